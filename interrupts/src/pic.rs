//! The two cascaded 8259 programmable interrupt controllers.

use bare_metal::cpu::io::{PortIo, PortNumber};

pub const PIC1_CMD: PortNumber = PortNumber(0x20);
pub const PIC1_DATA: PortNumber = PortNumber(0x21);
pub const PIC2_CMD: PortNumber = PortNumber(0xA0);
pub const PIC2_DATA: PortNumber = PortNumber(0xA1);

/// ICW4 will be sent
pub const ICW1_ICW4: u8 = 0x01;
/// Initialization
pub const ICW1_INIT: u8 = 0x10;
/// 8086/88 (MCS-80/85) mode
pub const ICW4_8086: u8 = 0x01;
/// Non-specific end of interrupt command.
pub const EOI: u8 = 0x20;

/// First vector used by the primary controller after remapping.
pub const PIC1_OFFSET: u8 = 32;
/// First vector used by the secondary controller after remapping.
pub const PIC2_OFFSET: u8 = 40;

/// Vector numbers of the sixteen remapped interrupt lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InterruptIndex(pub u8);

impl InterruptIndex {
    pub const TIMER: InterruptIndex = InterruptIndex(PIC1_OFFSET);
    pub const KEYBOARD: InterruptIndex = InterruptIndex(PIC1_OFFSET + 1);
    pub const CASCADE: InterruptIndex = InterruptIndex(PIC1_OFFSET + 2);
    pub const COM2: InterruptIndex = InterruptIndex(PIC1_OFFSET + 3);
    pub const COM1: InterruptIndex = InterruptIndex(PIC1_OFFSET + 4);
    pub const LPT2: InterruptIndex = InterruptIndex(PIC1_OFFSET + 5);
    pub const FLOPPY: InterruptIndex = InterruptIndex(PIC1_OFFSET + 6);
    pub const LPT1: InterruptIndex = InterruptIndex(PIC1_OFFSET + 7);
    pub const RTC: InterruptIndex = InterruptIndex(PIC2_OFFSET);
    pub const ACPI: InterruptIndex = InterruptIndex(PIC2_OFFSET + 1);
    pub const FREE1: InterruptIndex = InterruptIndex(PIC2_OFFSET + 2);
    pub const FREE2: InterruptIndex = InterruptIndex(PIC2_OFFSET + 3);
    pub const MOUSE: InterruptIndex = InterruptIndex(PIC2_OFFSET + 4);
    pub const FPU: InterruptIndex = InterruptIndex(PIC2_OFFSET + 5);
    pub const PRIMARY_ATA: InterruptIndex = InterruptIndex(PIC2_OFFSET + 6);
    pub const SECONDARY_ATA: InterruptIndex = InterruptIndex(PIC2_OFFSET + 7);

    pub fn vector(self) -> usize {
        self.0 as usize
    }

    /// The interrupt line (0-15) behind this vector.
    pub fn line(self) -> u8 {
        self.0 - PIC1_OFFSET
    }
}

/// Primary and secondary controller, wired together through line 2 of the primary.
pub struct ChainedPics<P> {
    ports: P,
    primary_offset: u8,
    secondary_offset: u8,
}

impl<P: PortIo> ChainedPics<P> {
    /// Controllers that will be remapped to vectors 32-47.
    pub const fn new(ports: P) -> Self {
        Self::with_offsets(ports, PIC1_OFFSET, PIC2_OFFSET)
    }

    pub const fn with_offsets(ports: P, primary_offset: u8, secondary_offset: u8) -> Self {
        ChainedPics { ports, primary_offset, secondary_offset }
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    /// Reinitialize both controllers, moving their lines to the configured vector offsets,
    /// and unmask all lines.
    pub unsafe fn initialize(&mut self) {
        debug!("[pic] remapping to {}/{}", self.primary_offset, self.secondary_offset);
        // ICW1: start initialization in cascade mode
        self.ports.outb(PIC1_CMD, ICW1_INIT | ICW1_ICW4);
        self.ports.outb(PIC2_CMD, ICW1_INIT | ICW1_ICW4);
        // ICW2: write new offsets
        self.ports.outb(PIC1_DATA, self.primary_offset);
        self.ports.outb(PIC2_DATA, self.secondary_offset);
        // ICW3: tell master that the slave is at IRQ2, and the slave its cascade identity
        self.ports.outb(PIC1_DATA, 1 << 2);
        self.ports.outb(PIC2_DATA, 2);
        // ICW4: tell PICs that they're in 8086 mode
        self.ports.outb(PIC1_DATA, ICW4_8086);
        self.ports.outb(PIC2_DATA, ICW4_8086);
        self.set_masks(0x00, 0x00);
        // make sure the keyboard line is open
        self.unmask(InterruptIndex::KEYBOARD.line());
    }

    /// Return the IRQ masks for the primary and secondary controller.
    pub unsafe fn masks(&mut self) -> (u8, u8) {
        (self.ports.inb(PIC1_DATA), self.ports.inb(PIC2_DATA))
    }

    pub unsafe fn set_masks(&mut self, primary: u8, secondary: u8) {
        self.ports.outb(PIC1_DATA, primary);
        self.ports.outb(PIC2_DATA, secondary);
    }

    /// Block a single line (0-15).
    pub unsafe fn mask(&mut self, line: u8) {
        let (port, bit) = Self::mask_bit(line);
        let value = self.ports.inb(port);
        self.ports.outb(port, value | bit);
    }

    /// Allow a single line (0-15).
    pub unsafe fn unmask(&mut self, line: u8) {
        let (port, bit) = Self::mask_bit(line);
        let value = self.ports.inb(port);
        self.ports.outb(port, value & !bit);
    }

    fn mask_bit(line: u8) -> (PortNumber, u8) {
        if line < 8 {
            (PIC1_DATA, 1 << line)
        } else {
            (PIC2_DATA, 1 << (line & 7))
        }
    }

    fn handled_by_primary(&self, vector: usize) -> bool {
        vector >= self.primary_offset as usize && vector < self.primary_offset as usize + 8
    }

    fn handled_by_secondary(&self, vector: usize) -> bool {
        vector >= self.secondary_offset as usize && vector < self.secondary_offset as usize + 8
    }

    /// Whether the vector belongs to one of the controller lines.
    pub fn handles_interrupt(&self, vector: usize) -> bool {
        self.handled_by_primary(vector) || self.handled_by_secondary(vector)
    }

    /// Acknowledge an interrupt. Lines of the secondary controller went through both
    /// controllers, so both need to be told. Other vectors are ignored.
    pub unsafe fn notify_end_of_interrupt(&mut self, vector: usize) {
        if !self.handles_interrupt(vector) {
            return;
        }
        if self.handled_by_secondary(vector) {
            self.ports.outb(PIC2_CMD, EOI);
        }
        self.ports.outb(PIC1_CMD, EOI);
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Access {
        Out(u16, u8),
        In(u16),
    }

    /// Port double that records accesses and simulates the mask registers.
    #[derive(Debug, Default)]
    pub struct RecordingPorts {
        pub log: Vec<Access>,
        pub primary_mask: u8,
        pub secondary_mask: u8,
    }

    impl PortIo for RecordingPorts {
        unsafe fn outb(&mut self, port: PortNumber, data: u8) {
            self.log.push(Access::Out(port.0, data));
            if port == PIC1_DATA {
                self.primary_mask = data;
            } else if port == PIC2_DATA {
                self.secondary_mask = data;
            }
        }

        unsafe fn inb(&mut self, port: PortNumber) -> u8 {
            self.log.push(Access::In(port.0));
            if port == PIC1_DATA {
                self.primary_mask
            } else if port == PIC2_DATA {
                self.secondary_mask
            } else {
                0
            }
        }
    }

    #[test]
    fn remap_sequence() {
        let mut pics = ChainedPics::new(RecordingPorts::default());
        unsafe { pics.initialize() };
        assert_eq!(pics.ports().log, [
            Access::Out(0x20, 0x11),
            Access::Out(0xA0, 0x11),
            Access::Out(0x21, 0x20),
            Access::Out(0xA1, 0x28),
            Access::Out(0x21, 0x04),
            Access::Out(0xA1, 0x02),
            Access::Out(0x21, 0x01),
            Access::Out(0xA1, 0x01),
            Access::Out(0x21, 0x00),
            Access::Out(0xA1, 0x00),
            Access::In(0x21),
            Access::Out(0x21, 0x00),
        ]);
    }

    #[test]
    fn end_of_interrupt() {
        let mut pics = ChainedPics::new(RecordingPorts::default());
        unsafe {
            pics.notify_end_of_interrupt(32);
            pics.notify_end_of_interrupt(39);
        }
        assert_eq!(pics.ports().log, [Access::Out(0x20, 0x20), Access::Out(0x20, 0x20)]);

        let mut pics = ChainedPics::new(RecordingPorts::default());
        unsafe {
            pics.notify_end_of_interrupt(40);
            pics.notify_end_of_interrupt(47);
        }
        assert_eq!(pics.ports().log, [
            Access::Out(0xA0, 0x20), Access::Out(0x20, 0x20),
            Access::Out(0xA0, 0x20), Access::Out(0x20, 0x20),
        ]);

        let mut pics = ChainedPics::new(RecordingPorts::default());
        unsafe {
            pics.notify_end_of_interrupt(14);
            pics.notify_end_of_interrupt(48);
        }
        assert!(pics.ports().log.is_empty());
    }

    #[test]
    fn masking_single_lines() {
        let mut pics = ChainedPics::new(RecordingPorts::default());
        unsafe {
            pics.set_masks(0xFF, 0xFF);
            pics.unmask(InterruptIndex::TIMER.line());
            pics.unmask(InterruptIndex::MOUSE.line());
            assert_eq!(pics.masks(), (0xFE, 0xEF));
            pics.mask(InterruptIndex::TIMER.line());
            assert_eq!(pics.masks(), (0xFF, 0xEF));
        }
    }

    #[test]
    fn vector_ranges() {
        let pics = ChainedPics::new(RecordingPorts::default());
        assert!(!pics.handles_interrupt(31));
        assert!(pics.handles_interrupt(32));
        assert!(pics.handles_interrupt(47));
        assert!(!pics.handles_interrupt(48));
        assert_eq!(InterruptIndex::KEYBOARD.vector(), 33);
        assert_eq!(InterruptIndex::SECONDARY_ATA.line(), 15);
    }
}
