use core::mem;
use core::ops;

use bare_metal::cpu::{self, DescriptorTablePointer};
use bare_metal::segments::{Ring, Selector};

/// Number of vectors of the x86_64 interrupt descriptor table.
pub const VECTOR_COUNT: usize = 256;

/// Low-level entry point installed in a gate. It never returns in the Rust
/// sense, it leaves through `iretq`.
pub type EntryStub = unsafe extern "C" fn();

/// Load an IDT for the current CPU.
///
/// # Safety
///
/// The table must stay alive and unchanged for as long as it is loaded.
pub unsafe fn load_idt(idt: &'static Idt) {
    let pointer = DescriptorTablePointer {
        limit: mem::size_of::<Idt>() as u16 - 1,
        base: idt as *const Idt as u64,
    };
    cpu::lidt(&pointer);
}

/// The 256 gates of the interrupt descriptor table.
#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; VECTOR_COUNT],
}

assert_eq_size!(Idt, [u64; 512]);

impl Idt {
    pub const fn new() -> Idt {
        Idt {
            entries: [IdtEntry::empty(); VECTOR_COUNT],
        }
    }

    /// Install `stub` as a ring 0 interrupt gate in the kernel code segment.
    pub fn set_gate(&mut self, vector: u8, stub: EntryStub) {
        self[vector] = IdtEntry::new(GateType::Interrupt, Selector::KERNEL_CODE, stub as usize, Ring::RING0);
    }

    /// Wire vectors `0..stubs.len()` to the given stubs, leaving all others empty.
    pub fn with_stubs(stubs: &[EntryStub]) -> Idt {
        let mut idt = Idt::new();
        for (vector, stub) in stubs.iter().enumerate().take(VECTOR_COUNT) {
            idt.set_gate(vector as u8, *stub);
        }
        trace!("[idt] {} stubs installed", stubs.len());
        idt
    }

    /// Number of present entries.
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.present()).count()
    }
}

impl ops::Index<u8> for Idt {
    type Output = IdtEntry;

    fn index(&self, idx: u8) -> &IdtEntry {
        &self.entries[idx as usize]
    }
}

impl ops::IndexMut<u8> for Idt {
    fn index_mut(&mut self, idx: u8) -> &mut IdtEntry {
        &mut self.entries[idx as usize]
    }
}

/// Gate descriptor of the 64 bit IDT.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(C)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    ist: u8,
    /// present, two DPL bits, a zero bit and the four bit gate type
    attributes: u8,
    offset_middle: u16,
    offset_high: u32,
    reserved: u32,
}

assert_eq_size!(IdtEntry, [u64; 2]);

/// Gate kinds of long mode. Interrupt gates clear IF on entry, trap gates keep it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GateType {
    Interrupt = 0xE,
    Trap = 0xF,
}

impl IdtEntry {
    const PRESENT: u8 = 0x80;

    /// A non-present entry. Delivering its vector raises a general protection fault.
    pub const fn empty() -> IdtEntry {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            ist: 0,
            attributes: GateType::Interrupt as u8,
            offset_middle: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    pub fn new(gate_type: GateType, selector: Selector, handler: usize, dpl: Ring) -> IdtEntry {
        IdtEntry {
            offset_low: handler as u16,
            selector: selector.0,
            ist: 0,
            attributes: Self::PRESENT | (dpl.number() << 5) | gate_type as u8,
            offset_middle: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            reserved: 0,
        }
    }

    pub fn present(&self) -> bool {
        self.attributes & Self::PRESENT != 0
    }

    /// The raw attribute byte, `0x8E` for a present ring 0 interrupt gate.
    pub fn type_attributes(&self) -> u8 {
        self.attributes
    }

    pub fn handler_address(&self) -> usize {
        self.offset_low as usize | (self.offset_middle as usize) << 16 | (self.offset_high as usize) << 32
    }

    pub fn selector(&self) -> Selector {
        Selector(self.selector)
    }

    pub fn gate_type(&self) -> Option<GateType> {
        match self.attributes & 0xF {
            0xE => Some(GateType::Interrupt),
            0xF => Some(GateType::Trap),
            _ => None,
        }
    }

    /// Lowest privilege level allowed to raise this vector with `int`.
    pub fn descriptor_privilege(&self) -> Ring {
        Ring::new((self.attributes >> 5) & 0b11).unwrap_or(Ring::RING0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    unsafe extern "C" fn test_stub() {}

    #[test]
    fn gate_fields() {
        let e = IdtEntry::new(GateType::Trap, Selector(0x2B), 0xFFFF_8000_1234_5678, Ring::RING3);
        assert!(e.present());
        assert_eq!(e.handler_address(), 0xFFFF_8000_1234_5678);
        assert_eq!(e.selector(), Selector(0x2B));
        assert_eq!(e.gate_type(), Some(GateType::Trap));
        assert_eq!(e.descriptor_privilege(), Ring::RING3);
        assert_eq!(e.type_attributes(), 0xEF);
    }

    #[test]
    fn empty_entry() {
        let e = IdtEntry::empty();
        assert!(!e.present());
        assert_eq!(e.handler_address(), 0);
        assert_eq!(e.descriptor_privilege(), Ring::RING0);
        assert_eq!(e.selector(), Selector(0));
    }

    #[test]
    fn kernel_interrupt_gate() {
        let mut idt = Idt::new();
        assert_eq!(idt.present_count(), 0);
        idt.set_gate(14, test_stub);

        let e = idt[14];
        assert!(e.present());
        assert_eq!(e.type_attributes(), 0x8E);
        assert_eq!(e.selector(), Selector(0x08));
        assert_eq!(e.handler_address(), test_stub as usize);
        assert_eq!(idt.present_count(), 1);
        assert!(!idt[13].present());
    }

    #[test]
    fn stubs_fill_the_first_vectors() {
        let stubs = [test_stub as EntryStub; 48];
        let idt = Idt::with_stubs(&stubs);
        assert_eq!(idt.present_count(), 48);
        assert!(idt[0].present());
        assert!(idt[47].present());
        assert!(!idt[48].present());
        assert_eq!(idt[255], IdtEntry::empty());
    }
}
