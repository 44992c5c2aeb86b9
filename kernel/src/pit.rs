//! Channel 0 of the programmable interval timer, the source of the periodic tick.

use bare_metal::cpu::io::{PortIo, PortNumber};

const CHANNEL0_DATA: PortNumber = PortNumber(0x40);
const MODE_COMMAND: PortNumber = PortNumber(0x43);

/// Channel 0, low byte then high byte, mode 3 (square wave), binary counting.
const CHANNEL0_SQUARE_WAVE: u8 = 0x36;

/// Input clock of the timer in Hz.
pub const BASE_FREQUENCY: u32 = 1_193_182;
/// Lowest rate that still fits a 16 bit divisor.
pub const MIN_FREQUENCY: u32 = 19;

/// Reload value for the requested rate, clamped to what the counter can hold.
pub fn divisor(hz: u32) -> u16 {
    let divisor = BASE_FREQUENCY / hz.max(1);
    divisor.clamp(1, u16::MAX as u32) as u16
}

/// Program channel 0 to fire at roughly `hz` times per second. Returns the divisor used.
pub unsafe fn set_frequency<P: PortIo + ?Sized>(ports: &mut P, hz: u32) -> u16 {
    let divisor = divisor(hz);
    debug!("[pit] {} Hz, divisor {}", hz, divisor);
    ports.outb(MODE_COMMAND, CHANNEL0_SQUARE_WAVE);
    ports.outb(CHANNEL0_DATA, (divisor & 0xFF) as u8);
    ports.outb(CHANNEL0_DATA, (divisor >> 8) as u8);
    divisor
}

#[cfg(test)]
mod test {
    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct Writes(Vec<(u16, u8)>);

    impl PortIo for Writes {
        unsafe fn outb(&mut self, port: PortNumber, data: u8) {
            self.0.push((port.0, data));
        }

        unsafe fn inb(&mut self, _port: PortNumber) -> u8 {
            0
        }
    }

    #[test]
    fn programs_channel0() {
        let mut ports = Writes::default();
        let divisor = unsafe { set_frequency(&mut ports, 100) };
        assert_eq!(divisor, 11931);
        assert_eq!(ports.0, [(0x43, 0x36), (0x40, 0x9B), (0x40, 0x2E)]);
    }

    #[test]
    fn divisor_limits() {
        assert_eq!(divisor(BASE_FREQUENCY), 1);
        assert_eq!(divisor(u32::MAX), 1);
        assert_eq!(divisor(MIN_FREQUENCY), 62799);
        assert_eq!(divisor(1), u16::MAX);
        assert_eq!(divisor(0), u16::MAX);
    }
}
