//! Provides primitive operations for working with the CPUs I/O ports

use core::arch::asm;
use core::ops;

pub mod com;

/// A CPU I/O port number.
#[derive(Debug, Eq, PartialEq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct PortNumber(pub u16);

impl ops::Add<u16> for PortNumber {
    type Output = PortNumber;

    fn add(self, offset: u16) -> PortNumber {
        PortNumber(self.0 + offset)
    }
}

/// Byte-wide access to I/O ports.
///
/// Code that drives legacy devices is written against this trait, so the exact
/// sequence of port accesses can be checked without touching real hardware.
pub trait PortIo {
    unsafe fn outb(&mut self, port: PortNumber, data: u8);
    unsafe fn inb(&mut self, port: PortNumber) -> u8;
}

/// Port access through the `in`/`out` instructions of the current CPU.
#[derive(Debug, Default, Copy, Clone)]
pub struct CpuPorts;

impl PortIo for CpuPorts {
    #[inline]
    unsafe fn outb(&mut self, port: PortNumber, data: u8) {
        outb(port, data)
    }

    #[inline]
    unsafe fn inb(&mut self, port: PortNumber) -> u8 {
        inb(port)
    }
}

// unsafe primitives

#[inline]
pub unsafe fn outb(port: PortNumber, data: u8) {
    asm!("out dx, al", in("dx") port.0, in("al") data, options(nomem, nostack, preserves_flags));
}

#[inline]
pub unsafe fn inb(port: PortNumber) -> u8 {
    let data: u8;
    asm!("in al, dx", out("al") data, in("dx") port.0, options(nomem, nostack, preserves_flags));
    data
}
