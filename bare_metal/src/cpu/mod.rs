pub mod io;

use core::arch::asm;

use crate::VirtAddr;

/// Interrupt enable flag in RFLAGS.
pub const RFLAGS_IF: u64 = 1 << 9;

/// Pause the CPU until the next interrupt arrives.
#[inline]
pub unsafe fn hlt() {
    asm!("hlt", options(nomem, nostack, preserves_flags));
}

/// Pause the CPU forever. Interrupts may still arrive,
/// depending on the interrupt flags of the CPU.
#[inline]
pub unsafe fn hang() -> ! {
    loop {
        hlt();
    }
}

/// Enable maskable interrupts on the current CPU.
#[inline]
pub unsafe fn enable_interrupts() {
    asm!("sti", options(nomem, nostack));
}

/// Disable maskable interrupts on the current CPU.
#[inline]
pub unsafe fn disable_interrupts() {
    asm!("cli", options(nomem, nostack));
}

/// Read the RFLAGS register.
#[inline]
pub fn read_rflags() -> u64 {
    let rflags: u64;
    unsafe {
        asm!("pushfq", "pop {}", out(reg) rflags, options(nomem, preserves_flags));
    }
    rflags
}

/// Return whether maskable interrupts are currently enabled.
#[inline]
pub fn interrupts_enabled() -> bool {
    read_rflags() & RFLAGS_IF != 0
}

/// Read the page table base register. The lower 12 bits hold flags (PCD, PWT or the PCID).
#[inline]
pub unsafe fn read_cr3() -> u64 {
    let value: u64;
    asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
    value
}

/// Remove the translation of a single page from the TLB.
#[inline]
pub unsafe fn invlpg(vaddr: VirtAddr) {
    asm!("invlpg [{}]", in(reg) vaddr.0, options(nostack, preserves_flags));
}

/// Operand of `lidt`: size and location of a descriptor table.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct DescriptorTablePointer {
    /// Size of the table in bytes, minus one.
    pub limit: u16,
    pub base: u64,
}

/// Load the interrupt descriptor table register.
#[inline]
pub unsafe fn lidt(pointer: &DescriptorTablePointer) {
    asm!("lidt [{}]", in(reg) pointer, options(readonly, nostack, preserves_flags));
}
