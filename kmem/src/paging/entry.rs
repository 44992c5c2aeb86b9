use bare_metal::PhysAddr;

/// An entry in a page table at any level of the hierarchy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

bitflags! {
    pub struct Flags : u64 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE      = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        // in a PD or PDP entry, this maps a 2 MiB or 1 GiB page.
        // Must be zero in PML4.
        const HUGE          = 1 << 7;
        const GLOBAL        = 1 << 8;
        const NO_EXECUTE    = 1 << 63;
    }
}

impl PageTableEntry {
    // mask for valid physical base addresses
    const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    pub const fn new() -> Self {
        PageTableEntry(0)
    }

    /// Build an entry pointing at `addr` with the given flags.
    pub fn with(addr: PhysAddr, flags: Flags) -> Self {
        let mut entry = Self::new();
        entry.set_base(addr);
        entry.set_flags(flags);
        entry
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.0)
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.0 = (self.0 & Self::ADDR_MASK) | flags.bits();
    }

    pub fn is_present(&self) -> bool {
        self.flags().contains(Flags::PRESENT)
    }

    /// Whether this entry maps a large page instead of pointing to the next table.
    pub fn is_huge(&self) -> bool {
        self.flags().contains(Flags::PRESENT | Flags::HUGE)
    }

    /// Return the physical page address of the page or page table pointed to by this entry.
    pub fn base(&self) -> PhysAddr {
        PhysAddr((self.0 & Self::ADDR_MASK) as usize)
    }

    /// Set the physical base address in this entry.
    /// The address is aligned downwards if necessary.
    pub fn set_base(&mut self, addr: PhysAddr) {
        self.0 = (self.0 & !Self::ADDR_MASK) | (addr.0 as u64 & Self::ADDR_MASK);
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_table_entry_accessors() {
        let mut pte = PageTableEntry::new();

        let flags = Flags::PRESENT | Flags::HUGE | Flags::USER | Flags::NO_EXECUTE;
        let addr = PhysAddr(0x0008_0F7A_BA02_1000);

        pte.set_flags(flags);
        pte.set_base(addr);
        assert_eq!(pte.flags(), flags, "flag roundtrip failed");
        assert_eq!(pte.base(), addr, "addr roundtrip failed");

        // set fields in a different order now
        pte.set_base(PhysAddr(0x1234_5FFF));
        pte.set_flags(Flags::PRESENT);
        assert_eq!(pte.flags(), Flags::PRESENT);
        assert_eq!(pte.base(), PhysAddr(0x1234_5000));
        assert!(pte.is_present());
        assert!(!pte.is_huge());
    }

    #[test]
    fn leaf_encoding() {
        let pte = PageTableEntry::with(PhysAddr(0x20_3000), Flags::PRESENT | Flags::WRITABLE);
        assert_eq!(pte.raw(), 0x20_3003);
    }
}
