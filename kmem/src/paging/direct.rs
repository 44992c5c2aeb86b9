use bare_metal::{PhysAddr, VirtAddr};

/// A linear window through which physical memory can be accessed.
///
/// Physical address `physical_base + x` is visible at `virtual_base + x` for all
/// `x < size_in_bytes`. The boot environment identity maps the low physical memory,
/// so the kernel uses `DirectMapping::identity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMapping {
    virtual_base: VirtAddr,
    physical_base: PhysAddr,
    size_in_bytes: usize,
}

impl DirectMapping {
    pub const fn new(virtual_base: VirtAddr, physical_base: PhysAddr, size_in_bytes: usize) -> Self {
        DirectMapping { virtual_base, physical_base, size_in_bytes }
    }

    /// Physical memory `[0, size_in_bytes)` visible at the same virtual addresses.
    pub const fn identity(size_in_bytes: usize) -> Self {
        Self::new(VirtAddr(0), PhysAddr(0), size_in_bytes)
    }

    pub fn virtual_base(&self) -> VirtAddr {
        self.virtual_base
    }

    pub fn physical_base(&self) -> PhysAddr {
        self.physical_base
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn contains_phys(&self, phys_addr: PhysAddr) -> bool {
        phys_addr >= self.physical_base && phys_addr.0 - self.physical_base.0 < self.size_in_bytes
    }

    pub fn contains_virt(&self, virt_addr: VirtAddr) -> bool {
        virt_addr >= self.virtual_base && virt_addr.0 - self.virtual_base.0 < self.size_in_bytes
    }

    /// Translates a physical address through the window, if it is covered.
    pub fn try_phys_to_virt(&self, phys_addr: PhysAddr) -> Option<VirtAddr> {
        if self.contains_phys(phys_addr) {
            Some(VirtAddr(phys_addr.0 - self.physical_base.0 + self.virtual_base.0))
        } else {
            None
        }
    }

    /// Translates a physical to a virtual address.
    ///
    /// # Panics
    ///
    /// Panics if the physical address is not covered by the window.
    pub fn phys_to_virt(&self, phys_addr: PhysAddr) -> VirtAddr {
        match self.try_phys_to_virt(phys_addr) {
            Some(vaddr) => vaddr,
            None => panic!("[DirectMapping] physical address {:p} out of bounds", phys_addr),
        }
    }

    /// Translates a virtual address inside the window back to its physical address.
    ///
    /// # Panics
    ///
    /// Panics if the virtual address is not covered by the window.
    pub fn virt_to_phys(&self, virt_addr: VirtAddr) -> PhysAddr {
        if !self.contains_virt(virt_addr) {
            panic!("[DirectMapping] virtual address {:p} out of bounds", virt_addr);
        }
        PhysAddr(virt_addr.0 - self.virtual_base.0 + self.physical_base.0)
    }
}
