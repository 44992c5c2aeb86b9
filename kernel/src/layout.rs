//! Fixed places in the physical and virtual address space.

use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::direct::DirectMapping;

/// Where the frame bitmap is stored, right above the legacy first MiB.
pub const FRAME_BITMAP: PhysAddr = PhysAddr(0x10_0000);

/// Physical memory below this address holds the kernel image and the bitmap
/// and is never handed out.
pub const RESERVED_BYTES: usize = 2 * 1024 * 1024;

/// Largest bitmap that fits between `FRAME_BITMAP` and the end of the reserved area.
pub const MAX_BITMAP_BYTES: usize = RESERVED_BYTES - FRAME_BITMAP.0;

/// Largest amount of physical memory the bitmap can describe.
pub const MAX_MEMORY_BYTES: usize = MAX_BITMAP_BYTES * 8 * kmem::PAGE_SIZE;

/// First virtual address handed out for heap pages.
pub const HEAP_START: VirtAddr = VirtAddr(0x40_0000);

/// Upper bound of the kernel heap. It never takes more than half of physical memory either.
pub const MAX_HEAP_BYTES: usize = 64 * 1024 * 1024;

pub fn heap_limit(memory_bytes: usize) -> usize {
    core::cmp::min(MAX_HEAP_BYTES, memory_bytes / 2)
}

/// The boot code identity maps physical memory.
pub const fn physical_memory(memory_bytes: usize) -> DirectMapping {
    DirectMapping::identity(memory_bytes)
}

const_assert!(HEAP_START.0 >= RESERVED_BYTES);
