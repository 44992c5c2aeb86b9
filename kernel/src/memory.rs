//! The kernel's single instance of the memory managers.
//!
//! Frame allocator, address space and heap live together behind one lock that is
//! only ever taken with interrupts masked.

use core::alloc::{GlobalAlloc, Layout};
use core::fmt;
use core::ptr::{self, NonNull};

use bare_metal::{cpu, PhysAddr, VirtAddr};
use interrupts::{without_interrupts, CpuControl};
use kmem::heap::{BlockHeap, HeapStats, HEAP_ALIGN};
use kmem::paging::{AddressSpace, BackedPages, CpuTlb};
use kmem::physical::alloc::{BitmapFrameAllocator, PageFrameStats};
use spin::Mutex;

use crate::config::KernelConfig;
use crate::layout;

/// Mask for the table address stored in CR3.
const CR3_ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

pub struct MemoryManager {
    pub frames: BitmapFrameAllocator<'static>,
    pub space: AddressSpace<CpuTlb>,
    pub heap: BlockHeap,
}

impl MemoryManager {
    /// The heap grows with freshly mapped pages of the address space.
    unsafe fn heap_allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let mut pages = BackedPages { space: &mut self.space, frames: &mut self.frames };
        self.heap.allocate(size, &mut pages)
    }

    unsafe fn heap_reallocate(&mut self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        let mut pages = BackedPages { space: &mut self.space, frames: &mut self.frames };
        self.heap.reallocate(ptr, new_size, &mut pages)
    }
}

static MEMORY: Mutex<Option<MemoryManager>> = Mutex::new(None);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryInitError {
    AlreadyInitialized,
    /// Not even the first heap page could be mapped.
    HeapUnavailable,
}

impl fmt::Display for MemoryInitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryInitError::AlreadyInitialized => write!(f, "memory management is already initialized"),
            MemoryInitError::HeapUnavailable => write!(f, "no memory for the kernel heap"),
        }
    }
}

/// Run `f` on the memory managers with interrupts masked. `None` before `init`.
pub fn with_memory<F, R>(f: F) -> Option<R>
    where F: FnOnce(&mut MemoryManager) -> R
{
    without_interrupts(&mut CpuControl, || MEMORY.lock().as_mut().map(f))
}

/// Set up the frame bitmap, take over the active page tables and create the heap.
pub fn init(config: &KernelConfig) -> Result<(), MemoryInitError> {
    let mut memory_bytes = config.memory_bytes;
    if memory_bytes > layout::MAX_MEMORY_BYTES {
        warn!("[boot] only using {} of {} bytes of memory", layout::MAX_MEMORY_BYTES, memory_bytes);
        memory_bytes = layout::MAX_MEMORY_BYTES;
    }
    let direct = layout::physical_memory(memory_bytes);

    without_interrupts(&mut CpuControl, || {
        let mut memory = MEMORY.lock();
        if memory.is_some() {
            return Err(MemoryInitError::AlreadyInitialized);
        }

        let frames = unsafe {
            BitmapFrameAllocator::from_addr(direct.phys_to_virt(layout::FRAME_BITMAP), memory_bytes, layout::RESERVED_BYTES)
        };
        let root = PhysAddr((unsafe { cpu::read_cr3() } & CR3_ADDR_MASK) as usize);
        let space = unsafe { AddressSpace::new(root, direct, layout::HEAP_START, CpuTlb) };
        info!("[boot] {} page frames, {} free, page tables at {:p}",
            frames.total_frames(), frames.free_frames(), root);

        let heap = BlockHeap::with_limit(layout::heap_limit(memory_bytes));
        let mut manager = MemoryManager { frames, space, heap };
        let mut pages = BackedPages { space: &mut manager.space, frames: &mut manager.frames };
        if !unsafe { manager.heap.init(&mut pages) } {
            return Err(MemoryInitError::HeapUnavailable);
        }
        *memory = Some(manager);
        Ok(())
    })
}

pub fn frame_stats() -> Option<PageFrameStats> {
    with_memory(|memory| memory.frames.stats())
}

pub fn heap_stats() -> Option<HeapStats> {
    with_memory(|memory| memory.heap.stats())
}

/// Map a fresh page at the next free virtual address.
pub fn allocate_page() -> Option<VirtAddr> {
    with_memory(|memory| memory.space.allocate_page(&mut memory.frames)).flatten()
}

/// Unmap a page obtained from `allocate_page` and release its frame.
///
/// # Safety
///
/// The page must not be used anymore.
pub unsafe fn free_page(vaddr: VirtAddr) {
    with_memory(|memory| memory.space.free_page(vaddr, &mut memory.frames));
}

/// `GlobalAlloc` adapter around the kernel heap. Alignments above 16 bytes are not supported.
pub struct KernelAllocator;

unsafe impl GlobalAlloc for KernelAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > HEAP_ALIGN {
            warn!("[heap] unsupported alignment {}", layout.align());
            return ptr::null_mut();
        }
        with_memory(|memory| memory.heap_allocate(layout.size()))
            .flatten()
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            with_memory(|memory| memory.heap.free(ptr));
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let ptr = match NonNull::new(ptr) {
            Some(ptr) if layout.align() <= HEAP_ALIGN => ptr,
            _ => return ptr::null_mut(),
        };
        with_memory(|memory| memory.heap_reallocate(ptr, new_size))
            .flatten()
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }
}

#[cfg_attr(not(test), global_allocator)]
pub static ALLOCATOR: KernelAllocator = KernelAllocator;
