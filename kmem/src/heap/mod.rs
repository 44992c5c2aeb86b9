//! The kernel heap.
//!
//! All blocks, used or free, form one doubly linked list ordered by address.
//! Each block starts with a `BlockHeader`, directly followed by its payload.
//! Allocation is first-fit and splits off the unused rest of a block. Freed
//! blocks are merged with free neighbours that touch them in memory.
//! The heap grows page by page, taking its pages from a `PageSource`, up to a
//! fixed limit. Growth is all or nothing: pages of an attempt that cannot be
//! completed go back to the source.

use core::cmp;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

use bare_metal::{CheckedAlign, VirtAddr};

use crate::PAGE_SIZE;

/// Alignment of every payload and every block size.
pub const HEAP_ALIGN: usize = 16;

/// Size of the header preceding each payload.
pub const HEADER_SIZE: usize = 32;

/// Supplies the heap with fresh, writable pages.
pub trait PageSource {
    /// Provide one more page, or `None` when memory is exhausted.
    fn allocate_page(&mut self) -> Option<VirtAddr>;

    /// Take back a page handed out by `allocate_page`.
    ///
    /// # Safety
    ///
    /// The page must not be used anymore.
    unsafe fn release_page(&mut self, page: VirtAddr);
}

type Link = Option<NonNull<BlockHeader>>;

#[repr(C)]
struct BlockHeader {
    /// Payload size in bytes, excluding the header.
    size: usize,
    free: bool,
    prev: Link,
    next: Link,
}

const_assert_eq!(mem::size_of::<BlockHeader>(), HEADER_SIZE);
const_assert_eq!(HEADER_SIZE % HEAP_ALIGN, 0);

unsafe fn header<'h>(block: NonNull<BlockHeader>) -> &'h mut BlockHeader {
    &mut *block.as_ptr()
}

fn payload(block: NonNull<BlockHeader>) -> NonNull<u8> {
    // a header is never placed at the very end of the address space
    unsafe { NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(HEADER_SIZE)) }
}

/// Whether `second` starts right where `first` ends.
unsafe fn touching(first: NonNull<BlockHeader>, second: NonNull<BlockHeader>) -> bool {
    first.as_ptr() as usize + HEADER_SIZE + header(first).size == second.as_ptr() as usize
}

/// Usage summary of the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Bytes received from the page source.
    pub donated: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    pub blocks: usize,
    pub free_blocks: usize,
}

/// Public view of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the payload.
    pub addr: VirtAddr,
    pub size: usize,
    pub free: bool,
}

/// A first-fit heap over a list of blocks.
///
/// The heap owns every page it received. All methods that touch memory are unsafe,
/// because the heap trusts its page source and the pointers passed back to it.
pub struct BlockHeap {
    head: Link,
    donated: usize,
    /// Upper bound for `donated`.
    limit: usize,
}

// the raw pointers only ever point into pages owned by the heap
unsafe impl Send for BlockHeap {}

impl BlockHeap {
    /// A heap without a size limit.
    pub const fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// A heap that never takes more than `limit` bytes from its page source.
    pub const fn with_limit(limit: usize) -> Self {
        BlockHeap { head: None, donated: 0, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_initialized(&self) -> bool {
        self.head.is_some()
    }

    /// Create the first free block from a single page.
    ///
    /// # Safety
    ///
    /// Pages returned by `pages` must be writable and exclusively owned by this heap from now on.
    pub unsafe fn init<P: PageSource + ?Sized>(&mut self, pages: &mut P) -> bool {
        if self.is_initialized() {
            warn!("[heap] already initialized");
            return true;
        }
        if self.limit < PAGE_SIZE {
            error!("[heap] limit of {} bytes is below one page", self.limit);
            return false;
        }
        match pages.allocate_page() {
            Some(page) => {
                self.add_page(page);
                debug!("[heap] initialized at {:p}", page);
                true
            }
            None => {
                error!("[heap] no page for the initial block");
                false
            }
        }
    }

    /// Allocate `size` bytes, aligned to `HEAP_ALIGN`.
    ///
    /// When no free block is large enough, the heap grows by as many pages as the
    /// request needs and tries once more. Returns `None` before `init`, if the growth
    /// would exceed the limit, or if the page source cannot supply all needed pages.
    ///
    /// # Safety
    ///
    /// See `init`.
    pub unsafe fn allocate<P: PageSource + ?Sized>(&mut self, size: usize, pages: &mut P) -> Option<NonNull<u8>> {
        if !self.is_initialized() {
            return None;
        }
        let size = cmp::max(size.checked_align_up(HEAP_ALIGN)?, HEAP_ALIGN);

        let block = match self.first_fit(size) {
            Some(block) => block,
            None => {
                let page_count = size.checked_add(HEADER_SIZE)?.checked_align_up(PAGE_SIZE)? / PAGE_SIZE;
                if !self.grow(page_count, pages) {
                    return None;
                }
                match self.first_fit(size) {
                    Some(block) => block,
                    None => {
                        warn!("[heap] out of memory for {} bytes", size);
                        return None;
                    }
                }
            }
        };

        self.split(block, size);
        header(block).free = false;
        trace!("[heap] allocate {} -> {:p}", size, payload(block));
        Some(payload(block))
    }

    /// Release an allocation. Pointers that were not handed out by this heap, or that
    /// are already free, are ignored.
    ///
    /// # Safety
    ///
    /// The memory must not be used after it was freed.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let block = match self.find(ptr) {
            Some(block) => block,
            None => {
                warn!("[heap] ignoring free of unknown pointer {:p}", ptr);
                return;
            }
        };
        if header(block).free {
            warn!("[heap] ignoring double free of {:p}", ptr);
            return;
        }
        trace!("[heap] free {:p}", ptr);
        header(block).free = true;
        self.coalesce(block);
    }

    /// Resize an allocation.
    ///
    /// If the block is already large enough, the same pointer is returned. Otherwise the
    /// contents move to a new allocation and the old one is freed. On failure, `None` is
    /// returned and the original allocation stays valid.
    ///
    /// # Safety
    ///
    /// See `init` and `free`.
    pub unsafe fn reallocate<P: PageSource + ?Sized>(&mut self, ptr: NonNull<u8>, new_size: usize, pages: &mut P) -> Option<NonNull<u8>> {
        let block = match self.find(ptr) {
            Some(block) if !header(block).free => block,
            _ => {
                warn!("[heap] cannot reallocate {:p}", ptr);
                return None;
            }
        };
        let old_size = header(block).size;
        if new_size <= old_size {
            return Some(ptr);
        }

        let new_ptr = self.allocate(new_size, pages)?;
        ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size);
        self.free(ptr);
        Some(new_ptr)
    }

    /// Payload size of the block backing an allocation.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.find(ptr).map(|block| unsafe { header(block).size })
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats { donated: self.donated, ..HeapStats::default() };
        for block in self.blocks() {
            stats.blocks += 1;
            if block.free {
                stats.free_blocks += 1;
                stats.free_bytes += block.size;
            } else {
                stats.used_bytes += block.size;
            }
        }
        stats
    }

    /// Iterate over all blocks in address order.
    pub fn blocks(&self) -> Blocks {
        Blocks { next: self.head, _heap: PhantomData }
    }

    fn find(&self, ptr: NonNull<u8>) -> Option<NonNull<BlockHeader>> {
        let mut cursor = self.head;
        while let Some(block) = cursor {
            if payload(block) == ptr {
                return Some(block);
            }
            cursor = unsafe { header(block).next };
        }
        None
    }

    fn first_fit(&self, size: usize) -> Option<NonNull<BlockHeader>> {
        let mut cursor = self.head;
        while let Some(block) = cursor {
            let h = unsafe { header(block) };
            if h.free && h.size >= size {
                return Some(block);
            }
            cursor = h.next;
        }
        None
    }

    /// Shrink `block` to `size` if the rest can hold another block.
    unsafe fn split(&mut self, block: NonNull<BlockHeader>, size: usize) {
        let h = header(block);
        let rest = h.size - size;
        if rest <= HEADER_SIZE {
            return;
        }
        let split = block.as_ptr().cast::<u8>().add(HEADER_SIZE + size).cast::<BlockHeader>();
        split.write(BlockHeader {
            size: rest - HEADER_SIZE,
            free: true,
            prev: Some(block),
            next: h.next,
        });
        let split = NonNull::new_unchecked(split);
        if let Some(next) = h.next {
            header(next).prev = Some(split);
        }
        h.next = Some(split);
        h.size = size;
    }

    /// Add `page_count` pages to the heap, or none at all.
    unsafe fn grow<P: PageSource + ?Sized>(&mut self, page_count: usize, pages: &mut P) -> bool {
        let within_limit = page_count.checked_mul(PAGE_SIZE)
            .and_then(|bytes| bytes.checked_add(self.donated))
            .map_or(false, |total| total <= self.limit);
        if !within_limit {
            warn!("[heap] growing by {} pages would exceed the limit of {} bytes", page_count, self.limit);
            return false;
        }
        debug!("[heap] growing by {} pages", page_count);

        // pages of this attempt form a stack, each one storing the address of its predecessor
        let mut staged: Option<VirtAddr> = None;
        for obtained in 0..page_count {
            match pages.allocate_page() {
                Some(page) => {
                    page.as_mut_ptr::<Option<VirtAddr>>().write(staged);
                    staged = Some(page);
                }
                None => {
                    warn!("[heap] page source exhausted after {} of {} pages", obtained, page_count);
                    while let Some(page) = staged {
                        staged = page.as_ptr::<Option<VirtAddr>>().read();
                        pages.release_page(page);
                    }
                    return false;
                }
            }
        }
        while let Some(page) = staged {
            staged = page.as_ptr::<Option<VirtAddr>>().read();
            self.add_page(page);
        }
        true
    }

    /// Turn a page into a free block and link it in.
    unsafe fn add_page(&mut self, page: VirtAddr) {
        let block = page.as_mut_ptr::<BlockHeader>();
        block.write(BlockHeader {
            size: PAGE_SIZE - HEADER_SIZE,
            free: true,
            prev: None,
            next: None,
        });
        let block = NonNull::new_unchecked(block);
        self.insert(block);
        self.donated += PAGE_SIZE;
        self.coalesce(block);
    }

    /// Link an unlinked block at its place in address order.
    unsafe fn insert(&mut self, block: NonNull<BlockHeader>) {
        let mut prev: Link = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if current.as_ptr() > block.as_ptr() {
                break;
            }
            prev = cursor;
            cursor = header(current).next;
        }

        let h = header(block);
        h.prev = prev;
        h.next = cursor;
        match prev {
            Some(prev) => header(prev).next = Some(block),
            None => self.head = Some(block),
        }
        if let Some(next) = cursor {
            header(next).prev = Some(block);
        }
    }

    /// Merge a free block with its free neighbours, as far as they touch it in memory.
    unsafe fn coalesce(&mut self, block: NonNull<BlockHeader>) {
        if let Some(next) = header(block).next {
            if header(next).free && touching(block, next) {
                Self::absorb(block, next);
            }
        }
        if let Some(prev) = header(block).prev {
            if header(prev).free && touching(prev, block) {
                Self::absorb(prev, block);
            }
        }
    }

    /// Extend `first` over the directly following `second`.
    unsafe fn absorb(first: NonNull<BlockHeader>, second: NonNull<BlockHeader>) {
        let second = header(second);
        let first_header = header(first);
        first_header.size += HEADER_SIZE + second.size;
        first_header.next = second.next;
        if let Some(next) = second.next {
            header(next).prev = Some(first);
        }
    }
}

/// Iterator over the blocks of a heap.
pub struct Blocks<'h> {
    next: Link,
    _heap: PhantomData<&'h BlockHeap>,
}

impl<'h> Iterator for Blocks<'h> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let block = self.next?;
        let h = unsafe { header(block) };
        self.next = h.next;
        Some(BlockInfo {
            addr: VirtAddr(payload(block).as_ptr() as usize),
            size: h.size,
            free: h.free,
        })
    }
}
