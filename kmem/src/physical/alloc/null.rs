//! An allocator that allocates nothing.

use crate::physical::PageFrame;

/// A null allocator that returns None on every allocation request and ignores frees.
/// Useful wherever an out-of-memory situation has to be forced.
pub struct NullAllocator;

impl super::PageFrameAllocator for NullAllocator {
    fn alloc(&mut self) -> Option<PageFrame> {
        None
    }

    fn free(&mut self, _frame: PageFrame) { }
}
