//! Page frame allocation.

mod bitmap;
mod null;

use crate::physical::PageFrame;

pub use self::bitmap::{BitmapFrameAllocator, PageFrameStats};
pub use self::null::NullAllocator;

/// Generic interface for a page frame allocator.
pub trait PageFrameAllocator {
    /// Allocate a single page frame.
    fn alloc(&mut self) -> Option<PageFrame>;
    /// Free a single page frame previously allocated via `alloc`.
    fn free(&mut self, frame: PageFrame);
}
