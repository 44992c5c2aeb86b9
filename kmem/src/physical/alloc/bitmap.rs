//! A page frame allocator keeping one bit per frame.
//!
//! Frames are handed out lowest address first. The scan is linear, which keeps
//! the allocation order deterministic.

use core::{cmp, slice};

use bare_metal::{PhysAddr, VirtAddr};

use crate::physical::PageFrame;
use super::PageFrameAllocator;

/// Statistics about the managed page frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFrameStats {
    pub total: usize,
    pub free: usize,
    pub used: usize,
}

/// Bitmap based page frame allocator. A set bit marks an allocated frame,
/// including the frames reserved at initialization.
pub struct BitmapFrameAllocator<'a> {
    bitmap: &'a mut [u8],
    total_frames: usize,
    free_frames: usize,
    reserved_frames: usize,
}

impl<'a> BitmapFrameAllocator<'a> {
    /// Number of bitmap bytes needed for tracking `total_frames` frames.
    pub const fn required_size_bytes(total_frames: usize) -> usize {
        (total_frames + 7) / 8
    }

    /// Build an allocator for `total_memory_bytes` of physical memory starting at address zero.
    ///
    /// The bitmap is cleared, then all frames overlapping `[0, reserved_bytes)` are marked as
    /// allocated. They are never handed out. The reserved area must cover the kernel image and,
    /// if it lives in the managed memory, the bitmap storage itself.
    ///
    /// # Panics
    ///
    /// Panics if `bitmap` is shorter than `required_size_bytes` for the given memory size.
    pub fn new(bitmap: &'a mut [u8], total_memory_bytes: usize, reserved_bytes: usize) -> Self {
        let total_frames = PageFrame::count_in(total_memory_bytes);
        let bitmap_len = Self::required_size_bytes(total_frames);
        assert!(bitmap.len() >= bitmap_len,
            "frame bitmap too small: {} bytes, need {}", bitmap.len(), bitmap_len);

        let bitmap = &mut bitmap[..bitmap_len];
        for byte in bitmap.iter_mut() {
            *byte = 0;
        }

        let reserved_frames = cmp::min(PageFrame::next_above(PhysAddr(reserved_bytes)).0, total_frames);
        let mut allocator = BitmapFrameAllocator {
            bitmap,
            total_frames,
            free_frames: total_frames,
            reserved_frames,
        };
        for frame in 0..reserved_frames {
            allocator.set(frame);
        }
        allocator.free_frames -= reserved_frames;

        debug!("[pfa] {} frames, {} reserved, bitmap {} B",
            total_frames, reserved_frames, bitmap_len);
        allocator
    }

    /// Number of frames that are reserved for the kernel and the bitmap.
    pub fn reserved_frames(&self) -> usize {
        self.reserved_frames
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn free_frames(&self) -> usize {
        self.free_frames
    }

    pub fn stats(&self) -> PageFrameStats {
        PageFrameStats {
            total: self.total_frames,
            free: self.free_frames,
            used: self.total_frames - self.free_frames,
        }
    }

    /// Return whether the frame is currently allocated.
    /// Frames outside the managed range are never reported as allocated.
    pub fn is_allocated(&self, frame: PageFrame) -> bool {
        frame.0 < self.total_frames && self.test(frame.0)
    }

    /// Release the frame containing the given physical address.
    pub fn free_address(&mut self, addr: PhysAddr) {
        self.free(PageFrame::including(addr))
    }

    fn test(&self, frame: usize) -> bool {
        self.bitmap[frame / 8] & (1 << (frame % 8)) != 0
    }

    fn set(&mut self, frame: usize) {
        self.bitmap[frame / 8] |= 1 << (frame % 8);
    }

    fn clear(&mut self, frame: usize) {
        self.bitmap[frame / 8] &= !(1 << (frame % 8));
    }

    /// Index of the lowest clear bit, if any.
    fn first_free(&self) -> Option<usize> {
        let (byte_index, byte) = self.bitmap.iter()
            .enumerate()
            .find(|(_, byte)| **byte != 0xFF)?;
        let frame = byte_index * 8 + (!*byte).trailing_zeros() as usize;
        // the last byte may have unused bits beyond the last frame
        if frame < self.total_frames {
            Some(frame)
        } else {
            None
        }
    }
}

impl BitmapFrameAllocator<'static> {
    /// Place the bitmap at the given (already mapped) address and initialize it.
    ///
    /// # Safety
    ///
    /// The memory at `addr` must be writable, at least `required_size_bytes` long and
    /// not be used by anything else for the lifetime of the kernel.
    pub unsafe fn from_addr(addr: VirtAddr, total_memory_bytes: usize, reserved_bytes: usize) -> Self {
        let len = Self::required_size_bytes(PageFrame::count_in(total_memory_bytes));
        let bitmap = slice::from_raw_parts_mut(addr.as_mut_ptr::<u8>(), len);
        Self::new(bitmap, total_memory_bytes, reserved_bytes)
    }
}

impl<'a> PageFrameAllocator for BitmapFrameAllocator<'a> {
    fn alloc(&mut self) -> Option<PageFrame> {
        if self.free_frames == 0 {
            return None;
        }
        let frame = self.first_free()?;
        self.set(frame);
        self.free_frames -= 1;
        trace!("[pfa] alloc {:p}", PageFrame(frame).start_address());
        Some(PageFrame(frame))
    }

    fn free(&mut self, frame: PageFrame) {
        if frame.0 >= self.total_frames || !self.test(frame.0) {
            debug!("[pfa] ignoring free of unallocated {}", frame);
            return;
        }
        self.clear(frame.0);
        self.free_frames += 1;
        trace!("[pfa] free {:p}", frame.start_address());
    }
}
