use core::fmt;

use bare_metal::{Alignable, PhysAddr};

use crate::{PAGE_ALIGN_BITS, PAGE_SIZE};

pub mod alloc;

/// Index of a 4 KiB physical frame. Frame `n` covers `[n * 4096, (n + 1) * 4096)`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct PageFrame(pub usize);

impl PageFrame {
    /// The first frame that starts at or above `addr`.
    pub fn next_above(addr: PhysAddr) -> PageFrame {
        PageFrame(addr.align_up(PAGE_SIZE).0 >> PAGE_ALIGN_BITS)
    }

    /// The frame that contains `addr`.
    pub fn including(addr: PhysAddr) -> PageFrame {
        PageFrame(addr.0 >> PAGE_ALIGN_BITS)
    }

    pub fn start_address(self) -> PhysAddr {
        PhysAddr(self.0 << PAGE_ALIGN_BITS)
    }

    /// Number of whole frames in `bytes` of memory.
    pub fn count_in(bytes: usize) -> usize {
        bytes >> PAGE_ALIGN_BITS
    }
}

impl fmt::Display for PageFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "frame #{} at {:p}", self.0, self.start_address())
    }
}
