//! Host-side stand-ins for physical memory used by the unit tests.

use std::vec::Vec;

use bare_metal::{PhysAddr, VirtAddr};

use crate::heap::PageSource;
use crate::paging::direct::DirectMapping;
use crate::paging::TlbInvalidate;
use crate::PAGE_SIZE;

#[repr(C, align(4096))]
struct Page([u8; PAGE_SIZE]);

/// Page aligned memory posing as physical memory starting at address zero.
pub struct Arena {
    pages: Vec<Page>,
}

impl Arena {
    pub fn new(page_count: usize) -> Arena {
        Arena {
            pages: (0..page_count).map(|_| Page([0; PAGE_SIZE])).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    pub fn base(&mut self) -> VirtAddr {
        VirtAddr(self.pages.as_mut_ptr() as usize)
    }

    /// Direct mapping placing physical address zero at the start of the arena.
    pub fn mapping(&mut self) -> DirectMapping {
        let size = self.size();
        DirectMapping::new(self.base(), PhysAddr(0), size)
    }

    pub fn page(&mut self, index: usize) -> VirtAddr {
        assert!(index < self.pages.len());
        self.base() + index * PAGE_SIZE
    }
}

/// Records every invalidated address instead of touching the TLB.
#[derive(Debug, Default)]
pub struct RecordingTlb {
    pub invalidated: Vec<VirtAddr>,
}

impl TlbInvalidate for RecordingTlb {
    fn invalidate(&mut self, vaddr: VirtAddr) {
        self.invalidated.push(vaddr);
    }
}

/// Hands out arena pages to the heap, `stride` pages apart, until `limit` pages were given.
/// Released pages are handed out again first.
pub struct ArenaPages {
    arena: Arena,
    next: usize,
    stride: usize,
    limit: usize,
    released: Vec<VirtAddr>,
    /// Pages currently owned by the heap.
    pub handed_out: usize,
}

impl ArenaPages {
    pub fn contiguous(page_count: usize) -> ArenaPages {
        Self::strided(page_count, 1)
    }

    /// Every page is followed by a gap of `stride - 1` pages.
    pub fn strided(page_count: usize, stride: usize) -> ArenaPages {
        ArenaPages {
            arena: Arena::new(page_count * stride),
            next: 0,
            stride,
            limit: page_count,
            released: Vec::new(),
            handed_out: 0,
        }
    }
}

impl PageSource for ArenaPages {
    fn allocate_page(&mut self) -> Option<VirtAddr> {
        let page = match self.released.pop() {
            Some(page) => page,
            None if self.next < self.limit * self.stride => {
                let page = self.arena.page(self.next);
                self.next += self.stride;
                page
            }
            None => return None,
        };
        self.handed_out += 1;
        Some(page)
    }

    unsafe fn release_page(&mut self, page: VirtAddr) {
        assert!(!self.released.contains(&page), "page released twice");
        self.released.push(page);
        self.handed_out -= 1;
    }
}
