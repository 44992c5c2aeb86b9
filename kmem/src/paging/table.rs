use core::ops;

use super::entry::PageTableEntry;

/// Number of entries in a table of any level.
pub const ENTRY_COUNT: usize = 512;

/// A single page table, occupying exactly one page frame.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRY_COUNT],
}

assert_eq_size!(PageTable, [u8; crate::PAGE_SIZE]);
const_assert_eq!(core::mem::align_of::<PageTable>(), crate::PAGE_SIZE);

impl PageTable {
    pub fn zero(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| !e.is_present())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageTableEntry> {
        self.entries.iter()
    }
}

impl ops::Index<usize> for PageTable {
    type Output = PageTableEntry;

    fn index(&self, idx: usize) -> &PageTableEntry {
        &self.entries[idx]
    }
}

impl ops::IndexMut<usize> for PageTable {
    fn index_mut(&mut self, idx: usize) -> &mut PageTableEntry {
        &mut self.entries[idx]
    }
}
