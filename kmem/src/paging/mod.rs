//! Manipulation of the four level page table hierarchy.
//!
//! Page tables are reached through a `DirectMapping` of physical memory, so the
//! code works the same on the real machine and on a test arena.

pub mod direct;
pub mod entry;
pub mod table;

use core::fmt;

use bare_metal::{cpu, Alignable, PhysAddr, VirtAddr};

use self::direct::DirectMapping;
use self::entry::{Flags, PageTableEntry};
use self::table::PageTable;
use crate::heap::PageSource;
use crate::physical::alloc::PageFrameAllocator;
use crate::physical::PageFrame;
use crate::PAGE_SIZE;

/// Index of a level in the page table hierarchy. 0 represents the lowest level (4K pages).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(pub u32);

impl Level {
    /// Page Table level
    pub const PT: Level = Level(0);
    /// Page Directory level
    pub const PD: Level = Level(1);
    /// Page Directory Pointer level
    pub const PDP: Level = Level(2);
    /// Page Map Level 4
    pub const PML4: Level = Level(3);

    /// The child level in the page table hierarchy, if the current level is not the leaf level (0).
    pub fn child(&self) -> Option<Level> {
        if self.0 == 0 {
            None
        } else {
            Some(Level(self.0 - 1))
        }
    }

    /// Number of bytes mapped by a single entry at this level.
    pub fn page_size(&self) -> usize {
        PAGE_SIZE << (INDEX_BIT_WIDTH * self.0)
    }
}

/// Mask for extracting the 9-bit index into a page table.
const INDEX_MASK: usize = 0x1FF;
/// Width of the index in bits.
const INDEX_BIT_WIDTH: u32 = 9;

/// Return the index in the page table at the given level (0 is PT, 3 is PML4)
/// that is responsible for mapping the given virtual address.
pub fn index_at_level(level: Level, vaddr: VirtAddr) -> usize {
    (vaddr.0 >> (crate::PAGE_ALIGN_BITS + INDEX_BIT_WIDTH * level.0)) & INDEX_MASK
}

/// Invalidation of cached translations after a page table entry changed.
pub trait TlbInvalidate {
    fn invalidate(&mut self, vaddr: VirtAddr);
}

/// Invalidates through `invlpg` on the current CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuTlb;

impl TlbInvalidate for CpuTlb {
    fn invalidate(&mut self, vaddr: VirtAddr) {
        unsafe { cpu::invlpg(vaddr) }
    }
}

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum MapError {
    /// There is no memory left for allocating new page tables.
    OutOfMemory,
    /// A large page already covers the address, so no 4K mapping can be inserted.
    HugePageInPath,
    /// Bits 48..64 of the address do not repeat bit 47.
    NonCanonical,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MapError::OutOfMemory => write!(f, "out of memory for page tables"),
            MapError::HugePageInPath => write!(f, "address is covered by a huge page"),
            MapError::NonCanonical => write!(f, "address is not canonical"),
        }
    }
}

/// An address space rooted at a PML4 table.
pub struct AddressSpace<T> {
    root: PhysAddr,
    mapping: DirectMapping,
    /// Next address handed out by `allocate_page`.
    next_page: VirtAddr,
    tlb: T,
}

impl<T: TlbInvalidate> AddressSpace<T> {
    /// Wrap the hierarchy rooted at `root`.
    ///
    /// # Safety
    ///
    /// `root` must be a valid PML4 table, and `mapping` must cover all physical memory
    /// that page tables live in. Nothing else may modify the hierarchy concurrently.
    pub unsafe fn new(root: PhysAddr, mapping: DirectMapping, page_cursor: VirtAddr, tlb: T) -> Self {
        AddressSpace {
            root,
            mapping,
            next_page: page_cursor.align_up(PAGE_SIZE),
            tlb,
        }
    }

    pub fn root(&self) -> PhysAddr {
        self.root
    }

    pub fn tlb(&self) -> &T {
        &self.tlb
    }

    /// The address the next call to `allocate_page` will try to map.
    pub fn page_cursor(&self) -> VirtAddr {
        self.next_page
    }

    /// Access the page table stored in the given physical frame.
    unsafe fn table<'t>(&self, frame: PhysAddr) -> &'t mut PageTable {
        &mut *self.mapping.phys_to_virt(frame).as_mut_ptr::<PageTable>()
    }

    /// Map the 4K page containing `vaddr` to the frame containing `paddr`.
    ///
    /// Missing intermediate tables are allocated from `frames`, zeroed and linked as
    /// present and writable. If the leaf is user accessible, so is the path towards it.
    /// A failed call leaves the hierarchy as it was: tables created by it are released
    /// again and existing entries are only touched once the leaf is written.
    ///
    /// # Safety
    ///
    /// Changing a mapping that is in use breaks memory safety of everything relying on it.
    pub unsafe fn map<A>(&mut self, vaddr: VirtAddr, paddr: PhysAddr, flags: Flags, frames: &mut A) -> Result<(), MapError>
        where A: PageFrameAllocator + ?Sized
    {
        if !vaddr.is_canonical() {
            warn!("[vmm] refusing to map non-canonical {:p}", vaddr);
            return Err(MapError::NonCanonical);
        }
        let vaddr = vaddr.align_down(PAGE_SIZE);
        let paddr = paddr.align_down(PAGE_SIZE);
        let user = flags.contains(Flags::USER);
        let table_flags = Flags::PRESENT | Flags::WRITABLE | (flags & Flags::USER);
        trace!("[vmm] map {:p} -> {:p} ({:?})", vaddr, paddr, flags);

        // (parent table, index in parent, new frame) for every table created below
        let mut created: [Option<(PhysAddr, usize, PageFrame)>; 3] = [None; 3];
        // existing entries that become user accessible once the leaf is in place
        let mut upgrades: [Option<(PhysAddr, usize)>; 3] = [None; 3];
        let mut current = self.root;

        for (depth, level) in [Level::PML4, Level::PDP, Level::PD].iter().enumerate() {
            let index = index_at_level(*level, vaddr);
            let entry = &mut self.table(current)[index];

            if entry.is_present() {
                if entry.is_huge() {
                    warn!("[vmm] {:p} is covered by a huge page at level {}", vaddr, level.0);
                    self.release_created(&created, frames);
                    return Err(MapError::HugePageInPath);
                }
                if user && !entry.flags().contains(Flags::USER) {
                    upgrades[depth] = Some((current, index));
                }
                current = entry.base();
            } else {
                let frame = match frames.alloc() {
                    Some(frame) => frame,
                    None => {
                        self.release_created(&created, frames);
                        return Err(MapError::OutOfMemory);
                    }
                };
                let new_table = frame.start_address();
                self.table(new_table).zero();
                *entry = PageTableEntry::with(new_table, table_flags);
                created[depth] = Some((current, index, frame));
                current = new_table;
            }
        }

        self.table(current)[index_at_level(Level::PT, vaddr)] = PageTableEntry::with(paddr, flags | Flags::PRESENT);
        for &(table, index) in upgrades.iter().flatten() {
            let entry = &mut self.table(table)[index];
            entry.set_flags(entry.flags() | Flags::USER);
        }
        self.tlb.invalidate(vaddr);
        Ok(())
    }

    /// Undo the linking of freshly created tables, deepest first.
    unsafe fn release_created<A>(&mut self, created: &[Option<(PhysAddr, usize, PageFrame)>], frames: &mut A)
        where A: PageFrameAllocator + ?Sized
    {
        for &(parent, index, frame) in created.iter().rev().flatten() {
            self.table(parent)[index].clear();
            frames.free(frame);
        }
    }

    /// Remove the 4K mapping of `vaddr`, returning the physical page it pointed to.
    /// Nothing happens if the page is not mapped or the address is not canonical.
    /// Page tables are never released.
    ///
    /// # Safety
    ///
    /// The page must not be used anymore.
    pub unsafe fn unmap(&mut self, vaddr: VirtAddr) -> Option<PhysAddr> {
        if !vaddr.is_canonical() {
            return None;
        }
        let vaddr = vaddr.align_down(PAGE_SIZE);
        let mut current = self.root;
        for level in [Level::PML4, Level::PDP, Level::PD].iter() {
            let entry = self.table(current)[index_at_level(*level, vaddr)];
            if !entry.is_present() {
                return None;
            }
            if entry.is_huge() {
                warn!("[vmm] not unmapping {:p} inside a huge page", vaddr);
                return None;
            }
            current = entry.base();
        }

        let entry = &mut self.table(current)[index_at_level(Level::PT, vaddr)];
        if !entry.is_present() {
            return None;
        }
        let paddr = entry.base();
        entry.clear();
        self.tlb.invalidate(vaddr);
        trace!("[vmm] unmap {:p} (was {:p})", vaddr, paddr);
        Some(paddr)
    }

    /// Resolve a virtual address to the physical address it is mapped to.
    /// Large pages are honored on the way down. Non-canonical addresses never translate.
    pub fn translate(&self, vaddr: VirtAddr) -> Option<PhysAddr> {
        if !vaddr.is_canonical() {
            return None;
        }
        let mut current = self.root;
        let mut level = Level::PML4;
        loop {
            let entry = unsafe { self.table(current)[index_at_level(level, vaddr)] };
            if !entry.is_present() {
                return None;
            }
            if level == Level::PT || (level != Level::PML4 && entry.is_huge()) {
                let offset = vaddr.0 & (level.page_size() - 1);
                return Some(entry.base() + offset);
            }
            current = entry.base();
            level = level.child()?;
        }
    }

    /// Map a fresh frame at the next free virtual page.
    ///
    /// The cursor advances even when the attempt fails, so the address is never handed out twice.
    pub fn allocate_page<A>(&mut self, frames: &mut A) -> Option<VirtAddr>
        where A: PageFrameAllocator + ?Sized
    {
        let vaddr = self.next_page;
        self.next_page += PAGE_SIZE;

        let frame = frames.alloc()?;
        match unsafe { self.map(vaddr, frame.start_address(), Flags::WRITABLE, frames) } {
            Ok(()) => Some(vaddr),
            Err(err) => {
                warn!("[vmm] failed to map page at {:p}: {}", vaddr, err);
                frames.free(frame);
                None
            }
        }
    }

    /// Unmap a page and return its frame to the allocator.
    ///
    /// # Safety
    ///
    /// The page must not be used anymore.
    pub unsafe fn free_page<A>(&mut self, vaddr: VirtAddr, frames: &mut A)
        where A: PageFrameAllocator + ?Sized
    {
        if let Some(paddr) = self.unmap(vaddr) {
            frames.free(PageFrame::including(paddr));
        }
    }
}

/// Heap pages backed by freshly mapped frames of an address space.
pub struct BackedPages<'a, T, A: ?Sized> {
    pub space: &'a mut AddressSpace<T>,
    pub frames: &'a mut A,
}

impl<'a, T: TlbInvalidate, A: PageFrameAllocator + ?Sized> PageSource for BackedPages<'a, T, A> {
    fn allocate_page(&mut self) -> Option<VirtAddr> {
        self.space.allocate_page(&mut *self.frames)
    }

    unsafe fn release_page(&mut self, page: VirtAddr) {
        self.space.free_page(page, &mut *self.frames)
    }
}
