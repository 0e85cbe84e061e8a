//! Physical frame allocator backed by an intrusive free list.

use crate::free_list::FreeFrameList;
use kernel_info::boot::MemoryMap;
use kernel_memory_addresses::{PageSize, Size4K, align_down, align_up};
use kernel_vmem::{FrameAlloc, PhysMapper, PhysicalAddress};
use log::{debug, warn};

/// Hands out 4 KiB frames in O(1).
///
/// Exhaustion is not fatal: [`allocate`](FrameAlloc::allocate) returns
/// `None` and callers turn that into a mapping failure.
pub struct FreeListFrameAlloc<M: PhysMapper> {
    list: FreeFrameList<M>,
    seeded: usize,
}

impl<M: PhysMapper> FreeListFrameAlloc<M> {
    /// An empty allocator; nothing can be allocated until it is seeded.
    pub const fn new(mapper: M) -> Self {
        Self {
            list: FreeFrameList::new(mapper),
            seeded: 0,
        }
    }

    /// Frees every whole page of every usable region in `map`.
    ///
    /// Returns the number of frames added.
    ///
    /// # Safety
    /// All usable regions must be reachable writable through the mapper and
    /// genuinely unused: not holding the kernel, its stack, the boot modules
    /// or any live page table.
    pub unsafe fn seed(&mut self, map: &MemoryMap) -> usize {
        let mut added = 0;
        for region in map.usable() {
            added += unsafe { self.add_region(region.base, region.length) };
        }
        debug!("Frame allocator seeded with {added} frames");
        added
    }

    /// Frees every page-aligned page that lies entirely in
    /// `[base, base + length)`.
    ///
    /// # Safety
    /// As [`seed`](Self::seed), for this one range.
    pub unsafe fn add_region(&mut self, base: PhysicalAddress, length: u64) -> usize {
        let start = align_up(base.as_u64(), Size4K::SIZE);
        let end = align_down(base.as_u64().saturating_add(length), Size4K::SIZE);

        let mut added = 0;
        let mut frame = start;
        while frame < end {
            unsafe { self.list.push(PhysicalAddress::new(frame)) };
            frame += Size4K::SIZE;
            added += 1;
        }
        self.seeded += added;
        added
    }

    /// Frames currently free.
    pub const fn free_count(&self) -> usize {
        self.list.len()
    }

    /// Frames ever added by seeding.
    pub const fn seeded_count(&self) -> usize {
        self.seeded
    }

    pub const fn mapper(&self) -> &M {
        self.list.mapper()
    }
}

impl<M: PhysMapper> FrameAlloc for FreeListFrameAlloc<M> {
    fn allocate(&mut self) -> Option<PhysicalAddress> {
        self.list.pop()
    }

    fn free(&mut self, frame: PhysicalAddress) {
        if !frame.is_aligned::<Size4K>() {
            warn!("Refusing to free unaligned frame {frame}");
            return;
        }
        // SAFETY: the FrameAlloc contract makes the caller give up the frame.
        unsafe { self.list.push(frame) };
    }
}
