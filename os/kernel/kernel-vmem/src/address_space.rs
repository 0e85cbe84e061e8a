//! # Address Space (x86-64, PML4-rooted)
//!
//! An address space is identified by the physical address of its root table.
//! All table memory is reached through the [`PhysMapper`]; nothing here
//! assumes the tables are mapped at any particular virtual address.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`vm_map`](AddressSpace::vm_map) | back a page with a fresh zeroed frame, creating missing tables |
//! | [`vm_protect`](AddressSpace::vm_protect) | grant extra rights along an existing path |
//! | [`vm_reprotect`](AddressSpace::vm_reprotect) | set the leaf to exactly the given rights |
//! | [`translate`](AddressSpace::translate) | diagnostic walk, logged and returned |
//! | [`unmap_lower_half`](AddressSpace::unmap_lower_half) | drop user-half tables and reclaim their frames |
//!
//! Mutations are not rolled back on failure: a `vm_map` that runs out of
//! frames half-way leaves the tables it already linked in place. They are
//! valid (zeroed) tables and are reused by the next attempt on that range.

use crate::walk::{TranslationWalk, WalkStep};
use crate::{FrameAlloc, PageEntryBits, PageTable, Permissions, PhysMapper, Tlb, VmemError};
use kernel_info::memory::{LOWER_HALF_L4_ENTRIES, PAGE_SIZE, TABLE_ENTRIES, USERSPACE_END};
use kernel_memory_addresses::{
    PageSize, PhysicalAddress, Size1G, Size2M, Size4K, TableLevel, VirtualAddress,
};
use log::{debug, info, trace};

/// What [`AddressSpace::vm_map`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapOutcome {
    /// A new frame now backs the page.
    Mapped(PhysicalAddress),
    /// The page was already mapped; its entry was left untouched.
    AlreadyMapped(PhysicalAddress),
}

impl MapOutcome {
    #[must_use]
    pub const fn frame(self) -> PhysicalAddress {
        match self {
            Self::Mapped(pa) | Self::AlreadyMapped(pa) => pa,
        }
    }
}

/// Handle to a single, concrete address space.
pub struct AddressSpace<M: PhysMapper, T: Tlb> {
    root: PhysicalAddress,
    mapper: M,
    tlb: T,
}

/// Borrow the table stored in frame `pa`.
///
/// # Safety
/// `pa` must hold a page table reachable through `mapper`, and the caller
/// must not hold another reference to the same table.
#[inline]
unsafe fn table<'a, M: PhysMapper>(mapper: &M, pa: PhysicalAddress) -> &'a mut PageTable {
    unsafe { mapper.phys_to_mut::<PageTable>(pa) }
}

impl<M: PhysMapper, T: Tlb> AddressSpace<M, T> {
    /// Wraps an existing root table.
    #[inline]
    pub const fn from_root(root: PhysicalAddress, mapper: M, tlb: T) -> Self {
        Self { root, mapper, tlb }
    }

    /// Allocates and zeroes a fresh root table.
    ///
    /// # Errors
    /// [`VmemError::OutOfMemory`] if no frame is available.
    pub fn new_empty<A: FrameAlloc>(alloc: &mut A, mapper: M, tlb: T) -> Result<Self, VmemError> {
        let root = alloc.allocate().ok_or(VmemError::OutOfMemory {
            va: VirtualAddress::zero(),
        })?;
        zero_frame(&mapper, root);
        Ok(Self { root, mapper, tlb })
    }

    /// View the currently active address space by reading CR3.
    ///
    /// # Safety
    /// Must run at CPL0 with paging enabled, and `mapper` must reach the
    /// active tables.
    #[inline]
    pub unsafe fn from_current(mapper: M, tlb: T) -> Self {
        use kernel_registers::{LoadRegisterUnsafe, cr3::Cr3};
        let root = unsafe { Cr3::load_unsafe() }.pml4_phys();
        Self { root, mapper, tlb }
    }

    /// Physical address of the root table.
    #[inline]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    #[inline]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[inline]
    pub const fn tlb(&self) -> &T {
        &self.tlb
    }

    fn allocate_table<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, VmemError> {
        let frame = alloc.allocate().ok_or(VmemError::OutOfMemory { va })?;
        zero_frame(&self.mapper, frame);
        Ok(frame)
    }

    /// Backs the page at `va` with a fresh, zeroed frame.
    ///
    /// Missing intermediate tables are allocated, zeroed and linked with
    /// maximal rights; the leaf gets exactly `perms`. An existing leaf (or a
    /// large page covering `va`) is left untouched.
    ///
    /// # Errors
    /// - [`VmemError::Unaligned`] if `va` is not 4 KiB aligned.
    /// - [`VmemError::OutOfMemory`] if the allocator runs dry. Tables linked
    ///   before that point stay in place.
    pub fn vm_map<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        perms: Permissions,
    ) -> Result<MapOutcome, VmemError> {
        if !va.is_aligned::<Size4K>() {
            return Err(VmemError::Unaligned(va));
        }

        let mut table_pa = self.root;
        for level in [TableLevel::L4, TableLevel::L3, TableLevel::L2] {
            let t = unsafe { table(&self.mapper, table_pa) };
            let index = va.index(level);
            let entry = t.get(index);

            if !entry.present() {
                let frame = self.allocate_table(alloc, va)?;
                t.set(index, PageEntryBits::intermediate(frame));
                trace!("{}[{index}] of {table_pa}: new table {frame}", level.as_str());
                table_pa = frame;
            } else if entry.large_page() {
                return Ok(MapOutcome::AlreadyMapped(large_page_target(level, entry, va)));
            } else {
                table_pa = entry.physical_address();
            }
        }

        let pt = unsafe { table(&self.mapper, table_pa) };
        let index = va.index(TableLevel::L1);
        let existing = pt.get(index);
        if existing.present() {
            return Ok(MapOutcome::AlreadyMapped(existing.physical_address()));
        }

        let frame = self.allocate_table(alloc, va)?;
        pt.set(index, PageEntryBits::leaf(frame, perms));
        self.tlb.invalidate_page(va);
        Ok(MapOutcome::Mapped(frame))
    }

    /// Grants `perms` at every level of the path to `va`.
    ///
    /// Never revokes: calling with [`Permissions::NONE`] changes nothing.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if any level on the path is absent.
    pub fn vm_protect(&mut self, va: VirtualAddress, perms: Permissions) -> Result<(), VmemError> {
        self.update_path(va, |e, _| e.widened(perms))
    }

    /// Sets the leaf for `va` to exactly `perms`, widening intermediate
    /// levels as needed so the leaf stays authoritative.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if any level on the path is absent.
    pub fn vm_reprotect(
        &mut self,
        va: VirtualAddress,
        perms: Permissions,
    ) -> Result<(), VmemError> {
        self.update_path(va, |e, is_leaf| {
            if is_leaf {
                e.with_permissions(perms)
            } else {
                e.widened(perms)
            }
        })
    }

    fn update_path(
        &mut self,
        va: VirtualAddress,
        update: impl Fn(PageEntryBits, bool) -> PageEntryBits,
    ) -> Result<(), VmemError> {
        // Check the full path first so a failure leaves every level as it was.
        let walk = self.lookup(va);
        if walk.leaf().is_none() {
            let level = walk.steps().last().map_or(TableLevel::L4, |s| s.level);
            return Err(VmemError::NotMapped { va, level });
        }

        for step in walk.steps() {
            let t = unsafe { table(&self.mapper, step.table) };
            t.set(step.index, update(step.entry, step.is_leaf()));
        }
        self.tlb.invalidate_page(va);
        Ok(())
    }

    /// Walks the tables for `va` without logging.
    #[must_use]
    pub fn lookup(&self, va: VirtualAddress) -> TranslationWalk {
        let mut walk = TranslationWalk::new(va);
        let mut table_pa = self.root;

        for level in TableLevel::WALK {
            let index = va.index(level);
            let entry = unsafe { table(&self.mapper, table_pa) }.get(index);
            walk.push(WalkStep {
                level,
                index,
                table: table_pa,
                entry,
            });

            if !entry.present() {
                break;
            }
            if level == TableLevel::L1 {
                walk.resolve(entry.physical_address() + va.page_offset::<Size4K>());
                break;
            }
            if entry.large_page() {
                walk.resolve(large_page_target(level, entry, va));
                break;
            }
            table_pa = entry.physical_address();
        }
        walk
    }

    /// Diagnostic walk for `va`: every visited level is logged at debug
    /// level and the result returned. Never mutates.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> TranslationWalk {
        let walk = self.lookup(va);
        debug!("{walk}");
        walk
    }

    /// Physical address backing `va`.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] naming the first absent level.
    pub fn physical_address(&self, va: VirtualAddress) -> Result<PhysicalAddress, VmemError> {
        let walk = self.lookup(va);
        walk.physical_address().ok_or_else(|| VmemError::NotMapped {
            va,
            level: walk.steps().last().map_or(TableLevel::L4, |s| s.level),
        })
    }

    /// Copies `bytes` to `va` through the physical mapper.
    ///
    /// Works regardless of which address space is active and of the page
    /// rights, so it can fill pages before they are tightened.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if any touched page is absent. Bytes for
    /// earlier pages have been written by then.
    pub fn write_bytes(&self, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmemError> {
        self.for_each_chunk(va, bytes.len(), |dst, range| unsafe {
            core::ptr::copy_nonoverlapping(bytes[range.clone()].as_ptr(), dst, range.len());
        })
    }

    /// Sets `len` bytes at `va` to zero.
    ///
    /// # Errors
    /// As [`write_bytes`](Self::write_bytes).
    pub fn zero_bytes(&self, va: VirtualAddress, len: usize) -> Result<(), VmemError> {
        self.for_each_chunk(va, len, |dst, range| unsafe {
            core::ptr::write_bytes(dst, 0, range.len());
        })
    }

    /// Copies `buf.len()` bytes from `va` into `buf`.
    ///
    /// # Errors
    /// As [`write_bytes`](Self::write_bytes).
    pub fn read_bytes(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmemError> {
        let dst = buf.as_mut_ptr();
        self.for_each_chunk(va, buf.len(), |src, range| unsafe {
            core::ptr::copy_nonoverlapping(src, dst.add(range.start), range.len());
        })
    }

    /// Copies from user memory at `va` into `buf`, as user code could read it.
    ///
    /// # Errors
    /// [`VmemError::NotUser`] if the range leaves the user half,
    /// [`VmemError::NotMapped`] or [`VmemError::AccessDenied`] for the first
    /// page user code could not read. Nothing is copied then.
    pub fn read_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmemError> {
        self.check_user_access(va, buf.len(), false)?;
        self.read_bytes(va, buf)
    }

    /// Copies `bytes` into user memory at `va`, as user code could write it.
    ///
    /// # Errors
    /// As [`read_user`](Self::read_user), and read-only pages are denied.
    pub fn write_user(&self, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmemError> {
        self.check_user_access(va, bytes.len(), true)?;
        self.write_bytes(va, bytes)
    }

    /// Every page of `[va, va + len)` must be in the user half, mapped, and
    /// grant `user` (and `writable` when `write` is set) along the whole walk.
    fn check_user_access(&self, va: VirtualAddress, len: usize, write: bool) -> Result<(), VmemError> {
        let start = va.as_u64();
        let end = start
            .checked_add(len as u64)
            .filter(|&end| end <= USERSPACE_END)
            .ok_or(VmemError::NotUser(va))?;
        if len == 0 {
            return Ok(());
        }

        let mut page = start - start % PAGE_SIZE;
        while page < end {
            let at = VirtualAddress::new(page.max(start));
            let walk = self.lookup(at);
            let Some(perms) = walk.effective_permissions() else {
                return Err(VmemError::NotMapped {
                    va: at,
                    level: walk.steps().last().map_or(TableLevel::L4, |s| s.level),
                });
            };
            if !perms.user || (write && !perms.writable) {
                return Err(VmemError::AccessDenied(at));
            }
            page += PAGE_SIZE;
        }
        Ok(())
    }

    fn for_each_chunk(
        &self,
        va: VirtualAddress,
        len: usize,
        mut f: impl FnMut(*mut u8, core::ops::Range<usize>),
    ) -> Result<(), VmemError> {
        let mut done = 0usize;
        while done < len {
            let cur = va + done as u64;
            let pa = self.physical_address(cur)?;
            let room = (Size4K::SIZE - cur.page_offset::<Size4K>()) as usize;
            let n = room.min(len - done);
            f(self.mapper.phys_to_ptr(pa), done..done + n);
            done += n;
        }
        Ok(())
    }

    /// Drops every lower-half (user) mapping and reclaims its page tables.
    ///
    /// Each present L4 entry in `0..256` is cleared. The L3, L2 and L1
    /// tables reachable beneath it are returned to `alloc`; the data frames
    /// they mapped (including large pages) are not. Finishes with a full
    /// TLB flush through a root reload.
    ///
    /// Returns the number of table frames reclaimed.
    pub fn unmap_lower_half<A: FrameAlloc>(&mut self, alloc: &mut A) -> usize {
        let root = unsafe { table(&self.mapper, self.root) };
        let mut reclaimed = 0usize;

        for l4 in 0..LOWER_HALF_L4_ENTRIES {
            let e4 = root.get(l4);
            if !e4.present() {
                continue;
            }
            root.set(l4, PageEntryBits::new());

            let pdpt_pa = e4.physical_address();
            let pdpt = unsafe { table(&self.mapper, pdpt_pa) };
            for (_, e3) in pdpt.present_in(0..TABLE_ENTRIES) {
                if e3.large_page() {
                    continue;
                }
                let pd_pa = e3.physical_address();
                let pd = unsafe { table(&self.mapper, pd_pa) };
                for (_, e2) in pd.present_in(0..TABLE_ENTRIES) {
                    if !e2.large_page() {
                        alloc.free(e2.physical_address());
                        reclaimed += 1;
                    }
                }
                alloc.free(pd_pa);
                reclaimed += 1;
            }
            alloc.free(pdpt_pa);
            reclaimed += 1;
        }

        self.tlb.reload_root(self.root);
        info!(
            "Reclaimed {reclaimed} lower-half page-table frames ({} KiB)",
            reclaimed as u64 * PAGE_SIZE / 1024
        );
        reclaimed
    }
}

fn zero_frame<M: PhysMapper>(mapper: &M, frame: PhysicalAddress) {
    unsafe { core::ptr::write_bytes(mapper.phys_to_ptr(frame), 0, Size4K::SIZE as usize) };
}

fn large_page_target(level: TableLevel, entry: PageEntryBits, va: VirtualAddress) -> PhysicalAddress {
    let offset = match level {
        TableLevel::L3 => va.page_offset::<Size1G>(),
        _ => va.page_offset::<Size2M>(),
    };
    entry.physical_address() + offset
}

#[cfg(test)]
mod tests;
