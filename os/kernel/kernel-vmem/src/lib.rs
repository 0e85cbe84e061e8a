//! # Virtual Memory Support
//!
//! x86-64 four-level paging for the kernel core: building, walking and
//! reclaiming page tables of an [`AddressSpace`].
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//!   │        │        │        │
//!   │        │        │        └───► PTE   → maps 4 KiB page
//!   │        │        └────────────► PDE   → PS=1 → 2 MiB page
//!   │        └─────────────────────► PDPTE → PS=1 → 1 GiB page
//!   └──────────────────────────────► PML4E
//! ```
//!
//! | Level | Table | Role |
//! |:------|:------|:-----|
//! | 4 | PML4 | Root, referenced by CR3. One per address space. |
//! | 3 | PDPT | Points to a PD, or maps 1 GiB with `PS=1`. |
//! | 2 | PD   | Points to a PT, or maps 2 MiB with `PS=1`. |
//! | 1 | PT   | Maps 4 KiB pages. Always a leaf. |
//!
//! ## Permission policy
//!
//! The CPU grants an access only if **every** entry on the walk allows it.
//! Tables created here therefore link intermediate levels with maximal rights
//! (user, writable, executable) and let the leaf carry the real permissions.
//!
//! ## Collaborators
//!
//! - [`FrameAlloc`]: hands out and takes back 4 KiB physical frames.
//! - [`PhysMapper`]: turns a physical address into a usable pointer (the
//!   direct map on hardware, a heap buffer in tests).
//! - [`Tlb`]: invalidates cached translations after a change.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod address_space;
mod page_entry_bits;
mod page_table;
mod tlb;
mod walk;

pub use crate::address_space::{AddressSpace, MapOutcome};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::PageTable;
pub use crate::tlb::{CpuTlb, Tlb};
pub use crate::walk::{TranslationWalk, WalkStep};
pub use kernel_memory_addresses::{PhysicalAddress, TableLevel, VirtualAddress};

/// Access rights of a mapping, as seen from one page-table entry.
///
/// `user` doubles as "readable by user code": there is no separate read bit
/// on x86-64, every present page is readable at the privilege it allows.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Permissions {
    pub user: bool,
    pub writable: bool,
    pub executable: bool,
}

impl Permissions {
    pub const NONE: Self = Self::new(false, false, false);
    pub const ALL: Self = Self::new(true, true, true);
    pub const USER_READ: Self = Self::new(true, false, false);

    #[must_use]
    pub const fn new(user: bool, writable: bool, executable: bool) -> Self {
        Self {
            user,
            writable,
            executable,
        }
    }

    /// Rights granted by either side.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::new(
            self.user | other.user,
            self.writable | other.writable,
            self.executable | other.executable,
        )
    }
}

/// Failures of address-space operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmemError {
    /// The frame allocator ran dry. Tables created before the failure stay.
    #[error("out of physical frames while mapping {va}")]
    OutOfMemory { va: VirtualAddress },
    /// The walk for `va` hit a non-present entry.
    #[error("{va} is not mapped ({} entry not present)", .level.as_str())]
    NotMapped { va: VirtualAddress, level: TableLevel },
    /// Page operations require a 4 KiB-aligned address.
    #[error("{0} is not page aligned")]
    Unaligned(VirtualAddress),
    /// A user-supplied range reaches outside the user half.
    #[error("{0} is outside user memory")]
    NotUser(VirtualAddress),
    /// The page at the address does not grant user code the requested access.
    #[error("{0} is not accessible to user code")]
    AccessDenied(VirtualAddress),
}

/// Source of physical 4 KiB frames.
///
/// Returned frames must be 4 KiB aligned and not in use by anyone else.
pub trait FrameAlloc {
    /// Takes one frame, or `None` when exhausted.
    fn allocate(&mut self) -> Option<PhysicalAddress>;

    /// Returns a frame to the pool.
    ///
    /// The frame must not be referenced by any page table afterwards.
    fn free(&mut self, frame: PhysicalAddress);
}

/// Converts physical addresses to pointers usable by the kernel.
pub trait PhysMapper {
    /// Pointer to the byte at `pa`.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// View the memory at `pa` as a `T`.
    ///
    /// # Safety
    /// - `pa` must be mapped writable through this mapper for `'a`.
    /// - The bytes at `pa` must be a valid, suitably aligned `T`.
    /// - No other live reference may alias it.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_ptr(pa).cast::<T>() }
    }
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        (**self).phys_to_ptr(pa)
    }
}

#[cfg(any(test, feature = "testing"))]
extern crate alloc;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
