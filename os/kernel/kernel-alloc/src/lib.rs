//! # Kernel Physical Memory Allocation
//!
//! Physical memory is handed out one 4 KiB frame at a time from a free list
//! threaded through the free frames themselves:
//!
//! ```text
//!   head ──► ┌────────────┐     ┌────────────┐     ┌────────────┐
//!            │ next ──────┼───► │ next ──────┼───► │ next = END │
//!            │  (unused)  │     │  (unused)  │     │  (unused)  │
//!            └────────────┘     └────────────┘     └────────────┘
//!             free frame         free frame         free frame
//! ```
//!
//! Each link is read and written through the [direct map](phys_mapper::DirectMap),
//! so no bookkeeping memory exists outside the frames. Allocation pops the
//! head and freeing pushes a new head, both in O(1). There is no coalescing
//! and no size classes.
//!
//! ## Components
//!
//! - [`FreeListFrameAlloc`](frame_alloc::FreeListFrameAlloc): the allocator,
//!   seeded from the usable regions of the boot memory map.
//! - [`DirectMap`](phys_mapper::DirectMap): the `physical + offset` mapper
//!   handed over by the bootloader.
//!
//! Both implement the traits of `kernel-vmem`, which consumes them to build
//! page tables.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_alloc;
mod free_list;
pub mod phys_mapper;

pub use frame_alloc::FreeListFrameAlloc;
pub use phys_mapper::DirectMap;
