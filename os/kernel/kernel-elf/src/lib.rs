//! # ELF64 executables
//!
//! Parsing of statically linked x86-64 ELF images and loading of their
//! `PT_LOAD` segments into an [`AddressSpace`](kernel_vmem::AddressSpace).
//!
//! Only the file header and program headers are consulted. There is no
//! dynamic linking, no relocation and no section table.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod image;
mod loader;

pub use crate::image::{ElfError, ElfImage, PFlags, ProgramHeader, SegmentKind};
pub use crate::loader::{LoadError, LoadPolicy, LoadedImage, load};

#[cfg(test)]
pub(crate) mod test_image;
