//! Loading `PT_LOAD` segments.
//!
//! Each segment is loaded in three steps:
//!
//! 1. every page covering `[vaddr, vaddr + memsz)` is mapped user, writable
//!    and executable so the bytes can be placed;
//! 2. `filesz` bytes are copied from the image and `[filesz, memsz)` is
//!    zeroed;
//! 3. once all segments are in place, every page gets the rights of the
//!    segments that touch it (R → user, W → writable, X → executable).
//!
//! Rights are applied after all copies so a page shared by two segments
//! ends up with the union of both, never with whichever came last.

use crate::image::{ElfError, ElfImage, ProgramHeader};
use kernel_info::memory::{PAGE_SIZE, USERSPACE_END};
use kernel_memory_addresses::{align_down, align_up};
use kernel_vmem::{
    AddressSpace, FrameAlloc, Permissions, PhysMapper, Tlb, VirtualAddress, VmemError,
};
use log::{debug, warn};

/// What to do when a page of a segment cannot be mapped, filled or protected.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LoadPolicy {
    /// Log the failure and carry on with the remaining pages and segments.
    #[default]
    ContinueOnError,
    /// Stop at the first failure and report it.
    AbortOnFirstError,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Elf(#[from] ElfError),
    #[error("segment {index}: {source}")]
    Segment {
        index: usize,
        #[source]
        source: VmemError,
    },
}

/// Result of a successful [`load`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoadedImage {
    pub entry: VirtualAddress,
    /// `PT_LOAD` segments placed in memory.
    pub segments: usize,
    /// Page-level failures tolerated under [`LoadPolicy::ContinueOnError`].
    pub failures: usize,
}

impl From<&ProgramHeader> for Permissions {
    fn from(ph: &ProgramHeader) -> Self {
        Self::new(ph.flags.read(), ph.flags.write(), ph.flags.execute())
    }
}

struct Loader<'s, M: PhysMapper, T: Tlb> {
    space: &'s mut AddressSpace<M, T>,
    policy: LoadPolicy,
    failures: usize,
}

impl<M: PhysMapper, T: Tlb> Loader<'_, M, T> {
    /// Applies the policy to the outcome of one step.
    fn check(&mut self, index: usize, what: &str, result: Result<(), VmemError>) -> Result<(), LoadError> {
        match result {
            Ok(()) => Ok(()),
            Err(source) if self.policy == LoadPolicy::ContinueOnError => {
                warn!("{what} failed for segment {index}: {source}");
                self.failures += 1;
                Ok(())
            }
            Err(source) => Err(LoadError::Segment { index, source }),
        }
    }

    fn place<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        image: &ElfImage<'_>,
        index: usize,
        ph: &ProgramHeader,
    ) -> Result<(), LoadError> {
        let data = image.segment_bytes(index, ph)?;

        for page in pages(ph) {
            let mapped = self
                .space
                .vm_map(alloc, VirtualAddress::new(page), Permissions::ALL)
                .map(|_| ());
            self.check(index, "vm_map", mapped)?;
        }

        let copied = self.space.write_bytes(ph.vaddr, data);
        self.check(index, "copy", copied)?;

        // The file part of the page was written above; the rest must read
        // as zero even if the frame was already in use by an earlier segment.
        let tail = usize::try_from(ph.memsz - ph.filesz).unwrap_or(usize::MAX);
        let zeroed = self.space.zero_bytes(ph.vaddr + ph.filesz, tail);
        self.check(index, "zero fill", zeroed)?;

        debug!(
            "segment {index}: vaddr={} filesz={:#x} memsz={:#x} offset={:#x} flags={}{}{}",
            ph.vaddr,
            ph.filesz,
            ph.memsz,
            ph.offset,
            if ph.flags.read() { 'r' } else { '-' },
            if ph.flags.write() { 'w' } else { '-' },
            if ph.flags.execute() { 'x' } else { '-' },
        );
        Ok(())
    }

    fn protect(&mut self, image: &ElfImage<'_>, index: usize, ph: &ProgramHeader) -> Result<(), LoadError> {
        for page in pages(ph) {
            let perms = image
                .loadable()
                .filter(|(_, other)| other.touches_page(page, PAGE_SIZE))
                .fold(Permissions::NONE, |acc, (_, other)| acc.union(Permissions::from(&other)));
            let result = self.space.vm_reprotect(VirtualAddress::new(page), perms);
            self.check(index, "vm_protect", result)?;
        }
        Ok(())
    }
}

/// Start addresses of the pages covering the segment in memory.
fn pages(ph: &ProgramHeader) -> impl Iterator<Item = u64> {
    let start = align_down(ph.vaddr.as_u64(), PAGE_SIZE);
    let end = align_up(ph.end(), PAGE_SIZE);
    (start..end).step_by(PAGE_SIZE as usize)
}

/// Rejects segments the loader must not touch at all.
fn validate(index: usize, ph: &ProgramHeader) -> Result<(), ElfError> {
    if ph.filesz > ph.memsz {
        return Err(ElfError::SegmentSizes { index });
    }
    match ph.vaddr.as_u64().checked_add(ph.memsz) {
        Some(end) if end <= USERSPACE_END => Ok(()),
        _ => Err(ElfError::SegmentNotUser { index }),
    }
}

/// Loads every `PT_LOAD` segment of `bytes` into `space` and returns the
/// entry point.
///
/// Segments with a zero memory size are skipped. A segment with a zero
/// file size is still mapped and reads as zero.
///
/// # Errors
/// - [`LoadError::Elf`] if the image is malformed; nothing is mapped then.
/// - [`LoadError::Segment`] for the first page-level failure under
///   [`LoadPolicy::AbortOnFirstError`]. Pages mapped before it stay mapped.
pub fn load<M: PhysMapper, T: Tlb, A: FrameAlloc>(
    space: &mut AddressSpace<M, T>,
    alloc: &mut A,
    bytes: &[u8],
    policy: LoadPolicy,
) -> Result<LoadedImage, LoadError> {
    let image = ElfImage::parse(bytes)?;
    for (index, ph) in image.loadable() {
        validate(index, &ph)?;
        image.segment_bytes(index, &ph)?;
    }

    let mut loader = Loader {
        space,
        policy,
        failures: 0,
    };

    let mut segments = 0;
    for (index, ph) in image.loadable().filter(|(_, ph)| ph.memsz != 0) {
        loader.place(alloc, &image, index, &ph)?;
        segments += 1;
    }
    for (index, ph) in image.loadable().filter(|(_, ph)| ph.memsz != 0) {
        loader.protect(&image, index, &ph)?;
    }

    if loader.failures > 0 {
        warn!(
            "Loaded {segments} segments with {} failures, entry {}",
            loader.failures,
            image.entry()
        );
    } else {
        debug!("Loaded {segments} segments, entry {}", image.entry());
    }

    Ok(LoadedImage {
        entry: image.entry(),
        segments,
        failures: loader.failures,
    })
}
