//! # Page tables
//!
//! Every level of the radix tree uses the same 4 KiB layout of 512
//! [`PageEntryBits`]; what an entry means depends on the level it sits at.

use crate::PageEntryBits;
use kernel_info::memory::TABLE_ENTRIES;

/// One level of the paging tree: 512 entries, 4 KiB-aligned.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; TABLE_ENTRIES],
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};

impl PageTable {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageEntryBits::new(); TABLE_ENTRIES],
        }
    }

    /// Marks every entry not present.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageEntryBits::new());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, index: usize) -> PageEntryBits {
        self.entries[index]
    }

    #[inline]
    pub const fn set(&mut self, index: usize, entry: PageEntryBits) {
        self.entries[index] = entry;
    }

    /// Indices and values of present entries in `range`.
    pub fn present_in(
        &self,
        range: core::ops::Range<usize>,
    ) -> impl Iterator<Item = (usize, PageEntryBits)> + '_ {
        self.entries[range.clone()]
            .iter()
            .zip(range)
            .filter(|(e, _)| e.present())
            .map(|(e, i)| (i, *e))
    }
}
