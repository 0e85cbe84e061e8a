use crate::{PageEntryBits, Permissions};
use core::fmt;
use kernel_memory_addresses::{PhysicalAddress, TableLevel, VirtualAddress};

/// One visited level of a translation walk.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WalkStep {
    pub level: TableLevel,
    pub index: usize,
    /// Physical address of the table the entry was read from.
    pub table: PhysicalAddress,
    pub entry: PageEntryBits,
}

impl WalkStep {
    const EMPTY: Self = Self {
        level: TableLevel::L4,
        index: 0,
        table: PhysicalAddress::zero(),
        entry: PageEntryBits::new(),
    };

    /// Whether this entry maps memory rather than pointing at another table.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.entry.present()
            && (matches!(self.level, TableLevel::L1) || self.entry.large_page())
    }
}

/// The result of walking the tables for one virtual address.
///
/// Purely diagnostic: it records what each level held and never mutates.
#[derive(Clone, Debug)]
pub struct TranslationWalk {
    va: VirtualAddress,
    steps: [WalkStep; 4],
    len: usize,
    physical: Option<PhysicalAddress>,
}

impl TranslationWalk {
    pub(crate) const fn new(va: VirtualAddress) -> Self {
        Self {
            va,
            steps: [WalkStep::EMPTY; 4],
            len: 0,
            physical: None,
        }
    }

    pub(crate) const fn push(&mut self, step: WalkStep) {
        self.steps[self.len] = step;
        self.len += 1;
    }

    pub(crate) const fn resolve(&mut self, pa: PhysicalAddress) {
        self.physical = Some(pa);
    }

    #[must_use]
    pub const fn virtual_address(&self) -> VirtualAddress {
        self.va
    }

    /// Levels visited, root first. Ends at the first non-present entry or
    /// at the leaf.
    #[must_use]
    pub fn steps(&self) -> &[WalkStep] {
        &self.steps[..self.len]
    }

    /// The physical address `va` translates to, if mapped.
    #[must_use]
    pub const fn physical_address(&self) -> Option<PhysicalAddress> {
        self.physical
    }

    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.physical.is_some()
    }

    /// The entry that mapped the page.
    #[must_use]
    pub fn leaf(&self) -> Option<&WalkStep> {
        self.steps().last().filter(|s| s.is_leaf())
    }

    /// Rights recorded in the leaf entry alone.
    #[must_use]
    pub fn leaf_permissions(&self) -> Option<Permissions> {
        self.leaf().map(|s| s.entry.permissions())
    }

    /// Rights the CPU actually grants: the AND over every level.
    #[must_use]
    pub fn effective_permissions(&self) -> Option<Permissions> {
        self.leaf()?;
        Some(self.steps().iter().fold(Permissions::ALL, |acc, s| {
            let p = s.entry.permissions();
            Permissions::new(
                acc.user & p.user,
                acc.writable & p.writable,
                acc.executable & p.executable,
            )
        }))
    }
}

impl fmt::Display for TranslationWalk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Translating {}", self.va)?;
        for step in self.steps() {
            write!(
                f,
                "  {} [{}] of {}: ",
                step.level.as_str(),
                step.index,
                step.table
            )?;
            if !step.entry.present() {
                writeln!(f, "not present")?;
                continue;
            }
            let p = step.entry.permissions();
            f.write_str(if p.user { "user " } else { "kernel " })?;
            if p.writable {
                f.write_str("writable ")?;
            }
            if p.executable {
                f.write_str("executable ")?;
            }
            writeln!(f, "-> {}", step.entry.physical_address())?;
        }
        match self.physical {
            Some(pa) => write!(f, "{} maps to {}", self.va, pa),
            None => write!(f, "{} is not mapped", self.va),
        }
    }
}
