use crate::Permissions;
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 64-bit x86-64 page table entry, valid at every level.
///
/// ### Bit layout
///
/// | Bits      | Mnemonic          | Meaning |
/// |-----------|-------------------|---------|
/// | 0         | `P`               | Entry is valid |
/// | 1         | `RW`              | Writable |
/// | 2         | `US`              | User-mode accessible |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Caching disabled |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (leaf only) |
/// | 7         | `PS`              | Large page (L3/L2 only) |
/// | 8         | `G`               | Global (leaf only) |
/// | 9–11      | OS avail low      | Ignored by hardware |
/// | 12–51     | `addr`            | Physical frame number |
/// | 52–58     | OS avail high     | Ignored by hardware |
/// | 59–62     | `PKU`             | Protection key |
/// | 63        | `NX`              | Execute disable (needs `EFER.NXE`) |
///
/// Access rights are the AND over all levels of a walk, so a single
/// read-only, supervisor or NX entry on the path is enough to forbid access.
///
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new()
///     .with_present(true)
///     .with_writable(true)
///     .with_physical_address(PhysicalAddress::new(0x1234_5000));
/// assert_eq!(e.into_bits(), 0x1234_5003);
/// ```
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on the first write through a leaf.
    pub dirty: bool,

    /// Large Page (PS, bit 7).
    ///
    /// At L3 and L2 a set bit makes the entry a 1 GiB or 2 MiB leaf instead
    /// of a pointer to the next table. Must be clear at L4; at L1 the same
    /// position is PAT.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global_translation: bool,

    #[bits(3)]
    pub os_available_low: u8,

    /// Physical address bits [51:12].
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    #[bits(7)]
    pub os_available_high: u8,

    #[bits(4)]
    pub protection_key: u8,

    /// No-Execute (NX, bit 63).
    pub no_execute: bool,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_51_12(phys.frame_number());
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, phys: PhysicalAddress) -> Self {
        self.with_phys_addr_bits_51_12(phys.frame_number())
    }

    /// The frame this entry points at: the next table, or the mapped page.
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::from_frame_number(self.phys_addr_bits_51_12())
    }

    /// A present link to a next-level table.
    ///
    /// Intermediate entries always carry the most permissive rights so that
    /// only the leaf decides what an access may do.
    #[inline]
    #[must_use]
    pub const fn intermediate(table: PhysicalAddress) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
            .with_no_execute(false)
            .with_physical_address(table)
    }

    /// A present 4 KiB leaf with exactly `perms`.
    #[inline]
    #[must_use]
    pub const fn leaf(frame: PhysicalAddress, perms: Permissions) -> Self {
        Self::new()
            .with_present(true)
            .with_physical_address(frame)
            .with_permissions(perms)
    }

    /// Replaces the `US`, `RW` and `NX` bits with `perms`.
    #[inline]
    #[must_use]
    pub const fn with_permissions(self, perms: Permissions) -> Self {
        self.with_user_access(perms.user)
            .with_writable(perms.writable)
            .with_no_execute(!perms.executable)
    }

    /// Grants `perms` on top of what the entry already allows.
    #[inline]
    #[must_use]
    pub const fn widened(self, perms: Permissions) -> Self {
        self.with_user_access(self.user_access() | perms.user)
            .with_writable(self.writable() | perms.writable)
            .with_no_execute(self.no_execute() & !perms.executable)
    }

    /// The rights this single entry grants.
    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        Permissions {
            user: self.user_access(),
            writable: self.writable(),
            executable: !self.no_execute(),
        }
    }
}
