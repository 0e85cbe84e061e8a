use bitfield_struct::bitfield;

/// Page-fault error code layout (x86-64).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15 "Page-Fault Exception (#PF)".
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    /// 1 = protection-key violation (if CR4.PKE=1).
    pub protection_key: bool, // bit 5

    /// 1 = shadow stack access (if CET-SS enabled).
    pub shadow_stack: bool, // bit 6

    #[bits(57)]
    __: u64,
}

impl PageFaultError {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if self.reserved_bit() {
            "Reserved bit set in a paging structure"
        } else if !self.present() {
            "Non-present page (page not mapped)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page (likely NX)"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            if self.user() {
                "User-mode write to read-only or supervisor page"
            } else {
                "Kernel write to read-only page (CR0.WP)"
            }
        } else if self.user() {
            "User-mode read of supervisor page"
        } else {
            "Read access to protected page"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_literal_error_codes() {
        let e = PageFaultError::from_bits(0b0_0110);
        assert!(!e.present() && e.write() && e.user());
        assert_eq!(e.explain(), "Non-present page (page not mapped)");

        let e = PageFaultError::from_bits(0b1_0101);
        assert!(e.present() && e.instruction_fetch() && e.user());
        assert_eq!(
            e.explain(),
            "User-mode instruction fetch on protected page (likely NX)"
        );

        assert_eq!(
            PageFaultError::from_bits(0b0011).explain(),
            "Kernel write to read-only page (CR0.WP)"
        );
        assert_eq!(
            PageFaultError::from_bits(0b0101).explain(),
            "User-mode read of supervisor page"
        );
    }
}
