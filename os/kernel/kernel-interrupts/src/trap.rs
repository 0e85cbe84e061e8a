use crate::page_fault::PageFaultError;
use crate::vectors;
use core::fmt;

/// Stack image handed to Rust by the exception trampolines.
///
/// The trampoline pushes a zero error code for vectors without one, then the
/// vector number; the rest is the frame the CPU pushed.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TrapFrame {
    pub vector: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

const _: () = assert!(size_of::<TrapFrame>() == 7 * 8);

impl TrapFrame {
    /// Requested privilege level of the interrupted code.
    #[must_use]
    pub const fn from_user(&self) -> bool {
        self.cs & 3 == 3
    }
}

/// Report of an unrecoverable CPU exception.
///
/// ```rust
/// use kernel_interrupts::{FatalTrap, TrapFrame};
///
/// let frame = TrapFrame { vector: 13, error_code: 0x18, rip: 0x40_1000, cs: 0x23, ..Default::default() };
/// let report = FatalTrap::new(&frame, 0);
/// assert_eq!(
///     report.to_string(),
///     "#GP general protection fault (vector 13) err=0x18 rip=0x401000 from user"
/// );
/// ```
#[derive(Copy, Clone, Debug)]
pub struct FatalTrap {
    vector: u8,
    error_code: Option<u64>,
    rip: u64,
    from_user: bool,
    page_fault: Option<(u64, PageFaultError)>,
}

impl FatalTrap {
    /// `cr2` is only consulted for page faults.
    #[must_use]
    pub const fn new(frame: &TrapFrame, cr2: u64) -> Self {
        let vector = (frame.vector & 0xFF) as u8;
        let error_code = if vectors::has_error_code(vector) {
            Some(frame.error_code)
        } else {
            None
        };
        let page_fault = if vector == vectors::PAGE_FAULT {
            Some((cr2, PageFaultError::from_bits(frame.error_code)))
        } else {
            None
        };
        Self {
            vector,
            error_code,
            rip: frame.rip,
            from_user: frame.from_user(),
            page_fault,
        }
    }

    #[must_use]
    pub const fn vector(&self) -> u8 {
        self.vector
    }

    #[must_use]
    pub const fn error_code(&self) -> Option<u64> {
        self.error_code
    }
}

impl fmt::Display for FatalTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (vector {})", vectors::name(self.vector), self.vector)?;
        if let Some(code) = self.error_code {
            write!(f, " err={code:#x}")?;
        }
        write!(f, " rip={:#x}", self.rip)?;
        if self.from_user {
            f.write_str(" from user")?;
        }
        if let Some((cr2, err)) = self.page_fault {
            write!(f, " cr2={cr2:#x}: {}", err.explain())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_fault_report_includes_cr2() {
        let frame = TrapFrame {
            vector: 14,
            error_code: 0b0_0010,
            rip: 0xFFFF_FFFF_8000_1234,
            cs: 0x08,
            ..TrapFrame::default()
        };
        let report = FatalTrap::new(&frame, 0xDEAD_B000);
        assert_eq!(report.error_code(), Some(2));
        assert_eq!(
            report.to_string(),
            "#PF page fault (vector 14) err=0x2 rip=0xffffffff80001234 cr2=0xdeadb000: Non-present page (page not mapped)"
        );
    }

    #[test]
    fn vectors_without_error_code_ignore_the_dummy() {
        let frame = TrapFrame {
            vector: 6,
            error_code: 0,
            rip: 0x40_0010,
            cs: 0x23,
            ..TrapFrame::default()
        };
        let report = FatalTrap::new(&frame, 0);
        assert_eq!(report.error_code(), None);
        assert_eq!(
            report.to_string(),
            "#UD invalid opcode (vector 6) rip=0x400010 from user"
        );
    }
}
