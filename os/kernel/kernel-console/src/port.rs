//! Port I/O used by the built-in sinks.

/// One 8-bit I/O port.
#[derive(Copy, Clone)]
pub struct Port(pub u16);

impl Port {
    /// The port `offset` registers above this one.
    #[must_use]
    pub const fn at(self, offset: u16) -> Self {
        Self(self.0 + offset)
    }

    /// # Safety
    /// Ring 0, and the caller drives the device behind the port.
    #[inline]
    pub unsafe fn write(self, val: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") self.0,
                in("al") val,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    /// # Safety
    /// Ring 0, and the caller drives the device behind the port.
    #[inline]
    pub unsafe fn read(self) -> u8 {
        let val: u8;
        unsafe {
            core::arch::asm!(
                "in al, dx",
                in("dx") self.0,
                out("al") val,
                options(nomem, nostack, preserves_flags)
            );
        }
        val
    }
}
