//! Interrupt masking.
//!
//! On the bare-metal target these wrap `cli`, `sti` and `pushfq`. Hosted
//! builds (unit tests) run in ring 3 where `cli` faults, so there the
//! guard only tracks its own state.

use crate::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};

/// `RFLAGS.IF`
const INTERRUPT_FLAG: u64 = 1 << 9;

/// Disables hardware interrupts (`cli`).
///
/// # Safety
/// Ring 0 only.
#[inline]
#[cfg(target_os = "none")]
pub unsafe fn cli_stop_interrupts() {
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enables hardware interrupts (`sti`).
///
/// # Safety
/// Ring 0 only. The interrupt table must be installed.
#[inline]
#[cfg(target_os = "none")]
pub unsafe fn sti_enable_interrupts() {
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Returns the current `RFLAGS` value.
#[inline]
#[must_use]
#[cfg(target_os = "none")]
pub fn rflags() -> u64 {
    let r: u64;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nomem, preserves_flags)) }
    r
}

/// Whether maskable interrupts are currently enabled.
#[inline]
#[must_use]
#[cfg(target_os = "none")]
pub fn interrupts_enabled() -> bool {
    rflags() & INTERRUPT_FLAG != 0
}

#[inline]
#[must_use]
#[cfg(not(target_os = "none"))]
pub const fn interrupts_enabled() -> bool {
    let _ = INTERRUPT_FLAG;
    false
}

/// Halts until the next interrupt unless `ready` already holds.
///
/// `ready` is evaluated with interrupts off and `sti; hlt` follows
/// directly, so an interrupt that makes it true cannot slip in between
/// the check and the halt. With interrupts already off nothing can wake
/// a halt, so this only spins once. Returns what `ready` reported.
#[inline]
#[must_use = "reports whether the halt was skipped"]
pub fn halt_unless(ready: impl FnOnce() -> bool) -> bool {
    #[cfg(target_os = "none")]
    if interrupts_enabled() {
        unsafe { cli_stop_interrupts() };
        let ready = ready();
        if ready {
            unsafe { sti_enable_interrupts() };
        } else {
            // `sti` takes effect after the next instruction.
            unsafe { core::arch::asm!("sti; hlt", options(nomem, nostack)) }
        }
        return ready;
    }

    let ready = ready();
    if !ready {
        core::hint::spin_loop();
    }
    ready
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// Only re-enables if interrupts were enabled when the guard was taken, so
/// guards nest.
pub struct IrqGuard {
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        #[cfg(target_os = "none")]
        if enabled {
            unsafe { cli_stop_interrupts() };
        }
        Self {
            were_enabled: enabled,
        }
    }

    /// Whether interrupts will be re-enabled when this guard drops.
    #[must_use]
    pub const fn restores_interrupts(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        #[cfg(target_os = "none")]
        if self.were_enabled {
            unsafe { sti_enable_interrupts() };
        }
    }
}

/// A [`SpinLockGuard`] that also holds interrupts off.
///
/// Field order matters: the lock is released before interrupts come back.
pub struct IrqSpinLockGuard<'a, T> {
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard,
}

impl<T> SpinLock<T> {
    /// Disables interrupts, then acquires the lock.
    #[inline]
    pub fn lock_irq(&self) -> IrqSpinLockGuard<'_, T> {
        let irq = IrqGuard::new();
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }

    /// Closure form of [`lock_irq`](Self::lock_irq).
    #[inline]
    pub fn with_lock_irq<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut g = self.lock_irq();
        f(&mut g)
    }
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_lock_releases_on_drop() {
        let lock = SpinLock::new(1u8);
        {
            let mut g = lock.lock_irq();
            *g += 1;
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
        assert_eq!(lock.with_lock_irq(|v| *v), 2);
    }

    #[test]
    fn halt_unless_checks_the_condition_once() {
        let mut calls = 0;
        assert!(halt_unless(|| {
            calls += 1;
            true
        }));
        assert!(!halt_unless(|| {
            calls += 1;
            false
        }));
        assert_eq!(calls, 2);
    }

    #[test]
    fn hosted_guard_never_restores() {
        let g = IrqGuard::new();
        assert!(!g.restores_interrupts());
    }
}
