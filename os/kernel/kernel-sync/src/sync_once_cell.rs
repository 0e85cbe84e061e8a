use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const PUBLISHED: u8 = 2;

/// A cell written at most once, then shared read-only.
///
/// Boot code fills these (the GDT, the TSS, the kernel state) before
/// interrupts are enabled; handlers only ever [`get`](Self::get). Contents
/// that change after boot sit behind a [`SpinLock`](crate::SpinLock) inside.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the slot is written by the single claimant and read only after
// PUBLISHED is observed with acquire ordering.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// The stored value, once published.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        (self.state.load(Ordering::Acquire) == PUBLISHED).then(|| unsafe { self.published() })
    }

    /// Stores `value` if the cell is still empty.
    ///
    /// # Errors
    /// Returns `value` if another caller got there first.
    pub fn set(&self, value: T) -> Result<(), T> {
        if !self.claim() {
            return Err(value);
        }
        self.publish(value);
        Ok(())
    }

    /// Returns the stored value, running `init` if the cell is empty.
    ///
    /// A caller that loses the race waits for the winner to publish.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }
        if self.claim() {
            self.publish(init());
        } else {
            while self.state.load(Ordering::Acquire) != PUBLISHED {
                spin_loop();
            }
        }
        // SAFETY: PUBLISHED was observed (or stored by us) above.
        unsafe { self.published() }
    }

    fn claim(&self) -> bool {
        self.state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn publish(&self, value: T) {
        // SAFETY: only the claimant reaches this, and nobody reads before PUBLISHED.
        unsafe { (*self.slot.get()).write(value) };
        self.state.store(PUBLISHED, Ordering::Release);
    }

    /// # Safety
    /// The state must be [`PUBLISHED`].
    unsafe fn published(&self) -> &T {
        unsafe { (*self.slot.get()).assume_init_ref() }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == PUBLISHED {
            unsafe { self.slot.get_mut().assume_init_drop() };
        }
    }
}
