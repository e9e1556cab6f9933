//! # SpinLock
//!
//! The degraded strategy, for targets with no wait/wake primitive.
//!
//! The word only ever holds `0` or `1`: there is no waiter accounting because
//! there is nobody to wake. Acquire spins on a compare-and-swap and, once
//! [`SPIN_LIMIT`](crate::backoff::SPIN_LIMIT) attempts have failed, yields the
//! thread between attempts. Release is a single store.
//!
//! Fairness and wake-up latency are whatever the scheduler provides.
//!
//! ## Example
//! ```rust
//! use tiny_lock::SpinLock;
//!
//! static LOCK: SpinLock = SpinLock::new();
//!
//! LOCK.acquire();
//! assert!(!LOCK.try_acquire());
//! unsafe { LOCK.release() };
//! assert!(LOCK.try_acquire());
//! # unsafe { LOCK.release() };
//! ```

use lock_api::{GuardSend, RawMutex};

use crate::collector::{Collector, CollectorAwareLock};
use crate::state::{LockWord, LOCKED, UNLOCKED};
use crate::Backoff;

/// A binary spin lock over one word.
pub struct SpinLock {
    word: LockWord,
}

impl SpinLock {
    /// Creates an unlocked [`SpinLock`]. Usable in `static` initializers.
    #[inline(always)]
    pub const fn new() -> Self {
        SpinLock {
            word: LockWord::new(),
        }
    }

    /// Acquires the lock, spinning (and eventually yielding) until it is free.
    #[inline]
    pub fn acquire(&self) {
        let backoff = Backoff::new();
        while !self.try_acquire() {
            backoff.snooze();
        }
    }

    /// Same as [`acquire`](SpinLock::acquire).
    ///
    /// A spinning thread is never parked, so there is no blocking step at
    /// which to let a collector pause in.
    #[inline]
    pub fn acquire_allowing_collector_pause<C: Collector + ?Sized>(&self, _collector: &C) {
        self.acquire();
    }

    /// Attempts the `0 -> 1` transition once.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.word.cmpxchg(UNLOCKED, LOCKED) == UNLOCKED
    }

    /// Releases the lock with a single store.
    ///
    /// # Safety
    /// The caller must hold the lock.
    #[inline]
    pub unsafe fn release(&self) {
        self.word.clear();
    }

    /// Whether some thread currently holds the lock.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.word.load() != UNLOCKED
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl RawMutex for SpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SpinLock::new();

    type GuardMarker = GuardSend;

    fn lock(&self) {
        self.acquire();
    }

    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    unsafe fn unlock(&self) {
        self.release();
    }

    fn is_locked(&self) -> bool {
        SpinLock::is_locked(self)
    }
}

unsafe impl CollectorAwareLock for SpinLock {
    fn lock_allowing_pause<C: Collector + ?Sized>(&self, collector: &C) {
        self.acquire_allowing_collector_pause(collector);
    }
}
