//! # QueuedLock
//!
//! The three-state lock ("mutex2" from Drepper's *Futexes Are Tricky*),
//! generic over the [`Parker`] that blocks and wakes threads.
//!
//! ## Protocol
//! - **Acquire, fast path**: one compare-and-swap `0 -> 1`. No loop, no syscall.
//! - **Acquire, slow path**: if the word was already `2`, or marking it
//!   `1 -> 2` finds it still held, park while the word is `2`. Then try
//!   `0 -> 2`; on failure go around again. Taking the lock as `2` is
//!   pessimistic: the next release will issue a wake even if nobody sleeps.
//! - **Release**: decrement. If the old value was `1` that is the whole
//!   release. Otherwise store `0` and wake one waiter, unconditionally.
//!
//! A spurious wake costs one syscall; a skipped wake loses a waiter forever.
//!
//! Release and the fast-path acquire touch nothing but the word, and the
//! contended release adds only [`Parker::wake`], so both are usable from a
//! signal handler.
//!
//! ## Example
//! ```rust
//! # #[cfg(target_os = "linux")] {
//! use tiny_lock::FutexLock;
//!
//! static LOCK: FutexLock = FutexLock::new();
//!
//! LOCK.acquire();
//! // critical section
//! unsafe { LOCK.release() };
//! # }
//! ```

use core::marker::PhantomData;
use core::sync::atomic::AtomicU32;

use lock_api::{GuardSend, RawMutex};

use crate::collector::{Collector, CollectorAwareLock};
use crate::error::{fatal, Error};
use crate::state::{LockWord, State, CONTENDED, LOCKED, UNLOCKED};
use crate::wait::{Parker, WaitStatus};

/// One-word lock that parks contended threads through `P`.
pub struct QueuedLock<P> {
    word: LockWord,
    _parker: PhantomData<fn() -> P>,
}

/// [`QueuedLock`] over the Linux futex.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type FutexLock = QueuedLock<crate::wait::Futex>;

impl<P: Parker> QueuedLock<P> {
    /// Creates an unlocked lock. Usable in `static` initializers.
    #[inline(always)]
    pub const fn new() -> Self {
        QueuedLock {
            word: LockWord::new(),
            _parker: PhantomData,
        }
    }

    /// Blocks until the lock is held by the calling thread.
    #[inline]
    pub fn acquire(&self) {
        let c = self.word.cmpxchg(UNLOCKED, LOCKED);
        if c != UNLOCKED {
            self.acquire_contended(c, |word| P::wait(word, CONTENDED, None));
        }
    }

    /// Like [`acquire`](QueuedLock::acquire), but parks through `collector`
    /// so a stop-the-world pause can proceed while this thread waits.
    ///
    /// The caller may be pseudo-atomic; it stays that way everywhere except
    /// while parked.
    #[inline]
    pub fn acquire_allowing_collector_pause<C: Collector + ?Sized>(&self, collector: &C) {
        let c = self.word.cmpxchg(UNLOCKED, LOCKED);
        if c != UNLOCKED {
            self.acquire_contended(c, |word| collector.wait_allowing_pause(word, CONTENDED));
        }
    }

    #[cold]
    #[inline(never)]
    fn acquire_contended<W>(&self, mut c: u32, mut wait: W)
    where
        W: FnMut(&AtomicU32) -> Result<WaitStatus, Error>,
    {
        loop {
            // Park unless the lock turned out to be free while marking it.
            if c == CONTENDED || self.word.cmpxchg(LOCKED, CONTENDED) != UNLOCKED {
                if let Err(err) = wait(self.word.as_atomic()) {
                    fatal(err);
                }
            }
            c = self.word.cmpxchg(UNLOCKED, CONTENDED);
            if c == UNLOCKED {
                return;
            }
        }
    }

    /// Attempts the `0 -> 1` transition once. Never marks contention.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.word.cmpxchg(UNLOCKED, LOCKED) == UNLOCKED
    }

    /// Releases the lock, waking one waiter if any was ever recorded.
    ///
    /// # Safety
    /// The caller must hold the lock. Releasing an unlocked lock corrupts the
    /// word.
    #[inline]
    pub unsafe fn release(&self) {
        if self.word.decrement() != LOCKED {
            self.word.clear();
            if let Err(err) = P::wake(self.word.as_atomic(), 1) {
                fatal(err);
            }
        }
    }

    /// Whether some thread currently holds the lock.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.word.load() != UNLOCKED
    }

    /// Current state of the word. Stale as soon as it is returned.
    #[inline]
    pub fn state(&self) -> State {
        State::from_raw(self.word.load())
    }
}

impl<P: Parker> Default for QueuedLock<P> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<P: Parker> RawMutex for QueuedLock<P> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = QueuedLock::new();

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
        QueuedLock::is_locked(self)
    }
}

unsafe impl<P: Parker> CollectorAwareLock for QueuedLock<P> {
    fn lock_allowing_pause<C: Collector + ?Sized>(&self, collector: &C) {
        self.acquire_allowing_collector_pause(collector);
    }
}
