//! # PthreadLock
//!
//! The same four operations on top of a `pthread_mutex_t`.
//!
//! This gives up the one property the rest of the crate is built around: a
//! pthread mutex is not async-signal-safe. It exists so that lock traffic can
//! be observed with tools that interpose on `pthread_mutex_*` (mutrace and
//! friends). Any nonzero return from the C library is fatal.

use core::cell::UnsafeCell;

use lock_api::{GuardNoSend, RawMutex};

use crate::collector::{Collector, CollectorAwareLock};
use crate::error::{fatal, Error};

/// A lock backed by a statically initialized `pthread_mutex_t`.
///
/// Must not be moved while locked. Dropping it does not call
/// `pthread_mutex_destroy`; a default-initialized mutex owns no resources on
/// the supported platforms.
pub struct PthreadLock {
    inner: UnsafeCell<libc::pthread_mutex_t>,
}

// Safety: every access to the inner mutex goes through pthread calls, which
// synchronize internally.
unsafe impl Send for PthreadLock {}
unsafe impl Sync for PthreadLock {}

impl PthreadLock {
    /// Creates an unlocked lock. Usable in `static` initializers.
    #[inline(always)]
    pub const fn new() -> Self {
        PthreadLock {
            inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
        }
    }

    /// Blocks in `pthread_mutex_lock` until the lock is held.
    #[inline]
    pub fn acquire(&self) {
        // Safety: `inner` is an initialized mutex that lives as long as self.
        let r = unsafe { libc::pthread_mutex_lock(self.inner.get()) };
        if r != 0 {
            fatal(Error::Pthread { op: "lock", code: r });
        }
    }

    /// Same as [`acquire`](PthreadLock::acquire): a pthread mutex has no
    /// blocking step the collector could be let into.
    #[inline]
    pub fn acquire_allowing_collector_pause<C: Collector + ?Sized>(&self, _collector: &C) {
        self.acquire();
    }

    /// One `pthread_mutex_trylock`; `false` if another thread holds the lock.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        // Safety: as in `acquire`.
        match unsafe { libc::pthread_mutex_trylock(self.inner.get()) } {
            0 => true,
            libc::EBUSY => false,
            r => fatal(Error::Pthread { op: "trylock", code: r }),
        }
    }

    /// Releases the lock with `pthread_mutex_unlock`.
    ///
    /// # Safety
    /// The calling thread must hold the lock.
    #[inline]
    pub unsafe fn release(&self) {
        let r = libc::pthread_mutex_unlock(self.inner.get());
        if r != 0 {
            fatal(Error::Pthread { op: "unlock", code: r });
        }
    }

    /// Whether some thread holds the lock. Costs a trylock and, if that
    /// succeeds, an unlock.
    #[inline]
    pub fn is_locked(&self) -> bool {
        if self.try_acquire() {
            // Safety: just acquired above.
            unsafe { self.release() };
            false
        } else {
            true
        }
    }
}

impl Default for PthreadLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl RawMutex for PthreadLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = PthreadLock::new();

    // pthread mutexes must be unlocked by the thread that locked them.
    type GuardMarker = GuardNoSend;

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
        PthreadLock::is_locked(self)
    }
}

unsafe impl CollectorAwareLock for PthreadLock {
    fn lock_allowing_pause<C: Collector + ?Sized>(&self, collector: &C) {
        self.acquire_allowing_collector_pause(collector);
    }
}
