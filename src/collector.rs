//! # Collector cooperation
//!
//! A thread blocked on a lock must never be the reason a stop-the-world pause
//! stalls. [`Collector`] is the capability a runtime hands to
//! [`acquire_allowing_collector_pause`](crate::QueuedLock::acquire_allowing_collector_pause):
//! the lock consults it only at its blocking step, where it calls
//! [`Collector::wait_allowing_pause`] instead of the plain wait primitive.
//!
//! The contract of that wait:
//! - while parked, the thread is *not* pseudo-atomic, so the collector may
//!   stop the world without it;
//! - a pause request makes the wait return (as if spuriously woken), and the
//!   thread goes back around the lock's retry loop;
//! - on return, the thread's pseudo-atomic status is what it was on entry, so
//!   the lock is only ever taken while pseudo-atomic if the caller was.
//!
//! [`MutatorState`] is a reference implementation of that contract, built on
//! any [`Parker`]. Runtimes with their own safepoint machinery implement
//! [`Collector`] directly.
//!
//! Polling for a safepoint between `try_acquire` attempts is not a substitute:
//! it leaves a window where the lock is held while the thread is
//! pseudo-atomic and the collector has no way to interrupt it.

use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use core::time::Duration;

use lock_api::{Mutex, MutexGuard, RawMutex};

use crate::error::{fatal, Error};
use crate::wait::{Parker, WaitStatus};

/// Upper bound on how long a parked thread can miss a pause request.
///
/// A request can land between the sleeper's last check and its wait syscall;
/// the sleeper then notices on its next poll.
pub const PAUSE_POLL: Duration = Duration::from_millis(10);

/// A runtime's view of one mutator thread, as seen by the lock.
pub trait Collector {
    /// Whether the thread is inside a pseudo-atomic (uninterruptible) region.
    fn in_pseudo_atomic(&self) -> bool;

    /// Blocks while `*word == expected`, letting the collector stop the
    /// thread while it is parked.
    ///
    /// Returns [`WaitStatus::Interrupted`] when a pause cut the wait short.
    fn wait_allowing_pause(&self, word: &AtomicU32, expected: u32) -> Result<WaitStatus, Error>;
}

impl<C: Collector + ?Sized> Collector for &C {
    fn in_pseudo_atomic(&self) -> bool {
        (**self).in_pseudo_atomic()
    }

    fn wait_allowing_pause(&self, word: &AtomicU32, expected: u32) -> Result<WaitStatus, Error> {
        (**self).wait_allowing_pause(word, expected)
    }
}

/// A raw lock that can block in a collector-cooperative way.
///
/// # Safety
/// Implementors must uphold the [`RawMutex`] contract for
/// [`lock_allowing_pause`](CollectorAwareLock::lock_allowing_pause) exactly as
/// for `lock`.
pub unsafe trait CollectorAwareLock: RawMutex {
    /// Acquires the lock, parking through `collector` if it has to block.
    fn lock_allowing_pause<C: Collector + ?Sized>(&self, collector: &C);
}

/// Locks `mutex`, staying interruptible by collector pauses while blocked.
pub fn lock_allowing_pause<'a, R, T, C>(
    mutex: &'a Mutex<R, T>,
    collector: &C,
) -> MutexGuard<'a, R, T>
where
    R: CollectorAwareLock,
    T: ?Sized,
    C: Collector + ?Sized,
{
    // Safety: the raw lock is only locked here, and the guard made right
    // after owns the unlock.
    unsafe {
        mutex.raw().lock_allowing_pause(collector);
        mutex.make_guard_unchecked()
    }
}

/// Counters kept by [`MutatorState`].
#[derive(Debug, Default)]
pub struct PauseStats {
    parks: AtomicUsize,
    stops: AtomicUsize,
}

impl PauseStats {
    /// Times the thread parked on a lock word.
    pub fn parks(&self) -> usize {
        self.parks.load(Ordering::Relaxed)
    }

    /// Times a pause request interrupted the thread while parked.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

/// Per-thread collector state: pseudo-atomic flag, pending pause, and where
/// the thread is parked.
///
/// The owning thread enters and leaves pseudo-atomic regions and blocks on
/// locks; any thread (the collector) may call
/// [`request_pause`](MutatorState::request_pause) and
/// [`resume`](MutatorState::resume).
pub struct MutatorState<P> {
    pseudo_atomic: AtomicBool,
    /// 1 while a pause is requested. Doubles as the word stopped threads wait on.
    pause: AtomicU32,
    parked_on: AtomicPtr<AtomicU32>,
    /// Collector threads currently between reading `parked_on` and waking it.
    wakers: AtomicUsize,
    stats: PauseStats,
    _parker: PhantomData<fn() -> P>,
}

impl<P: Parker> MutatorState<P> {
    /// A thread outside any pseudo-atomic region, with no pause pending.
    pub const fn new() -> Self {
        Self {
            pseudo_atomic: AtomicBool::new(false),
            pause: AtomicU32::new(0),
            parked_on: AtomicPtr::new(ptr::null_mut()),
            wakers: AtomicUsize::new(0),
            stats: PauseStats {
                parks: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            },
            _parker: PhantomData,
        }
    }

    /// Marks the thread as uninterruptible by the collector.
    pub fn enter_pseudo_atomic(&self) {
        self.pseudo_atomic.store(true, Ordering::SeqCst);
    }

    /// Ends the pseudo-atomic region entered with
    /// [`enter_pseudo_atomic`](MutatorState::enter_pseudo_atomic).
    pub fn leave_pseudo_atomic(&self) {
        self.pseudo_atomic.store(false, Ordering::SeqCst);
    }

    /// Asks the thread to stop at its next safe point.
    ///
    /// If it is parked on a lock word, everyone parked there is woken; they
    /// treat it as a spurious wake.
    pub fn request_pause(&self) {
        log::debug!("pause requested");
        self.pause.store(1, Ordering::SeqCst);
        self.wakers.fetch_add(1, Ordering::SeqCst);
        let word = self.parked_on.load(Ordering::SeqCst);
        let woken = if word.is_null() {
            Ok(0)
        } else {
            // Safety: the owning thread does not leave `wait_allowing_pause`
            // (ending its borrow of the word) while `wakers` is nonzero.
            P::wake(unsafe { &*word }, u32::MAX)
        };
        self.wakers.fetch_sub(1, Ordering::SeqCst);
        if let Err(err) = woken {
            fatal(err);
        }
    }

    /// Ends the pause and restarts any thread stopped by it.
    pub fn resume(&self) {
        log::debug!("pause lifted");
        self.pause.store(0, Ordering::SeqCst);
        if let Err(err) = P::wake(&self.pause, u32::MAX) {
            fatal(err);
        }
    }

    /// Whether a pause has been requested and not yet lifted.
    pub fn is_pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst) != 0
    }

    /// Park and stop counters for this thread.
    pub fn stats(&self) -> &PauseStats {
        &self.stats
    }

    /// Parks the thread until the pause is lifted.
    fn stop(&self) -> Result<(), Error> {
        self.stats.stops.fetch_add(1, Ordering::Relaxed);
        log::trace!("stopped for pause");
        while self.pause.load(Ordering::SeqCst) != 0 {
            P::wait(&self.pause, 1, None)?;
        }
        Ok(())
    }

    fn park(&self, word: &AtomicU32, expected: u32) -> Result<WaitStatus, Error> {
        loop {
            if self.is_pause_requested() {
                self.stop()?;
                return Ok(WaitStatus::Interrupted);
            }
            // A pause request wakes the word too; go back and stop for it.
            let status = P::wait(word, expected, Some(PAUSE_POLL))?;
            if status != WaitStatus::TimedOut && !self.is_pause_requested() {
                return Ok(status);
            }
        }
    }
}

impl<P: Parker> Default for MutatorState<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Parker> Collector for MutatorState<P> {
    fn in_pseudo_atomic(&self) -> bool {
        self.pseudo_atomic.load(Ordering::SeqCst)
    }

    fn wait_allowing_pause(&self, word: &AtomicU32, expected: u32) -> Result<WaitStatus, Error> {
        self.stats.parks.fetch_add(1, Ordering::Relaxed);

        let was_pseudo_atomic = self.pseudo_atomic.swap(false, Ordering::SeqCst);
        self.parked_on
            .store(word as *const AtomicU32 as *mut AtomicU32, Ordering::SeqCst);

        let status = self.park(word, expected);

        self.parked_on.store(ptr::null_mut(), Ordering::SeqCst);
        while self.wakers.load(Ordering::SeqCst) != 0 {
            core::hint::spin_loop();
        }
        self.pseudo_atomic.store(was_pseudo_atomic, Ordering::SeqCst);
        status
    }
}

#[cfg(all(test, any(target_os = "linux", target_os = "android")))]
mod tests {
    use super::*;
    use crate::test_util::wait_for;
    use crate::wait::Futex;

    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_wait_restores_pseudo_atomic() {
        let mutator = MutatorState::<Futex>::new();
        let word = AtomicU32::new(0);

        mutator.enter_pseudo_atomic();
        let status = mutator.wait_allowing_pause(&word, 2);

        assert_eq!(status, Ok(WaitStatus::ValueChanged));
        assert!(mutator.in_pseudo_atomic());
        assert_eq!(mutator.stats().parks(), 1);
    }

    #[test]
    fn test_pause_interrupts_parked_thread() {
        let mutator = Arc::new(MutatorState::<Futex>::new());
        let word = Arc::new(AtomicU32::new(2));

        let parked = {
            let mutator = mutator.clone();
            let word = word.clone();
            thread::spawn(move || {
                mutator.enter_pseudo_atomic();
                let status = mutator.wait_allowing_pause(&word, 2);
                (status, mutator.in_pseudo_atomic())
            })
        };

        wait_for("thread to park", || mutator.stats().parks() > 0);
        mutator.request_pause();
        wait_for("thread to stop", || mutator.stats().stops() > 0);

        // Stopped threads are not pseudo-atomic.
        assert!(!mutator.in_pseudo_atomic());
        mutator.resume();

        let (status, pseudo_atomic) = parked.join().unwrap();
        assert_eq!(status, Ok(WaitStatus::Interrupted));
        assert!(pseudo_atomic);
        assert_eq!(mutator.stats().stops(), 1);
    }

    /// Sleeps once between the pause check and the futex call, so a pause
    /// requested meanwhile wakes nobody.
    struct SlowToSleep;

    static IN_GAP: AtomicBool = AtomicBool::new(false);
    static GAP_USED: AtomicBool = AtomicBool::new(false);

    const GAP: Duration = Duration::from_millis(20);

    unsafe impl Parker for SlowToSleep {
        fn wait(
            word: &AtomicU32,
            expected: u32,
            timeout: Option<Duration>,
        ) -> Result<WaitStatus, Error> {
            if timeout.is_some() && !GAP_USED.swap(true, Ordering::SeqCst) {
                IN_GAP.store(true, Ordering::SeqCst);
                thread::sleep(GAP);
            }
            Futex::wait(word, expected, timeout)
        }

        fn wake(word: &AtomicU32, count: u32) -> Result<usize, Error> {
            Futex::wake(word, count)
        }
    }

    #[test]
    fn test_pause_before_sleep_is_caught_by_poll() {
        let mutator = Arc::new(MutatorState::<SlowToSleep>::new());
        let word = Arc::new(AtomicU32::new(2));

        let parked = {
            let mutator = mutator.clone();
            let word = word.clone();
            thread::spawn(move || mutator.wait_allowing_pause(&word, 2))
        };

        wait_for("thread to pass its pause check", || IN_GAP.load(Ordering::SeqCst));
        let requested = Instant::now();
        mutator.request_pause();
        wait_for("thread to stop", || mutator.stats().stops() > 0);
        let latency = requested.elapsed();

        assert!(
            latency < GAP + PAUSE_POLL * 5,
            "pause noticed after {latency:?}"
        );

        mutator.resume();
        assert_eq!(parked.join().unwrap(), Ok(WaitStatus::Interrupted));
    }
}
