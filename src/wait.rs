//! # Wait/wake primitives
//!
//! A lock that can block needs something that puts a thread to sleep "while
//! this word still holds `V`" and wakes sleepers on that word. [`Parker`] is
//! that contract; [`Futex`] is the Linux implementation of it.
//!
//! The lock only ever calls [`Parker::wait`] from its slow path and
//! [`Parker::wake`] from a contended release. Release may run inside a signal
//! handler, so `wake` must be async-signal-safe in every implementation.

use core::sync::atomic::AtomicU32;
use core::time::Duration;

use crate::error::Error;

/// Why a call to [`Parker::wait`] returned.
///
/// Only errors are unexpected; every status here is a normal outcome and the
/// caller re-checks the word either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by [`Parker::wake`], or spuriously.
    Woken,
    /// The word did not hold the expected value, so the thread never slept.
    ValueChanged,
    /// A signal (or a collector pause) cut the sleep short.
    Interrupted,
    /// The timeout elapsed.
    TimedOut,
}

/// A futex-style wait/wake primitive keyed by the address of a word.
///
/// # Safety
///
/// Implementors must make the comparison in [`wait`](Parker::wait) atomic with
/// respect to [`wake`](Parker::wake): a thread that has checked
/// `*word == expected` and is about to sleep must be woken by any `wake` on the
/// same word issued after that check. Anything weaker loses wakeups and
/// deadlocks the lock. `wake` must also be async-signal-safe.
pub unsafe trait Parker {
    /// Blocks while `*word == expected`, for at most `timeout` if given.
    ///
    /// May return early for any reason.
    fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>)
        -> Result<WaitStatus, Error>;

    /// Wakes up to `count` threads blocked in `wait` on `word` and returns how
    /// many were woken.
    fn wake(word: &AtomicU32, count: u32) -> Result<usize, Error>;
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::futex::Futex;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod futex {
    use core::ptr;
    use core::sync::atomic::AtomicU32;
    use core::time::Duration;

    use super::{Parker, WaitStatus};
    use crate::error::Error;

    /// Process-private Linux futex.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Futex;

    #[cfg(target_os = "linux")]
    #[inline]
    fn errno() -> i32 {
        // Safety: the errno location is always valid for the calling thread.
        unsafe { *libc::__errno_location() }
    }

    #[cfg(target_os = "android")]
    #[inline]
    fn errno() -> i32 {
        // Safety: as above.
        unsafe { *libc::__errno() }
    }

    fn timespec(timeout: Duration) -> libc::timespec {
        // Safety: timespec is plain data; zeroing covers any padding fields.
        let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
        ts.tv_sec = timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t;
        ts.tv_nsec = timeout.subsec_nanos() as _;
        ts
    }

    unsafe impl Parker for Futex {
        fn wait(
            word: &AtomicU32,
            expected: u32,
            timeout: Option<Duration>,
        ) -> Result<WaitStatus, Error> {
            let ts = timeout.map(timespec);
            let ts_ptr = ts
                .as_ref()
                .map_or(ptr::null(), |ts| ts as *const libc::timespec);

            // Safety: `word` is a live, aligned u32 for the whole call and the
            // timeout (if any) is relative, as FUTEX_WAIT expects.
            let r = unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    word.as_ptr(),
                    libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                    expected,
                    ts_ptr,
                    ptr::null::<u32>(),
                    0u32,
                )
            };
            if r == 0 {
                return Ok(WaitStatus::Woken);
            }
            match errno() {
                libc::EAGAIN => Ok(WaitStatus::ValueChanged),
                libc::EINTR => Ok(WaitStatus::Interrupted),
                libc::ETIMEDOUT => Ok(WaitStatus::TimedOut),
                e => Err(Error::Wait(e)),
            }
        }

        fn wake(word: &AtomicU32, count: u32) -> Result<usize, Error> {
            let count = count.min(i32::MAX as u32);
            // Safety: FUTEX_WAKE only uses the address as a key.
            let r = unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    word.as_ptr(),
                    libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                    count,
                )
            };
            if r < 0 {
                Err(Error::Wake(errno()))
            } else {
                Ok(r as usize)
            }
        }
    }
}

#[cfg(all(test, any(target_os = "linux", target_os = "android")))]
mod tests {
    use super::*;

    #[test]
    fn test_wait_returns_immediately_on_mismatch() {
        let word = AtomicU32::new(1);
        assert_eq!(Futex::wait(&word, 2, None), Ok(WaitStatus::ValueChanged));
    }

    #[test]
    fn test_wait_times_out() {
        let word = AtomicU32::new(2);
        let status = Futex::wait(&word, 2, Some(Duration::from_millis(5)));
        // A signal landing on the test thread is also legal.
        assert!(matches!(
            status,
            Ok(WaitStatus::TimedOut) | Ok(WaitStatus::Interrupted)
        ));
    }

    #[test]
    fn test_wake_without_sleepers_is_a_no_op() {
        let word = AtomicU32::new(0);
        assert_eq!(Futex::wake(&word, 1), Ok(0));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_wake_releases_sleeper() {
        use std::sync::atomic::Ordering;
        use std::sync::Arc;
        use std::thread;

        let word = Arc::new(AtomicU32::new(2));
        let sleeper = {
            let word = word.clone();
            thread::spawn(move || {
                while word.load(Ordering::Acquire) == 2 {
                    Futex::wait(&word, 2, None).unwrap();
                }
            })
        };

        thread::sleep(Duration::from_millis(10));
        word.store(0, Ordering::Release);
        Futex::wake(&word, 1).unwrap();
        sleeper.join().unwrap();
    }
}
