//! # Backoff
//!
//! Spin-then-yield policy for the lock strategy that has no way to block.
//!
//! The first [`SPIN_LIMIT`] failed attempts only issue a CPU pause hint
//! ([`core::hint::spin_loop`]). After that, every further attempt also gives
//! the rest of the thread's time slice back to the scheduler, so a holder
//! that was preempted gets a chance to run and release.
//!
//! ## Yielding
//! - On unix the yield is `sched_yield(2)`, which is async-signal-safe.
//! - Elsewhere, with the `std` feature, it is [`std::thread::yield_now`].
//! - Without either there is nothing to yield to and the loop keeps spinning.
//!
//! ## Example
//! ```rust
//! use tiny_lock::Backoff;
//!
//! let backoff = Backoff::new();
//! let mut tries = 0;
//! while !try_acquire(&mut tries) {
//!     backoff.snooze();
//! }
//!
//! fn try_acquire(tries: &mut u32) -> bool {
//!     *tries += 1;
//!     *tries > 3
//! }
//! ```

use core::{cell::Cell, hint::spin_loop};

/// Failed attempts tolerated before each retry starts yielding.
pub const SPIN_LIMIT: u32 = 1000;

/// Counts failed acquisition attempts and decides when to yield.
///
/// One `Backoff` lives on the stack of a single acquire call; it is not
/// shared between threads.
pub struct Backoff {
    attempts: Cell<u32>,
}

impl Backoff {
    /// Creates a fresh [`Backoff`] with no recorded attempts.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            attempts: Cell::new(0),
        }
    }

    /// Records one failed attempt and waits before the next one.
    ///
    /// Returns `true` if this call yielded the thread.
    #[inline]
    pub fn snooze(&self) -> bool {
        let n = self.attempts.get();
        self.attempts.set(n.saturating_add(1));

        spin_loop();
        if n > SPIN_LIMIT {
            yield_now();
            true
        } else {
            false
        }
    }

    /// Number of failed attempts recorded so far.
    #[inline(always)]
    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }

    /// Whether the next [`snooze`](Backoff::snooze) will yield.
    #[inline(always)]
    pub fn is_yielding(&self) -> bool {
        self.attempts.get() > SPIN_LIMIT
    }

    /// Forgets all recorded attempts.
    #[inline(always)]
    pub fn reset(&self) {
        self.attempts.set(0);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
#[inline]
fn yield_now() {
    // Safety: sched_yield takes no arguments and cannot fail on Linux.
    unsafe {
        libc::sched_yield();
    }
}

#[cfg(all(not(unix), feature = "std"))]
#[inline]
fn yield_now() {
    std::thread::yield_now();
}

#[cfg(all(not(unix), not(feature = "std")))]
#[inline]
fn yield_now() {
    spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ensures the first SPIN_LIMIT attempts never yield.
    #[test]
    fn test_spins_before_yielding() {
        let b = Backoff::new();

        for _ in 0..=SPIN_LIMIT {
            assert!(!b.snooze(), "Backoff yielded before the spin limit");
        }
        assert_eq!(b.attempts(), SPIN_LIMIT + 1);
        assert!(b.is_yielding());
        assert!(b.snooze(), "Backoff should yield past the spin limit");
    }

    /// Ensures reset restores the spinning phase.
    #[test]
    fn test_reset_behavior() {
        let b = Backoff::new();

        for _ in 0..SPIN_LIMIT + 5 {
            b.snooze();
        }
        assert!(b.is_yielding());

        b.reset();
        assert_eq!(b.attempts(), 0, "Reset did not clear attempts");
        assert!(!b.snooze());
    }
}
