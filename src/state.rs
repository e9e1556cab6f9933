//! # Lock word
//!
//! The only storage a lock owns: one `u32` that every strategy manipulates
//! with single atomic operations.
//!
//! | value | meaning                                               |
//! |-------|-------------------------------------------------------|
//! | `0`   | unlocked, no waiters                                  |
//! | `1`   | locked, nobody blocked on it                          |
//! | `2`   | locked, at least one thread is (or is about to be) parked |
//!
//! The spin fallback only ever uses `0` and `1`.

use core::sync::atomic::{AtomicU32, Ordering};

/// Unlocked, no waiters.
pub const UNLOCKED: u32 = 0;

/// Locked, no thread blocked on it.
pub const LOCKED: u32 = 1;

/// Locked, some thread has recorded itself as a waiter.
pub const CONTENDED: u32 = 2;

/// Decoded view of a lock word, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unlocked,
    Locked,
    Contended,
}

impl State {
    /// Decodes a raw word. Anything other than `0` or `1` reads as contended.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            UNLOCKED => State::Unlocked,
            LOCKED => State::Locked,
            _ => State::Contended,
        }
    }
}

/// The atomic word behind every lock in this crate.
#[repr(transparent)]
pub struct LockWord(AtomicU32);

impl LockWord {
    /// A word in the unlocked state.
    #[inline(always)]
    pub const fn new() -> Self {
        LockWord(AtomicU32::new(UNLOCKED))
    }

    /// Compare-and-swap `old` to `new`, returning the value seen before the
    /// attempt. The swap happened iff the result equals `old`.
    ///
    /// Success has acquire ordering, so winning `0 -> n` opens a critical
    /// section.
    #[inline(always)]
    pub fn cmpxchg(&self, old: u32, new: u32) -> u32 {
        match self
            .0
            .compare_exchange(old, new, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(seen) | Err(seen) => seen,
        }
    }

    /// Subtracts one with release ordering and returns the previous value.
    #[inline(always)]
    pub fn decrement(&self) -> u32 {
        self.0.fetch_sub(1, Ordering::Release)
    }

    /// Stores `0` with release ordering.
    #[inline(always)]
    pub fn clear(&self) {
        self.0.store(UNLOCKED, Ordering::Release)
    }

    /// Relaxed read of the raw word.
    #[inline(always)]
    pub fn load(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// The raw atomic, for handing to a wait/wake primitive.
    #[inline(always)]
    pub fn as_atomic(&self) -> &AtomicU32 {
        &self.0
    }
}

impl Default for LockWord {
    fn default() -> Self {
        Self::new()
    }
}
