//! # tiny-lock
//!
//! A one-word, allocation-free mutual-exclusion lock that is safe to use where
//! ordinary mutexes are not: inside signal handlers, and in a managed runtime
//! where a garbage collector may need to stop the world while threads wait.
//!
//! The crate exposes exactly four operations over one `u32`:
//!
//! - `acquire`: blocks until held. Uncontended, it is a single
//!   compare-and-swap.
//! - `try_acquire`: one compare-and-swap, never blocks.
//! - `release`: a decrement, plus one wake call only if a waiter was ever
//!   recorded.
//! - `acquire_allowing_collector_pause`: `acquire`, but a thread that has to
//!   block parks through a [`Collector`] so a stop-the-world pause can proceed.
//!
//! There is no reentrancy, no owner tracking, no timeout and no fairness
//! beyond what the wait primitive provides.
//!
//! ## Strategies
//!
//! [`Lock`] is picked at build time:
//!
//! | configuration                    | `Lock`          | word       |
//! |----------------------------------|-----------------|------------|
//! | `pthread` feature, unix          | `PthreadLock`   | n/a        |
//! | `futex` feature, Linux/Android   | `FutexLock`     | `0, 1, 2`  |
//! | anything else                    | [`SpinLock`]    | `0, 1`     |
//!
//! Where no blocking primitive exists, the collector-aware acquire is the
//! plain acquire.
//!
//! ## 🚀 Quick Example
//!
//! ```rust
//! use tiny_lock::{Lock, Mutex};
//!
//! static RAW: Lock = Lock::new();
//! static COUNTER: Mutex<u32> = Mutex::const_new(<Lock as tiny_lock::RawMutex>::INIT, 0);
//!
//! RAW.acquire();
//! // critical section
//! unsafe { RAW.release() };
//!
//! *COUNTER.lock() += 1;
//! assert_eq!(*COUNTER.lock(), 1);
//! ```
//!
//! ## ⚠️ Safety & Usage Notes
//!
//! - `release` must only be called by the thread holding the lock; anything
//!   else is undefined behavior, not an error.
//! - A failing wait/wake primitive aborts the process. See [`error`].
//! - `PthreadLock` (unix only) is not async-signal-safe.
//!
//! ## Feature flags
//! - **`std`** (default): yielding through `std` on non-unix targets.
//! - **`futex`** (default): the futex strategy on Linux and Android.
//! - **`pthread`**: select the pthread strategy on unix.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod backoff;
pub mod collector;
pub mod error;
#[cfg(unix)]
pub mod pthread;
pub mod queued;
pub mod spin;
pub mod state;
pub mod wait;

#[cfg(test)]
mod test_util;

pub use backoff::Backoff;
pub use collector::{lock_allowing_pause, Collector, CollectorAwareLock, MutatorState};
pub use error::Error;
#[cfg(unix)]
pub use pthread::PthreadLock;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use queued::FutexLock;
pub use queued::QueuedLock;
pub use spin::SpinLock;
pub use state::State;
pub use wait::{Parker, WaitStatus};

pub use lock_api::RawMutex;

/// The lock this build uses.
#[cfg(all(unix, feature = "pthread"))]
pub type Lock = PthreadLock;

/// The lock this build uses.
#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    feature = "futex",
    not(all(unix, feature = "pthread"))
))]
pub type Lock = FutexLock;

/// The lock this build uses.
#[cfg(not(any(
    all(unix, feature = "pthread"),
    all(any(target_os = "linux", target_os = "android"), feature = "futex")
)))]
pub type Lock = SpinLock;

/// A value guarded by a raw lock, [`Lock`] unless stated otherwise.
pub type Mutex<T, R = Lock> = lock_api::Mutex<R, T>;

/// RAII guard returned by [`Mutex::lock`] and [`lock_allowing_pause`].
pub type MutexGuard<'a, T, R = Lock> = lock_api::MutexGuard<'a, R, T>;
