//! Failures of the primitives underneath the lock.
//!
//! None of these ever reach a caller of the lock. A wait or wake primitive
//! that fails unexpectedly leaves the lock word in a state nobody can reason
//! about, so the lock hands the error to [`fatal`] and the process aborts.

/// An unexpected failure reported by a wait/wake primitive or a pthread mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The wait primitive failed with something other than a spurious return.
    #[error("wait on lock word failed (errno {0})")]
    Wait(i32),

    /// The wake primitive failed.
    #[error("wake on lock word failed (errno {0})")]
    Wake(i32),

    /// A `pthread_mutex_*` call returned a nonzero code.
    #[error("pthread_mutex_{op} failed (code {code})")]
    Pthread {
        /// Which call failed: `lock`, `trylock` or `unlock`.
        op: &'static str,
        /// The code it returned.
        code: i32,
    },
}

/// Reports `err` and aborts the process.
///
/// Unwinding out of a lock operation could leave other threads parked on a
/// word that will never be woken, so this never panics.
#[cold]
#[inline(never)]
pub fn fatal(err: Error) -> ! {
    log::error!("tiny-lock: {err}");
    abort()
}

#[cfg(unix)]
fn abort() -> ! {
    // Safety: abort(3) is async-signal-safe and takes no arguments.
    unsafe { libc::abort() }
}

#[cfg(all(not(unix), feature = "std"))]
fn abort() -> ! {
    std::process::abort()
}

#[cfg(all(not(unix), not(feature = "std")))]
fn abort() -> ! {
    // No way to abort without an OS; a panic is the closest thing.
    panic!("tiny-lock: unrecoverable primitive failure")
}
