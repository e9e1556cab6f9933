//! Demonstrates the build's default `Lock` under contention.
//!
//! Spawns 16 threads, each incrementing a shared counter 100 000 times
//! through a `tiny_lock::Mutex<i64>`, then reports the final value and
//! whether the lock is still held.

use std::thread;
use tiny_lock::{Lock, Mutex, RawMutex};

// Shared static mutex protecting a 64-bit counter.
static Q: Mutex<i64> = Mutex::const_new(<Lock as RawMutex>::INIT, 0);

/// Increment the global counter 100 000 times.
fn add() {
    for _ in 0..100_000 {
        *Q.lock() += 1;
    }
}

fn main() {
    println!("Starting tiny-lock test...");

    let mut threads = Vec::with_capacity(16);
    for _ in 0..16 {
        threads.push(thread::spawn(add));
    }

    for t in threads {
        let _ = t.join();
    }

    println!("Final counter value: {}", *Q.lock());
    println!("Lock held after join: {}", Q.is_locked());
}
