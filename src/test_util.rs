//! Helpers shared by the unit tests.

use core::sync::atomic::AtomicU32;
use std::thread;
use std::time::{Duration, Instant};

use crate::collector::Collector;
use crate::error::Error;
use crate::wait::WaitStatus;

/// Polls `cond` until it holds, failing the test after five seconds.
pub(crate) fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// A collector that must never be consulted.
pub(crate) struct UnusedCollector;

impl Collector for UnusedCollector {
    fn in_pseudo_atomic(&self) -> bool {
        panic!("collector queried by a lock that cannot park")
    }

    fn wait_allowing_pause(&self, _word: &AtomicU32, _expected: u32) -> Result<WaitStatus, Error> {
        panic!("collector wait used by a lock that cannot park")
    }
}
