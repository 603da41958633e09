//! Shared helpers for the end-to-end scenario tests.
//!
//! Each scenario lives in its own top-level file under `tests/` rather
//! than as multiple `#[test]` functions in one file: `uthread_init` may
//! only run once per process (the scheduler is a process-wide
//! singleton, exactly as spec'd), and Cargo already gives every
//! top-level integration test file its own process.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Initialise `env_logger` so the library's `log::trace!`/`debug!` traces
/// (scheduling transitions, timer arming, ...) are visible with
/// `RUST_LOG=uthreads=trace cargo test -- --nocapture`. `try_init` rather
/// than `init`: harmless if a test ever calls this more than once in the
/// same process.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

/// Busy-spin for `duration` of wall time. Unlike a real sleep, this
/// keeps the process consuming CPU the whole time, which is what makes
/// `ITIMER_VIRTUAL` (a *virtual*-time timer, ticking only while the
/// process is actually scheduled on a CPU) advance at all.
pub fn busy_wait(duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Busy-spin until `predicate` holds or `timeout` elapses. Returns
/// whether the predicate was observed true.
pub fn busy_wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::hint::spin_loop();
    }
    predicate()
}

/// A small append-only log threads use to record `get_tid()` at points
/// of interest, protected by a plain mutex (the threads here are
/// uthreads cooperatively sharing one OS thread, so there is never
/// real contention — this is just interior mutability for `'static`
/// storage, the same role `spin::Mutex` plays inside the library
/// itself).
pub struct TidLog(Mutex<Vec<i32>>);

impl TidLog {
    pub const fn new() -> Self {
        TidLog(Mutex::new(Vec::new()))
    }

    pub fn push(&self, tid: i32) {
        self.0.lock().unwrap().push(tid);
    }

    pub fn snapshot(&self) -> Vec<i32> {
        self.0.lock().unwrap().clone()
    }
}

/// Collapse consecutive duplicate entries, recovering the sequence of
/// distinct RUNNING slices from a log a thread appended to on every
/// loop iteration.
pub fn dedup_consecutive(log: &[i32]) -> Vec<i32> {
    let mut out: Vec<i32> = Vec::new();
    for &tid in log {
        if out.last() != Some(&tid) {
            out.push(tid);
        }
    }
    out
}
