//! Scenario 4 / invariant I5 (spec §8): a thread sleeping for `n` quanta
//! observes at least `n` quantum boundaries elapse before `sleep`
//! returns.

mod common;

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use uthreads::api::{uthread_get_total_quantums, uthread_init, uthread_sleep, uthread_spawn};

const QUANTUM_USECS: i32 = 100_000;
const SLEEP_QUANTA: i32 = 3;

static TOTAL_BEFORE_SLEEP: AtomicI32 = AtomicI32::new(-1);
static TOTAL_AFTER_WAKE: AtomicI32 = AtomicI32::new(-1);

extern "C" fn sleeper() {
    TOTAL_BEFORE_SLEEP.store(uthread_get_total_quantums(), Ordering::Relaxed);
    uthread_sleep(SLEEP_QUANTA);
    TOTAL_AFTER_WAKE.store(uthread_get_total_quantums(), Ordering::Relaxed);
    loop {
        std::hint::spin_loop();
    }
}

extern "C" fn other() {
    // Keeps READY non-empty and keeps virtual CPU time advancing while
    // `sleeper` is off the queue.
    loop {
        std::hint::spin_loop();
    }
}

#[test]
fn sleep_for_n_quanta() {
    common::init_logging();
    assert_eq!(uthread_init(QUANTUM_USECS), 0);
    assert_eq!(uthread_spawn(Some(sleeper)), 1);
    assert_eq!(uthread_spawn(Some(other)), 2);

    let woke = common::busy_wait_until(
        || TOTAL_AFTER_WAKE.load(Ordering::Relaxed) >= 0,
        Duration::from_micros(QUANTUM_USECS as u64 * (SLEEP_QUANTA as u64 + 4)),
    );
    assert!(woke, "tid 1 must wake up and resume running");

    let before = TOTAL_BEFORE_SLEEP.load(Ordering::Relaxed);
    let after = TOTAL_AFTER_WAKE.load(Ordering::Relaxed);
    assert!(before >= 0);
    assert!(
        after - before >= SLEEP_QUANTA,
        "at least {SLEEP_QUANTA} quantum boundaries must elapse while tid 1 sleeps (before={before}, after={after})"
    );
}
