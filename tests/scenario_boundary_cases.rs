//! Boundary cases (spec §8): a non-positive quantum, a null entry point,
//! blocking or sleeping tid 0, an out-of-range tid, filling the thread
//! table to `MAX_THREAD_NUM`, and id reuse after a non-self `terminate`.
//!
//! None of these need a spawned thread to actually run: every assertion
//! here is resolved synchronously inside the calling (main) thread, so
//! unlike the other `scenario_*` files this one needs no busy-waiting.

mod common;

use uthreads::api::{
    uthread_block, uthread_get_quantums, uthread_init, uthread_sleep, uthread_spawn,
    uthread_terminate,
};
use uthreads::MAX_THREAD_NUM;

extern "C" fn filler() {
    loop {
        std::hint::spin_loop();
    }
}

#[test]
fn boundary_cases() {
    common::init_logging();
    assert_eq!(uthread_init(0), -1, "init(0) must fail");
    assert_eq!(uthread_init(-1), -1, "init(-1) must fail");

    assert_eq!(uthread_init(100_000), 0);
    assert_eq!(
        uthread_init(100_000),
        -1,
        "init must not be callable a second time"
    );

    assert_eq!(uthread_spawn(None), -1, "spawn(null) must fail");

    assert_eq!(uthread_block(0), -1, "tid 0 may never be blocked");
    assert_eq!(uthread_sleep(5), -1, "tid 0 may never sleep");

    assert_eq!(
        uthread_terminate(MAX_THREAD_NUM as i32 + 5),
        -1,
        "terminating an out-of-range tid must fail"
    );
    assert_eq!(
        uthread_get_quantums(MAX_THREAD_NUM as i32 + 5),
        -1,
        "querying an out-of-range tid must fail"
    );
    assert_eq!(
        uthread_get_quantums(7),
        -1,
        "querying an unallocated (but in-range) tid must fail"
    );

    // Slot 0 is main; MAX_THREAD_NUM - 1 slots remain for spawned threads.
    for expected_tid in 1..MAX_THREAD_NUM {
        assert_eq!(
            uthread_spawn(Some(filler)),
            expected_tid as i32,
            "spawn must allocate the lowest free tid"
        );
    }
    assert_eq!(
        uthread_spawn(Some(filler)),
        -1,
        "spawn must fail once the table is full"
    );

    // Freeing one non-main slot makes room for exactly one more spawn,
    // which reuses that freed tid (spec I7).
    assert_eq!(uthread_terminate(1), 0);
    assert_eq!(
        uthread_spawn(Some(filler)),
        1,
        "spawn must reuse the tid freed by terminate"
    );
    assert_eq!(
        uthread_spawn(Some(filler)),
        -1,
        "the table must be full again immediately after"
    );
}
