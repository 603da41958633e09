//! The public C ABI (spec §5): every `uthread_*` function here is a thin
//! shell around [`crate::scheduler`] — mask `SIGVTALRM`, call into the
//! scheduler, translate its `Result` into the `-1`/`0`/count convention,
//! and print the matching diagnostic on failure. No scheduling logic
//! lives in this module.

use crate::errors::{report_library_error, LibraryError};
use crate::scheduler::{self, TerminateOutcome};
use crate::thread::{ThreadEntry, Tid};
use crate::timer::CriticalSection;

fn tid_from_raw(raw: i32) -> Result<Tid, LibraryError> {
    usize::try_from(raw).map_err(|_| LibraryError::InvalidTid)
}

fn fail(err: LibraryError) -> i32 {
    report_library_error(err);
    -1
}

/// Initialise the library with a quantum length in microseconds. Must be
/// called exactly once, before any other `uthread_*` function.
#[no_mangle]
pub extern "C" fn uthread_init(quantum_usecs: i32) -> i32 {
    let _critical = CriticalSection::enter();
    if scheduler::is_initialized() {
        return fail(LibraryError::InvalidInput);
    }
    match scheduler::init(quantum_usecs as i64) {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

/// Spawn a new thread running `entry_point`. Returns its tid, or `-1`.
/// A null `entry_point` is a library error, not a segfault waiting to
/// happen — hence the nullable function pointer here rather than a bare
/// `ThreadEntry`.
#[no_mangle]
pub extern "C" fn uthread_spawn(entry_point: Option<ThreadEntry>) -> i32 {
    let _critical = CriticalSection::enter();
    let entry_point = match entry_point {
        Some(entry) => entry,
        None => return fail(LibraryError::InvalidSpawn),
    };
    match scheduler::spawn(entry_point) {
        Ok(tid) => tid as i32,
        Err(err) => fail(err),
    }
}

/// Terminate the thread identified by `tid`. Terminating tid 0
/// terminates the whole process (after releasing library resources);
/// this function does not return in that case.
#[no_mangle]
pub extern "C" fn uthread_terminate(tid: i32) -> i32 {
    let _critical = CriticalSection::enter();
    let tid = match tid_from_raw(tid) {
        Ok(tid) => tid,
        Err(err) => return fail(err),
    };
    match scheduler::terminate(tid) {
        Ok(TerminateOutcome::Terminated) => 0,
        Ok(TerminateOutcome::ExitProcess) => {
            scheduler::release_all_resources();
            std::process::exit(0);
        }
        Err(err) => fail(err),
    }
}

/// Move `tid` to BLOCKED. Blocking the running thread yields immediately.
#[no_mangle]
pub extern "C" fn uthread_block(tid: i32) -> i32 {
    let _critical = CriticalSection::enter();
    let tid = match tid_from_raw(tid) {
        Ok(tid) => tid,
        Err(err) => return fail(err),
    };
    match scheduler::block(tid) {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

/// Move `tid` back to READY, unless it is still sleeping.
#[no_mangle]
pub extern "C" fn uthread_resume(tid: i32) -> i32 {
    let _critical = CriticalSection::enter();
    let tid = match tid_from_raw(tid) {
        Ok(tid) => tid,
        Err(err) => return fail(err),
    };
    match scheduler::resume(tid) {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

/// Put the running thread to sleep for `num_quantums` quanta. Illegal
/// from tid 0.
#[no_mangle]
pub extern "C" fn uthread_sleep(num_quantums: i32) -> i32 {
    let _critical = CriticalSection::enter();
    if num_quantums < 0 {
        return fail(LibraryError::InvalidInput);
    }
    match scheduler::sleep(num_quantums as u32) {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

/// The calling thread's own tid.
#[no_mangle]
pub extern "C" fn uthread_get_tid() -> i32 {
    let _critical = CriticalSection::enter();
    scheduler::get_tid() as i32
}

/// Total quanta elapsed across every thread since `uthread_init`.
#[no_mangle]
pub extern "C" fn uthread_get_total_quantums() -> i32 {
    let _critical = CriticalSection::enter();
    scheduler::get_total_quantums() as i32
}

/// Quanta a specific thread has spent RUNNING.
#[no_mangle]
pub extern "C" fn uthread_get_quantums(tid: i32) -> i32 {
    let _critical = CriticalSection::enter();
    let tid = match tid_from_raw(tid) {
        Ok(tid) => tid,
        Err(err) => return fail(err),
    };
    match scheduler::get_quantums(tid) {
        Ok(count) => count as i32,
        Err(err) => fail(err),
    }
}
