//! The scheduler core (spec §4.3–§4.6): the thread table, the READY/
//! BLOCKED/RUNNING state sets, the `yield` operation, and the sleep
//! countdown. This module is the library's single source of truth; the
//! `api` module is a thin, C-ABI shell over the functions here.
//!
//! Every operation that mutates state sets or the thread table does so
//! while holding the global [`SCHEDULER`] lock — but the lock is always
//! released *before* a context switch actually happens (see [`yield_now`]),
//! because `Context::restore` can abandon the current stack frame for
//! good. A `MutexGuard` held across that call would never run its `Drop`,
//! and the lock would stay held forever. The true mutual-exclusion
//! primitive here is the `SIGVTALRM` mask ([`crate::timer::CriticalSection`]),
//! not this lock — the lock only exists to give the 'static singleton
//! interior mutability.
//!
//! A self-terminating thread can't free its own stack synchronously
//! either, for the same reason: it is still executing on that stack
//! when `terminate` runs. See the `zombie` field on [`Scheduler`] and
//! [`terminate`].

use std::collections::{BTreeSet, VecDeque};

use spin::Mutex;

use crate::context::Context;
use crate::errors::{report_system_error_and_abort, LibraryError};
use crate::thread::{Stack, ThreadEntry, ThreadRecord, Tid};
use crate::MAX_THREAD_NUM;

static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);

pub(crate) enum TerminateOutcome {
    Terminated,
    ExitProcess,
}

struct Scheduler {
    table: Vec<Option<ThreadRecord>>,
    ready: VecDeque<Tid>,
    blocked: BTreeSet<Tid>,
    running: Tid,
    /// A self-terminated thread's record, kept alive past the point its
    /// table slot is cleared. We are still executing on that thread's
    /// own stack when `terminate` runs, so the `Stack` buffer can't be
    /// dropped until some *other* thread is running — see `terminate`.
    zombie: Option<ThreadRecord>,
}

impl Scheduler {
    fn allocate_slot(&self) -> Option<Tid> {
        self.table.iter().position(Option::is_none)
    }

    fn validate_tid(&self, tid: Tid) -> Result<(), LibraryError> {
        if tid >= self.table.len() || self.table[tid].is_none() {
            return Err(LibraryError::InvalidTid);
        }
        Ok(())
    }

    /// Sleep countdown (spec §4.4): every positive sleep counter drops by
    /// one; a thread whose counter reaches zero rejoins READY unless it
    /// is also BLOCKED.
    fn tick_sleep_counters(&mut self) {
        for tid in 0..self.table.len() {
            if let Some(record) = self.table[tid].as_mut() {
                if record.sleep_counter > 0 {
                    record.sleep_counter -= 1;
                    if record.sleep_counter == 0 && !self.blocked.contains(&tid) {
                        self.ready.push_back(tid);
                    }
                }
            }
        }
    }
}

/// Whether `uthread_init` has already run.
pub(crate) fn is_initialized() -> bool {
    SCHEDULER.lock().is_some()
}

pub(crate) fn init(quantum_usecs: i64) -> Result<(), LibraryError> {
    if quantum_usecs < 1 {
        return Err(LibraryError::InvalidInput);
    }

    let context = match Context::capture_current() {
        Ok(c) => c,
        Err(err) => report_system_error_and_abort(err),
    };

    let mut table: Vec<Option<ThreadRecord>> = (0..MAX_THREAD_NUM).map(|_| None).collect();
    let mut main_thread = ThreadRecord::main_thread(context);
    main_thread.quantums = 1;
    table[0] = Some(main_thread);

    *SCHEDULER.lock() = Some(Scheduler {
        table,
        ready: VecDeque::new(),
        blocked: BTreeSet::new(),
        running: 0,
        zombie: None,
    });

    if let Err(err) = crate::timer::arm(quantum_usecs) {
        report_system_error_and_abort(err);
    }

    log::info!("uthreads initialized, quantum = {quantum_usecs}us");
    Ok(())
}

pub(crate) fn spawn(entry: ThreadEntry) -> Result<Tid, LibraryError> {
    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not initialized");

    let tid = sched.allocate_slot().ok_or(LibraryError::TableFull)?;

    let mut stack = match Stack::allocate() {
        Ok(stack) => stack,
        Err(err) => {
            drop(guard);
            report_system_error_and_abort(err);
        }
    };
    let context = match Context::primed(&mut stack, trampoline, tid) {
        Ok(ctx) => ctx,
        Err(err) => {
            drop(guard);
            report_system_error_and_abort(err);
        }
    };

    sched.table[tid] = Some(ThreadRecord::spawned(context, stack, entry));
    sched.ready.push_back(tid);
    log::debug!("spawned tid {tid}");
    Ok(tid)
}

pub(crate) fn terminate(tid: Tid) -> Result<TerminateOutcome, LibraryError> {
    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not initialized");
    sched.validate_tid(tid)?;

    if tid == 0 {
        return Ok(TerminateOutcome::ExitProcess);
    }

    let is_self = tid == sched.running;
    sched.ready.retain(|&t| t != tid);
    sched.blocked.remove(&tid);
    let record = sched.table[tid].take();

    // Whatever zombie was pending belongs to some earlier self-terminate;
    // since we're executing here at all, we're on a live thread's stack,
    // never that dead one's, so dropping it now is safe.
    sched.zombie = None;
    if is_self {
        // This thread is still running on `record`'s stack. Keep it
        // alive until a future `terminate` call (necessarily made from a
        // different, live stack) reaps it above; `yield_now` below never
        // touches this slot again.
        sched.zombie = record;
    }
    drop(guard);

    log::debug!("terminated tid {tid} (self={is_self})");
    if is_self {
        yield_now(false);
        unreachable!("yield_now(false) from a self-terminate must never return");
    }
    Ok(TerminateOutcome::Terminated)
}

pub(crate) fn block(tid: Tid) -> Result<(), LibraryError> {
    let is_self;
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");
        sched.validate_tid(tid)?;
        if tid == 0 {
            return Err(LibraryError::InvalidBlock);
        }
        sched.ready.retain(|&t| t != tid);
        sched.blocked.insert(tid);
        is_self = tid == sched.running;
    }
    if is_self {
        yield_now(false);
    }
    Ok(())
}

pub(crate) fn resume(tid: Tid) -> Result<(), LibraryError> {
    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not initialized");
    sched.validate_tid(tid)?;

    let was_blocked = sched.blocked.remove(&tid);
    if was_blocked && sched.table[tid].as_ref().unwrap().sleep_counter == 0 {
        sched.ready.push_back(tid);
    }
    Ok(())
}

pub(crate) fn sleep(num_quantums: u32) -> Result<(), LibraryError> {
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");
        if sched.running == 0 {
            return Err(LibraryError::InvalidSleepFromMain);
        }
        sched.table[sched.running].as_mut().unwrap().sleep_counter = num_quantums;
    }
    yield_now(false);
    Ok(())
}

pub(crate) fn get_tid() -> Tid {
    SCHEDULER.lock().as_ref().expect("scheduler not initialized").running
}

pub(crate) fn get_total_quantums() -> u64 {
    SCHEDULER
        .lock()
        .as_ref()
        .expect("scheduler not initialized")
        .table
        .iter()
        .flatten()
        .map(|r| r.quantums)
        .sum()
}

pub(crate) fn get_quantums(tid: Tid) -> Result<u64, LibraryError> {
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref().expect("scheduler not initialized");
    sched.validate_tid(tid)?;
    Ok(sched.table[tid].as_ref().unwrap().quantums)
}

/// Release every resource the scheduler holds. Used both by main-thread
/// termination (spec §4.6) and by the unrecoverable-system-error path
/// (spec §7) before the process exits.
pub(crate) fn release_all_resources() {
    *SCHEDULER.lock() = None; // dropping the Scheduler drops every stack
}

/// The one scheduling decision in the library (spec §4.3).
///
/// `reinsert`: whether the currently running thread goes back to the
/// tail of READY before the next thread is chosen.
pub(crate) fn yield_now(reinsert: bool) {
    let (running_ctx, next): (Option<*mut Context>, Tid) = {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");

        let running = sched.running;
        if reinsert {
            sched.ready.push_back(running);
        }
        let next = sched.ready.pop_front().expect(
            "READY must be non-empty: tid 0 is never BLOCKED or SLEEPING, so \
             whenever it isn't RUNNING it is sitting in READY",
        );

        let running_ctx = sched.table[running]
            .as_mut()
            .map(|record| &mut record.context as *mut Context);
        (running_ctx, next)
        // lock released here, *before* any context is touched
    };

    // SAFETY: `running_ctx`/later `next_ctx` point into the 'static
    // `Scheduler`'s storage, which outlives this call; nothing else can
    // run concurrently because SIGVTALRM is masked for the duration of
    // whichever public call (or timer handler) reached this function.
    let resumed = match running_ctx {
        Some(ctx) => unsafe { &mut *ctx }
            .save()
            .unwrap_or_else(|err| report_system_error_and_abort(err)),
        // The running slot was just freed by a self-terminate: there is
        // nothing to save, and nothing will ever resume here.
        None => false,
    };

    if resumed {
        // We were the thread that had yielded; the scheduling decision
        // that picked us happened in a past invocation of this function.
        return;
    }

    let next_ctx = {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");
        sched.table[next]
            .as_mut()
            .expect("tid popped from READY must be allocated")
            .quantums += 1;
        sched.tick_sleep_counters();
        sched.running = next;
        &mut sched.table[next].as_mut().unwrap().context as *mut Context
        // lock released here, *before* the point of no return
    };

    unsafe { &mut *next_ctx }.restore();
}

/// Invoked directly by the `SIGVTALRM` handler. The signal itself is
/// already blocked for the handler's duration (no `SA_NODEFER`), so this
/// runs with the same atomicity a public API call gets.
pub(crate) fn on_timer_tick() {
    yield_now(true);
}

/// The `makecontext` entry point for every spawned thread. Looks up its
/// own entry function (briefly masked, since this touches the shared
/// table), runs it unmasked and fully preemptible, then self-terminates
/// if the entry function ever returns.
extern "C" fn trampoline(tid: libc::c_int) {
    let tid = tid as Tid;
    let entry = {
        let _critical = crate::timer::CriticalSection::enter();
        let guard = SCHEDULER.lock();
        guard
            .as_ref()
            .expect("scheduler not initialized")
            .table[tid]
            .as_ref()
            .expect("trampoline invoked for an unallocated tid")
            .entry
            .expect("a spawned thread record always carries its entry point")
    };

    entry();

    // Implicit self-terminate: `entry()` returned instead of the thread
    // calling `uthread_terminate` itself. Every other path into the
    // scheduler core is reached through an `api.rs` shim that masks
    // `SIGVTALRM` for the whole call; this is the one path that isn't, so
    // it must mask it here itself before touching `SCHEDULER` — otherwise
    // a timer tick landing inside `terminate()` would re-enter `yield_now`
    // through the handler while this thread already holds the (non-
    // reentrant) `SCHEDULER` lock.
    let _critical = crate::timer::CriticalSection::enter();
    let _ = terminate(tid); // self-terminate: never returns
    unreachable!("terminate of the running thread must never return");
}
