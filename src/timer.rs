//! The preemptive timer and the signal mask that makes every public API
//! call atomic with respect to it.
//!
//! A real `ITIMER_VIRTUAL` fires `SIGVTALRM` every `quantum_usecs`; the
//! installed handler's entire job is to invoke the scheduler's `yield`.
//! Every public API body masks `SIGVTALRM` on entry and unmasks it on
//! exit via [`CriticalSection`], so the handler only ever runs between API
//! calls or while a thread is executing its own user code — never while
//! the thread table or state sets are mid-mutation.

use std::io;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::SystemError;

static TIMER_ARMED: AtomicBool = AtomicBool::new(false);

pub fn is_armed() -> bool {
    TIMER_ARMED.load(Ordering::Acquire)
}

extern "C" fn sigvtalrm_handler(_sig: libc::c_int) {
    // SIGVTALRM is automatically added to the blocked set for the
    // duration of its own handler (no SA_NODEFER below), so this runs
    // with the same atomicity a public API call gets from
    // `CriticalSection`.
    crate::scheduler::on_timer_tick();
}

/// Install the handler and arm `ITIMER_VIRTUAL` to fire every
/// `quantum_usecs` microseconds, starting after the first such interval.
pub fn arm(quantum_usecs: i64) -> Result<(), SystemError> {
    unsafe {
        let mut sa: libc::sigaction = MaybeUninit::zeroed().assume_init();
        sa.sa_sigaction = sigvtalrm_handler as usize;
        sa.sa_flags = 0;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(libc::SIGVTALRM, &sa, std::ptr::null_mut()) != 0 {
            return Err(SystemError::SigactionFailed(io::Error::last_os_error()));
        }

        let interval = libc::timeval {
            tv_sec: quantum_usecs / 1_000_000,
            tv_usec: quantum_usecs % 1_000_000,
        };
        let timer = libc::itimerval {
            it_interval: interval,
            it_value: interval,
        };
        if libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) != 0 {
            return Err(SystemError::SetitimerFailed(io::Error::last_os_error()));
        }
    }
    TIMER_ARMED.store(true, Ordering::Release);
    log::debug!("ITIMER_VIRTUAL armed at {quantum_usecs}us");
    Ok(())
}

fn sigvtalrm_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = MaybeUninit::zeroed().assume_init();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGVTALRM);
        set
    }
}

/// A scoped mask of `SIGVTALRM`, released on every exit path — including
/// an early `return` or a panic unwinding through it — by `Drop`. This is
/// the library's sole mutual-exclusion primitive: since only one CPU
/// context ever executes library code, blocking the timer signal is
/// sufficient to prevent the handler from re-entering the scheduler
/// mid-mutation.
pub struct CriticalSection {
    _no_send_sync: std::marker::PhantomData<*const ()>,
}

impl CriticalSection {
    pub fn enter() -> Self {
        unsafe {
            let set = sigvtalrm_set();
            libc::sigprocmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
        }
        CriticalSection {
            _no_send_sync: std::marker::PhantomData,
        }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        unsafe {
            let set = sigvtalrm_set();
            libc::sigprocmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut());
        }
    }
}
