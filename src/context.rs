//! The context primitive (spec §4.1): save the caller's execution state
//! into a slot, restore a previously-saved state, or prime a slot to begin
//! a fresh entry function on top of a given stack.
//!
//! Implemented on POSIX `ucontext_t` (`getcontext`/`setcontext`/
//! `makecontext`) — one of the "equivalent primitives" the spec names in
//! place of hand-rolled register-save assembly. `getcontext`/`setcontext`
//! only ever snapshot CPU register state (stack pointer, program counter,
//! callee-saved registers, signal mask); they never roll back ordinary
//! memory. That's what makes the `resumed` flag below work: it is written
//! to memory immediately before `save` returns and again immediately
//! before `restore` jumps, so whichever write happened last is the one
//! `save`'s caller observes when execution resumes at the `getcontext`
//! call site.

use std::mem::MaybeUninit;

use crate::errors::SystemError;
use crate::thread::{Stack, Tid};

/// A thread's saved execution context.
pub struct Context {
    uctx: libc::ucontext_t,
    /// Set to `true` immediately before `restore` jumps into this
    /// context, and to `false` immediately before `save` captures it.
    /// Read right after `getcontext` returns (whether that's the first,
    /// "just saved" return or a later, "just resumed" one).
    resumed: bool,
}

impl Context {
    fn blank() -> Self {
        Context {
            uctx: unsafe { MaybeUninit::zeroed().assume_init() },
            resumed: false,
        }
    }

    /// Capture the calling thread's current state. Used once at `init`
    /// time to give tid 0 (which already has a running stack) a context
    /// to be preempted into later.
    pub fn capture_current() -> Result<Self, SystemError> {
        let mut ctx = Self::blank();
        ctx.save()?;
        Ok(ctx)
    }

    /// Initialise a context so that `restore`-ing it begins executing
    /// `trampoline(tid)` on top of `stack`. The saved signal mask starts
    /// empty, per §4.1 — a freshly spawned thread runs preemptible from
    /// its first instruction.
    pub fn primed(
        stack: &mut Stack,
        trampoline: extern "C" fn(libc::c_int),
        tid: Tid,
    ) -> Result<Self, SystemError> {
        let mut ctx = Self::blank();
        unsafe {
            if libc::getcontext(&mut ctx.uctx) != 0 {
                return Err(SystemError::GetcontextFailed(std::io::Error::last_os_error()));
            }
            ctx.uctx.uc_stack.ss_sp = stack.as_mut_ptr() as *mut libc::c_void;
            ctx.uctx.uc_stack.ss_size = stack.len();
            ctx.uctx.uc_stack.ss_flags = 0;
            ctx.uctx.uc_link = std::ptr::null_mut();
            libc::sigemptyset(&mut ctx.uctx.uc_sigmask);
            let entry: extern "C" fn() = std::mem::transmute(trampoline);
            libc::makecontext(&mut ctx.uctx, entry, 1, tid as libc::c_int);
        }
        Ok(ctx)
    }

    /// Snapshot the caller's state. Returns `false` the first time
    /// ("just saved"); returns `true` if execution reaches this point
    /// again because a later `restore` jumped back into it ("just
    /// resumed").
    pub fn save(&mut self) -> Result<bool, SystemError> {
        self.resumed = false;
        let rc = unsafe { libc::getcontext(&mut self.uctx) };
        if rc != 0 {
            return Err(SystemError::GetcontextFailed(std::io::Error::last_os_error()));
        }
        Ok(self.resumed)
    }

    /// Transfer control into this context. Never returns to its caller:
    /// control resumes at the `save` call that produced it (or, for a
    /// primed context, at the trampoline's entry).
    pub fn restore(&mut self) -> ! {
        self.resumed = true;
        unsafe {
            libc::setcontext(&self.uctx);
        }
        unreachable!("setcontext returned to its caller, which must never happen");
    }
}
