//! The two error taxonomies from the library's contract: recoverable
//! [`LibraryError`]s (the caller's fault, reported and returned as `-1`)
//! and unrecoverable [`SystemError`]s (the host's fault, reported and
//! followed by process termination after releasing library memory).

use std::io;
use thiserror::Error;

/// Prefix for every recoverable-error diagnostic written to stderr.
pub const LIB_ERROR_PREFIX: &str = "thread library error: ";

/// Prefix for every unrecoverable-error diagnostic written to stderr.
pub const SYS_ERROR_PREFIX: &str = "system error: ";

/// Caller's-fault errors: invalid tid, invalid argument, or a request the
/// state machine can't satisfy. None of these mutate library state before
/// being returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LibraryError {
    #[error("invalid input")]
    InvalidInput,
    #[error("invalid thread id")]
    InvalidTid,
    #[error("invalid block call")]
    InvalidBlock,
    #[error("invalid spawn")]
    InvalidSpawn,
    #[error("invalid termination")]
    InvalidTerm,
    #[error("invalid sleep call from main thread")]
    InvalidSleepFromMain,
    #[error("maximum number of threads already exist")]
    TableFull,
}

/// Host's-fault errors: a resource the library needs could not be
/// obtained. Reported, then the process exits after releasing whatever
/// the library had already allocated.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("failed allocation")]
    AllocationFailed,
    #[error("sigaction failed: {0}")]
    SigactionFailed(io::Error),
    #[error("setitimer failed: {0}")]
    SetitimerFailed(io::Error),
    #[error("getcontext failed: {0}")]
    GetcontextFailed(io::Error),
}

/// Print the `thread library error: ` diagnostic for a recoverable error.
/// Does not change any library state.
pub fn report_library_error(err: LibraryError) {
    log::debug!("rejecting call: {err}");
    eprintln!("{LIB_ERROR_PREFIX}{err}");
}

/// Print the `system error: ` diagnostic, release whatever the scheduler
/// already holds, and terminate the process with a failure status. Never
/// returns.
pub fn report_system_error_and_abort(err: SystemError) -> ! {
    log::error!("unrecoverable: {err}");
    eprintln!("{SYS_ERROR_PREFIX}{err}");
    crate::scheduler::release_all_resources();
    std::process::exit(1);
}
