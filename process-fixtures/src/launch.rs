//! Launching fixture roles as separate processes

use crate::FixtureError;
use std::panic::{self, AssertUnwindSafe};
use unsafe_linux_process::{
    safe_exit_immediately, safe_fork, safe_wait_for_child, ChildExit, ForkOutcome,
};

/// Exit code of a launched child whose entry point returned an error
pub const ENTRY_FAILED_EXIT_CODE: i32 = 1;

/// Exit code of a launched child whose entry point panicked
pub const ENTRY_PANICKED_EXIT_CODE: i32 = 101;

/// Caller-side handle to a launched child process
///
/// Dropping the handle does not reap the child. A child that is never waited
/// for stays in the process table as a zombie until someone else reaps it.
#[derive(Debug)]
pub struct ChildHandle {
    pid: u32,
}

impl ChildHandle {
    /// Process ID of the child
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the child terminates and reap it
    pub fn wait(self) -> Result<ChildExit, FixtureError> {
        let pid = self.pid;
        safe_wait_for_child(pid).map_err(|source| FixtureError::WaitFailed { pid, source })
    }
}

/// Run `entry` in a new process and return a handle to it
///
/// The new process never returns from this call: it terminates with the code
/// `entry` returns, [`ENTRY_FAILED_EXIT_CODE`] on error or
/// [`ENTRY_PANICKED_EXIT_CODE`] on panic. Only call this from a
/// single-threaded process.
pub fn launch<F>(entry: F) -> Result<ChildHandle, FixtureError>
where
    F: FnOnce() -> Result<i32, FixtureError>,
{
    match safe_fork().map_err(|source| FixtureError::SpawnFailed { source })? {
        ForkOutcome::Parent { child_pid } => {
            tracing::debug!("Launched child process {}", child_pid);
            Ok(ChildHandle { pid: child_pid })
        }
        ForkOutcome::Child => {
            let code = match panic::catch_unwind(AssertUnwindSafe(entry)) {
                Ok(Ok(code)) => code,
                Ok(Err(error)) => {
                    tracing::error!("Child entry point failed: {}", error);
                    ENTRY_FAILED_EXIT_CODE
                }
                Err(_) => ENTRY_PANICKED_EXIT_CODE,
            };
            safe_exit_immediately(code)
        }
    }
}
