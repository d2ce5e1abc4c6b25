//! Unsafe Linux process operations with safe wrappers
//!
//! This crate provides safe wrappers around the Linux system calls the process
//! fixtures need: duplicating the process, waiting for children, installing
//! signal handlers, raw stdout writes and subreaper control. All unsafe
//! operations are contained within this crate and exposed through safe APIs.

use std::fmt;

/// Errors that can occur during unsafe Linux operations
#[derive(Debug, thiserror::Error)]
pub enum UnsafeLinuxError {
    #[error("System call failed: {syscall}: {errno}")]
    SystemCallFailed { syscall: String, errno: i32 },

    #[error("Invalid parameter: {details}")]
    InvalidParameter { details: String },

    #[error("Process not found")]
    ProcessNotFound,

    #[error("Permission denied: {operation}")]
    PermissionDenied { operation: String },

    #[error("Unsupported on this platform: {operation}")]
    Unsupported { operation: String },
}

/// Which side of a process duplication the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkOutcome {
    /// The original process; `child_pid` is the new process
    Parent { child_pid: u32 },
    /// The new process
    Child,
}

/// How a waited-for child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited normally with the given status code
    Exited(i32),
    /// Killed by the given signal number
    Signaled(i32),
}

impl ChildExit {
    /// Exit code, if the child exited normally
    pub fn code(&self) -> Option<i32> {
        match self {
            ChildExit::Exited(code) => Some(*code),
            ChildExit::Signaled(_) => None,
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildExit::Exited(code) => write!(f, "exited with status {}", code),
            ChildExit::Signaled(signo) => write!(f, "killed by signal {}", signo),
        }
    }
}

/// Signature of a handler accepted by [`safe_install_signal_handler`]
pub type SignalHandlerFn = extern "C" fn(libc::c_int);

#[cfg(target_os = "linux")]
fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(target_os = "linux")]
fn syscall_failed(syscall: &str, errno: i32) -> UnsafeLinuxError {
    match errno {
        libc::ESRCH | libc::ECHILD => UnsafeLinuxError::ProcessNotFound,
        libc::EPERM => UnsafeLinuxError::PermissionDenied {
            operation: syscall.to_string(),
        },
        _ => UnsafeLinuxError::SystemCallFailed {
            syscall: syscall.to_string(),
            errno,
        },
    }
}

/// Safely duplicate the current process
///
/// The child gets a copy of the caller's memory but only the calling thread.
/// Call this from a single-threaded process, or make sure the child touches
/// nothing another thread may have held locked at the time of the call.
#[cfg(target_os = "linux")]
pub fn safe_fork() -> Result<ForkOutcome, UnsafeLinuxError> {
    let pid = unsafe { libc::fork() };

    match pid {
        -1 => Err(syscall_failed("fork", last_errno())),
        0 => Ok(ForkOutcome::Child),
        child => Ok(ForkOutcome::Parent {
            child_pid: child as u32,
        }),
    }
}

/// Safely block until the given child terminates, reaping it
#[cfg(target_os = "linux")]
pub fn safe_wait_for_child(pid: u32) -> Result<ChildExit, UnsafeLinuxError> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(UnsafeLinuxError::InvalidParameter {
            details: format!("cannot wait for pid {}", pid),
        });
    }

    let mut status: libc::c_int = 0;
    loop {
        let result = unsafe { libc::waitpid(pid as libc::pid_t, &mut status, 0) };
        if result != -1 {
            break;
        }

        let errno = last_errno();
        if errno != libc::EINTR {
            return Err(syscall_failed("waitpid", errno));
        }
    }

    decode_wait_status(status)
}

#[cfg(target_os = "linux")]
fn decode_wait_status(status: libc::c_int) -> Result<ChildExit, UnsafeLinuxError> {
    if libc::WIFEXITED(status) {
        Ok(ChildExit::Exited(libc::WEXITSTATUS(status)))
    } else if libc::WIFSIGNALED(status) {
        Ok(ChildExit::Signaled(libc::WTERMSIG(status)))
    } else {
        Err(UnsafeLinuxError::InvalidParameter {
            details: format!("unexpected wait status {:#x}", status),
        })
    }
}

/// Terminate the current process immediately without running exit handlers
#[cfg(target_os = "linux")]
pub fn safe_exit_immediately(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

/// Safely install `handler` for `signo`, restarting interrupted system calls
#[cfg(target_os = "linux")]
pub fn safe_install_signal_handler(
    signo: i32,
    handler: SignalHandlerFn,
) -> Result<(), UnsafeLinuxError> {
    install_handler(signo, handler, libc::SA_RESTART)
}

/// Safely install `handler` for `signo` without `SA_RESTART`
///
/// Blocking calls interrupted by `signo` fail with `EINTR` instead of being
/// restarted by the kernel.
#[cfg(target_os = "linux")]
pub fn safe_install_interrupting_signal_handler(
    signo: i32,
    handler: SignalHandlerFn,
) -> Result<(), UnsafeLinuxError> {
    install_handler(signo, handler, 0)
}

#[cfg(target_os = "linux")]
fn install_handler(
    signo: i32,
    handler: SignalHandlerFn,
    flags: libc::c_int,
) -> Result<(), UnsafeLinuxError> {
    if signo == libc::SIGKILL || signo == libc::SIGSTOP {
        return Err(UnsafeLinuxError::InvalidParameter {
            details: format!("signal {} cannot be caught", signo),
        });
    }

    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler as libc::sighandler_t;
    action.sa_flags = flags;

    if unsafe { libc::sigemptyset(&mut action.sa_mask) } == -1 {
        return Err(syscall_failed("sigemptyset", last_errno()));
    }

    if unsafe { libc::sigaction(signo, &action, std::ptr::null_mut()) } == -1 {
        return Err(syscall_failed("sigaction", last_errno()));
    }

    Ok(())
}

/// Write `bytes` straight to fd 1, bypassing the std stdout buffer
///
/// Async-signal-safe: no allocation, no locks. Short writes are continued and
/// errors are dropped, since a signal handler has nowhere to report them.
#[cfg(target_os = "linux")]
pub fn safe_write_stdout_raw(bytes: &[u8]) {
    let mut remaining = bytes;
    while !remaining.is_empty() {
        let written = unsafe {
            libc::write(
                libc::STDOUT_FILENO,
                remaining.as_ptr() as *const libc::c_void,
                remaining.len(),
            )
        };

        if written > 0 {
            remaining = &remaining[written as usize..];
        } else if written == -1 && last_errno() == libc::EINTR {
            continue;
        } else {
            return;
        }
    }
}

/// Safely send `signo` to a process
#[cfg(target_os = "linux")]
pub fn safe_send_signal(pid: u32, signo: i32) -> Result<(), UnsafeLinuxError> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(UnsafeLinuxError::InvalidParameter {
            details: format!("refusing to signal pid {}", pid),
        });
    }

    if unsafe { libc::kill(pid as libc::pid_t, signo) } == -1 {
        return Err(syscall_failed("kill", last_errno()));
    }

    Ok(())
}

/// Safely send `signo` to one thread of the current process
#[cfg(target_os = "linux")]
pub fn safe_signal_thread(thread: libc::pthread_t, signo: i32) -> Result<(), UnsafeLinuxError> {
    // pthread_kill reports errors through its return value, not errno
    match unsafe { libc::pthread_kill(thread, signo) } {
        0 => Ok(()),
        errno => Err(syscall_failed("pthread_kill", errno)),
    }
}

/// Safely mark (or unmark) the current process as a child subreaper
#[cfg(target_os = "linux")]
pub fn safe_set_child_subreaper(enabled: bool) -> Result<(), UnsafeLinuxError> {
    let flag: libc::c_ulong = if enabled { 1 } else { 0 };
    let result = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, flag, 0, 0, 0) };

    if result == -1 {
        return Err(syscall_failed("prctl(PR_SET_CHILD_SUBREAPER)", last_errno()));
    }

    Ok(())
}

/// Safely get the parent process ID
#[cfg(target_os = "linux")]
pub fn safe_get_parent_pid() -> u32 {
    unsafe { libc::getppid() as u32 }
}

// Provide stub implementations for non-Linux platforms
#[cfg(not(target_os = "linux"))]
fn unsupported(operation: &str) -> UnsafeLinuxError {
    UnsafeLinuxError::Unsupported {
        operation: operation.to_string(),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn safe_fork() -> Result<ForkOutcome, UnsafeLinuxError> {
    Err(unsupported("fork"))
}

#[cfg(not(target_os = "linux"))]
pub fn safe_wait_for_child(_pid: u32) -> Result<ChildExit, UnsafeLinuxError> {
    Err(unsupported("waitpid"))
}

#[cfg(not(target_os = "linux"))]
pub fn safe_exit_immediately(code: i32) -> ! {
    std::process::exit(code)
}

#[cfg(not(target_os = "linux"))]
pub fn safe_install_signal_handler(
    _signo: i32,
    _handler: SignalHandlerFn,
) -> Result<(), UnsafeLinuxError> {
    Err(unsupported("sigaction"))
}

#[cfg(not(target_os = "linux"))]
pub fn safe_install_interrupting_signal_handler(
    _signo: i32,
    _handler: SignalHandlerFn,
) -> Result<(), UnsafeLinuxError> {
    Err(unsupported("sigaction"))
}

#[cfg(not(target_os = "linux"))]
pub fn safe_write_stdout_raw(_bytes: &[u8]) {}

#[cfg(not(target_os = "linux"))]
pub fn safe_send_signal(_pid: u32, _signo: i32) -> Result<(), UnsafeLinuxError> {
    Err(unsupported("kill"))
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn safe_signal_thread(_thread: libc::pthread_t, _signo: i32) -> Result<(), UnsafeLinuxError> {
    Err(unsupported("pthread_kill"))
}

#[cfg(not(target_os = "linux"))]
pub fn safe_set_child_subreaper(_enabled: bool) -> Result<(), UnsafeLinuxError> {
    Err(unsupported("prctl(PR_SET_CHILD_SUBREAPER)"))
}

#[cfg(not(target_os = "linux"))]
pub fn safe_get_parent_pid() -> u32 {
    0
}
