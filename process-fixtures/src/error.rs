//! Error types for the process fixtures

use unsafe_linux_process::UnsafeLinuxError;

/// Main error type for fixture operations
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Invalid fixture configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Failed to launch child process: {source}")]
    SpawnFailed { source: UnsafeLinuxError },

    #[error("Failed to wait for child {pid}: {source}")]
    WaitFailed { pid: u32, source: UnsafeLinuxError },

    #[error("Failed to install handler for signal {signal}: {source}")]
    SignalSetupFailed { signal: i32, source: UnsafeLinuxError },

    #[error("Failed to become child subreaper: {source}")]
    SubreaperFailed { source: UnsafeLinuxError },

    #[error("Process table entry for {pid} unreadable: {details}")]
    ProcessTable { pid: u32, details: String },

    #[error("Failed to write fixture output: {0}")]
    OutputFailed(#[from] std::io::Error),
}
