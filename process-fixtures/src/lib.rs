//! Process Fixtures - deterministic misbehaving processes for supervisor tests
//!
//! This library provides two fixture programs with a fixed, observable
//! contract (stdout lines, exit codes, process-table states) plus the tools a
//! harness needs to check that contract:
//!
//! - [`signal_echo`]: echoes SIGINT/SIGTERM, sleeps 2 s, exits 55
//! - [`orphan_zombie`]: produces an orphaned grandchild that turns into a zombie
//! - [`proc_table`] and [`reaper`]: observe and collect those processes

pub mod console;
pub mod error;
pub mod launch;
pub mod orphan_zombie;
pub mod proc_table;
pub mod reaper;
pub mod signal_echo;

pub use error::FixtureError;
pub use launch::{launch, ChildHandle};
pub use orphan_zombie::OrphanZombieConfig;
pub use proc_table::{ProcessState, ProcessTableEntry};
pub use reaper::Subreaper;
pub use signal_echo::SignalEchoConfig;
pub use unsafe_linux_process::ChildExit;

use tracing_subscriber::EnvFilter;

/// Log level used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Initialize tracing on stderr (idempotent)
///
/// Stdout carries only fixture lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
