//! Orphan/zombie fixture
//!
//! Main launches a Worker and waits for it. The Worker launches a Grandchild
//! and exits without waiting, orphaning it. The Grandchild outlives the
//! Worker and exits while its new parent has not reaped it, leaving a zombie
//! for an external observer to find.
//!
//! | Role       | Linger | Exit |
//! |------------|--------|------|
//! | Main       | 0.3 s  | 11   |
//! | Worker     | 0.1 s  | 13   |
//! | Grandchild | 0.2 s  | 12   |

use crate::launch::launch;
use crate::{console, FixtureError};
use std::thread;
use std::time::Duration;
use unsafe_linux_process::safe_get_parent_pid;

/// Exit status of Main once the worker was reaped and the grace period passed
pub const MAIN_EXIT_CODE: i32 = 11;

/// Exit status of the orphaned grandchild
pub const GRANDCHILD_EXIT_CODE: i32 = 12;

/// Exit status of the worker, which never waits for the grandchild
pub const WORKER_EXIT_CODE: i32 = 13;

/// Timings and exit codes for the three roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanZombieConfig {
    /// How long the worker stays alive after launching the grandchild
    pub worker_linger: Duration,
    /// How long the grandchild stays alive; must exceed `worker_linger`
    pub grandchild_linger: Duration,
    /// How long Main waits after reaping the worker
    pub main_grace: Duration,
    pub main_exit_code: i32,
    pub worker_exit_code: i32,
    pub grandchild_exit_code: i32,
}

impl Default for OrphanZombieConfig {
    fn default() -> Self {
        Self {
            worker_linger: Duration::from_millis(100),
            grandchild_linger: Duration::from_millis(200),
            main_grace: Duration::from_millis(300),
            main_exit_code: MAIN_EXIT_CODE,
            worker_exit_code: WORKER_EXIT_CODE,
            grandchild_exit_code: GRANDCHILD_EXIT_CODE,
        }
    }
}

impl OrphanZombieConfig {
    /// Set how long the worker lingers
    pub fn worker_linger(mut self, linger: Duration) -> Self {
        self.worker_linger = linger;
        self
    }

    /// Set how long the grandchild lingers
    pub fn grandchild_linger(mut self, linger: Duration) -> Self {
        self.grandchild_linger = linger;
        self
    }

    /// Set Main's grace period
    pub fn main_grace(mut self, grace: Duration) -> Self {
        self.main_grace = grace;
        self
    }

    /// Set the exit codes of Main, Worker and Grandchild
    pub fn exit_codes(mut self, main: i32, worker: i32, grandchild: i32) -> Self {
        self.main_exit_code = main;
        self.worker_exit_code = worker;
        self.grandchild_exit_code = grandchild;
        self
    }

    /// Check the configuration still produces an orphan before the zombie
    pub fn validate(&self) -> Result<(), FixtureError> {
        if self.grandchild_linger <= self.worker_linger {
            return Err(FixtureError::InvalidConfig {
                details: format!(
                    "grandchild linger {:?} must be longer than worker linger {:?}",
                    self.grandchild_linger, self.worker_linger
                ),
            });
        }

        for (role, code) in [
            ("main", self.main_exit_code),
            ("worker", self.worker_exit_code),
            ("grandchild", self.grandchild_exit_code),
        ] {
            if !(0..=255).contains(&code) {
                return Err(FixtureError::InvalidConfig {
                    details: format!("{} exit code {} is outside 0..=255", role, code),
                });
            }
        }

        Ok(())
    }
}

/// Main role: launch the worker, reap it, wait out the grace period
pub fn run_main(config: &OrphanZombieConfig) -> Result<i32, FixtureError> {
    config.validate()?;

    let worker = launch(|| run_worker(config))?;
    let worker_pid = worker.pid();
    let worker_exit = worker.wait()?;
    tracing::info!("Worker {} {}", worker_pid, worker_exit);

    console::emit("Main: Worker exit captured. Sleeping.")?;
    thread::sleep(config.main_grace);
    console::emit("Main exiting...")?;

    Ok(config.main_exit_code)
}

/// Worker role: launch the grandchild and exit without reaping it
pub fn run_worker(config: &OrphanZombieConfig) -> Result<i32, FixtureError> {
    tracing::debug!(
        "Worker {} started under {}",
        std::process::id(),
        safe_get_parent_pid()
    );

    let grandchild = launch(|| run_grandchild(config))?;
    console::emit(&format!("Created child {}", grandchild.pid()))?;

    thread::sleep(config.worker_linger);
    console::emit("Worker exiting, making the child orphan")?;

    // The handle goes out of scope unreaped.
    Ok(config.worker_exit_code)
}

/// Grandchild role: outlive the worker, then exit unreaped
pub fn run_grandchild(config: &OrphanZombieConfig) -> Result<i32, FixtureError> {
    let launched_by = safe_get_parent_pid();
    console::emit("Child started")?;

    thread::sleep(config.grandchild_linger);

    tracing::debug!(
        "Grandchild {} launched by {} now parented by {}",
        std::process::id(),
        launched_by,
        safe_get_parent_pid()
    );
    console::emit("Orphan exiting and becoming zombie")?;

    Ok(config.grandchild_exit_code)
}
