//! Child subreaper for observing orphans and zombies

use crate::FixtureError;
use unsafe_linux_process::{safe_set_child_subreaper, safe_wait_for_child, ChildExit};

/// The current process, marked as a child subreaper
///
/// Orphaned descendants are reparented here instead of to the tree root and
/// stay zombies until [`Subreaper::reap`] collects them. The mark lasts for
/// the rest of the process lifetime.
#[derive(Debug)]
pub struct Subreaper {
    pid: u32,
}

impl Subreaper {
    /// Mark the current process as a child subreaper
    pub fn install() -> Result<Self, FixtureError> {
        safe_set_child_subreaper(true).map_err(|source| FixtureError::SubreaperFailed { source })?;

        let pid = std::process::id();
        tracing::info!("Process {} is now a child subreaper", pid);
        Ok(Self { pid })
    }

    /// Process ID orphans are reparented to
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the adopted or own child `pid` terminates and reap it
    pub fn reap(&self, pid: u32) -> Result<ChildExit, FixtureError> {
        let exit =
            safe_wait_for_child(pid).map_err(|source| FixtureError::WaitFailed { pid, source })?;
        tracing::debug!("Reaped {}: {}", pid, exit);
        Ok(exit)
    }
}
