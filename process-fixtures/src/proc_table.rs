//! Process-table inspection through `/proc`
//!
//! Harnesses use this to catch the orphan and zombie the fixtures produce:
//! the parent pid of an orphan changes, and an exited but unreaped process
//! shows state `Z`.

use crate::FixtureError;
use std::fs;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Scheduler state of a process as reported in `/proc/<pid>/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Dead,
    Idle,
    Other(char),
}

impl ProcessState {
    /// Map the single-letter state code
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::DiskSleep,
            'T' | 't' => ProcessState::Stopped,
            'Z' => ProcessState::Zombie,
            'X' | 'x' => ProcessState::Dead,
            'I' => ProcessState::Idle,
            other => ProcessState::Other(other),
        }
    }
}

/// One row of the process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTableEntry {
    pub pid: u32,
    pub command: String,
    pub state: ProcessState,
    pub parent_pid: u32,
}

impl ProcessTableEntry {
    /// Whether the process has exited but not been reaped
    pub fn is_zombie(&self) -> bool {
        self.state == ProcessState::Zombie
    }
}

/// Parse the contents of `/proc/<pid>/stat`
pub fn parse_stat(stat: &str) -> Result<ProcessTableEntry, FixtureError> {
    let malformed = |details: &str| FixtureError::ProcessTable {
        pid: 0,
        details: format!("{}: {:?}", details, stat.trim_end()),
    };

    // The command may itself contain spaces and parentheses
    let open = stat.find('(').ok_or_else(|| malformed("missing '('"))?;
    let close = stat.rfind(')').ok_or_else(|| malformed("missing ')'"))?;
    if close < open {
        return Err(malformed("unbalanced command"));
    }

    let pid = stat[..open]
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed("bad pid"))?;
    let command = stat[open + 1..close].to_string();

    let mut rest = stat[close + 1..].split_whitespace();
    let state = rest
        .next()
        .and_then(|field| field.chars().next())
        .map(ProcessState::from_code)
        .ok_or_else(|| malformed("missing state"))?;
    let parent_pid = rest
        .next()
        .and_then(|field| field.parse::<u32>().ok())
        .ok_or_else(|| malformed("missing parent pid"))?;

    Ok(ProcessTableEntry {
        pid,
        command,
        state,
        parent_pid,
    })
}

/// Read the current entry for `pid`, or `None` if the process is gone
pub fn read_entry(pid: u32) -> Result<Option<ProcessTableEntry>, FixtureError> {
    let content = match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(content) => content,
        Err(e) if vanished(&e) => return Ok(None),
        Err(e) => {
            return Err(FixtureError::ProcessTable {
                pid,
                details: e.to_string(),
            })
        }
    };

    parse_stat(&content)
        .map(Some)
        .map_err(|error| match error {
            FixtureError::ProcessTable { details, .. } => FixtureError::ProcessTable { pid, details },
            other => other,
        })
}

fn vanished(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound || error.raw_os_error() == Some(libc::ESRCH)
}

/// Read every entry in the process table
///
/// Processes that exit while the scan is running are skipped.
pub fn snapshot() -> Result<Vec<ProcessTableEntry>, FixtureError> {
    let entries = fs::read_dir("/proc").map_err(|e| FixtureError::ProcessTable {
        pid: 0,
        details: format!("cannot list /proc: {}", e),
    })?;

    let mut table = Vec::new();
    for entry in entries.flatten() {
        let pid = match entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        if let Some(row) = read_entry(pid)? {
            table.push(row);
        }
    }

    Ok(table)
}

/// Entries whose parent is `parent_pid`
pub fn children_of(parent_pid: u32) -> Result<Vec<ProcessTableEntry>, FixtureError> {
    Ok(snapshot()?
        .into_iter()
        .filter(|entry| entry.parent_pid == parent_pid)
        .collect())
}

/// Poll `pid` until `predicate` holds for its entry
///
/// Returns `None` if the timeout passes or the process disappears first.
pub fn wait_for_entry<P>(
    pid: u32,
    timeout: Duration,
    predicate: P,
) -> Result<Option<ProcessTableEntry>, FixtureError>
where
    P: Fn(&ProcessTableEntry) -> bool,
{
    let start = Instant::now();

    loop {
        match read_entry(pid)? {
            Some(entry) if predicate(&entry) => return Ok(Some(entry)),
            Some(_) => {}
            None => return Ok(None),
        }

        if start.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
