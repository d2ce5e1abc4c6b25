//! End-to-end tests for the orphan/zombie fixture
//!
//! The test process marks itself as a child subreaper, so the orphaned
//! grandchild is reparented here rather than to init. That keeps the zombie
//! in the process table until the test reaps it, which makes the zombie state
//! observable on every run.

#![cfg(target_os = "linux")]

mod common;

use common::{init_tracing, FixtureRun};
use process_fixtures::proc_table::{self, ProcessState};
use process_fixtures::{ChildExit, Subreaper};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::process::{Command, Stdio};
use std::time::Duration;

const ORPHAN_ZOMBIE: &str = env!("CARGO_BIN_EXE_orphan_zombie");

const STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// A stdout whose reader is already gone, so every write fails with EPIPE
fn closed_socket() -> Stdio {
    let (writer, reader) = UnixStream::pair().expect("Failed to create socket pair");
    drop(reader);
    Stdio::from(OwnedFd::from(writer))
}

fn grandchild_pid(run: &mut FixtureRun) -> u32 {
    run.expect_prefix("Created child ")
        .trim()
        .parse()
        .expect("Created child line without a pid")
}

#[test]
fn orphan_is_reparented_then_left_as_zombie() {
    init_tracing();
    let reaper = Subreaper::install().expect("Failed to become child subreaper");

    let mut run = FixtureRun::spawn(ORPHAN_ZOMBIE, &[]);
    let main_pid = run.pid();
    let grandchild = grandchild_pid(&mut run);

    // The worker lingers for 100ms after printing, so it is still the parent
    let first = proc_table::read_entry(grandchild)
        .expect("Failed to read process table")
        .expect("Grandchild missing right after launch");
    let worker = first.parent_pid;
    assert_ne!(worker, main_pid);
    assert_ne!(worker, reaper.pid());
    if let Some(worker_entry) = proc_table::read_entry(worker).unwrap() {
        assert_eq!(worker_entry.parent_pid, main_pid);
    }

    // Worker exits first: the grandchild is adopted while still running
    let adopted = proc_table::wait_for_entry(grandchild, STATE_TIMEOUT, |e| {
        e.parent_pid != worker
    })
    .unwrap()
    .expect("Grandchild was never reparented");
    assert_eq!(adopted.parent_pid, reaper.pid());
    assert_ne!(adopted.state, ProcessState::Zombie);

    // Then the grandchild exits and nobody has reaped it yet
    let zombie = proc_table::wait_for_entry(grandchild, STATE_TIMEOUT, |e| e.is_zombie())
        .unwrap()
        .expect("Grandchild never showed up as a zombie");
    assert_eq!(zombie.parent_pid, reaper.pid());

    // The worker is gone or at most awaiting Main's wait by now
    if let Some(worker_entry) = proc_table::read_entry(worker).unwrap() {
        assert!(
            worker_entry.is_zombie() || worker_entry.parent_pid != main_pid,
            "worker {} still running after grandchild exit",
            worker
        );
    }

    assert_eq!(reaper.reap(grandchild).unwrap(), ChildExit::Exited(12));
    assert_eq!(proc_table::read_entry(grandchild).unwrap(), None);

    let output = run.finish();
    assert_eq!(output.status.code(), Some(11));
}

#[test]
fn main_exits_11_after_logging_every_role_in_order() {
    init_tracing();
    let reaper = Subreaper::install().expect("Failed to become child subreaper");

    let mut run = FixtureRun::spawn(
        ORPHAN_ZOMBIE,
        &[("RUST_LOG", "process_fixtures=info")],
    );
    let grandchild = grandchild_pid(&mut run);

    run.expect_line("Orphan exiting and becoming zombie");
    assert_eq!(reaper.reap(grandchild).unwrap(), ChildExit::Exited(12));

    let output = run.finish();
    assert_eq!(output.status.code(), Some(11));

    let position = |needle: &str| {
        output
            .lines
            .iter()
            .position(|line| line == needle)
            .unwrap_or_else(|| panic!("missing line {:?} in {:?}", needle, output.lines))
    };

    let created = output
        .lines
        .iter()
        .position(|line| line.starts_with("Created child "))
        .expect("missing Created child line");
    let child_started = position("Child started");
    let worker_exiting = position("Worker exiting, making the child orphan");
    let orphan_exiting = position("Orphan exiting and becoming zombie");
    let main_captured = position("Main: Worker exit captured. Sleeping.");
    let main_exiting = position("Main exiting...");

    // Per-role order
    assert!(created < worker_exiting);
    assert!(child_started < orphan_exiting);
    assert!(main_captured < main_exiting);

    // Worker leaves before the grandchild and Main notices right away
    assert!(worker_exiting < orphan_exiting);
    assert!(worker_exiting < main_captured);
    assert_eq!(output.lines.len(), 6, "unexpected lines: {:?}", output.lines);
    assert_eq!(output.lines.last().map(String::as_str), Some("Main exiting..."));

    // Main reaped the worker and saw its status
    assert!(
        output
            .stderr
            .lines()
            .any(|line| line.contains("Worker ") && line.contains(" exited with status 13")),
        "worker exit not logged:\n{}",
        output.stderr
    );
}

#[test]
fn broken_stdout_is_reported_once_and_exits_1() {
    init_tracing();

    let output = Command::new(ORPHAN_ZOMBIE)
        .stdout(closed_socket())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to run fixture");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1), "stderr:\n{}", stderr);
    assert_eq!(
        stderr.matches("Orphan/zombie fixture failed").count(),
        1,
        "stderr:\n{}",
        stderr
    );
    assert!(!stderr.contains("Error: "), "failure reported twice:\n{}", stderr);
}
