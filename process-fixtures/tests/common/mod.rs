//! Common helpers for driving the fixture binaries

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long to wait for any single expected line
pub const LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize tracing for tests (idempotent)
pub fn init_tracing() {
    process_fixtures::init_tracing();
}

/// A running fixture binary with its stdout read line by line
pub struct FixtureRun {
    child: Child,
    lines: Receiver<String>,
    seen: Vec<String>,
    stderr: Option<JoinHandle<String>>,
}

impl FixtureRun {
    /// Spawn `binary` with piped stdout/stderr and extra environment
    pub fn spawn(binary: &str, env: &[(&str, &str)]) -> Self {
        let mut command = Command::new(binary);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        for (key, value) in env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .unwrap_or_else(|e| panic!("Failed to spawn {}: {}", binary, e));

        let stdout = child.stdout.take().expect("stdout not piped");
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut stderr_pipe = child.stderr.take().expect("stderr not piped");
        let stderr = thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr_pipe.read_to_string(&mut text);
            text
        });

        Self {
            child,
            lines,
            seen: Vec::new(),
            stderr: Some(stderr),
        }
    }

    /// Process ID of the spawned binary
    #[allow(dead_code)]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Lines consumed so far
    #[allow(dead_code)]
    pub fn seen(&self) -> &[String] {
        &self.seen
    }

    fn next_line(&mut self, deadline: Instant) -> Option<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.lines.recv_timeout(remaining) {
            Ok(line) => {
                self.seen.push(line.clone());
                Some(line)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Consume lines until one equals `expected`
    pub fn expect_line(&mut self, expected: &str) {
        let deadline = Instant::now() + LINE_TIMEOUT;
        while let Some(line) = self.next_line(deadline) {
            if line == expected {
                return;
            }
        }
        self.fail(&format!("Failed to find line: {}", expected));
    }

    /// Consume lines until one starts with `prefix` and return the remainder
    #[allow(dead_code)]
    pub fn expect_prefix(&mut self, prefix: &str) -> String {
        let deadline = Instant::now() + LINE_TIMEOUT;
        while let Some(line) = self.next_line(deadline) {
            if let Some(rest) = line.strip_prefix(prefix) {
                return rest.to_string();
            }
        }
        self.fail(&format!("Failed to find line starting with: {}", prefix))
    }

    /// Wait for exit and collect every stdout line plus all of stderr
    pub fn finish(mut self) -> FixtureOutput {
        let status = self.child.wait().expect("Failed to wait for fixture");

        // The stream ends once every process holding the pipe has exited
        let mut lines = std::mem::take(&mut self.seen);
        lines.extend(self.lines.iter());

        let stderr = self
            .stderr
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        FixtureOutput {
            status,
            lines,
            stderr,
        }
    }

    fn fail(&mut self, message: &str) -> ! {
        for line in &self.seen {
            eprintln!("LINE> {}", line);
        }
        let _ = self.child.kill();
        panic!("{}", message);
    }
}

/// Everything a finished fixture run produced
pub struct FixtureOutput {
    pub status: ExitStatus,
    pub lines: Vec<String>,
    pub stderr: String,
}
