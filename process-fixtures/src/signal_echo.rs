//! Signal-echo fixture
//!
//! Installs handlers for SIGINT and SIGTERM that print `got signal <N>`, prints
//! `starting`, sleeps for two seconds and exits with status 55. Handled
//! signals never cut the sleep short; unhandled ones keep their default
//! disposition.

use crate::{console, FixtureError};
use std::thread;
use std::time::Duration;
use unsafe_linux_process::{safe_install_signal_handler, safe_write_stdout_raw};

/// Exit status after the full sleep, however many signals arrived
pub const SIGNAL_ECHO_EXIT_CODE: i32 = 55;

/// How long the fixture sleeps after printing `starting`
pub const SIGNAL_ECHO_SLEEP: Duration = Duration::from_secs(2);

const SIGNAL_LINE_PREFIX: &[u8] = b"got signal ";

/// Buffer large enough for the prefix, a sign, ten digits and a newline
pub type SignalLineBuffer = [u8; 32];

/// Settings for one run of the signal-echo fixture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEchoConfig {
    /// Time to sleep after printing `starting`
    pub sleep: Duration,
    /// Status to exit with once the sleep elapses
    pub exit_code: i32,
    /// Signals that get the echo handler
    pub signals: Vec<i32>,
}

impl Default for SignalEchoConfig {
    fn default() -> Self {
        Self {
            sleep: SIGNAL_ECHO_SLEEP,
            exit_code: SIGNAL_ECHO_EXIT_CODE,
            signals: vec![libc::SIGINT, libc::SIGTERM],
        }
    }
}

impl SignalEchoConfig {
    /// Set the sleep duration
    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Set the exit status
    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Replace the set of echoed signals
    pub fn signals<I>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        self.signals = signals.into_iter().collect();
        self
    }

    /// Check the configuration can actually be honoured
    pub fn validate(&self) -> Result<(), FixtureError> {
        if !(0..=255).contains(&self.exit_code) {
            return Err(FixtureError::InvalidConfig {
                details: format!("exit code {} is outside 0..=255", self.exit_code),
            });
        }

        if let Some(signal) = self
            .signals
            .iter()
            .find(|&&s| s == libc::SIGKILL || s == libc::SIGSTOP)
        {
            return Err(FixtureError::InvalidConfig {
                details: format!("signal {} cannot be caught", signal),
            });
        }

        Ok(())
    }
}

/// Render `got signal <signo>\n` into `buf` and return the length used
///
/// Runs inside a signal handler, so it must not allocate.
pub fn format_signal_line(signo: i32, buf: &mut SignalLineBuffer) -> usize {
    let mut len = SIGNAL_LINE_PREFIX.len();
    buf[..len].copy_from_slice(SIGNAL_LINE_PREFIX);

    if signo < 0 {
        buf[len] = b'-';
        len += 1;
    }

    let mut digits = [0u8; 10];
    let mut count = 0;
    let mut value = signo.unsigned_abs();
    loop {
        digits[count] = b'0' + (value % 10) as u8;
        count += 1;
        value /= 10;
        if value == 0 {
            break;
        }
    }

    for &digit in digits[..count].iter().rev() {
        buf[len] = digit;
        len += 1;
    }

    buf[len] = b'\n';
    len + 1
}

extern "C" fn echo_signal(signo: libc::c_int) {
    let mut buf: SignalLineBuffer = [0; 32];
    let len = format_signal_line(signo, &mut buf);
    safe_write_stdout_raw(&buf[..len]);
}

/// Install the echo handler for every signal in `signals`
pub fn install_handlers(signals: &[i32]) -> Result<(), FixtureError> {
    for &signal in signals {
        safe_install_signal_handler(signal, echo_signal)
            .map_err(|source| FixtureError::SignalSetupFailed { signal, source })?;
        tracing::debug!("Echo handler installed for signal {}", signal);
    }
    Ok(())
}

/// Run the fixture and return the status the process should exit with
pub fn run(config: &SignalEchoConfig) -> Result<i32, FixtureError> {
    config.validate()?;
    install_handlers(&config.signals)?;

    console::emit("starting")?;

    // std's sleep resumes with the remaining time after EINTR
    tracing::debug!("Sleeping for {:?}", config.sleep);
    thread::sleep(config.sleep);

    tracing::info!("Sleep finished, exiting with {}", config.exit_code);
    Ok(config.exit_code)
}
