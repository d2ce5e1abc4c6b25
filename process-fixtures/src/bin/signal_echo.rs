//! Signal-echo fixture binary
//!
//! Prints `starting`, echoes SIGINT/SIGTERM as `got signal <N>`, sleeps two
//! seconds and exits with status 55.

use process_fixtures::signal_echo::{self, SignalEchoConfig};

fn main() {
    process_fixtures::init_tracing();

    match signal_echo::run(&SignalEchoConfig::default()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("Signal echo fixture failed: {}", e);
            std::process::exit(1);
        }
    }
}
