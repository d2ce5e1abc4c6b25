//! Orphan/zombie fixture binary
//!
//! Main (exit 11) launches a Worker (exit 13) that launches a Grandchild
//! (exit 12) and leaves it orphaned; the Grandchild exits as a zombie.

use process_fixtures::orphan_zombie::{self, OrphanZombieConfig};

fn main() {
    process_fixtures::init_tracing();

    match orphan_zombie::run_main(&OrphanZombieConfig::default()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("Orphan/zombie fixture failed: {}", e);
            std::process::exit(1);
        }
    }
}
