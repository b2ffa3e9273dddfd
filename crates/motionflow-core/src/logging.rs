//! Process-wide tracing setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `MOTIONFLOW_LOG=debug`.
pub const LOG_ENV: &str = "MOTIONFLOW_LOG";

/// Installs the global fmt subscriber. Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
