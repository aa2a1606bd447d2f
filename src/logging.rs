//! Logging setup.
//!
//! Logs go to stderr through `tracing-subscriber`. The filter comes from
//! `RUST_LOG`, then `AWS_LAMBDA_LOG_LEVEL`, then defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Host-provided log level variable (e.g. `DEBUG`, `WARN`).
pub const LOG_LEVEL_ENV: &str = "AWS_LAMBDA_LOG_LEVEL";

/// Filter used when nothing is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed (e.g. by the
/// application), in which case nothing changes.
pub fn init_logging() -> bool {
    let directive = resolve_directive(
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        std::env::var(LOG_LEVEL_ENV).ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

fn resolve_directive(rust_log: Option<String>, lambda_level: Option<String>) -> String {
    rust_log
        .filter(|d| !d.trim().is_empty())
        .or_else(|| {
            lambda_level
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_ascii_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}
