//! Logging configuration using tracing

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PLAYROOM_LOG";

const DEFAULT_FILTER: &str = "playroom_native=info,warn";

/// Initialize the logging subsystem
///
/// Logs go to stderr. The level is controlled by `PLAYROOM_LOG`.
///
/// # Examples
/// ```bash
/// PLAYROOM_LOG=debug node host.js
/// PLAYROOM_LOG=playroom_native::frame=trace node host.js
/// ```
///
/// Calling this when a global subscriber is already installed (for example
/// by the host) is not an error; the existing subscriber is kept.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true),
        )
        .try_init();

    if installed.is_ok() {
        tracing::info!("═══════════════════════════════════════════════════════");
        tracing::info!("Playroom engine starting");
        tracing::info!("═══════════════════════════════════════════════════════");
    }
}
