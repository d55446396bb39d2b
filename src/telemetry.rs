//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout stays reserved for command output (the
//! replay CSV, the load-test report). The filter comes from `RUST_LOG` and
//! defaults to `info`.

use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

/// Log line format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// Returns an error if a subscriber is already installed.
pub fn init(format: LogFormat) -> Result<(), String> {
    let builder = fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| format!("Failed to initialize logging: {}", e))
}
