//! # qschema-cli: Command-Line Shell for qschema
//!
//! Reads schema and document files from disk and hands their text to
//! `qschema-schema`. No validation logic lives here.
//!
//! ```bash
//! qschema validate --schema pod.schema.yaml pod.yaml deployment.yaml
//! qschema -vv validate --schema limits.json --all-branches --format json manifests.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: every document is valid.
//! - `1`: at least one document failed validation.
//! - `2`: operational error (I/O, decode, normalize, compile).

pub mod validate;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Default filter directive for a `-v` count.
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber. `RUST_LOG`, when set, takes
/// precedence over the `-v` count.
pub fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_directive(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
