//! Structured logging initialization.
//!
//! The keeper daemon logs to stdout. One-shot tools print their result line
//! on stdout, so they log to stderr instead.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,keeper=debug";

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Long-running keeper: pretty multi-line events.
    #[default]
    Stdout,
    /// One-shot tools: compact single-line events, stdout left for results.
    Stderr,
}

impl LogOutput {
    fn writer(self) -> BoxMakeWriter {
        match self {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

fn is_production() -> bool {
    std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}

/// Initialize keeper logging on stdout.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_to(LogOutput::Stdout)
}

/// Initialize logging on `output`.
///
/// JSON lines when `RUST_ENV=production`, whatever the output.
/// Fails if a global subscriber is already installed.
pub fn init_logging_to(output: LogOutput) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match (is_production(), output) {
        (true, _) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(output.writer()),
            )
            .try_init(),
        (false, LogOutput::Stdout) => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(output.writer()),
            )
            .try_init(),
        (false, LogOutput::Stderr) => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(output.writer()),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
