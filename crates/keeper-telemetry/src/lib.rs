//! Prometheus metrics and structured logging for the keeper.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus counters for cycles, batches, verification and ABI resolution

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_to, LogOutput};
pub use metrics::Metrics;
