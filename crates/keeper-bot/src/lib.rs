//! Position-closing keeper.
//!
//! Orchestrates the per-asset cycle:
//! - Trigger detection on fixed UTC seconds
//! - Oracle price read and candidate fetch
//! - Batch dispatch per bucket (limit, stop-loss, take-profit, liquidation)
//! - At most one in-flight cycle per asset

pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;

pub use app::{Application, CyclePipeline, CycleReport};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use scheduler::{InFlightGuard, InFlightSet, TriggerSchedule};
