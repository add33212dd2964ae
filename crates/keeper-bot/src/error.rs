//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] keeper_core::CoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] keeper_registry::RegistryError),

    #[error("Feed error: {0}")]
    Feed(#[from] keeper_feed::FeedError),

    #[error("Executor error: {0}")]
    Executor(#[from] keeper_executor::ExecutorError),

    #[error("Key error: {0}")]
    Key(#[from] keeper_executor::KeyError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] keeper_telemetry::TelemetryError),
}

pub type AppResult<T> = Result<T, AppError>;
