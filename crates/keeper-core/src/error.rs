//! Error types for keeper-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid position id: {0}")]
    InvalidId(String),

    #[error("No position ids provided")]
    EmptyIds,

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid batch mode: {0}")]
    InvalidMode(String),

    #[error("Decimal error: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
