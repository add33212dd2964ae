//! Feed error types.

use keeper_core::AssetId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Oracle read failed, returned nothing, or returned an unusable price.
    #[error("Oracle unavailable for asset {asset_id}: {reason}")]
    OracleUnavailable { asset_id: AssetId, reason: String },

    /// Matching-service range query failed.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Matching-service verification request failed.
    #[error("Verification failure: {0}")]
    Verification(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
