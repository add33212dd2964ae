//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Asset catalog is empty")]
    EmptyCatalog,

    #[error("Duplicate asset id: {0}")]
    DuplicateId(u32),

    #[error("Duplicate asset key: {0}")]
    DuplicateKey(String),

    #[error("Invalid asset key for id {0}: key must not be blank")]
    BlankKey(u32),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
