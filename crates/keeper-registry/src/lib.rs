//! Static asset catalog for the position-closing keeper.
//!
//! The catalog is loaded once from configuration, validated, and shared
//! read-only between every per-asset cycle.

pub mod catalog;
pub mod error;

pub use catalog::AssetRegistry;
pub use error::{RegistryError, RegistryResult};
