//! Core domain types for the position-closing keeper.
//!
//! This crate provides the types shared by every stage of a keeper cycle:
//! - `AssetId`, `Asset`, `MarketGroup`: the tradable asset catalog entries
//! - `PriceSample`, `PriceBand`: oracle readings and the candidate price window
//! - `CandidateSet`: position ids selected for execution, one bucket per mode
//! - `BatchMode`, `SignatureVariant`, `ExecutionOutcome`: batch execution results
//! - `ids`: position id sanitization and chunking

pub mod asset;
pub mod candidate;
pub mod error;
pub mod execution;
pub mod ids;
pub mod price;

pub use asset::{Asset, AssetId, MarketGroup};
pub use candidate::{CandidateSet, StopKind};
pub use error::{CoreError, Result};
pub use execution::{BatchMode, ExecutionOutcome, SignatureVariant, SimulatedCounts};
pub use ids::{chunk_ids, parse_id, parse_ids, sanitize_ids, PositionId};
pub use price::{PriceBand, PriceSample};
