//! Oracle price reads and matching-service access for the keeper.
//!
//! - [`PriceOracle`]: latest price sample per pair index (oracle contract)
//! - [`MatchingService`]: `/bucket/range` and `/verify` transport
//! - [`CandidateFetcher`]: price band computation and candidate classification

pub mod candidates;
pub mod error;
pub mod matching;
pub mod oracle;

use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub use candidates::{parse_range_response, CandidateFetcher};
pub use error::{FeedError, FeedResult};
pub use matching::{HttpMatchingClient, MatchingService, MockMatchingService};
pub use oracle::{MockPriceOracle, PriceOracle, RpcPriceOracle};
