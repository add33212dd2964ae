//! Oracle contract price reads.
//!
//! The oracle exposes a batched lookup by pair index. The keeper always asks
//! for exactly one index and keeps the first entry of the answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Client;
use alloy::transports::http::Http;
use keeper_core::{AssetId, PriceSample};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{FeedError, FeedResult};
use crate::BoxFuture;

sol! {
    interface ISValueFeed {
        struct PriceFeed {
            uint256 round;
            uint256 decimals;
            uint256 time;
            uint256 price;
        }

        function getSvalues(uint256[] pairIndexes) external view returns (PriceFeed[] memory);
    }
}

/// Source of the latest price sample for a pair index.
pub trait PriceOracle: Send + Sync {
    /// Read the latest sample for `asset_id`.
    ///
    /// Fails with [`FeedError::OracleUnavailable`]; the caller aborts only
    /// that asset's cycle.
    fn latest(&self, asset_id: AssetId) -> BoxFuture<'_, FeedResult<PriceSample>>;
}

// ============================================================================
// RpcPriceOracle
// ============================================================================

/// Oracle reader over JSON-RPC `eth_call`.
pub struct RpcPriceOracle<P> {
    provider: P,
    address: Address,
}

impl<P> RpcPriceOracle<P> {
    pub fn new(provider: P, address: Address) -> Self {
        Self { provider, address }
    }
}

impl RpcPriceOracle<()> {
    /// Connect a read-only HTTP provider to the oracle at `address`.
    pub fn connect_http(rpc_url: &str, address: Address) -> FeedResult<Arc<dyn PriceOracle>> {
        let url = rpc_url
            .parse::<reqwest::Url>()
            .map_err(|e| FeedError::Config(format!("Invalid RPC URL {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new().on_http(url);
        Ok(Arc::new(RpcPriceOracle::new(provider, address)))
    }
}

impl<P> PriceOracle for RpcPriceOracle<P>
where
    P: Provider<Http<Client>> + 'static,
{
    fn latest(&self, asset_id: AssetId) -> BoxFuture<'_, FeedResult<PriceSample>> {
        Box::pin(async move {
            let unavailable = |reason: String| FeedError::OracleUnavailable { asset_id, reason };

            let call = ISValueFeed::getSvaluesCall {
                pairIndexes: vec![U256::from(asset_id.index())],
            };
            let tx = TransactionRequest::default()
                .with_to(self.address)
                .with_input(call.abi_encode());

            let raw = self
                .provider
                .call(&tx)
                .await
                .map_err(|e| unavailable(format!("eth_call failed: {e}")))?;
            trace!(%asset_id, bytes = raw.len(), "Oracle call returned");

            let feeds = ISValueFeed::getSvaluesCall::abi_decode_returns(&raw, true)
                .map_err(|e| unavailable(format!("cannot decode oracle response: {e}")))?
                ._0;
            let feed = feeds
                .into_iter()
                .next()
                .ok_or_else(|| unavailable("empty oracle response".to_string()))?;

            let sample = sample_from_feed(&feed).map_err(unavailable)?;
            debug!(
                %asset_id,
                round = sample.round,
                decimals = sample.decimals,
                raw_price = sample.raw_price,
                "Oracle price read"
            );
            Ok(sample)
        })
    }
}

fn sample_from_feed(feed: &ISValueFeed::PriceFeed) -> Result<PriceSample, String> {
    let raw_price = u128::try_from(feed.price)
        .map_err(|_| format!("raw price {} exceeds u128", feed.price))?;
    let decimals =
        u32::try_from(feed.decimals).map_err(|_| format!("decimals {} out of range", feed.decimals))?;
    Ok(PriceSample {
        round: u64::try_from(feed.round).unwrap_or(u64::MAX),
        decimals,
        time: u64::try_from(feed.time).unwrap_or(u64::MAX),
        raw_price,
    })
}

// ============================================================================
// MockPriceOracle
// ============================================================================

/// In-memory oracle for tests.
#[derive(Debug, Default)]
pub struct MockPriceOracle {
    samples: Mutex<HashMap<AssetId, PriceSample>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sample returned for an asset. Unknown assets fail.
    pub fn set_sample(&self, asset_id: AssetId, sample: PriceSample) {
        self.samples.lock().insert(asset_id, sample);
    }

    /// Set a sample from a human price with 18 decimals.
    pub fn set_price_18(&self, asset_id: AssetId, whole_units: u128) {
        self.set_sample(
            asset_id,
            PriceSample {
                round: 1,
                decimals: 18,
                time: 0,
                raw_price: whole_units * 10u128.pow(18),
            },
        );
    }

    /// Delay every read (simulates a slow RPC).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of reads performed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceOracle for MockPriceOracle {
    fn latest(&self, asset_id: AssetId) -> BoxFuture<'_, FeedResult<PriceSample>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.samples
                .lock()
                .get(&asset_id)
                .copied()
                .ok_or_else(|| FeedError::OracleUnavailable {
                    asset_id,
                    reason: "no sample".to_string(),
                })
        })
    }
}
