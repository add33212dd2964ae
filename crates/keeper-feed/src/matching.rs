//! HTTP transport for the matching service.
//!
//! Two endpoints are used:
//! - `GET {base}/bucket/range?...` returns resting orders and stop conditions
//!   inside a price band
//! - `GET {base}/verify/<ids>` asks the service to re-check positions the
//!   contract skipped

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use keeper_core::{AssetId, PositionId, PriceBand};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::BoxFuture;

/// Default timeout for matching-service requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Matching-service operations used by the keeper.
pub trait MatchingService: Send + Sync {
    /// Fetch orders and stops inside `band` for `asset_id` (raw JSON body).
    fn bucket_range(
        &self,
        asset_id: AssetId,
        band: PriceBand,
    ) -> BoxFuture<'_, FeedResult<serde_json::Value>>;

    /// Ask the service to re-verify `ids` (ascending).
    fn verify(&self, ids: Vec<PositionId>) -> BoxFuture<'_, FeedResult<()>>;
}

// ============================================================================
// HttpMatchingClient
// ============================================================================

/// reqwest-backed matching-service client.
pub struct HttpMatchingClient {
    client: Client,
    base_url: String,
}

impl HttpMatchingClient {
    /// Create a client for `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Range query URL.
    pub fn range_url(&self, asset_id: AssetId, band: &PriceBand) -> String {
        format!(
            "{}/bucket/range?asset={}&from={}&to={}&types=orders,stops&side=all&sort=lots&order=desc",
            self.base_url, asset_id, band.from, band.to
        )
    }

    /// Verification URL: ids comma-joined in the path.
    pub fn verify_url(&self, ids: &[PositionId]) -> String {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}/verify/{}", self.base_url, joined)
    }
}

impl MatchingService for HttpMatchingClient {
    fn bucket_range(
        &self,
        asset_id: AssetId,
        band: PriceBand,
    ) -> BoxFuture<'_, FeedResult<serde_json::Value>> {
        Box::pin(async move {
            let url = self.range_url(asset_id, &band);
            debug!(%asset_id, %url, "Fetching candidate range");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FeedError::Fetch(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FeedError::Fetch(format!("HTTP {status}: {body}")));
            }

            response
                .json()
                .await
                .map_err(|e| FeedError::Fetch(format!("Failed to parse response: {e}")))
        })
    }

    fn verify(&self, ids: Vec<PositionId>) -> BoxFuture<'_, FeedResult<()>> {
        Box::pin(async move {
            let url = self.verify_url(&ids);
            debug!(%url, count = ids.len(), "Requesting verification");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FeedError::Verification(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FeedError::Verification(format!("HTTP {status}: {body}")));
            }
            Ok(())
        })
    }
}

// ============================================================================
// MockMatchingService
// ============================================================================

/// Recording matching service for tests.
#[derive(Debug, Default)]
pub struct MockMatchingService {
    range_body: Mutex<Option<serde_json::Value>>,
    range_requests: Mutex<Vec<(AssetId, PriceBand)>>,
    verify_requests: Mutex<Vec<Vec<PositionId>>>,
    fail_range: Mutex<bool>,
    fail_verify: Mutex<bool>,
    range_calls: AtomicUsize,
}

impl MockMatchingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body returned by every range query. Defaults to `{}`.
    pub fn set_range_body(&self, body: serde_json::Value) {
        *self.range_body.lock() = Some(body);
    }

    pub fn fail_range(&self, fail: bool) {
        *self.fail_range.lock() = fail;
    }

    pub fn fail_verify(&self, fail: bool) {
        *self.fail_verify.lock() = fail;
    }

    pub fn range_requests(&self) -> Vec<(AssetId, PriceBand)> {
        self.range_requests.lock().clone()
    }

    pub fn range_call_count(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    /// Verification requests, in arrival order (recorded even when failing).
    pub fn verify_requests(&self) -> Vec<Vec<PositionId>> {
        self.verify_requests.lock().clone()
    }
}

impl MatchingService for MockMatchingService {
    fn bucket_range(
        &self,
        asset_id: AssetId,
        band: PriceBand,
    ) -> BoxFuture<'_, FeedResult<serde_json::Value>> {
        Box::pin(async move {
            self.range_calls.fetch_add(1, Ordering::SeqCst);
            self.range_requests.lock().push((asset_id, band));
            if *self.fail_range.lock() {
                return Err(FeedError::Fetch("HTTP 503 Service Unavailable".to_string()));
            }
            Ok(self
                .range_body
                .lock()
                .clone()
                .unwrap_or_else(|| serde_json::json!({})))
        })
    }

    fn verify(&self, ids: Vec<PositionId>) -> BoxFuture<'_, FeedResult<()>> {
        Box::pin(async move {
            self.verify_requests.lock().push(ids);
            if *self.fail_verify.lock() {
                return Err(FeedError::Verification("connection refused".to_string()));
            }
            Ok(())
        })
    }
}
