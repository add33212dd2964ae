//! Candidate selection around the oracle price.

use std::sync::Arc;

use keeper_core::{parse_id, AssetId, CandidateSet, PositionId, PriceBand};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{FeedError, FeedResult};
use crate::matching::MatchingService;

/// Asks the matching service which positions fall inside the price band.
pub struct CandidateFetcher {
    service: Arc<dyn MatchingService>,
    range_rate: Decimal,
}

impl CandidateFetcher {
    pub fn new(service: Arc<dyn MatchingService>, range_rate: Decimal) -> Self {
        Self {
            service,
            range_rate,
        }
    }

    pub fn range_rate(&self) -> Decimal {
        self.range_rate
    }

    /// Fetch and classify candidates for `asset_id` at `price`.
    ///
    /// Transport and decode errors propagate; the caller abandons the cycle.
    /// A price too large to band is reported as an unusable oracle price.
    pub async fn fetch(&self, asset_id: AssetId, price: Decimal) -> FeedResult<CandidateSet> {
        let band = PriceBand::around(price, self.range_rate).map_err(|e| {
            FeedError::OracleUnavailable {
                asset_id,
                reason: e.to_string(),
            }
        })?;
        let body = self.service.bucket_range(asset_id, band).await?;
        let set = parse_range_response(&body);

        info!(
            %asset_id,
            %price,
            from = %band.from,
            to = %band.to,
            orders = set.orders.len(),
            sl = set.stop_loss.len(),
            tp = set.take_profit.len(),
            liq = set.liquidation.len(),
            "Candidates fetched"
        );
        Ok(set)
    }
}

/// Classify a `/bucket/range` response body.
///
/// Missing or non-array `items_orders`/`items_stops` count as empty. Entries
/// without a valid non-negative integer id are dropped.
pub fn parse_range_response(body: &Value) -> CandidateSet {
    let orders = items(body, "items_orders").filter_map(entry_id);
    let stops = items(body, "items_stops").filter_map(|entry| {
        let id = entry_id(entry)?;
        Some((id, entry.get("type").and_then(Value::as_str)))
    });
    CandidateSet::classify(orders, stops)
}

fn items<'a>(body: &'a Value, field: &str) -> impl Iterator<Item = &'a Value> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or_default()
        .iter()
}

fn entry_id(entry: &Value) -> Option<PositionId> {
    let parsed = match entry.get("id") {
        Some(Value::Number(n)) => parse_id(&n.to_string()),
        Some(Value::String(s)) => parse_id(s),
        _ => {
            debug!(%entry, "Dropping entry without id");
            return None;
        }
    };
    match parsed {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(%entry, error = %e, "Dropping entry with invalid id");
            None
        }
    }
}
