//! Trigger detection and per-asset overlap control.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashSet;
use keeper_core::AssetId;

/// Fires on configured UTC seconds-of-minute, at most once per wall-clock second.
#[derive(Debug, Clone)]
pub struct TriggerSchedule {
    seconds: BTreeSet<u32>,
    /// Epoch second of the last firing.
    last_fired: Option<i64>,
}

impl TriggerSchedule {
    pub fn new(seconds: impl IntoIterator<Item = u32>) -> Self {
        Self {
            seconds: seconds.into_iter().collect(),
            last_fired: None,
        }
    }

    /// Whether a cycle should fire at `now`. Records the firing.
    pub fn should_fire(&mut self, now: DateTime<Utc>) -> bool {
        let epoch_second = now.timestamp();
        if !self.seconds.contains(&now.second()) || self.last_fired == Some(epoch_second) {
            return false;
        }
        self.last_fired = Some(epoch_second);
        true
    }
}

/// Assets with a cycle currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    inner: Arc<DashSet<AssetId>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `asset_id` as running. `None` if it already is.
    pub fn try_acquire(&self, asset_id: AssetId) -> Option<InFlightGuard> {
        if self.inner.insert(asset_id) {
            Some(InFlightGuard {
                set: Arc::clone(&self.inner),
                asset_id,
            })
        } else {
            None
        }
    }

    pub fn contains(&self, asset_id: AssetId) -> bool {
        self.inner.contains(&asset_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Removes the asset from the in-flight set when dropped, including on panic.
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<DashSet<AssetId>>,
    asset_id: AssetId,
}

impl InFlightGuard {
    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.asset_id);
    }
}
