//! Candidate position sets selected by the matching service.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::execution::BatchMode;
use crate::ids::PositionId;

/// Stop-type condition attached to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopKind {
    StopLoss,
    TakeProfit,
    Liquidation,
}

impl StopKind {
    /// Case-insensitive match against the matching service's `type` labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("SL") {
            Some(Self::StopLoss)
        } else if label.eq_ignore_ascii_case("TP") {
            Some(Self::TakeProfit)
        } else if label.eq_ignore_ascii_case("LIQ") {
            Some(Self::Liquidation)
        } else {
            None
        }
    }
}

/// Position ids to act on in one cycle, one bucket per batch mode.
///
/// Every bucket is deduplicated and sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub orders: Vec<PositionId>,
    pub stop_loss: Vec<PositionId>,
    pub take_profit: Vec<PositionId>,
    pub liquidation: Vec<PositionId>,
}

impl CandidateSet {
    /// Build a candidate set from open-order ids and labelled stop entries.
    ///
    /// Stop entries with a missing or unknown label are dropped.
    pub fn classify<'a, O, S>(orders: O, stops: S) -> Self
    where
        O: IntoIterator<Item = PositionId>,
        S: IntoIterator<Item = (PositionId, Option<&'a str>)>,
    {
        let orders: BTreeSet<PositionId> = orders.into_iter().collect();
        let mut stop_loss = BTreeSet::new();
        let mut take_profit = BTreeSet::new();
        let mut liquidation = BTreeSet::new();

        for (id, label) in stops {
            match label.and_then(StopKind::from_label) {
                Some(StopKind::StopLoss) => stop_loss.insert(id),
                Some(StopKind::TakeProfit) => take_profit.insert(id),
                Some(StopKind::Liquidation) => liquidation.insert(id),
                None => continue,
            };
        }

        Self {
            orders: orders.into_iter().collect(),
            stop_loss: stop_loss.into_iter().collect(),
            take_profit: take_profit.into_iter().collect(),
            liquidation: liquidation.into_iter().collect(),
        }
    }

    /// Ids for the given batch mode.
    pub fn bucket(&self, mode: BatchMode) -> &[PositionId] {
        match mode {
            BatchMode::Limit => &self.orders,
            BatchMode::StopLoss => &self.stop_loss,
            BatchMode::TakeProfit => &self.take_profit,
            BatchMode::Liquidation => &self.liquidation,
        }
    }

    /// Total ids across all buckets.
    pub fn total(&self) -> usize {
        self.orders.len() + self.stop_loss.len() + self.take_profit.len() + self.liquidation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
