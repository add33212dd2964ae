//! Batch execution types.
//!
//! This module provides types for:
//! - Batch modes and their on-chain operation / reason code mapping
//! - ABI signature variants tried during call resolution
//! - Terminal outcomes of a submitted batch

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::error::CoreError;
use crate::ids::PositionId;

// ============================================================================
// BatchMode
// ============================================================================

/// What a batch does on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Execute resting limit orders (`execLimits`).
    Limit,
    /// Close positions whose stop-loss was hit (`closeBatch`, reason 1).
    StopLoss,
    /// Close positions whose take-profit was hit (`closeBatch`, reason 2).
    TakeProfit,
    /// Liquidate positions (`closeBatch`, reason 3).
    Liquidation,
}

impl BatchMode {
    /// Processing order within one asset cycle.
    pub const ALL: [BatchMode; 4] = [
        BatchMode::Limit,
        BatchMode::StopLoss,
        BatchMode::TakeProfit,
        BatchMode::Liquidation,
    ];

    /// `closeBatch` reason code. `None` for limit execution.
    pub fn reason_code(&self) -> Option<u8> {
        match self {
            Self::Limit => None,
            Self::StopLoss => Some(1),
            Self::TakeProfit => Some(2),
            Self::Liquidation => Some(3),
        }
    }

    /// Contract function name.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Limit => "execLimits",
            _ => "closeBatch",
        }
    }

    /// Label of the processed count returned by the operation.
    pub fn processed_label(&self) -> &'static str {
        match self {
            Self::Limit => "executed",
            _ => "closed",
        }
    }

    /// Short label used on the command line and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::StopLoss => "sl",
            Self::TakeProfit => "tp",
            Self::Liquidation => "liq",
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "limit" => Ok(Self::Limit),
            "sl" => Ok(Self::StopLoss),
            "tp" => Ok(Self::TakeProfit),
            "liq" => Ok(Self::Liquidation),
            other => Err(CoreError::InvalidMode(other.to_string())),
        }
    }
}

// ============================================================================
// SignatureVariant
// ============================================================================

/// Wire-level function shape of the execution contract.
///
/// Variants are listed in resolution priority order (tier 1 to tier 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureVariant {
    /// `uint32[]` ids, `(uint32, uint32)` returned.
    NarrowWithReturns,
    /// `uint256[]` ids, `(uint32, uint32)` returned.
    WideWithReturns,
    /// `uint32[]` ids, nothing returned.
    NarrowNoReturns,
    /// `uint256[]` ids, nothing returned.
    WideNoReturns,
}

impl SignatureVariant {
    /// Resolution order.
    pub const TIERS: [SignatureVariant; 4] = [
        SignatureVariant::NarrowWithReturns,
        SignatureVariant::WideWithReturns,
        SignatureVariant::NarrowNoReturns,
        SignatureVariant::WideNoReturns,
    ];

    /// 1-based tier number.
    pub fn tier(&self) -> u8 {
        match self {
            Self::NarrowWithReturns => 1,
            Self::WideWithReturns => 2,
            Self::NarrowNoReturns => 3,
            Self::WideNoReturns => 4,
        }
    }

    /// Whether ids are encoded as `uint256[]`.
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::WideWithReturns | Self::WideNoReturns)
    }

    /// Whether the shape declares `(processed, skipped)` return values.
    pub fn has_returns(&self) -> bool {
        matches!(self, Self::NarrowWithReturns | Self::WideWithReturns)
    }
}

impl fmt::Display for SignatureVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = if self.is_wide() { "uint256[]" } else { "uint32[]" };
        if self.has_returns() {
            write!(f, "{ids}")
        } else {
            write!(f, "{ids} (no returns)")
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Counts returned by a successful simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedCounts {
    pub processed: u32,
    pub skipped: u32,
}

/// Terminal result of one batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub mode: BatchMode,
    pub asset_id: AssetId,
    /// Ids the batch was submitted with.
    pub ids: Vec<PositionId>,
    /// Resolved signature, if resolution got that far.
    pub variant: Option<SignatureVariant>,
    pub processed_count: u32,
    pub skipped_count: u32,
    /// Transaction hash (0x-prefixed hex), if a transaction was sent.
    pub tx_hash: Option<String>,
    /// Block the transaction was confirmed in.
    pub confirmed_block: Option<u64>,
}

impl ExecutionOutcome {
    /// Outcome of a batch that did not go through: every id counts as skipped.
    pub fn fully_skipped(mode: BatchMode, asset_id: AssetId, ids: Vec<PositionId>) -> Self {
        let skipped_count = u32::try_from(ids.len()).unwrap_or(u32::MAX);
        Self {
            mode,
            asset_id,
            ids,
            variant: None,
            processed_count: 0,
            skipped_count,
            tx_hash: None,
            confirmed_block: None,
        }
    }

    /// Whether the skip verification step should run.
    pub fn needs_verification(&self) -> bool {
        self.skipped_count > 0
    }

    /// Whether a transaction was confirmed for this batch.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_block.is_some()
    }

    /// Machine-parsable summary: `<operation> → <label>=<n> | skipped=<k>`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} → {}={} | skipped={}",
            self.mode.operation(),
            self.mode.processed_label(),
            self.processed_count,
            self.skipped_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(BatchMode::Limit.reason_code(), None);
        assert_eq!(BatchMode::StopLoss.reason_code(), Some(1));
        assert_eq!(BatchMode::TakeProfit.reason_code(), Some(2));
        assert_eq!(BatchMode::Liquidation.reason_code(), Some(3));
    }

    #[test]
    fn test_mode_parse_roundtrip_labels() {
        for mode in BatchMode::ALL {
            assert_eq!(mode.as_str().parse::<BatchMode>().unwrap(), mode);
        }
        assert_eq!("TP".parse::<BatchMode>().unwrap(), BatchMode::TakeProfit);
        assert!("market".parse::<BatchMode>().is_err());
    }

    #[test]
    fn test_tier_order() {
        let tiers: Vec<u8> = SignatureVariant::TIERS.iter().map(|v| v.tier()).collect();
        assert_eq!(tiers, vec![1, 2, 3, 4]);
        assert!(!SignatureVariant::NarrowWithReturns.is_wide());
        assert!(SignatureVariant::WideNoReturns.is_wide());
        assert!(!SignatureVariant::WideNoReturns.has_returns());
    }

    #[test]
    fn test_fully_skipped_outcome() {
        let outcome = ExecutionOutcome::fully_skipped(BatchMode::StopLoss, AssetId(2), vec![10, 11, 12]);
        assert_eq!(outcome.skipped_count, 3);
        assert_eq!(outcome.processed_count, 0);
        assert!(outcome.needs_verification());
        assert!(!outcome.is_confirmed());
        assert_eq!(outcome.summary_line(), "closeBatch → closed=0 | skipped=3");
    }
}
