//! Asset identification types.
//!
//! Every tradable instrument is addressed by a pair index shared between the
//! oracle feed and the execution contract. The keeper only ever reads these
//! entries; they are loaded once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset identifier (oracle pair index / execution contract asset id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u32);

impl AssetId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Market group an asset is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketGroup {
    Crypto,
    Forex,
    Commodities,
    Indices,
    Stocks,
}

impl fmt::Display for MarketGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::Forex => write!(f, "forex"),
            Self::Commodities => write!(f, "commodities"),
            Self::Indices => write!(f, "indices"),
            Self::Stocks => write!(f, "stocks"),
        }
    }
}

/// Catalog entry for one tradable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Pair index used by both the oracle and the execution contract.
    pub id: AssetId,
    /// Display label (e.g., "BTC_USDT").
    pub key: String,
    /// Market group.
    pub market_group: MarketGroup,
}

impl Asset {
    pub fn new(id: u32, key: impl Into<String>, market_group: MarketGroup) -> Self {
        Self {
            id: AssetId(id),
            key: key.into(),
            market_group,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key, self.id)
    }
}
