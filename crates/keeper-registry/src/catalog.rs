//! Asset registry.
//!
//! Immutable after construction. Assets are kept sorted by id so that
//! iteration order (and therefore log order at fan-out) is stable.

use std::collections::HashMap;

use keeper_core::{Asset, AssetId, MarketGroup};
use tracing::info;

use crate::error::{RegistryError, RegistryResult};

/// Read-only catalog of tradable assets.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
    by_id: HashMap<AssetId, usize>,
    by_key: HashMap<String, usize>,
}

impl AssetRegistry {
    /// Build a registry, rejecting empty catalogs, blank keys and duplicates.
    ///
    /// Keys are compared case-insensitively.
    pub fn new(mut assets: Vec<Asset>) -> RegistryResult<Self> {
        if assets.is_empty() {
            return Err(RegistryError::EmptyCatalog);
        }
        assets.sort_by_key(|a| a.id);

        let mut by_id = HashMap::with_capacity(assets.len());
        let mut by_key = HashMap::with_capacity(assets.len());
        for (idx, asset) in assets.iter().enumerate() {
            if asset.key.trim().is_empty() {
                return Err(RegistryError::BlankKey(asset.id.index()));
            }
            if by_id.insert(asset.id, idx).is_some() {
                return Err(RegistryError::DuplicateId(asset.id.index()));
            }
            if by_key.insert(asset.key.to_ascii_uppercase(), idx).is_some() {
                return Err(RegistryError::DuplicateKey(asset.key.clone()));
            }
        }

        info!(asset_count = assets.len(), "Asset registry loaded");

        Ok(Self {
            assets,
            by_id,
            by_key,
        })
    }

    /// Look up an asset by id.
    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.by_id.get(&id).map(|&idx| &self.assets[idx])
    }

    /// Look up an asset by display key (case-insensitive).
    pub fn by_key(&self, key: &str) -> RegistryResult<&Asset> {
        self.by_key
            .get(&key.trim().to_ascii_uppercase())
            .map(|&idx| &self.assets[idx])
            .ok_or_else(|| RegistryError::AssetNotFound(key.to_string()))
    }

    /// All assets, ascending by id.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// All asset ids, ascending.
    pub fn ids(&self) -> Vec<AssetId> {
        self.assets.iter().map(|a| a.id).collect()
    }

    /// Assets in one market group.
    pub fn in_group(&self, group: MarketGroup) -> impl Iterator<Item = &Asset> {
        self.assets.iter().filter(move |a| a.market_group == group)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
