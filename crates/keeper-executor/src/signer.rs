//! Per-asset signing credentials.
//!
//! Keys are resolved per asset in priority order:
//! 1. Explicit map (`KEEPER_KEYS_BY_ASSET` JSON, or `keys_by_asset` in config)
//! 2. `KEEPER_KEY_<asset id>`
//! 3. Shared fallback `KEEPER_PRIVATE_KEY`
//!
//! Security notes:
//! - Key material is held in `Zeroizing` buffers while parsing.
//! - Keys are loaded once at startup; no runtime rotation.
//! - Never log private key material, only the derived address.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use keeper_core::AssetId;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Environment variable carrying the explicit JSON key map.
pub const KEYS_BY_ASSET_VAR: &str = "KEEPER_KEYS_BY_ASSET";
/// Prefix of the per-asset key variables (`KEEPER_KEY_0`, ...).
pub const ASSET_KEY_PREFIX: &str = "KEEPER_KEY_";
/// Shared fallback key variable.
pub const SHARED_KEY_VAR: &str = "KEEPER_PRIVATE_KEY";

// =============================================================================
// SigningCredential
// =============================================================================

/// Parsed signing key. `Debug` shows the address only.
#[derive(Clone)]
pub struct SigningCredential {
    signer: PrivateKeySigner,
}

impl SigningCredential {
    /// Parse a hex private key (with or without `0x`, surrounding whitespace ignored).
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let secret_bytes: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);
        let signer = PrivateKeySigner::from_slice(&secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("address", &self.address())
            .finish()
    }
}

/// Where an asset's key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    ExplicitMap,
    AssetEnvVar,
    SharedFallback,
}

// =============================================================================
// SigningKeys
// =============================================================================

/// Resolved credentials by asset.
#[derive(Debug, Clone, Default)]
pub struct SigningKeys {
    by_asset: HashMap<AssetId, (Arc<SigningCredential>, KeySource)>,
}

impl SigningKeys {
    /// Resolve credentials from the process environment.
    ///
    /// `configured` is the config file's `keys_by_asset` map; entries from
    /// `KEEPER_KEYS_BY_ASSET` override it.
    pub fn from_env(
        asset_ids: &[AssetId],
        configured: &HashMap<AssetId, String>,
    ) -> Result<Self, KeyError> {
        let mut explicit = configured.clone();
        if let Ok(json) = std::env::var(KEYS_BY_ASSET_VAR) {
            explicit.extend(parse_keys_by_asset(&json)?);
        }
        Self::resolve_with(asset_ids, &explicit, |name| std::env::var(name).ok())
    }

    /// Resolve credentials with an injectable variable lookup.
    ///
    /// Fails if any key that is present is malformed, or if no asset
    /// resolves a key at all.
    pub fn resolve_with<F>(
        asset_ids: &[AssetId],
        explicit: &HashMap<AssetId, String>,
        lookup: F,
    ) -> Result<Self, KeyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let shared = lookup(SHARED_KEY_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(|hex| {
                SigningCredential::from_hex(&hex)
                    .map(Arc::new)
                    .map_err(|e| e.context(SHARED_KEY_VAR))
            })
            .transpose()?;

        let mut by_asset = HashMap::with_capacity(asset_ids.len());
        for &asset_id in asset_ids {
            let var_name = format!("{ASSET_KEY_PREFIX}{asset_id}");
            let resolved = if let Some(hex) = explicit.get(&asset_id) {
                let credential = SigningCredential::from_hex(hex)
                    .map_err(|e| e.context(&format!("{KEYS_BY_ASSET_VAR}[{asset_id}]")))?;
                Some((Arc::new(credential), KeySource::ExplicitMap))
            } else if let Some(hex) = lookup(&var_name).filter(|v| !v.trim().is_empty()) {
                let credential =
                    SigningCredential::from_hex(&hex).map_err(|e| e.context(&var_name))?;
                Some((Arc::new(credential), KeySource::AssetEnvVar))
            } else {
                shared
                    .as_ref()
                    .map(|credential| (Arc::clone(credential), KeySource::SharedFallback))
            };

            match resolved {
                Some((credential, source)) => {
                    debug!(%asset_id, address = %credential.address(), ?source, "Signing key resolved");
                    by_asset.insert(asset_id, (credential, source));
                }
                None => debug!(%asset_id, "No signing key for asset"),
            }
        }

        if by_asset.is_empty() {
            return Err(KeyError::NoCredential);
        }
        info!(
            resolved = by_asset.len(),
            assets = asset_ids.len(),
            "Signing keys loaded"
        );
        Ok(Self { by_asset })
    }

    pub fn get(&self, asset_id: AssetId) -> Option<Arc<SigningCredential>> {
        self.by_asset
            .get(&asset_id)
            .map(|(credential, _)| Arc::clone(credential))
    }

    pub fn source(&self, asset_id: AssetId) -> Option<KeySource> {
        self.by_asset.get(&asset_id).map(|(_, source)| *source)
    }

    pub fn len(&self) -> usize {
        self.by_asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_asset.is_empty()
    }
}

/// Parse a `{"<asset id>": "<hex key>"}` JSON object.
pub fn parse_keys_by_asset(json: &str) -> Result<HashMap<AssetId, String>, KeyError> {
    let raw: HashMap<String, String> = serde_json::from_str(json)
        .map_err(|e| KeyError::InvalidKeyMap(format!("expected a JSON object of strings: {e}")))?;
    raw.into_iter()
        .map(|(asset, key)| {
            let id = asset
                .trim()
                .parse::<u32>()
                .map_err(|_| KeyError::InvalidKeyMap(format!("invalid asset id {asset:?}")))?;
            Ok((AssetId(id), key))
        })
        .collect()
}

/// Key management errors. Messages never contain key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid key map: {0}")]
    InvalidKeyMap(String),

    #[error("No signing key resolved for any asset")]
    NoCredential,
}

impl KeyError {
    /// Prefix the error with the name of the key's source.
    fn context(self, source: &str) -> Self {
        match self {
            Self::NoCredential => Self::NoCredential,
            other => Self::InvalidKey(format!("{source}: {other}")),
        }
    }
}
