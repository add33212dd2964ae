//! Application configuration.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use alloy::primitives::Address;
use keeper_core::{Asset, AssetId};
use keeper_executor::{parse_keys_by_asset, DispatchConfig, ReceiptPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Environment variable overriding `executor_address`.
pub const EXECUTOR_ADDR_VAR: &str = "EXECUTOR_ADDR";
/// Environment variable overriding `oracle_address`.
pub const ORACLE_ADDR_VAR: &str = "ORACLE_ADDR";

/// Keeper configuration. Immutable once the application is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Execution contract (`execLimits` / `closeBatch`).
    #[serde(default)]
    pub executor_address: Option<String>,
    /// Oracle contract (`getSvalues`).
    #[serde(default)]
    pub oracle_address: Option<String>,
    /// Matching service base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Half-width of the candidate price band, as a fraction of the price.
    #[serde(default = "default_range_rate")]
    pub range_rate: Decimal,
    #[serde(default = "default_max_ids_per_call")]
    pub max_ids_per_call: usize,
    /// Pause after every batch group (ms).
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,
    /// UTC seconds-of-minute at which a cycle fires.
    #[serde(default = "default_trigger_seconds")]
    pub trigger_seconds: Vec<u32>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Upper bound for one batch's resolve and submit (ms).
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_receipt_max_polls")]
    pub receipt_max_polls: u32,
    /// Matching-service request timeout (ms).
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Asset catalog.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Inline per-asset keys. Prefer `KEEPER_KEYS_BY_ASSET`.
    #[serde(default, skip_serializing)]
    pub keys_by_asset: HashMap<String, String>,
}

fn default_rpc_url() -> String {
    "https://testnet.dplabs-internal.com".to_string()
}

fn default_api_base() -> String {
    "https://api.brokex.trade".to_string()
}

fn default_range_rate() -> Decimal {
    Decimal::new(2, 4)
}

fn default_max_ids_per_call() -> usize {
    200
}

fn default_call_delay_ms() -> u64 {
    1_000
}

fn default_trigger_seconds() -> Vec<u32> {
    vec![3, 15, 27, 39, 51]
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_execution_timeout_ms() -> u64 {
    120_000
}

fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}

fn default_receipt_max_polls() -> u32 {
    60
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            executor_address: None,
            oracle_address: None,
            api_base: default_api_base(),
            range_rate: default_range_rate(),
            max_ids_per_call: default_max_ids_per_call(),
            call_delay_ms: default_call_delay_ms(),
            trigger_seconds: default_trigger_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            execution_timeout_ms: default_execution_timeout_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_max_polls: default_receipt_max_polls(),
            http_timeout_ms: default_http_timeout_ms(),
            assets: Vec::new(),
            keys_by_asset: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load a file, apply environment overrides and validate.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Contract addresses from the environment win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(addr) = non_blank(EXECUTOR_ADDR_VAR) {
            self.executor_address = Some(addr);
        }
        if let Some(addr) = non_blank(ORACLE_ADDR_VAR) {
            self.oracle_address = Some(addr);
        }
    }

    /// Reject configurations the keeper cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.assets.is_empty() {
            return Err(AppError::Config("asset catalog is empty".to_string()));
        }
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for asset in &self.assets {
            if !ids.insert(asset.id) {
                return Err(AppError::Config(format!("duplicate asset id {}", asset.id)));
            }
            if !keys.insert(asset.key.to_ascii_uppercase()) {
                return Err(AppError::Config(format!("duplicate asset key {}", asset.key)));
            }
        }
        if self.max_ids_per_call == 0 {
            return Err(AppError::Config("max_ids_per_call must be at least 1".to_string()));
        }
        if self.range_rate <= Decimal::ZERO || self.range_rate >= Decimal::ONE {
            return Err(AppError::Config(format!(
                "range_rate must be in (0, 1), got {}",
                self.range_rate
            )));
        }
        if self.trigger_seconds.is_empty() {
            return Err(AppError::Config("trigger_seconds is empty".to_string()));
        }
        if let Some(s) = self.trigger_seconds.iter().find(|&&s| s >= 60) {
            return Err(AppError::Config(format!("trigger second {s} out of range")));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config("tick_interval_ms must be positive".to_string()));
        }
        self.executor_address()?;
        self.oracle_address()?;
        self.configured_keys()?;
        Ok(())
    }

    pub fn executor_address(&self) -> AppResult<Address> {
        parse_address("executor_address", EXECUTOR_ADDR_VAR, self.executor_address.as_deref())
    }

    pub fn oracle_address(&self) -> AppResult<Address> {
        parse_address("oracle_address", ORACLE_ADDR_VAR, self.oracle_address.as_deref())
    }

    /// Inline `keys_by_asset` with typed asset ids.
    pub fn configured_keys(&self) -> AppResult<HashMap<AssetId, String>> {
        if self.keys_by_asset.is_empty() {
            return Ok(HashMap::new());
        }
        let json = serde_json::to_string(&self.keys_by_asset)
            .map_err(|e| AppError::Config(format!("keys_by_asset: {e}")))?;
        Ok(parse_keys_by_asset(&json)?)
    }

    pub fn trigger_set(&self) -> BTreeSet<u32> {
        self.trigger_seconds.iter().copied().collect()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            max_ids_per_call: self.max_ids_per_call,
            call_delay: Duration::from_millis(self.call_delay_ms),
        }
    }

    pub fn receipt_policy(&self) -> ReceiptPolicy {
        ReceiptPolicy {
            poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            max_polls: self.receipt_max_polls,
        }
    }
}

fn parse_address(field: &str, env_var: &str, value: Option<&str>) -> AppResult<Address> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("{field} is not set (config or {env_var})")))?;
    raw.parse()
        .map_err(|e| AppError::Config(format!("{field} {raw:?} is not an address: {e}")))
}
