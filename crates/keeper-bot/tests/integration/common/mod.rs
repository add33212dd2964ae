//! Shared harness: an application wired to mock oracle, matching service
//! and contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use keeper_bot::{AppConfig, Application, CyclePipeline};
use keeper_core::{Asset, AssetId, MarketGroup};
use keeper_executor::{
    BatchDispatcher, ContractCaller, DispatchConfig, ExecutionUnit, MockContractCaller,
    SignerCallerFactory, SigningKeys, SkipVerifier,
};
use keeper_feed::{CandidateFetcher, MockMatchingService, MockPriceOracle};
use keeper_registry::AssetRegistry;
use rust_decimal_macros::dec;

/// Development key (anvil account 0).
pub const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub struct Harness {
    pub oracle: Arc<MockPriceOracle>,
    pub matching: Arc<MockMatchingService>,
    pub contract: Arc<MockContractCaller>,
    pub pipeline: Arc<CyclePipeline>,
    pub app: Application,
}

impl Harness {
    /// Assets 0 (BTC) and 1 (ETH). Only the ids in `keyed` get a signing key.
    pub fn new(keyed: &[u32]) -> Self {
        let assets = vec![
            Asset::new(0, "BTC_USDT", MarketGroup::Crypto),
            Asset::new(1, "ETH_USDT", MarketGroup::Crypto),
        ];
        let registry = Arc::new(AssetRegistry::new(assets.clone()).unwrap());

        let oracle = Arc::new(MockPriceOracle::new());
        let matching = Arc::new(MockMatchingService::new());
        let contract = Arc::new(MockContractCaller::new());

        let explicit: HashMap<AssetId, String> = keyed
            .iter()
            .map(|&id| (AssetId(id), KEY.to_string()))
            .collect();
        let keys = SigningKeys::resolve_with(&registry.ids(), &explicit, |_| None).unwrap();

        // Same per-signer wrapping as production, over one mock contract.
        let caller: Arc<dyn ContractCaller> = contract.clone();
        let callers = SignerCallerFactory::new(move |_| Ok(Arc::clone(&caller)));
        let dispatcher = BatchDispatcher::new(
            ExecutionUnit::new(Arc::new(callers), Duration::from_secs(120)),
            SkipVerifier::new(matching.clone()),
            DispatchConfig {
                max_ids_per_call: 200,
                call_delay: Duration::from_millis(1000),
            },
        );
        let pipeline = Arc::new(CyclePipeline::new(
            oracle.clone(),
            CandidateFetcher::new(matching.clone(), dec!(0.0002)),
            dispatcher,
            keys,
        ));

        let config = AppConfig {
            assets,
            ..Default::default()
        };
        let app = Application::with_pipeline(config, registry, Arc::clone(&pipeline));

        Self {
            oracle,
            matching,
            contract,
            pipeline,
            app,
        }
    }
}
