//! Main application orchestration.
//!
//! A wall-clock tick checks the trigger schedule. On a trigger every asset in
//! the registry gets one cycle attempt in its own task:
//! oracle price, candidate fetch, then dispatch of each bucket in fixed order.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use keeper_core::{Asset, AssetId, BatchMode, CandidateSet, ExecutionOutcome};
use keeper_executor::{
    BatchDispatcher, ExecutionUnit, SignerCallerFactory, SigningKeys, SkipVerifier,
};
use keeper_feed::{
    CandidateFetcher, FeedError, HttpMatchingClient, MatchingService, PriceOracle, RpcPriceOracle,
};
use keeper_registry::AssetRegistry;
use keeper_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::scheduler::{InFlightSet, TriggerSchedule};

// ============================================================================
// CyclePipeline
// ============================================================================

/// What one asset cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub price: Option<Decimal>,
    pub candidates: CandidateSet,
    /// One outcome per dispatched group, in dispatch order.
    pub outcomes: Vec<ExecutionOutcome>,
}

/// Oracle read, candidate fetch and dispatch for one asset.
pub struct CyclePipeline {
    oracle: Arc<dyn PriceOracle>,
    fetcher: CandidateFetcher,
    dispatcher: BatchDispatcher,
    keys: SigningKeys,
}

impl CyclePipeline {
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        fetcher: CandidateFetcher,
        dispatcher: BatchDispatcher,
        keys: SigningKeys,
    ) -> Self {
        Self {
            oracle,
            fetcher,
            dispatcher,
            keys,
        }
    }

    /// Run one full cycle.
    ///
    /// Oracle and fetch failures abort the cycle. Batch failures never do;
    /// they surface as fully skipped outcomes.
    pub async fn run_cycle(&self, asset: &Asset) -> AppResult<CycleReport> {
        let asset_id = asset.id;

        let sample = self.oracle.latest(asset_id).await?;
        let price = sample
            .human_price()
            .map_err(|e| FeedError::OracleUnavailable {
                asset_id,
                reason: e.to_string(),
            })?;
        Metrics::oracle_price(&asset_id.to_string(), price.to_f64().unwrap_or_default());
        debug!(%asset_id, key = %asset.key, %price, round = sample.round, "Oracle price");

        let candidates = self.fetcher.fetch(asset_id, price).await?;
        let mut report = CycleReport {
            price: Some(price),
            candidates,
            outcomes: Vec::new(),
        };
        if report.candidates.is_empty() {
            return Ok(report);
        }

        let Some(credential) = self.keys.get(asset_id) else {
            warn!(%asset_id, key = %asset.key, "No signing key for asset, skipping dispatch");
            return Ok(report);
        };

        for mode in BatchMode::ALL {
            let ids = report.candidates.bucket(mode);
            let outcomes = self
                .dispatcher
                .dispatch(mode, asset_id, ids, &credential)
                .await;
            report.outcomes.extend(outcomes);
        }
        Ok(report)
    }
}

// ============================================================================
// Application
// ============================================================================

/// Main application.
pub struct Application {
    config: AppConfig,
    registry: Arc<AssetRegistry>,
    pipeline: Arc<CyclePipeline>,
    in_flight: InFlightSet,
    schedule: TriggerSchedule,
}

impl Application {
    /// Build the application with RPC and HTTP clients.
    ///
    /// Fails on invalid configuration, malformed keys, or when no asset
    /// resolves a signing key.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let registry = Arc::new(AssetRegistry::new(config.assets.clone())?);
        let keys = SigningKeys::from_env(&registry.ids(), &config.configured_keys()?)?;

        let oracle = RpcPriceOracle::connect_http(&config.rpc_url, config.oracle_address()?)?;
        let matching: Arc<dyn MatchingService> =
            Arc::new(HttpMatchingClient::new(&config.api_base, config.http_timeout())?);
        let callers = Arc::new(SignerCallerFactory::rpc(
            &config.rpc_url,
            config.executor_address()?,
            config.receipt_policy(),
        ));

        let pipeline = CyclePipeline::new(
            oracle,
            CandidateFetcher::new(Arc::clone(&matching), config.range_rate),
            BatchDispatcher::new(
                ExecutionUnit::new(callers, config.execution_timeout()),
                SkipVerifier::new(matching),
                config.dispatch(),
            ),
            keys,
        );

        Ok(Self::with_pipeline(config, registry, Arc::new(pipeline)))
    }

    /// Build from already constructed components.
    pub fn with_pipeline(
        config: AppConfig,
        registry: Arc<AssetRegistry>,
        pipeline: Arc<CyclePipeline>,
    ) -> Self {
        let schedule = TriggerSchedule::new(config.trigger_set());
        Self {
            config,
            registry,
            pipeline,
            in_flight: InFlightSet::new(),
            schedule,
        }
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Start one cycle attempt per asset.
    ///
    /// Assets whose previous cycle is still running are dropped, not queued.
    /// Returns the handles of the cycles that started.
    pub fn fire(&self) -> Vec<JoinHandle<()>> {
        self.registry
            .assets()
            .iter()
            .filter_map(|asset| self.try_start_cycle(asset.clone()))
            .collect()
    }

    /// Start a cycle for one asset unless one is already running.
    pub fn try_start_cycle(&self, asset: Asset) -> Option<JoinHandle<()>> {
        let asset_label = asset.id.to_string();
        let Some(guard) = self.in_flight.try_acquire(asset.id) else {
            debug!(asset_id = %asset.id, "Previous cycle still running, attempt dropped");
            Metrics::cycle_dropped(&asset_label);
            return None;
        };

        let pipeline = Arc::clone(&self.pipeline);
        Some(tokio::spawn(async move {
            let _guard = guard;
            Metrics::cycle_started(&asset_label);
            let started = Instant::now();

            match pipeline.run_cycle(&asset).await {
                Ok(report) => {
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    Metrics::cycle_completed(&asset_label, elapsed_ms);
                    log_report(asset.id, &report, elapsed_ms);
                }
                Err(e) => {
                    Metrics::cycle_aborted(&asset_label);
                    warn!(asset_id = %asset.id, key = %asset.key, error = %e, "Cycle aborted");
                }
            }
        }))
    }

    /// Run until Ctrl-C. In-flight cycles are not cancelled.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes.
    pub async fn run_until<F>(mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            assets = self.registry.len(),
            triggers = ?self.config.trigger_seconds,
            tick_ms = self.config.tick_interval_ms,
            "Starting keeper"
        );

        let mut tick = tokio::time::interval(self.config.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if self.schedule.should_fire(Utc::now()) {
                        let started = self.fire();
                        debug!(started = started.len(), in_flight = self.in_flight.len(), "Trigger fired");
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(in_flight = self.in_flight.len(), "Shutting down");
        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => error!(error = %e, "Failed to render metrics"),
        }
        Ok(())
    }
}

fn log_report(asset_id: AssetId, report: &CycleReport, elapsed_ms: f64) {
    let processed: u64 = report
        .outcomes
        .iter()
        .map(|o| u64::from(o.processed_count))
        .sum();
    let skipped: u64 = report
        .outcomes
        .iter()
        .map(|o| u64::from(o.skipped_count))
        .sum();
    info!(
        %asset_id,
        price = ?report.price,
        candidates = report.candidates.total(),
        batches = report.outcomes.len(),
        processed,
        skipped,
        elapsed_ms,
        "Cycle complete"
    );
}
