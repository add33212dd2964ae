//! Batch dispatch for one candidate bucket.
//!
//! Groups are processed strictly in order: execute, verify, then pace. A
//! group that fails for any reason is reported as fully skipped so its ids
//! still reach verification.

use std::sync::Arc;
use std::time::Duration;

use keeper_core::{chunk_ids, AssetId, BatchMode, ExecutionOutcome, PositionId};
use keeper_telemetry::Metrics;
use tracing::{debug, error, info};

use crate::signer::SigningCredential;
use crate::unit::ExecutionUnit;
use crate::verifier::SkipVerifier;

/// One group of ids submitted in a single transaction.
#[derive(Debug, Clone)]
pub struct Batch {
    pub mode: BatchMode,
    pub asset_id: AssetId,
    pub ids: Vec<PositionId>,
    pub credential: Arc<SigningCredential>,
}

impl Batch {
    pub fn new(
        mode: BatchMode,
        asset_id: AssetId,
        ids: Vec<PositionId>,
        credential: Arc<SigningCredential>,
    ) -> Self {
        Self {
            mode,
            asset_id,
            ids,
            credential,
        }
    }

    pub fn first_id(&self) -> Option<PositionId> {
        self.ids.first().copied()
    }

    pub fn last_id(&self) -> Option<PositionId> {
        self.ids.last().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Maximum ids per transaction.
    pub max_ids_per_call: usize,
    /// Pause after every group.
    pub call_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_ids_per_call: 200,
            call_delay: Duration::from_millis(1000),
        }
    }
}

pub struct BatchDispatcher {
    unit: ExecutionUnit,
    verifier: SkipVerifier,
    config: DispatchConfig,
}

impl BatchDispatcher {
    pub fn new(unit: ExecutionUnit, verifier: SkipVerifier, config: DispatchConfig) -> Self {
        Self {
            unit,
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch one bucket. Returns one outcome per group, in order.
    ///
    /// An empty bucket does nothing and does not pace.
    pub async fn dispatch(
        &self,
        mode: BatchMode,
        asset_id: AssetId,
        ids: &[PositionId],
        credential: &Arc<SigningCredential>,
    ) -> Vec<ExecutionOutcome> {
        if ids.is_empty() {
            return Vec::new();
        }

        let groups = chunk_ids(ids, self.config.max_ids_per_call);
        debug!(%asset_id, %mode, total = ids.len(), groups = groups.len(), "Dispatching bucket");

        let mut outcomes = Vec::with_capacity(groups.len());
        for group in groups {
            let batch = Batch::new(mode, asset_id, group.to_vec(), Arc::clone(credential));
            let outcome = self.execute_batch(batch).await;
            self.verifier.verify(&outcome).await;
            outcomes.push(outcome);
            tokio::time::sleep(self.config.call_delay).await;
        }
        outcomes
    }

    async fn execute_batch(&self, batch: Batch) -> ExecutionOutcome {
        let first_id = batch.first_id().unwrap_or_default();
        let last_id = batch.last_id().unwrap_or_default();
        let batch_size = batch.len();
        let mode = batch.mode.as_str();

        match self.unit.run(&batch).await {
            Ok(outcome) => {
                Metrics::batch_outcome(
                    mode,
                    "confirmed",
                    outcome.processed_count,
                    outcome.skipped_count,
                );
                info!(
                    asset_id = %batch.asset_id,
                    mode,
                    first_id,
                    last_id,
                    batch_size,
                    summary = %outcome.summary_line(),
                    "Batch done"
                );
                outcome
            }
            Err(e) => {
                let outcome = ExecutionOutcome::fully_skipped(batch.mode, batch.asset_id, batch.ids);
                Metrics::batch_outcome(mode, "failed", 0, outcome.skipped_count);
                error!(
                    asset_id = %outcome.asset_id,
                    mode,
                    first_id,
                    last_id,
                    batch_size,
                    error = %e,
                    "Batch failed, counting all ids as skipped"
                );
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi;
    use crate::caller::{ContractCaller, MockContractCaller, StaticCallerFactory};
    use keeper_feed::MockMatchingService;
    use tokio::time::Instant;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    struct Harness {
        contract: Arc<MockContractCaller>,
        matching: Arc<MockMatchingService>,
        dispatcher: BatchDispatcher,
        credential: Arc<SigningCredential>,
    }

    fn harness(max_ids_per_call: usize) -> Harness {
        let contract = Arc::new(MockContractCaller::new());
        let matching = Arc::new(MockMatchingService::new());
        let caller: Arc<dyn ContractCaller> = contract.clone();
        let unit = ExecutionUnit::new(
            Arc::new(StaticCallerFactory(caller)),
            Duration::from_secs(120),
        );
        let dispatcher = BatchDispatcher::new(
            unit,
            SkipVerifier::new(matching.clone()),
            DispatchConfig {
                max_ids_per_call,
                call_delay: Duration::from_millis(1000),
            },
        );
        Harness {
            contract,
            matching,
            dispatcher,
            credential: Arc::new(SigningCredential::from_hex(KEY).unwrap()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_in_order_and_paced() {
        let h = harness(2);
        h.contract
            .accept(abi::selector(BatchMode::Limit, false), abi::encode_counts(2, 0));

        let start = Instant::now();
        let outcomes = h
            .dispatcher
            .dispatch(BatchMode::Limit, AssetId(0), &[1, 2, 3, 4, 5], &h.credential)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].ids, vec![1, 2]);
        assert_eq!(outcomes[1].ids, vec![3, 4]);
        assert_eq!(outcomes[2].ids, vec![5]);
        assert_eq!(h.contract.submits().len(), 3);
        // One pause per group, including the last.
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert!(h.matching.verify_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_no_work_no_pacing() {
        let h = harness(200);
        let start = Instant::now();
        let outcomes = h
            .dispatcher
            .dispatch(BatchMode::TakeProfit, AssetId(0), &[], &h.credential)
            .await;
        assert!(outcomes.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(h.contract.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_counts_as_skipped_and_verifies() {
        let h = harness(200);
        h.contract
            .accept(abi::selector(BatchMode::StopLoss, false), abi::encode_counts(3, 0));
        h.contract.fail_submissions("insufficient funds for gas");

        let outcomes = h
            .dispatcher
            .dispatch(BatchMode::StopLoss, AssetId(0), &[10, 11, 12], &h.credential)
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].processed_count, 0);
        assert_eq!(outcomes[0].skipped_count, 3);
        assert_eq!(h.matching.verify_requests(), vec![vec![10, 11, 12]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_unit_counts_as_skipped() {
        let h = harness(200);
        h.contract
            .accept(abi::selector(BatchMode::Liquidation, true), abi::encode_counts(1, 0));
        h.contract.panic_on_submit();

        let outcomes = h
            .dispatcher
            .dispatch(BatchMode::Liquidation, AssetId(4), &[7, 8], &h.credential)
            .await;

        assert_eq!(outcomes[0].skipped_count, 2);
        assert_eq!(h.matching.verify_requests(), vec![vec![7, 8]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contract_skips_trigger_verification() {
        let h = harness(200);
        h.contract
            .accept(abi::selector(BatchMode::TakeProfit, false), abi::encode_counts(1, 2));

        let outcomes = h
            .dispatcher
            .dispatch(BatchMode::TakeProfit, AssetId(0), &[4, 5, 6], &h.credential)
            .await;

        assert_eq!(outcomes[0].processed_count, 1);
        assert_eq!(outcomes[0].skipped_count, 2);
        assert!(outcomes[0].tx_hash.is_some());
        assert_eq!(h.matching.verify_requests(), vec![vec![4, 5, 6]]);
    }
}
