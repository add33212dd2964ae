//! Verification requests for skipped positions.

use std::sync::Arc;

use keeper_core::ExecutionOutcome;
use keeper_feed::MatchingService;
use keeper_telemetry::Metrics;
use tracing::{info, warn};

/// Asks the matching service to re-check a batch the contract partly skipped.
pub struct SkipVerifier {
    service: Arc<dyn MatchingService>,
}

impl SkipVerifier {
    pub fn new(service: Arc<dyn MatchingService>) -> Self {
        Self { service }
    }

    /// Send one verification request naming the batch's ids when anything
    /// was skipped. Errors are logged, never returned.
    ///
    /// Returns whether a request was attempted.
    pub async fn verify(&self, outcome: &ExecutionOutcome) -> bool {
        if !outcome.needs_verification() || outcome.ids.is_empty() {
            return false;
        }

        let ids = outcome.ids.clone();
        let batch_size = ids.len();
        match self.service.verify(ids).await {
            Ok(()) => {
                Metrics::verification_sent();
                info!(
                    asset_id = %outcome.asset_id,
                    mode = %outcome.mode,
                    skipped = outcome.skipped_count,
                    batch_size,
                    "Verification requested"
                );
            }
            Err(e) => {
                Metrics::verification_failed();
                warn!(
                    asset_id = %outcome.asset_id,
                    mode = %outcome.mode,
                    batch_size,
                    error = %e,
                    "Verification request failed"
                );
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_core::{AssetId, BatchMode};
    use keeper_feed::MockMatchingService;

    #[tokio::test]
    async fn test_skipped_triggers_one_request() {
        let mock = Arc::new(MockMatchingService::new());
        let verifier = SkipVerifier::new(mock.clone());

        let outcome = ExecutionOutcome::fully_skipped(BatchMode::StopLoss, AssetId(0), vec![10, 11, 12]);
        assert!(verifier.verify(&outcome).await);
        assert_eq!(mock.verify_requests(), vec![vec![10, 11, 12]]);
    }

    #[tokio::test]
    async fn test_nothing_skipped_no_request() {
        let mock = Arc::new(MockMatchingService::new());
        let verifier = SkipVerifier::new(mock.clone());

        let mut outcome = ExecutionOutcome::fully_skipped(BatchMode::Limit, AssetId(0), vec![1, 2]);
        outcome.processed_count = 2;
        outcome.skipped_count = 0;
        assert!(!verifier.verify(&outcome).await);
        assert!(mock.verify_requests().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let mock = Arc::new(MockMatchingService::new());
        mock.fail_verify(true);
        let verifier = SkipVerifier::new(mock.clone());

        let outcome = ExecutionOutcome::fully_skipped(BatchMode::Liquidation, AssetId(3), vec![4]);
        assert!(verifier.verify(&outcome).await);
        assert_eq!(mock.verify_requests().len(), 1);
    }
}
