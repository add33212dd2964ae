//! Execution unit: isolated resolve and submit of one batch.
//!
//! Each batch runs in its own tokio task bounded by a timeout. The typed
//! result comes back through the join handle; a panic surfaces as a
//! `JoinError` and is reported as [`ExecutorError::ExecutionUnitFailed`].

use std::sync::Arc;
use std::time::Duration;

use keeper_core::{AssetId, BatchMode, ExecutionOutcome, PositionId};
use tracing::info;

use crate::caller::{CallerFactory, ContractCaller};
use crate::dispatcher::Batch;
use crate::error::{ExecutorError, ExecutorResult};
use crate::resolver::resolve;

pub struct ExecutionUnit {
    callers: Arc<dyn CallerFactory>,
    timeout: Duration,
}

impl ExecutionUnit {
    pub fn new(callers: Arc<dyn CallerFactory>, timeout: Duration) -> Self {
        Self { callers, timeout }
    }

    /// Run one batch to a terminal outcome.
    ///
    /// The task is aborted if it outlives the timeout; a transaction that
    /// was already sent is not recalled.
    pub async fn run(&self, batch: &Batch) -> ExecutorResult<ExecutionOutcome> {
        let caller = self.callers.caller_for(&batch.credential)?;
        let mut handle = tokio::spawn(execute(caller, batch.mode, batch.asset_id, batch.ids.clone()));

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                Err(ExecutorError::ExecutionUnitFailed(reason))
            }
            Err(_) => {
                handle.abort();
                Err(ExecutorError::ExecutionTimeout(self.timeout))
            }
        }
    }
}

/// Resolve the signature shape, submit, and build the outcome.
pub async fn execute(
    caller: Arc<dyn ContractCaller>,
    mode: BatchMode,
    asset_id: AssetId,
    ids: Vec<PositionId>,
) -> ExecutorResult<ExecutionOutcome> {
    let resolution = resolve(caller, mode, asset_id, &ids).await?;
    let submitted = resolution
        .submit()
        .await
        .map_err(|failure| ExecutorError::SubmissionFailure(failure.reason))?;

    let batch_size = u32::try_from(ids.len()).unwrap_or(u32::MAX);
    let (processed_count, skipped_count) = match resolution.simulated {
        Some(counts) => (counts.processed, counts.skipped),
        None => (batch_size, 0),
    };

    info!(
        %asset_id,
        %mode,
        variant = %resolution.variant,
        tx_hash = %submitted.tx_hash,
        block = ?submitted.block_number,
        processed = processed_count,
        skipped = skipped_count,
        "Batch confirmed"
    );

    Ok(ExecutionOutcome {
        mode,
        asset_id,
        ids,
        variant: Some(resolution.variant),
        processed_count,
        skipped_count,
        tx_hash: Some(submitted.tx_hash),
        confirmed_block: submitted.block_number,
    })
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
