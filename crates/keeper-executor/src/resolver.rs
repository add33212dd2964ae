//! Signature shape resolution.
//!
//! Tiers are probed in fixed order with read-only calls, each exactly once:
//!
//! | Tier | Ids         | Probe                              |
//! |------|-------------|------------------------------------|
//! | 1    | `uint32[]`  | simulate and decode `(u32, u32)`   |
//! | 2    | `uint256[]` | simulate and decode `(u32, u32)`   |
//! | 3    | `uint32[]`  | plain call, success = no revert    |
//! | 4    | `uint256[]` | plain call, success = no revert    |
//!
//! The first tier that succeeds is bound for submission. No transaction is
//! sent while probing.

use std::sync::Arc;

use alloy::primitives::Bytes;
use keeper_core::{AssetId, BatchMode, PositionId, SignatureVariant, SimulatedCounts};
use keeper_telemetry::Metrics;
use tracing::{debug, warn};

use crate::abi;
use crate::caller::{CallFailure, ContractCaller, SubmittedTx};
use crate::error::{ExecutorError, ExecutorResult};

/// A tier that was tried and rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub variant: SignatureVariant,
    pub reason: String,
}

/// Accepted shape, bound to its calldata and caller.
pub struct CallResolution {
    pub variant: SignatureVariant,
    pub calldata: Bytes,
    /// Counts from the simulation (tiers 1 and 2 only).
    pub simulated: Option<SimulatedCounts>,
    /// Tiers rejected before this one, in order.
    pub failed_probes: Vec<ProbeFailure>,
    caller: Arc<dyn ContractCaller>,
}

impl std::fmt::Debug for CallResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallResolution")
            .field("variant", &self.variant)
            .field("simulated", &self.simulated)
            .field("failed_probes", &self.failed_probes)
            .finish_non_exhaustive()
    }
}

impl CallResolution {
    /// Send the bound call as a signed transaction.
    pub async fn submit(&self) -> Result<SubmittedTx, CallFailure> {
        self.caller.submit(self.calldata.clone()).await
    }
}

/// Find the first shape the contract accepts for this batch.
pub async fn resolve(
    caller: Arc<dyn ContractCaller>,
    mode: BatchMode,
    asset_id: AssetId,
    ids: &[PositionId],
) -> ExecutorResult<CallResolution> {
    let operation = mode.operation();
    let mut failed_probes: Vec<ProbeFailure> = Vec::new();

    for variant in SignatureVariant::TIERS {
        let calldata = match abi::encode_call(mode, asset_id, ids, variant) {
            Ok(calldata) => calldata,
            Err(reason) => {
                debug!(%asset_id, %mode, tier = variant.tier(), %reason, "Tier not encodable");
                failed_probes.push(ProbeFailure { variant, reason });
                continue;
            }
        };

        let probe = match caller.call(calldata.clone()).await {
            Ok(output) if variant.has_returns() => abi::decode_counts(mode, &output).map(Some),
            Ok(_) => Ok(None),
            Err(failure) => Err(failure.reason),
        };

        match probe {
            Ok(simulated) => {
                debug!(
                    %asset_id,
                    %mode,
                    operation,
                    tier = variant.tier(),
                    variant = %variant,
                    ?simulated,
                    "Signature resolved"
                );
                Metrics::abi_resolved(operation, &variant.tier().to_string());
                return Ok(CallResolution {
                    variant,
                    calldata,
                    simulated,
                    failed_probes,
                    caller,
                });
            }
            Err(reason) => {
                debug!(%asset_id, %mode, tier = variant.tier(), %reason, "Tier rejected");
                failed_probes.push(ProbeFailure { variant, reason });
            }
        }
    }

    let reason = failed_probes
        .last()
        .map(|f| f.reason.clone())
        .unwrap_or_default();
    warn!(%asset_id, %mode, operation, %reason, "No compatible signature");
    Metrics::abi_resolved(operation, "none");
    Err(ExecutorError::NoCompatibleSignature { operation, reason })
}
