//! Execution contract ABI.
//!
//! The deployed contract may take ids as `uint32[]` (narrow) or `uint256[]`
//! (wide), and may or may not declare `(processed, skipped)` return values.
//! Return declarations do not change the selector, so each operation has two
//! selectors and four shapes.

use alloy::primitives::{Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use keeper_core::{AssetId, BatchMode, PositionId, SignatureVariant, SimulatedCounts};

sol! {
    interface IExecNarrow {
        function execLimits(uint32 assetId, uint32[] ids) external returns (uint32 executed, uint32 skipped);
        function closeBatch(uint32 assetId, uint8 reason, uint32[] ids) external returns (uint32 closed, uint32 skipped);
    }

    interface IExecWide {
        function execLimits(uint32 assetId, uint256[] ids) external returns (uint32 executed, uint32 skipped);
        function closeBatch(uint32 assetId, uint8 reason, uint256[] ids) external returns (uint32 closed, uint32 skipped);
    }
}

/// Function selector for `mode` with narrow or wide id arrays.
pub fn selector(mode: BatchMode, wide: bool) -> [u8; 4] {
    match (mode.reason_code(), wide) {
        (None, false) => IExecNarrow::execLimitsCall::SELECTOR,
        (None, true) => IExecWide::execLimitsCall::SELECTOR,
        (Some(_), false) => IExecNarrow::closeBatchCall::SELECTOR,
        (Some(_), true) => IExecWide::closeBatchCall::SELECTOR,
    }
}

/// Encode calldata for one batch in the given shape.
///
/// Fails only for narrow shapes when an id does not fit in `uint32`.
pub fn encode_call(
    mode: BatchMode,
    asset_id: AssetId,
    ids: &[PositionId],
    variant: SignatureVariant,
) -> Result<Bytes, String> {
    let asset = asset_id.index();
    let encoded = if variant.is_wide() {
        let ids: Vec<U256> = ids.iter().map(|&id| U256::from(id)).collect();
        match mode.reason_code() {
            None => IExecWide::execLimitsCall { assetId: asset, ids }.abi_encode(),
            Some(reason) => IExecWide::closeBatchCall {
                assetId: asset,
                reason,
                ids,
            }
            .abi_encode(),
        }
    } else {
        let ids = narrow_ids(ids)?;
        match mode.reason_code() {
            None => IExecNarrow::execLimitsCall { assetId: asset, ids }.abi_encode(),
            Some(reason) => IExecNarrow::closeBatchCall {
                assetId: asset,
                reason,
                ids,
            }
            .abi_encode(),
        }
    };
    Ok(Bytes::from(encoded))
}

/// Decode `(processed, skipped)` from a simulation result.
pub fn decode_counts(mode: BatchMode, data: &[u8]) -> Result<SimulatedCounts, String> {
    // Return layout is identical for both id widths.
    let counts = match mode.reason_code() {
        None => IExecNarrow::execLimitsCall::abi_decode_returns(data, true).map(|r| {
            SimulatedCounts {
                processed: r.executed,
                skipped: r.skipped,
            }
        }),
        Some(_) => IExecNarrow::closeBatchCall::abi_decode_returns(data, true).map(|r| {
            SimulatedCounts {
                processed: r.closed,
                skipped: r.skipped,
            }
        }),
    };
    counts.map_err(|e| format!("cannot decode return values: {e}"))
}

/// ABI-encoded `(processed, skipped)` as the contract would return it.
pub fn encode_counts(processed: u32, skipped: u32) -> Bytes {
    Bytes::from(IExecNarrow::execLimitsCall::abi_encode_returns(&(
        processed, skipped,
    )))
}

fn narrow_ids(ids: &[PositionId]) -> Result<Vec<u32>, String> {
    ids.iter()
        .map(|&id| u32::try_from(id).map_err(|_| "id out of uint32 range".to_string()))
        .collect()
}
