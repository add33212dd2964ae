//! One-shot batch execution.
//!
//! Runs a single batch through the same execution unit the keeper uses and
//! prints `<operation> → <label>=<n> | skipped=<k>` to stdout. Logs go to
//! stderr. Exits non-zero on failure (after printing the fully skipped line).
//!
//! ```text
//! exec-batch sl "[123,329]" [PK] --addr=0x... --rpc=https://... [--asset=0] [--pk=0x...]
//! ```
//!
//! The signing key is the positional `PK`, then `--pk`, then
//! `KEEPER_KEY_<asset>`, then `KEEPER_PRIVATE_KEY`. The asset defaults to
//! `ASSET_ID`, or 0 when that is unset or not a number.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use keeper_core::{parse_ids, AssetId, BatchMode, ExecutionOutcome};
use keeper_executor::{
    Batch, ExecutionUnit, ReceiptPolicy, SignerCallerFactory, SigningCredential,
};
use keeper_telemetry::LogOutput;

const DEFAULT_RPC_URL: &str = "https://testnet.dplabs-internal.com";
const EXECUTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Execute one limit or close batch against the execution contract
#[derive(Parser, Debug)]
#[command(name = "exec-batch", version, about, long_about = None)]
struct Args {
    /// Batch mode: limit, sl, tp or liq
    mode: BatchMode,

    /// Position ids: JSON array ("[1,2]") or comma list ("1,2")
    ids: String,

    /// Private key (hex); wins over --pk
    #[arg(value_name = "PK")]
    pk_positional: Option<String>,

    /// Execution contract address (falls back to EXECUTOR_ADDR)
    #[arg(long)]
    addr: Option<String>,

    /// JSON-RPC endpoint
    #[arg(long)]
    rpc: Option<String>,

    /// Asset id (falls back to ASSET_ID, then 0)
    #[arg(long)]
    asset: Option<u32>,

    /// Private key (hex)
    #[arg(long)]
    pk: Option<String>,
}

fn resolve_asset(flag: Option<u32>, env: impl Fn(&str) -> Option<String>) -> AssetId {
    let id = flag
        .or_else(|| env("ASSET_ID").and_then(|v| v.trim().parse().ok()))
        .unwrap_or(0);
    AssetId(id)
}

fn resolve_key(
    positional: Option<String>,
    flag: Option<String>,
    asset_id: AssetId,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    positional
        .or(flag)
        .or_else(|| env(&format!("KEEPER_KEY_{asset_id}")))
        .or_else(|| env("KEEPER_PRIVATE_KEY"))
}

#[tokio::main]
async fn main() -> Result<()> {
    keeper_telemetry::init_logging_to(LogOutput::Stderr)?;

    let args = Args::parse();
    let env = |name: &str| std::env::var(name).ok();
    let asset_id = resolve_asset(args.asset, env);
    let ids = parse_ids(&args.ids).context("invalid ids")?;

    let addr = args
        .addr
        .or_else(|| std::env::var("EXECUTOR_ADDR").ok())
        .ok_or_else(|| anyhow!("--addr or EXECUTOR_ADDR is required"))?;
    let contract = addr
        .trim()
        .parse::<Address>()
        .with_context(|| format!("invalid contract address {addr}"))?;
    let rpc = args.rpc.unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

    let key = resolve_key(args.pk_positional, args.pk, asset_id, env)
        .ok_or_else(|| anyhow!("no private key (positional, --pk, KEEPER_KEY_<asset> or KEEPER_PRIVATE_KEY)"))?;
    let credential = Arc::new(SigningCredential::from_hex(&key)?);

    tracing::info!(
        %asset_id,
        mode = %args.mode,
        batch_size = ids.len(),
        signer = %credential.address(),
        "Executing batch"
    );

    let unit = ExecutionUnit::new(
        Arc::new(SignerCallerFactory::rpc(rpc, contract, ReceiptPolicy::default())),
        EXECUTION_TIMEOUT,
    );
    let batch = Batch::new(args.mode, asset_id, ids, credential);

    match unit.run(&batch).await {
        Ok(outcome) => {
            if let Some(tx_hash) = &outcome.tx_hash {
                tracing::info!(%tx_hash, block = ?outcome.confirmed_block, "Confirmed");
            }
            println!("{}", outcome.summary_line());
            Ok(())
        }
        Err(e) => {
            let outcome = ExecutionOutcome::fully_skipped(batch.mode, batch.asset_id, batch.ids);
            println!("{}", outcome.summary_line());
            Err(e.into())
        }
    }
}
