//! Contract call resolution and batch execution for the keeper.
//!
//! Components:
//! - [`resolve`]: tiered probing of the execution contract's function shape
//! - [`ContractCaller`]: read-only simulation and signed submission seam
//! - [`ExecutionUnit`]: task-isolated, time-bounded resolve and submit
//! - [`BatchDispatcher`]: chunking, sequencing and pacing of batches
//! - [`SkipVerifier`]: verification requests for skipped positions
//! - [`SigningKeys`]: per-asset signing credential resolution

pub mod abi;
pub mod caller;
pub mod dispatcher;
pub mod error;
pub mod resolver;
pub mod revert;
pub mod signer;
pub mod unit;
pub mod verifier;

pub use caller::{
    await_confirmation, CallFailure, CallerFactory, ContractCaller, MockContractCaller,
    ReceiptPolicy, ReceiptStatus, RpcContractCaller, SerializedCaller, SignerCallerFactory,
    StaticCallerFactory, SubmittedTx,
};
pub use dispatcher::{Batch, BatchDispatcher, DispatchConfig};
pub use error::{ExecutorError, ExecutorResult};
pub use resolver::{resolve, CallResolution, ProbeFailure};
pub use revert::decode_revert_reason;
pub use signer::{parse_keys_by_asset, KeyError, KeySource, SigningCredential, SigningKeys};
pub use unit::ExecutionUnit;
pub use verifier::SkipVerifier;
