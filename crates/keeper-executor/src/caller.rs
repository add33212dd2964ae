//! Execution contract call seam.
//!
//! [`ContractCaller`] has two capabilities: a read-only simulation (`eth_call`)
//! used while probing signature shapes, and a signed submission that waits for
//! one confirmation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{Revert, SolError};
use alloy::transports::http::reqwest::{Client, Url};
use alloy::transports::http::Http;
use alloy::transports::TransportError;
use dashmap::DashMap;
use keeper_feed::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::revert::decode_revert_reason;
use crate::signer::SigningCredential;

/// A failed call or submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    /// Decoded reason (for logs).
    pub reason: String,
    /// Raw revert payload, when the node returned one.
    pub revert_data: Option<Bytes>,
}

impl CallFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            revert_data: None,
        }
    }

    /// Failure carrying revert data; the reason is decoded from it.
    pub fn reverted(data: Option<Bytes>, message: &str) -> Self {
        Self {
            reason: decode_revert_reason(data.as_ref().map(|b| &b[..]), message),
            revert_data: data,
        }
    }
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    /// 0x-prefixed transaction hash.
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Bounded confirmation waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_polls: 60,
        }
    }
}

/// Execution contract access bound to one contract address and signer.
pub trait ContractCaller: Send + Sync {
    /// Read-only simulation. Never changes chain state.
    fn call(&self, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, CallFailure>>;

    /// Send a signed transaction and wait for one confirmation.
    fn submit(&self, calldata: Bytes) -> BoxFuture<'_, Result<SubmittedTx, CallFailure>>;
}

/// Hands out callers bound to a signing credential.
pub trait CallerFactory: Send + Sync {
    fn caller_for(&self, credential: &SigningCredential) -> ExecutorResult<Arc<dyn ContractCaller>>;
}

// ============================================================================
// RpcContractCaller
// ============================================================================

/// JSON-RPC caller backed by an alloy provider with a wallet filler.
pub struct RpcContractCaller<P> {
    provider: P,
    contract: Address,
    from: Address,
    receipts: ReceiptPolicy,
}

impl<P> RpcContractCaller<P> {
    pub fn new(provider: P, contract: Address, from: Address, receipts: ReceiptPolicy) -> Self {
        Self {
            provider,
            contract,
            from,
            receipts,
        }
    }

    fn request(&self, calldata: Bytes) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.from)
            .with_to(self.contract)
            .with_input(calldata)
    }
}

/// Connect an HTTP provider signing with `credential`.
pub fn connect_http(
    rpc_url: &str,
    contract: Address,
    credential: &SigningCredential,
    receipts: ReceiptPolicy,
) -> ExecutorResult<Arc<dyn ContractCaller>> {
    let url = rpc_url
        .parse::<Url>()
        .map_err(|e| ExecutorError::Config(format!("Invalid RPC URL {rpc_url}: {e}")))?;
    let wallet = EthereumWallet::from(credential.signer().clone());
    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(wallet)
        .on_http(url);
    Ok(Arc::new(RpcContractCaller::new(
        provider,
        contract,
        credential.address(),
        receipts,
    )))
}

fn rpc_failure(err: TransportError) -> CallFailure {
    match err.as_error_resp() {
        Some(payload) => CallFailure::reverted(payload.as_revert_data(), &payload.message),
        None => CallFailure::new(err.to_string()),
    }
}

impl<P> ContractCaller for RpcContractCaller<P>
where
    P: Provider<Http<Client>> + 'static,
{
    fn call(&self, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, CallFailure>> {
        Box::pin(async move {
            let tx = self.request(calldata);
            self.provider.call(&tx).await.map_err(rpc_failure)
        })
    }

    fn submit(&self, calldata: Bytes) -> BoxFuture<'_, Result<SubmittedTx, CallFailure>> {
        Box::pin(async move {
            let tx = self.request(calldata);
            let pending = self
                .provider
                .send_transaction(tx)
                .await
                .map_err(rpc_failure)?;
            let tx_hash = *pending.tx_hash();
            info!(%tx_hash, contract = %self.contract, "Transaction sent");

            await_confirmation(&tx_hash.to_string(), self.receipts, || async move {
                self.provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .map(|receipt| {
                        receipt.map(|r| ReceiptStatus {
                            success: r.status(),
                            block_number: r.block_number(),
                        })
                    })
                    .map_err(|e| e.to_string())
            })
            .await
        })
    }
}

// ============================================================================
// Confirmation
// ============================================================================

/// What one receipt lookup reported for a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptStatus {
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Poll `lookup` until a receipt appears, at most `policy.max_polls` times.
///
/// A lookup error counts as a pending poll. A receipt with failed status is
/// an on-chain revert.
pub async fn await_confirmation<F, Fut>(
    tx_hash: &str,
    policy: ReceiptPolicy,
    mut lookup: F,
) -> Result<SubmittedTx, CallFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<ReceiptStatus>, String>>,
{
    for attempt in 1..=policy.max_polls {
        match lookup().await {
            Ok(Some(status)) if !status.success => {
                return Err(CallFailure::new(format!(
                    "transaction {tx_hash} reverted on-chain"
                )));
            }
            Ok(Some(status)) => {
                return Ok(SubmittedTx {
                    tx_hash: tx_hash.to_string(),
                    block_number: status.block_number,
                });
            }
            Ok(None) => debug!(tx_hash, attempt, "Receipt pending"),
            Err(e) => warn!(tx_hash, attempt, error = %e, "Receipt poll failed"),
        }
        if attempt < policy.max_polls {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    Err(CallFailure::new(format!(
        "no receipt for {tx_hash} after {} polls",
        policy.max_polls
    )))
}

// ============================================================================
// SerializedCaller
// ============================================================================

/// Lets one submission through at a time.
///
/// Every caller built for a signer address is wrapped in one of these, so
/// two assets sharing a key never race for the same nonce.
pub struct SerializedCaller {
    inner: Arc<dyn ContractCaller>,
    submit_lock: tokio::sync::Mutex<()>,
}

impl SerializedCaller {
    pub fn new(inner: Arc<dyn ContractCaller>) -> Self {
        Self {
            inner,
            submit_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl ContractCaller for SerializedCaller {
    fn call(&self, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, CallFailure>> {
        self.inner.call(calldata)
    }

    fn submit(&self, calldata: Bytes) -> BoxFuture<'_, Result<SubmittedTx, CallFailure>> {
        Box::pin(async move {
            let _turn = self.submit_lock.lock().await;
            self.inner.submit(calldata).await
        })
    }
}

// ============================================================================
// Factories
// ============================================================================

type Connector =
    Box<dyn Fn(&SigningCredential) -> ExecutorResult<Arc<dyn ContractCaller>> + Send + Sync>;

/// Builds one serialized caller per signer address and reuses it.
pub struct SignerCallerFactory {
    connect: Connector,
    cache: DashMap<Address, Arc<dyn ContractCaller>>,
}

impl SignerCallerFactory {
    pub fn new<F>(connect: F) -> Self
    where
        F: Fn(&SigningCredential) -> ExecutorResult<Arc<dyn ContractCaller>> + Send + Sync + 'static,
    {
        Self {
            connect: Box::new(connect),
            cache: DashMap::new(),
        }
    }

    /// HTTP JSON-RPC callers against `contract`.
    pub fn rpc(rpc_url: impl Into<String>, contract: Address, receipts: ReceiptPolicy) -> Self {
        let rpc_url = rpc_url.into();
        Self::new(move |credential| connect_http(&rpc_url, contract, credential, receipts))
    }
}

impl CallerFactory for SignerCallerFactory {
    fn caller_for(&self, credential: &SigningCredential) -> ExecutorResult<Arc<dyn ContractCaller>> {
        let entry = self
            .cache
            .entry(credential.address())
            .or_try_insert_with(|| {
                let inner = (self.connect)(credential)?;
                debug!(signer = %credential.address(), "Caller created");
                Ok::<_, ExecutorError>(Arc::new(SerializedCaller::new(inner)) as Arc<dyn ContractCaller>)
            })?;
        Ok(Arc::clone(entry.value()))
    }
}

/// Returns the same caller for every credential.
pub struct StaticCallerFactory(pub Arc<dyn ContractCaller>);

impl CallerFactory for StaticCallerFactory {
    fn caller_for(&self, _credential: &SigningCredential) -> ExecutorResult<Arc<dyn ContractCaller>> {
        Ok(Arc::clone(&self.0))
    }
}

// ============================================================================
// MockContractCaller
// ============================================================================

/// Scriptable contract for testing.
///
/// Calls whose selector is not accepted revert with `Error(string)`.
#[derive(Debug, Default)]
pub struct MockContractCaller {
    accepted: Mutex<HashMap<[u8; 4], Bytes>>,
    calls: Mutex<Vec<Bytes>>,
    submits: Mutex<Vec<Bytes>>,
    submit_failure: Mutex<Option<String>>,
    submit_delay: Mutex<Option<Duration>>,
    panic_on_submit: AtomicBool,
    call_count: AtomicUsize,
    tx_counter: AtomicU64,
    active_submits: AtomicUsize,
    peak_submits: AtomicUsize,
}

impl MockContractCaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept calls with `selector`, returning `output`.
    pub fn accept(&self, selector: [u8; 4], output: Bytes) {
        self.accepted.lock().insert(selector, output);
    }

    /// Make every submission fail with `reason`.
    pub fn fail_submissions(&self, reason: impl Into<String>) {
        *self.submit_failure.lock() = Some(reason.into());
    }

    /// Make every submission panic.
    pub fn panic_on_submit(&self) {
        self.panic_on_submit.store(true, Ordering::SeqCst);
    }

    /// Delay every submission (simulates slow confirmation).
    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }

    /// Simulations performed, in order.
    pub fn calls(&self) -> Vec<Bytes> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Submissions attempted, in order.
    pub fn submits(&self) -> Vec<Bytes> {
        self.submits.lock().clone()
    }

    /// Most submissions that were ever in progress at the same time.
    pub fn peak_concurrent_submits(&self) -> usize {
        self.peak_submits.load(Ordering::SeqCst)
    }
}

fn selector_of(calldata: &[u8]) -> Option<[u8; 4]> {
    calldata.get(..4).and_then(|s| s.try_into().ok())
}

impl ContractCaller for MockContractCaller {
    fn call(&self, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, CallFailure>> {
        Box::pin(async move {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let accepted = selector_of(&calldata)
                .and_then(|selector| self.accepted.lock().get(&selector).cloned());
            self.calls.lock().push(calldata);
            accepted.ok_or_else(|| {
                let data = Revert {
                    reason: "function selector not recognized".to_string(),
                }
                .abi_encode();
                CallFailure::reverted(Some(Bytes::from(data)), "execution reverted")
            })
        })
    }

    fn submit(&self, calldata: Bytes) -> BoxFuture<'_, Result<SubmittedTx, CallFailure>> {
        Box::pin(async move {
            self.submits.lock().push(calldata);
            if self.panic_on_submit.load(Ordering::SeqCst) {
                panic!("mock submission panicked");
            }
            let active = self.active_submits.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_submits.fetch_max(active, Ordering::SeqCst);
            let delay = *self.submit_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.active_submits.fetch_sub(1, Ordering::SeqCst);
            if let Some(reason) = self.submit_failure.lock().clone() {
                return Err(CallFailure::new(reason));
            }
            let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SubmittedTx {
                tx_hash: format!("0x{n:064x}"),
                block_number: Some(1_000 + n),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn policy(max_polls: u32) -> ReceiptPolicy {
        ReceiptPolicy {
            poll_interval: Duration::from_millis(1000),
            max_polls,
        }
    }

    #[test]
    fn test_reverted_failure_decodes_reason() {
        let data = Revert {
            reason: "below liquidation price".to_string(),
        }
        .abi_encode();
        let failure = CallFailure::reverted(Some(Bytes::from(data.clone())), "execution reverted");
        assert_eq!(failure.reason, "below liquidation price");
        assert_eq!(failure.revert_data, Some(Bytes::from(data)));

        let bare = CallFailure::reverted(None, "insufficient funds");
        assert_eq!(bare.reason, "insufficient funds");
        assert!(bare.revert_data.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_gives_up_after_max_polls() {
        let polls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let err = await_confirmation("0xabc", policy(3), || {
            polls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap_err();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(err.reason, "no receipt for 0xabc after 3 polls");
        // Sleeps between polls only.
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_failed_status_is_revert() {
        let err = await_confirmation("0xdef", policy(5), || async {
            Ok(Some(ReceiptStatus {
                success: false,
                block_number: Some(12),
            }))
        })
        .await
        .unwrap_err();

        assert_eq!(err.reason, "transaction 0xdef reverted on-chain");
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_survives_lookup_errors() {
        let polls = AtomicUsize::new(0);

        let tx = await_confirmation("0x123", policy(5), || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err("connection reset".to_string()),
                    1 => Ok(None),
                    _ => Ok(Some(ReceiptStatus {
                        success: true,
                        block_number: Some(77),
                    })),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(
            tx,
            SubmittedTx {
                tx_hash: "0x123".to_string(),
                block_number: Some(77),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_serialized_caller_submits_one_at_a_time() {
        let mock = Arc::new(MockContractCaller::new());
        mock.set_submit_delay(Duration::from_secs(5));
        let serialized = SerializedCaller::new(mock.clone());

        let (a, b) = tokio::join!(
            serialized.submit(Bytes::from_static(&[1])),
            serialized.submit(Bytes::from_static(&[2]))
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(mock.submits().len(), 2);
        assert_eq!(mock.peak_concurrent_submits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unserialized_submits_overlap() {
        let mock = MockContractCaller::new();
        mock.set_submit_delay(Duration::from_secs(5));

        let _ = tokio::join!(
            mock.submit(Bytes::from_static(&[1])),
            mock.submit(Bytes::from_static(&[2]))
        );

        assert_eq!(mock.peak_concurrent_submits(), 2);
    }

    #[test]
    fn test_signer_factory_reuses_caller_per_address() {
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connects);
        let factory = SignerCallerFactory::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MockContractCaller::new()) as Arc<dyn ContractCaller>)
        });
        let a = SigningCredential::from_hex(KEY_A).unwrap();
        let b = SigningCredential::from_hex(KEY_B).unwrap();

        let first = factory.caller_for(&a).unwrap();
        let again = factory.caller_for(&a).unwrap();
        let other = factory.caller_for(&b).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_signer_factory_connect_error_is_not_cached() {
        let factory = SignerCallerFactory::rpc("not a url", Address::ZERO, ReceiptPolicy::default());
        let credential = SigningCredential::from_hex(KEY_A).unwrap();

        assert!(matches!(
            factory.caller_for(&credential),
            Err(ExecutorError::Config(_))
        ));
        assert!(factory.cache.is_empty());
    }

    #[tokio::test]
    async fn test_mock_reverts_unknown_selector() {
        let mock = MockContractCaller::new();
        mock.accept([1, 2, 3, 4], Bytes::from_static(&[9]));

        let ok = mock.call(Bytes::from_static(&[1, 2, 3, 4, 0])).await.unwrap();
        assert_eq!(ok, Bytes::from_static(&[9]));

        let err = mock.call(Bytes::from_static(&[5, 6, 7, 8])).await.unwrap_err();
        assert_eq!(err.reason, "function selector not recognized");
        assert!(err.revert_data.is_some());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_submissions() {
        let mock = MockContractCaller::new();
        let first = mock.submit(Bytes::from_static(&[1])).await.unwrap();
        assert_eq!(first.block_number, Some(1_001));
        assert_eq!(first.tx_hash.len(), 66);

        mock.fail_submissions("nonce too low");
        let err = mock.submit(Bytes::from_static(&[2])).await.unwrap_err();
        assert_eq!(err.reason, "nonce too low");
        assert_eq!(mock.submits().len(), 2);
    }

    #[test]
    fn test_static_factory_shares_caller() {
        let mock: Arc<dyn ContractCaller> = Arc::new(MockContractCaller::new());
        let factory = StaticCallerFactory(Arc::clone(&mock));
        let credential = SigningCredential::from_hex(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let caller = factory.caller_for(&credential).unwrap();
        assert!(Arc::ptr_eq(&caller, &mock));
    }
}
