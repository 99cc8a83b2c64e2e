//! Bridge Integration Tests
//!
//! Drives the bridge flow against a scripted EIP-1193 wallet and checks the
//! step sequence, the approve/deposit ordering and the failure paths.
//!
//! Run with: cargo test --test bridge_test -- --nocapture

use async_trait::async_trait;
use serde_json::{json, Value};
use stackpay::bridge::monitor::check_status;
use stackpay::{
    Amount, BridgeConfig, BridgeHistory, BridgeMonitor, BridgeOrchestrator, BridgeStatus,
    BridgeStep, Chain, Eip1193Accounts, Eip1193Provider, StackPayError, Storage, WalletSession,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
const XRESERVE: &str = "0x2222222222222222222222222222222222222222";
const USDC: &str = "0x3333333333333333333333333333333333333333";
const STACKS_RECIPIENT: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
const SEPOLIA: u64 = 11_155_111;

const APPROVE_HASH: &str = "0xaaaa";
const DEPOSIT_HASH: &str = "0xdddd";

// ============================================================================
// Scripted wallet
// ============================================================================

struct FakeWallet {
    chain_id: Mutex<u64>,
    switch_allowed: bool,
    balance: u128,
    allowance: u128,
    /// Receipt status per hash; missing hashes stay pending
    receipts: Mutex<HashMap<String, &'static str>>,
    calls: Mutex<Vec<String>>,
}

impl FakeWallet {
    fn new(balance: u128, allowance: u128) -> Self {
        let receipts = HashMap::from([
            (APPROVE_HASH.to_string(), "0x1"),
            (DEPOSIT_HASH.to_string(), "0x1"),
        ]);
        Self {
            chain_id: Mutex::new(SEPOLIA),
            switch_allowed: true,
            balance,
            allowance,
            receipts: Mutex::new(receipts),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn on_chain(self, chain_id: u64, switch_allowed: bool) -> Self {
        *self.chain_id.lock().unwrap() = chain_id;
        Self {
            switch_allowed,
            ..self
        }
    }

    fn with_receipt(self, hash: &str, status: &'static str) -> Self {
        self.receipts.lock().unwrap().insert(hash.to_string(), status);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn uint_word(value: u128) -> Value {
        json!(format!("0x{:064x}", value))
    }
}

fn selector_of(params: &Value) -> String {
    let data = params[0]["data"].as_str().unwrap_or_default();
    data.trim_start_matches("0x").chars().take(8).collect()
}

#[async_trait]
impl Eip1193Provider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, StackPayError> {
        let label = match method {
            "eth_call" | "eth_sendTransaction" => format!("{}:{}", method, selector_of(&params)),
            _ => method.to_string(),
        };
        self.calls.lock().unwrap().push(label);

        match method {
            "eth_requestAccounts" => Ok(json!([ACCOUNT])),
            "eth_chainId" => Ok(json!(format!("0x{:x}", *self.chain_id.lock().unwrap()))),
            "wallet_switchEthereumChain" => {
                if !self.switch_allowed {
                    return Err(StackPayError::UserCancelled);
                }
                *self.chain_id.lock().unwrap() = SEPOLIA;
                Ok(Value::Null)
            }
            "eth_call" => match selector_of(&params).as_str() {
                "70a08231" => Ok(Self::uint_word(self.balance)),
                "dd62ed3e" => Ok(Self::uint_word(self.allowance)),
                other => Err(StackPayError::Transport(format!("unexpected call {}", other))),
            },
            "eth_sendTransaction" => match selector_of(&params).as_str() {
                "095ea7b3" => Ok(json!(APPROVE_HASH)),
                _ => Ok(json!(DEPOSIT_HASH)),
            },
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default();
                match self.receipts.lock().unwrap().get(hash) {
                    Some(status) => Ok(json!({ "transactionHash": hash, "status": status })),
                    None => Ok(Value::Null),
                }
            }
            other => Err(StackPayError::Transport(format!("unexpected method {}", other))),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        xreserve_address: Some(XRESERVE.to_string()),
        usdc_address: Some(USDC.to_string()),
        receipt_poll_interval: Duration::from_millis(5),
        receipt_max_attempts: 5,
        ..BridgeConfig::default()
    }
}

fn empty_session() -> (Arc<WalletSession>, TempDir) {
    let dir = TempDir::new().unwrap();
    let session = WalletSession::new(Storage::new_with_base_dir(dir.path().to_path_buf()));
    (session, dir)
}

/// Session with the wallet's account connected on the Ethereum side
async fn connected_session(wallet: Arc<FakeWallet>) -> (Arc<WalletSession>, TempDir) {
    let (session, dir) = empty_session();
    session
        .connect(Chain::Ethereum, &Eip1193Accounts::new(wallet))
        .await
        .unwrap();
    (session, dir)
}

struct Harness {
    orchestrator: BridgeOrchestrator,
    steps: Arc<Mutex<Vec<&'static str>>>,
    _dir: TempDir,
}

async fn orchestrator(wallet: Arc<FakeWallet>) -> Harness {
    let (session, dir) = connected_session(wallet.clone()).await;
    let steps = Arc::new(Mutex::new(Vec::new()));
    let seen = steps.clone();
    let orchestrator =
        BridgeOrchestrator::new(bridge_config(), session, Some(wallet as Arc<dyn Eip1193Provider>))
            .on_step(move |step: &BridgeStep| seen.lock().unwrap().push(step.label()));
    Harness {
        orchestrator,
        steps,
        _dir: dir,
    }
}

fn position(calls: &[String], label: &str) -> usize {
    calls
        .iter()
        .position(|c| c == label)
        .unwrap_or_else(|| panic!("{} not called in {:?}", label, calls))
}

// ============================================================================
// Sequencing
// ============================================================================

#[tokio::test]
async fn test_approve_then_deposit_when_allowance_short() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(50_000_000, 0));
    let Harness { orchestrator, steps, _dir } = orchestrator(wallet.clone()).await;

    let hash = orchestrator
        .bridge(Amount::from_whole(10), STACKS_RECIPIENT)
        .await
        .unwrap();
    assert_eq!(hash, DEPOSIT_HASH);

    let calls = wallet.calls();
    let approve = position(&calls, "eth_sendTransaction:095ea7b3");
    let deposit = calls
        .iter()
        .rposition(|c| c.starts_with("eth_sendTransaction:") && !c.ends_with("095ea7b3"))
        .unwrap();
    assert!(approve < deposit, "approve must precede deposit: {:?}", calls);

    // The deposit is only sent once the approve receipt is in
    let approve_receipt = calls[approve..]
        .iter()
        .position(|c| c == "eth_getTransactionReceipt")
        .map(|i| i + approve)
        .unwrap();
    assert!(approve_receipt < deposit);

    let steps = steps.lock().unwrap().clone();
    assert_eq!(steps.first(), Some(&"INIT"));
    assert_eq!(steps.last(), Some(&"POLLING"));
    assert!(steps.contains(&"APPROVE"));
}

#[tokio::test]
async fn test_sufficient_allowance_skips_approve() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(50_000_000, u128::MAX));
    let Harness { orchestrator, steps, _dir } = orchestrator(wallet.clone()).await;

    orchestrator
        .bridge(Amount::from_whole(10), STACKS_RECIPIENT)
        .await
        .unwrap();

    assert!(!wallet.calls().iter().any(|c| c == "eth_sendTransaction:095ea7b3"));
    assert_eq!(
        *steps.lock().unwrap(),
        vec!["INIT", "CHAIN_CHECK", "BALANCE_CHECK", "ALLOWANCE_CHECK", "DEPOSIT", "DEPOSIT", "POLLING"]
    );
}

#[tokio::test]
async fn test_switches_chain_when_needed() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(50_000_000, u128::MAX).on_chain(1, true));
    let Harness { orchestrator, _dir, .. } = orchestrator(wallet.clone()).await;

    orchestrator
        .bridge(Amount::from_whole(2), STACKS_RECIPIENT)
        .await
        .unwrap();
    assert!(wallet.calls().iter().any(|c| c == "wallet_switchEthereumChain"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_wrong_network_when_switch_refused() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(50_000_000, u128::MAX).on_chain(1, false));
    let Harness { orchestrator, _dir, .. } = orchestrator(wallet.clone()).await;

    let err = orchestrator
        .bridge(Amount::from_whole(2), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::WrongNetwork { expected: SEPOLIA, actual: 1 }));
    assert!(!wallet.calls().iter().any(|c| c.starts_with("eth_call")));
}

#[tokio::test]
async fn test_below_minimum_checked_before_balance() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(50_000_000, u128::MAX));
    let Harness { orchestrator, _dir, .. } = orchestrator(wallet.clone()).await;

    let err = orchestrator
        .bridge("0.5".parse().unwrap(), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::BelowMinimum { .. }));
    assert!(!wallet.calls().iter().any(|c| c.starts_with("eth_call")));
}

#[tokio::test]
async fn test_insufficient_source_balance() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(1_000_000, u128::MAX));
    let Harness { orchestrator, _dir, .. } = orchestrator(wallet.clone()).await;

    let err = orchestrator
        .bridge(Amount::from_whole(5), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::InsufficientBalance { .. }));
    assert!(!wallet.calls().iter().any(|c| c.starts_with("eth_sendTransaction")));
}

#[tokio::test]
async fn test_missing_config_and_wallet() {
    init_logging();
    let (session, _dir) = empty_session();

    let unconfigured = BridgeOrchestrator::new(BridgeConfig::default(), session.clone(), None);
    let err = unconfigured
        .bridge(Amount::from_whole(5), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::MissingContractConfig(_)));

    let no_wallet = BridgeOrchestrator::new(bridge_config(), session, None);
    let err = no_wallet
        .bridge(Amount::from_whole(5), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::WalletNotInstalled));
}

#[tokio::test]
async fn test_bridge_requires_connected_ethereum_account() {
    init_logging();
    let wallet = Arc::new(FakeWallet::new(50_000_000, u128::MAX));
    let (session, _dir) = empty_session();
    let orchestrator = BridgeOrchestrator::new(
        bridge_config(),
        session.clone(),
        Some(wallet.clone() as Arc<dyn Eip1193Provider>),
    );

    let err = orchestrator
        .bridge(Amount::from_whole(5), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::NotConnected(ref chain) if chain == "ethereum"));
    assert!(wallet.calls().is_empty());

    // The account comes from the session, not from a fresh wallet prompt
    session
        .connect(Chain::Ethereum, &Eip1193Accounts::new(wallet.clone()))
        .await
        .unwrap();
    orchestrator
        .bridge(Amount::from_whole(5), STACKS_RECIPIENT)
        .await
        .unwrap();
    let prompts = wallet
        .calls()
        .iter()
        .filter(|c| *c == "eth_requestAccounts")
        .count();
    assert_eq!(prompts, 1);
}

#[tokio::test]
async fn test_reverted_deposit_marks_history_failed() {
    init_logging();
    let dir = tempfile::TempDir::new().unwrap();
    let history = BridgeHistory::new(Storage::new_with_base_dir(dir.path().to_path_buf()));

    let wallet = Arc::new(FakeWallet::new(50_000_000, u128::MAX).with_receipt(DEPOSIT_HASH, "0x0"));
    let (session, _session_dir) = connected_session(wallet.clone()).await;
    let orchestrator =
        BridgeOrchestrator::new(bridge_config(), session, Some(wallet as Arc<dyn Eip1193Provider>))
            .with_history(history.clone());

    let err = orchestrator
        .bridge(Amount::from_whole(3), STACKS_RECIPIENT)
        .await
        .unwrap_err();
    assert!(matches!(err, StackPayError::TransactionReverted(ref h) if h == DEPOSIT_HASH));

    let entries = history.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, BridgeStatus::Failed);
    assert_eq!(entries[0].amount, Amount::from_whole(3));
}

// ============================================================================
// Monitoring
// ============================================================================

#[tokio::test]
async fn test_check_status_reads_receipts() {
    let wallet = FakeWallet::new(0, 0).with_receipt("0xbad", "0x0");

    assert_eq!(check_status(&wallet, DEPOSIT_HASH).await, BridgeStatus::Completed);
    assert_eq!(check_status(&wallet, "0xbad").await, BridgeStatus::Failed);
    assert_eq!(check_status(&wallet, "0xunknown").await, BridgeStatus::Pending);
}

#[tokio::test]
async fn test_monitor_stops_on_terminal_status() {
    init_logging();
    let dir = tempfile::TempDir::new().unwrap();
    let history = BridgeHistory::new(Storage::new_with_base_dir(dir.path().to_path_buf()));
    history
        .record(stackpay::BridgeTransfer {
            hash: "0xfeed".to_string(),
            amount: Amount::from_whole(1),
            date: chrono::Utc::now(),
            status: BridgeStatus::Pending,
        })
        .unwrap();

    let wallet = Arc::new(FakeWallet::new(0, 0));
    let monitor = BridgeMonitor::start(
        wallet.clone(),
        "0xfeed",
        Duration::from_millis(10),
        Some(history.clone()),
    );
    let mut updates = monitor.subscribe();

    // Still pending after a few polls
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(monitor.status(), BridgeStatus::Pending);
    assert!(!monitor.is_finished());

    wallet.receipts.lock().unwrap().insert("0xfeed".to_string(), "0x1");
    tokio::time::timeout(Duration::from_secs(2), updates.changed())
        .await
        .expect("monitor reported")
        .unwrap();

    assert_eq!(monitor.status(), BridgeStatus::Completed);
    assert_eq!(history.list().unwrap()[0].status, BridgeStatus::Completed);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(monitor.is_finished());
}
