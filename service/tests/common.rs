//! Common test utilities for StackPay service integration tests
//!
//! This module provides shared test infrastructure including:
//! - An indexer mock on an ephemeral port, backed by an in-memory chain
//! - A service router over a temporary data directory
//! - Wallet stand-ins that broadcast straight into the mock chain
#![allow(dead_code)]

use axum_test::TestServer;
use indexer_mock::{ChainSigner, MockChain};
use stackpay::{
    Amount, Chain, FileMirror, RequestManager, StackPayConfig, StacksApiClient, Storage,
    TransferSubmitter, WalletSession,
};
use stackpay_service::api::server::create_router;
use stackpay_service::PaymentService;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const ALICE: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";
pub const BOB: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
pub const CAROL: &str = "ST000000000000000000002AMW42H";

pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Test environment with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub chain: Arc<MockChain>,
    pub config: StackPayConfig,
    pub server: TestServer,
}

impl TestEnvironment {
    pub async fn new() -> anyhow::Result<Self> {
        init_logging();

        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());

        let chain = Arc::new(MockChain::from_config(&StackPayConfig::default()));
        let addr = indexer_mock::spawn(chain.clone()).await?;

        let mut config = StackPayConfig::with_api_url(format!("http://{}", addr));
        config.data_dir = temp_dir.path().to_path_buf();
        config.debounce = Duration::from_millis(10);

        let service = Arc::new(PaymentService::new(config.clone()));
        let server = TestServer::new(create_router(service, &[])).expect("test server");

        Ok(Self {
            temp_dir,
            chain,
            config,
            server,
        })
    }

    /// Seed usernames `alice` and `bob` and fund both addresses
    pub fn seed_users(&self, alice_balance: Amount, bob_balance: Amount) {
        self.chain.register_username("alice", ALICE);
        self.chain.register_username("bob", BOB);
        if !alice_balance.is_zero() {
            self.chain.fund(ALICE, alice_balance.base_units());
        }
        if !bob_balance.is_zero() {
            self.chain.fund(BOB, bob_balance.base_units());
        }
    }

    pub fn api(&self) -> StacksApiClient {
        StacksApiClient::new(&self.config.api_url)
    }

    /// Session connected to `signer`'s account, kept apart from the
    /// service's own documents
    async fn session_for(&self, signer: &ChainSigner) -> Arc<WalletSession> {
        let dir = self.temp_dir.path().join(format!("wallet-{}", signer.sender()));
        let session = WalletSession::new(Storage::new_with_base_dir(dir));
        session
            .connect(Chain::Stacks, signer)
            .await
            .expect("connect wallet");
        session
    }

    async fn wallet_requests(&self, signer: ChainSigner) -> RequestManager {
        let session = self.session_for(&signer).await;
        RequestManager::new(&self.config, self.api()).with_wallet(session, Arc::new(signer))
    }

    /// Request writes signed as `address`
    pub async fn requests_as(&self, address: &str) -> RequestManager {
        self.wallet_requests(ChainSigner::new(self.chain.clone(), address))
            .await
    }

    /// Request writes signed as `address` that stay in the mempool
    pub async fn pending_requests_as(&self, address: &str) -> RequestManager {
        self.wallet_requests(ChainSigner::new(self.chain.clone(), address).pending())
            .await
    }

    /// Request writes signed as `address` that also land in the service's mirror
    pub async fn mirrored_requests_as(&self, address: &str) -> RequestManager {
        let mirror = FileMirror::new(Storage::new_with_base_dir(self.config.data_dir.clone()));
        self.requests_as(address).await.with_mirror(Arc::new(mirror))
    }

    pub async fn transfers_as(&self, address: &str) -> TransferSubmitter {
        let signer = ChainSigner::new(self.chain.clone(), address);
        let session = self.session_for(&signer).await;
        TransferSubmitter::new(&self.config, session, Arc::new(signer))
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        log::info!("🧹 Cleaning up test environment at {:?}", self.temp_dir.path());
    }
}
