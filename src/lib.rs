//! StackPay: peer-to-peer token payments on Stacks
//!
//! This crate provides the client-side core of a payments app on the
//! Stacks chain: resolving `@usernames` to addresses, reading balances,
//! submitting token transfers, creating and settling escrow and invoice
//! payment requests, reconstructing history from the chain indexer, and
//! bridging USDC in from Ethereum Sepolia through xReserve.
//!
//! # Architecture
//!
//! - **Chain indexer client**: read-only contract calls, balances and
//!   transaction history over HTTP
//! - **Signer seam**: every write is a `ContractCall` handed to a
//!   `ContractCallSigner`, which returns the transaction id
//! - **Wallet session**: the connected addresses live in one shared
//!   `WalletSession`; writes read their signer address from it
//! - **Reconciliation**: request status is derived from transaction history,
//!   never stored as the source of truth
//! - **Bridge**: EIP-1193 wallet flow (approve, deposit) plus a receipt monitor
//!
//! # Example
//!
//! ```ignore
//! use stackpay::{
//!     Amount, Chain, Resolver, StackPayConfig, StacksApiClient, Storage, TransferSubmitter,
//!     WalletSession,
//! };
//!
//! let config = StackPayConfig::from_env();
//! let api = StacksApiClient::new(&config.api_url);
//! let resolver = Resolver::new(api.clone(), config.username_contract.clone());
//!
//! let session = WalletSession::restore(Storage::new_with_base_dir(config.data_dir.clone()))?;
//! session.connect(Chain::Stacks, &wallet).await?;
//!
//! let recipient = resolver.resolve("@bob").await?;
//! let submitter = TransferSubmitter::new(&config, session.clone(), signer);
//! let tx_id = submitter.send(&recipient, "12.5".parse::<Amount>()?).await?;
//! ```

// Public modules
pub mod amount;
pub mod api;
pub mod balance;
pub mod bridge;
pub mod c32;
pub mod clarity;
pub mod config;
pub mod debounce;
pub mod error;
pub mod history;
pub mod ledger;
pub mod mirror;
pub mod qr;
pub mod requests;
pub mod resolver;
pub mod session;
pub mod signer;
pub mod storage;
pub mod transfer;
pub mod username;

// Re-exports for convenience
pub use amount::Amount;
pub use api::StacksApiClient;
pub use balance::BalanceReader;
pub use bridge::{
    encode_remote_recipient, BridgeHistory, BridgeMonitor, BridgeOrchestrator, BridgeStatus,
    BridgeStep, BridgeTransfer, Eip1193Accounts, Eip1193Provider, HttpRpcProvider,
};
pub use clarity::ClarityValue;
pub use config::{BridgeConfig, ClaimGuard, ContractId, StackPayConfig, StacksNetwork};
pub use debounce::{Debouncer, RecipientStatus, RecipientValidator};
pub use error::StackPayError;
pub use history::{
    build_history, derive_request_statuses, Direction, HistoryContracts, HistoryFilter,
    HistoryItem, HistoryService, HistoryStats, HistoryView,
};
pub use ledger::{PaymentLedger, PaymentRecord};
pub use mirror::{FileMirror, MirrorError, MirroredRequest, NoMirror, RequestMirror};
pub use qr::{build_payment_url, parse_payment_id};
pub use requests::{
    ClaimAction, PaymentRequest, RequestCalls, RequestKind, RequestManager, RequestStatus,
};
pub use resolver::Resolver;
pub use session::{Chain, ConnectionState, WalletProvider, WalletSession};
pub use signer::{ContractCall, ContractCallSigner, PostConditionMode};
pub use storage::Storage;
pub use transfer::{validate_transfer, TransferSubmitter};
pub use username::{Availability, UsernameRegistry};

// Common result type
pub type Result<T> = std::result::Result<T, StackPayError>;
