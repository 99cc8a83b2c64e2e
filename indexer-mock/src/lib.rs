/// Chain Indexer Mock Library
///
/// This crate provides both a standalone binary and library components
/// for mocking the Stacks chain indexer API with an in-memory ledger.

pub mod chain;
pub mod handlers;
pub mod server;
pub mod signer;
pub mod types;

// Re-export commonly used types
pub use chain::{MockChain, MockContracts};
pub use server::{create_router, run_server, spawn};
pub use signer::ChainSigner;
pub use types::*;
