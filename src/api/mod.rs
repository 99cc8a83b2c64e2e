// Chain indexer integration
// Read-only HTTP access to contract state, balances and transaction history

pub mod client;
pub mod types;

pub use client::StacksApiClient;
pub use types::*;
