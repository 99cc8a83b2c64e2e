/// Mock-only request/response types
///
/// The indexer read API reuses the client's own wire types
/// (`stackpay::api`); these cover the helper endpoints that seed and mutate
/// the in-memory ledger.

use serde::{Deserialize, Serialize};

/// POST /mock/usernames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUsernameRequest {
    pub username: String,
    pub address: String,
}

/// POST /mock/fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub address: String,
    /// Base units
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundResponse {
    pub address: String,
    pub balance: u64,
}

/// POST /mock/submit: a signed contract call as a wallet would broadcast it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub sender: String,
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    /// Hex-encoded Clarity values
    #[serde(default)]
    pub function_args: Vec<String>,
    /// Leave the transaction in the mempool instead of confirming it
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub tx_id: String,
    pub tx_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub confirmed: usize,
}
