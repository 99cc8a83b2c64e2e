use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use stackpay::history::{HistoryFilter, HistoryItem, HistoryStats};
use stackpay::mirror::MirroredRequest;
use stackpay::signer::ContractCall;
use stackpay::{Availability, ClaimAction, PaymentRequest};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub input: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    /// Decimal form, e.g. `"12.5"`
    pub balance: String,
    pub base_units: u64,
    pub asset: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub address: String,
    pub filter: HistoryFilter,
    pub items: Vec<HistoryItem>,
    pub stats: HistoryStats,
    /// Username by counterparty address
    pub labels: BTreeMap<String, String>,
    pub pending_claims: Vec<MirroredRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request: PaymentRequest,
    pub payment_url: String,
}

#[derive(Debug, Deserialize)]
pub struct QrDecodeRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrDecodeResponse {
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub username: String,
    pub availability: Availability,
}

// ============================================================================
// Prepare endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PrepareTransferRequest {
    pub sender: String,
    /// `@username` or address
    pub recipient: String,
    /// Decimal token amount
    pub amount: String,
}

/// Escrow and invoice creation
#[derive(Debug, Deserialize)]
pub struct PrepareRequestRequest {
    pub creator: String,
    /// Escrow: who may claim. Invoice: who is asked to pay.
    pub recipient: String,
    pub amount: String,
    #[serde(default)]
    pub memo: Option<String>,
    /// Generated when absent
    #[serde(default)]
    pub id: Option<String>,
}

/// Claim, pay-invoice and cancel
#[derive(Debug, Deserialize)]
pub struct PrepareSettleRequest {
    pub id: String,
    /// Connected wallet address
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct PrepareUsernameRequest {
    pub username: String,
    pub address: String,
}

/// Unsigned call plus whatever the client needs to follow up
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedCall {
    pub call: ContractCall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ClaimAction>,
}

impl PreparedCall {
    pub fn new(call: ContractCall) -> Self {
        Self {
            call,
            recipient: None,
            request_id: None,
            payment_url: None,
            action: None,
        }
    }
}
