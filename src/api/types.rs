//! Chain indexer request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::clarity::ClarityValue;
use crate::error::StackPayError;

// ============================================================================
// Read-only contract calls
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOnlyRequest {
    pub sender: String,
    /// Hex-encoded Clarity values (`0x…`)
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOnlyResponse {
    pub okay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ReadOnlyResponse {
    /// Decoded result; `None` when the call was not okay or returned nothing
    pub fn value(&self) -> Result<Option<ClarityValue>, StackPayError> {
        if !self.okay {
            return Ok(None);
        }
        match &self.result {
            Some(hex) => ClarityValue::from_hex(hex).map(Some),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Balances
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StxBalance {
    pub balance: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FungibleTokenBalance {
    /// Base units as a decimal string
    pub balance: String,
    #[serde(default)]
    pub total_sent: Option<String>,
    #[serde(default)]
    pub total_received: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalancesResponse {
    #[serde(default)]
    pub stx: Option<StxBalance>,
    /// Keyed by `"{contract-address}.{contract-name}::{asset-name}"`
    #[serde(default)]
    pub fungible_tokens: HashMap<String, FungibleTokenBalance>,
}

// ============================================================================
// Transactions
// ============================================================================

/// Page of transaction records; items stay raw so one bad record can be skipped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionListResponse {
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArg {
    #[serde(default)]
    pub hex: String,
    #[serde(default)]
    pub repr: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub arg_type: String,
}

impl FunctionArg {
    pub fn from_value(name: &str, value: &ClarityValue) -> Self {
        Self {
            hex: value.to_hex(),
            repr: value.repr(),
            name: name.to_string(),
            arg_type: value.type_name(),
        }
    }

    /// Decoded value, preferring the hex form over `repr`
    pub fn value(&self) -> Option<ClarityValue> {
        if self.hex.is_empty() {
            return None;
        }
        ClarityValue::from_hex(&self.hex).ok()
    }

    /// String argument (request id, username, memo)
    pub fn as_string(&self) -> Option<String> {
        if let Some(value) = self.value() {
            return value.as_str().map(str::to_string);
        }
        let repr = self.repr.strip_prefix('u').unwrap_or(&self.repr);
        repr.strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .map(str::to_string)
    }

    /// Unsigned integer argument (amounts)
    pub fn as_uint(&self) -> Option<u128> {
        if let Some(value) = self.value() {
            return value.as_uint();
        }
        self.repr.strip_prefix('u')?.parse().ok()
    }

    /// Principal argument (recipient, sender)
    pub fn as_principal(&self) -> Option<String> {
        if let Some(value) = self.value() {
            return value.as_principal();
        }
        self.repr.strip_prefix('\'').map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCallInfo {
    pub contract_id: String,
    pub function_name: String,
    #[serde(default)]
    pub function_args: Vec<FunctionArg>,
}

impl ContractCallInfo {
    pub fn arg(&self, index: usize) -> Option<&FunctionArg> {
        self.function_args.get(index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtTransfer {
    pub asset_identifier: String,
    pub amount: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    pub tx_status: String,
    pub sender_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burn_block_time: Option<i64>,
    /// Mempool entries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_call: Option<ContractCallInfo>,
    #[serde(default)]
    pub ft_transfers: Vec<FtTransfer>,
}

impl Transaction {
    pub fn is_success(&self) -> bool {
        self.tx_status == "success"
    }

    /// Submitted but not yet confirmed
    pub fn is_pending(&self) -> bool {
        self.tx_status == "pending"
    }

    /// Best available timestamp in unix seconds
    pub fn timestamp(&self) -> i64 {
        self.block_time
            .or(self.burn_block_time)
            .or(self.receipt_time)
            .unwrap_or(0)
    }

    /// Contract call targeting `contract_id`
    pub fn call_to(&self, contract_id: &str) -> Option<&ContractCallInfo> {
        self.contract_call
            .as_ref()
            .filter(|call| call.contract_id == contract_id)
    }
}

// ============================================================================
// Contract inspection
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSource {
    pub source: String,
    #[serde(default)]
    pub publish_height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

/// `data_var` and `map_entry` responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse {
    /// Hex-encoded Clarity value
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

impl DataResponse {
    pub fn value(&self) -> Result<ClarityValue, StackPayError> {
        ClarityValue::from_hex(&self.data)
    }
}
