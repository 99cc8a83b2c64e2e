//! Foreign-chain (EVM) plumbing: the EIP-1193 request seam, a JSON-RPC
//! provider, and ABI calldata for the handful of functions the bridge needs.

use async_trait::async_trait;
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::{Address, U256};
use ethers_core::utils::keccak256;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::StackPayError;
use crate::session::WalletProvider;

/// EIP-1193 `request({ method, params })`
///
/// Wallet implementations surface user rejection (code 4001) as
/// `StackPayError::UserCancelled`.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, StackPayError>;
}

/// Plain JSON-RPC over HTTP; suitable for reads and receipt polling
#[derive(Debug)]
pub struct HttpRpcProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpRpcProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Eip1193Provider for HttpRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, StackPayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        log::debug!("RPC {} -> {}", method, self.url);

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StackPayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut payload: Value = response.json().await?;
        if let Some(error) = payload.get("error") {
            if error.get("code").and_then(Value::as_i64) == Some(4001) {
                return Err(StackPayError::UserCancelled);
            }
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error");
            return Err(StackPayError::Transport(format!("{}: {}", method, message)));
        }
        Ok(payload["result"].take())
    }
}

/// Connects the Ethereum side of a [`crate::WalletSession`] through an
/// EIP-1193 wallet's `eth_requestAccounts` prompt
pub struct Eip1193Accounts {
    wallet: Arc<dyn Eip1193Provider>,
}

impl Eip1193Accounts {
    pub fn new(wallet: Arc<dyn Eip1193Provider>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletProvider for Eip1193Accounts {
    async fn connect(&self) -> Result<String, StackPayError> {
        let accounts = self.wallet.request("eth_requestAccounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StackPayError::ConnectionFailed("wallet returned no accounts".to_string()))
    }
}

// ============================================================================
// ABI encoding
// ============================================================================

/// First four bytes of keccak256 of the canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `0x`-prefixed 20-byte address
pub fn parse_address(text: &str) -> Result<Address, StackPayError> {
    let invalid = || StackPayError::InvalidAddress(text.to_string());
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    if digits.len() != 40 {
        return Err(invalid());
    }
    digits.parse::<Address>().map_err(|_| invalid())
}

fn call_data(signature: &str, tokens: &[Token]) -> String {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&abi::encode(tokens));
    format!("0x{}", hex::encode(data))
}

/// Decode a single `uint256` return value
pub fn decode_uint(result: &Value) -> Result<U256, StackPayError> {
    let text = result
        .as_str()
        .ok_or_else(|| StackPayError::InvalidResponse(format!("expected hex string, got {}", result)))?;
    let digits = text.trim_start_matches("0x");
    // Calls against an address without code come back empty
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    let bytes = hex::decode(digits).map_err(|e| StackPayError::InvalidResponse(e.to_string()))?;

    abi::decode(&[ParamType::Uint(256)], &bytes)
        .map_err(|e| StackPayError::InvalidResponse(format!("bad uint256 {}: {}", text, e)))?
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| StackPayError::InvalidResponse(format!("bad uint256 {}", text)))
}

/// Parse a `0x…` quantity (chain id, status)
pub fn decode_quantity(value: &Value) -> Result<u64, StackPayError> {
    let text = value
        .as_str()
        .ok_or_else(|| StackPayError::InvalidResponse(format!("expected quantity, got {}", value)))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| StackPayError::InvalidResponse(format!("bad quantity {}: {}", text, e)))
}

pub fn quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// ERC-20 calls on the source token
pub struct Erc20;

impl Erc20 {
    pub fn balance_of(owner: Address) -> String {
        call_data("balanceOf(address)", &[Token::Address(owner)])
    }

    pub fn allowance(owner: Address, spender: Address) -> String {
        call_data(
            "allowance(address,address)",
            &[Token::Address(owner), Token::Address(spender)],
        )
    }

    pub fn approve(spender: Address, amount: U256) -> String {
        call_data(
            "approve(address,uint256)",
            &[Token::Address(spender), Token::Uint(amount)],
        )
    }
}

/// xReserve bridge contract
pub struct XReserve;

impl XReserve {
    /// `depositToRemote(uint256 value, uint32 remoteDomain, bytes32
    /// remoteRecipient, address localToken, uint256 maxFee, bytes hookData)`
    pub fn deposit_to_remote(
        value: U256,
        remote_domain: u32,
        remote_recipient: [u8; 32],
        local_token: Address,
        max_fee: U256,
        hook_data: &[u8],
    ) -> String {
        call_data(
            "depositToRemote(uint256,uint32,bytes32,address,uint256,bytes)",
            &[
                Token::Uint(value),
                Token::Uint(U256::from(remote_domain)),
                Token::FixedBytes(remote_recipient.to_vec()),
                Token::Address(local_token),
                Token::Uint(max_fee),
                Token::Bytes(hook_data.to_vec()),
            ],
        )
    }
}

/// `Some(true)` success, `Some(false)` reverted, `None` not yet mined
pub fn receipt_status(receipt: &Value) -> Option<bool> {
    if receipt.is_null() {
        return None;
    }
    match receipt.get("status").and_then(Value::as_str) {
        Some("0x1") => Some(true),
        Some("0x0") => Some(false),
        _ => None,
    }
}
