//! StackPay configuration from environment variables
//!
//! Controls the Stacks indexer endpoint, deployed contract identifiers and
//! the foreign-chain bridge parameters. Defaults to Stacks testnet with the
//! contracts the hosted client is deployed against.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::amount::Amount;
use crate::error::StackPayError;

pub const TESTNET_API_URL: &str = "https://api.testnet.hiro.so";
pub const MAINNET_API_URL: &str = "https://api.hiro.so";

const DEFAULT_TOKEN_CONTRACT: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.usdcx";
const DEFAULT_TOKEN_ASSET: &str = "usdcx-token";
const DEFAULT_PAYMENT_CONTRACT: &str = "ST2Y455NJPETB2SRSD0VDZP3KJE50WNHY0BN3TWY5.payment-requests-v9";
const DEFAULT_USERNAME_CONTRACT: &str = "ST2Y455NJPETB2SRSD0VDZP3KJE50WNHY0BN3TWY5.username-registry";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";

/// Sepolia
pub const DEFAULT_BRIDGE_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_STACKS_DOMAIN: u32 = 10_003;
const DEFAULT_FOREIGN_RPC_URL: &str = "https://ethereum-sepolia.publicnode.com";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StacksNetwork {
    Testnet,
    Mainnet,
}

impl StacksNetwork {
    pub fn default_api_url(&self) -> &'static str {
        match self {
            StacksNetwork::Testnet => TESTNET_API_URL,
            StacksNetwork::Mainnet => MAINNET_API_URL,
        }
    }
}

/// Fully-qualified contract identifier `{address}.{name}`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContractId {
    pub address: String,
    pub name: String,
}

impl ContractId {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl FromStr for ContractId {
    type Err = StackPayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((address, name)) if !address.is_empty() && !name.is_empty() => {
                Ok(Self::new(address, name))
            }
            _ => Err(StackPayError::InvalidInput(format!(
                "expected '<address>.<contract-name>', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.name)
    }
}

/// Which principal's post-condition guards a `claim-payment` call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimGuard {
    /// Payment contract must send exactly the claimed amount
    ContractPrincipal,
    /// No post-condition attached
    None,
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// xReserve bridge contract on the foreign chain
    pub xreserve_address: Option<String>,
    /// Source token (USDC) on the foreign chain
    pub usdc_address: Option<String>,
    /// Destination domain id of the Stacks chain
    pub stacks_domain: u32,
    /// Chain id the foreign wallet must be on
    pub chain_id: u64,
    /// Public RPC used for status polling
    pub rpc_url: String,
    /// Smallest accepted transfer
    pub min_amount: Amount,
    pub poll_interval: Duration,
    /// Receipt polling while waiting for approve/deposit inclusion
    pub receipt_poll_interval: Duration,
    pub receipt_max_attempts: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            xreserve_address: None,
            usdc_address: None,
            stacks_domain: DEFAULT_STACKS_DOMAIN,
            chain_id: DEFAULT_BRIDGE_CHAIN_ID,
            rpc_url: DEFAULT_FOREIGN_RPC_URL.to_string(),
            min_amount: Amount::from_whole(1),
            poll_interval: Duration::from_secs(10),
            receipt_poll_interval: Duration::from_secs(2),
            receipt_max_attempts: 90,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StackPayConfig {
    pub network: StacksNetwork,
    /// Chain indexer base URL
    pub api_url: String,
    /// Fungible token contract (`transfer`, balances)
    pub token_contract: ContractId,
    /// Asset name inside the token contract
    pub token_asset: String,
    pub payment_contract: ContractId,
    pub username_contract: ContractId,
    /// Origin used for `/pay/:paymentId` deep links
    pub app_origin: String,
    pub claim_guard: ClaimGuard,
    /// Local persistence (session, bridge history, mirror)
    pub data_dir: PathBuf,
    pub debounce: Duration,
    /// Page size for transaction-history reads
    pub history_limit: u32,
    pub bridge: BridgeConfig,
}

impl StackPayConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `STACKS_NETWORK`: "testnet" (default) or "mainnet"
    /// - `STACKS_API_URL`: indexer base URL (defaults per network)
    /// - `TOKEN_CONTRACT`, `TOKEN_ASSET`, `PAYMENT_CONTRACT`, `USERNAME_CONTRACT`
    /// - `APP_ORIGIN`: origin embedded in payment links and QR codes
    /// - `CLAIM_POST_CONDITION`: "contract" (default) or "none"
    /// - `STACKPAY_DATA_DIR`, `DEBOUNCE_MS`, `HISTORY_LIMIT`
    /// - `XRESERVE_CONTRACT`, `USDC_CONTRACT`, `STACKS_DOMAIN`,
    ///   `BRIDGE_CHAIN_ID`, `FOREIGN_RPC_URL`, `BRIDGE_MIN_AMOUNT`, `BRIDGE_POLL_SECS`
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Local indexer mock
    /// STACKS_API_URL=http://localhost:3999 cargo run -p stackpay-service
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let network = match env::var("STACKS_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .to_lowercase()
            .as_str()
        {
            "mainnet" => {
                log::info!("Using Stacks MAINNET");
                StacksNetwork::Mainnet
            }
            "testnet" | "" => {
                log::info!("Using Stacks TESTNET");
                StacksNetwork::Testnet
            }
            other => {
                log::warn!("Unknown network '{}', defaulting to testnet", other);
                StacksNetwork::Testnet
            }
        };

        let api_url = env::var("STACKS_API_URL")
            .unwrap_or_else(|_| network.default_api_url().to_string())
            .trim_end_matches('/')
            .to_string();
        log::info!("Stacks API URL: {}", api_url);

        let token_contract = contract_from_env("TOKEN_CONTRACT", defaults.token_contract);
        let payment_contract = contract_from_env("PAYMENT_CONTRACT", defaults.payment_contract);
        let username_contract = contract_from_env("USERNAME_CONTRACT", defaults.username_contract);

        let claim_guard = match env::var("CLAIM_POST_CONDITION").ok().as_deref() {
            Some("none") => ClaimGuard::None,
            Some("contract") | None => ClaimGuard::ContractPrincipal,
            Some(other) => {
                log::warn!("Unknown CLAIM_POST_CONDITION '{}', using 'contract'", other);
                ClaimGuard::ContractPrincipal
            }
        };

        let bridge = BridgeConfig {
            xreserve_address: non_empty_env("XRESERVE_CONTRACT"),
            usdc_address: non_empty_env("USDC_CONTRACT"),
            stacks_domain: parsed_env("STACKS_DOMAIN", defaults.bridge.stacks_domain),
            chain_id: parsed_env("BRIDGE_CHAIN_ID", defaults.bridge.chain_id),
            rpc_url: env::var("FOREIGN_RPC_URL").unwrap_or(defaults.bridge.rpc_url),
            min_amount: parsed_env("BRIDGE_MIN_AMOUNT", defaults.bridge.min_amount),
            poll_interval: Duration::from_secs(parsed_env(
                "BRIDGE_POLL_SECS",
                defaults.bridge.poll_interval.as_secs(),
            )),
            ..defaults.bridge
        };
        if bridge.xreserve_address.is_none() || bridge.usdc_address.is_none() {
            log::warn!("Bridge contracts not configured; bridging will be unavailable");
        }

        Self {
            network,
            api_url,
            token_contract,
            token_asset: env::var("TOKEN_ASSET").unwrap_or(defaults.token_asset),
            payment_contract,
            username_contract,
            app_origin: env::var("APP_ORIGIN")
                .unwrap_or(defaults.app_origin)
                .trim_end_matches('/')
                .to_string(),
            claim_guard,
            data_dir: env::var("STACKPAY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            debounce: Duration::from_millis(parsed_env(
                "DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )),
            history_limit: parsed_env("HISTORY_LIMIT", defaults.history_limit),
            bridge,
        }
    }

    /// `"{contract-address}.{contract-name}::{asset-name}"`, the key of the
    /// token in balance responses and post-conditions
    pub fn asset_identifier(&self) -> String {
        format!("{}::{}", self.token_contract, self.token_asset)
    }

    /// Configuration pointing at a local indexer (for tests)
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }
}

impl Default for StackPayConfig {
    /// Default configuration (testnet)
    fn default() -> Self {
        Self {
            network: StacksNetwork::Testnet,
            api_url: TESTNET_API_URL.to_string(),
            token_contract: split_default(DEFAULT_TOKEN_CONTRACT),
            token_asset: DEFAULT_TOKEN_ASSET.to_string(),
            payment_contract: split_default(DEFAULT_PAYMENT_CONTRACT),
            username_contract: split_default(DEFAULT_USERNAME_CONTRACT),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            claim_guard: ClaimGuard::ContractPrincipal,
            data_dir: PathBuf::from("./stackpay-data"),
            debounce: Duration::from_millis(500),
            history_limit: 50,
            bridge: BridgeConfig::default(),
        }
    }
}

fn split_default(id: &str) -> ContractId {
    let (address, name) = id.split_once('.').unwrap_or((id, ""));
    ContractId::new(address, name)
}

fn contract_from_env(key: &str, default: ContractId) -> ContractId {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            log::warn!("Ignoring {}: {}", key, e);
            default
        }),
        Err(_) => default,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid value '{}' for {}, using default", value, key);
            default
        }),
        Err(_) => default,
    }
}
