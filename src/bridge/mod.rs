//! Cross-chain bridge (Ethereum Sepolia → Stacks via xReserve)
//!
//! The orchestrator walks the user's foreign wallet through the approve and
//! deposit transactions; the monitor polls the deposit receipt afterwards;
//! the history keeps a local list of bridged transfers.

pub mod evm;
pub mod history;
pub mod monitor;
pub mod orchestrator;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::c32::c32_address_decode;
use crate::error::StackPayError;

pub use evm::{Eip1193Accounts, Eip1193Provider, HttpRpcProvider};
pub use history::{BridgeHistory, BridgeTransfer};
pub use monitor::BridgeMonitor;
pub use orchestrator::BridgeOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Pending,
    Completed,
    Failed,
}

impl BridgeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Progress of a single bridge attempt, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStep {
    Init,
    ChainCheck,
    BalanceCheck,
    AllowanceCheck,
    Approve { tx_hash: Option<String> },
    Deposit { tx_hash: Option<String> },
    Polling { tx_hash: String },
}

impl BridgeStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::ChainCheck => "CHAIN_CHECK",
            Self::BalanceCheck => "BALANCE_CHECK",
            Self::AllowanceCheck => "ALLOWANCE_CHECK",
            Self::Approve { .. } => "APPROVE",
            Self::Deposit { .. } => "DEPOSIT",
            Self::Polling { .. } => "POLLING",
        }
    }
}

/// Encode a Stacks address as the 32-byte remote recipient:
/// 11 zero bytes, the c32 version byte, then the 20-byte hash160.
pub fn encode_remote_recipient(stacks_address: &str) -> Result<[u8; 32], StackPayError> {
    let (version, hash160) = c32_address_decode(stacks_address.trim())?;
    let mut out = [0u8; 32];
    out[11] = version;
    out[12..].copy_from_slice(&hash160);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c32::{c32_address, VERSION_TESTNET_SINGLESIG};

    #[test]
    fn test_remote_recipient_layout() {
        let hash = [0xabu8; 20];
        let address = c32_address(VERSION_TESTNET_SINGLESIG, &hash);
        let encoded = encode_remote_recipient(&address).unwrap();

        assert!(encoded[..11].iter().all(|b| *b == 0));
        assert_eq!(encoded[11], VERSION_TESTNET_SINGLESIG);
        assert_eq!(&encoded[12..], &hash);
    }

    #[test]
    fn test_remote_recipient_rejects_garbage() {
        assert!(encode_remote_recipient("not-an-address").is_err());
        assert!(encode_remote_recipient("@alice").is_err());
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(BridgeStep::Init.label(), "INIT");
        assert_eq!(BridgeStep::Approve { tx_hash: None }.label(), "APPROVE");
        assert!(BridgeStatus::Failed.is_terminal());
        assert!(!BridgeStatus::Pending.is_terminal());
    }
}
