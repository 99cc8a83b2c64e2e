//! Error types for StackPay operations
//!
//! Follows the propagation policy of the client: reads degrade at the call
//! site, writes surface a typed rejection the caller turns into a message.

use thiserror::Error;

/// Core error type for StackPay operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StackPayError {
    /// Wallet popup was dismissed without signing
    #[error("Transaction cancelled by user")]
    UserCancelled,

    /// Input rejected before any submission (bad recipient, amount, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed user input (empty username, unparsable amount)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Decimal amount could not be parsed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Registry has no mapping for the username (explicitly absent)
    #[error("Username not found: {0}")]
    UsernameNotFound(String),

    /// Registry lookup could not be performed (network/transport)
    #[error("Failed to resolve '{input}': {reason}")]
    ResolutionFailed { input: String, reason: String },

    /// Username already registered to another address
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Indexer answered with a non-2xx status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network failure talking to an external service
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Typed value (de)serialization error
    #[error("Clarity codec error: {0}")]
    Codec(String),

    /// Address failed c32check decoding
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// No wallet connected for the requested chain
    #[error("Wallet not connected: {0}")]
    NotConnected(String),

    /// Wallet provider failed to connect
    #[error("Wallet connection failed: {0}")]
    ConnectionFailed(String),

    /// Bridge contract addresses are not configured
    #[error("Missing contract configuration: {0}")]
    MissingContractConfig(String),

    /// No foreign-chain wallet provider available
    #[error("Foreign-chain wallet not installed")]
    WalletNotInstalled,

    /// Foreign wallet is on the wrong network and switching failed
    #[error("Wrong network: expected chain id {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },

    /// Requested bridge amount is under the configured minimum
    #[error("Minimum bridge amount is {minimum}")]
    BelowMinimum { minimum: String },

    /// Source balance is lower than the requested amount
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: String, required: String },

    /// Foreign-chain transaction receipt reported a revert
    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    /// Local persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StackPayError {
    /// Create a resolution failure error
    pub fn resolution_failed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an insufficient balance error from displayable amounts
    pub fn insufficient_balance(
        available: impl std::fmt::Display,
        required: impl std::fmt::Display,
    ) -> Self {
        Self::InsufficientBalance {
            available: available.to_string(),
            required: required.to_string(),
        }
    }

    /// Whether the caller may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResolutionFailed { .. } | Self::Transport(_) | Self::Api { .. }
        )
    }

    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// "Not found" class errors, distinct from transport failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UsernameNotFound(_))
    }
}

impl From<reqwest::Error> for StackPayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StackPayError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<std::io::Error> for StackPayError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
