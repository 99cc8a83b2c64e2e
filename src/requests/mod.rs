//! Payment requests
//!
//! Escrow requests lock funds in the payment contract at creation and are
//! claimed by the recipient; invoice requests record the ask only and move
//! funds when a payer pays. The authoritative copy lives on-chain.

pub mod builders;
pub mod manager;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;
use crate::clarity::ClarityValue;
use crate::error::StackPayError;

pub use builders::RequestCalls;
pub use manager::RequestManager;

pub const DEFAULT_ESCROW_MEMO: &str = "Payment Request";
pub const DEFAULT_INVOICE_MEMO: &str = "Invoice Request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Escrow,
    Invoice,
}

impl RequestKind {
    pub fn default_memo(&self) -> &'static str {
        match self {
            Self::Escrow => DEFAULT_ESCROW_MEMO,
            Self::Invoice => DEFAULT_INVOICE_MEMO,
        }
    }
}

impl FromStr for RequestKind {
    type Err = StackPayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "escrow" => Ok(Self::Escrow),
            "invoice" => Ok(Self::Invoice),
            other => Err(StackPayError::InvalidInput(format!("unknown request type '{}'", other))),
        }
    }
}

/// `pending` is the only non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    Paid,
    Cancelled,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Apply an observed transition; terminal states never revert
    pub fn advance(self, next: RequestStatus) -> RequestStatus {
        if self.is_terminal() {
            self
        } else {
            next
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: String,
    pub creator: String,
    pub recipient: String,
    pub amount: Amount,
    pub memo: String,
    pub kind: RequestKind,
    pub status: RequestStatus,
}

impl PaymentRequest {
    /// Decode the `get-payment-request` tuple
    ///
    /// Tolerates the contract versions seen in the wild: the kind comes from
    /// an optional `is-invoice` flag or `request-type` string, the status from
    /// an optional `status` string or the `claimed` flag.
    pub fn from_clarity(id: &str, value: &ClarityValue) -> Result<Self, StackPayError> {
        let tuple = value
            .unwrap_present()
            .ok_or_else(|| StackPayError::InvalidResponse("empty payment request".to_string()))?;

        let field = |name: &str| {
            tuple
                .tuple_field(name)
                .ok_or_else(|| StackPayError::InvalidResponse(format!("payment request missing '{}'", name)))
        };

        let creator = field("creator")?
            .as_principal()
            .ok_or_else(|| StackPayError::InvalidResponse("creator is not a principal".to_string()))?;
        let recipient = field("recipient")?
            .as_principal()
            .ok_or_else(|| StackPayError::InvalidResponse("recipient is not a principal".to_string()))?;
        let amount = field("amount")?
            .as_uint()
            .and_then(|v| u64::try_from(v).ok())
            .map(Amount::from_base_units)
            .ok_or_else(|| StackPayError::InvalidResponse("amount is not a uint".to_string()))?;

        let kind = match (
            tuple.tuple_field("is-invoice").and_then(ClarityValue::as_bool),
            tuple.tuple_field("request-type").and_then(ClarityValue::as_str),
        ) {
            (Some(true), _) | (_, Some("invoice")) => RequestKind::Invoice,
            _ => RequestKind::Escrow,
        };

        let memo = tuple
            .tuple_field("memo")
            .and_then(|m| m.unwrap_present())
            .and_then(ClarityValue::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(kind.default_memo())
            .to_string();

        let status = match tuple.tuple_field("status").and_then(ClarityValue::as_str) {
            Some("completed") | Some("claimed") => RequestStatus::Completed,
            Some("paid") => RequestStatus::Paid,
            Some("cancelled") => RequestStatus::Cancelled,
            _ => {
                let claimed = tuple
                    .tuple_field("claimed")
                    .and_then(ClarityValue::as_bool)
                    .unwrap_or(false);
                if claimed {
                    RequestStatus::Completed
                } else {
                    RequestStatus::Pending
                }
            }
        };

        Ok(Self {
            id: id.to_string(),
            creator,
            recipient,
            amount,
            memo,
            kind,
            status,
        })
    }
}

/// Random request id; collisions are not checked
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ids must survive the `/pay/{id}` link: URL parsing folds `.` and `..`
/// path segments away, so those two are refused
pub fn validate_request_id(id: &str) -> Result<(), StackPayError> {
    match id.trim() {
        "" => Err(StackPayError::Validation("Request id is required".to_string())),
        "." | ".." => Err(StackPayError::Validation(format!(
            "Request id '{}' cannot be used in a payment link",
            id
        ))),
        _ => Ok(()),
    }
}

/// What the `/pay/:paymentId` page offers the connected wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimAction {
    /// Escrow: release custody to the recipient
    Claim,
    /// Invoice: pay the requested amount to the recipient
    PayInvoice,
}

impl ClaimAction {
    /// Decide the action for `caller`; escrow requests can only be claimed by
    /// their recipient, invoices by anyone with enough balance
    pub fn decide(
        request: &PaymentRequest,
        caller: &str,
        balance: Option<Amount>,
    ) -> Result<Self, StackPayError> {
        if request.status.is_terminal() {
            return Err(StackPayError::Validation(format!(
                "Payment request is already {}",
                request.status
            )));
        }

        match request.kind {
            RequestKind::Invoice => {
                if let Some(balance) = balance {
                    if balance < request.amount {
                        return Err(StackPayError::insufficient_balance(balance, request.amount));
                    }
                }
                Ok(Self::PayInvoice)
            }
            RequestKind::Escrow => {
                if !request.recipient.eq_ignore_ascii_case(caller) {
                    return Err(StackPayError::Validation(
                        "Only the recipient can claim this payment".to_string(),
                    ));
                }
                Ok(Self::Claim)
            }
        }
    }
}
