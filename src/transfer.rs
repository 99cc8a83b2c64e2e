//! Direct token transfers

use std::sync::Arc;

use chrono::Utc;

use crate::amount::Amount;
use crate::clarity::ClarityValue;
use crate::config::{ContractId, StackPayConfig};
use crate::error::StackPayError;
use crate::ledger::{PaymentLedger, PaymentRecord};
use crate::requests::RequestStatus;
use crate::session::{Chain, WalletSession};
use crate::signer::{ContractCall, ContractCallSigner, FungiblePostCondition};

/// Caller-side guards run before anything is handed to the wallet.
/// The token contract remains the authoritative check.
pub fn validate_transfer(
    recipient: &str,
    amount: Amount,
    sender: &str,
    balance: Option<Amount>,
) -> Result<(), StackPayError> {
    if recipient.trim().is_empty() {
        return Err(StackPayError::Validation("Recipient is required".to_string()));
    }
    if amount.is_zero() {
        return Err(StackPayError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    if recipient == sender {
        return Err(StackPayError::Validation(
            "Cannot send to your own address".to_string(),
        ));
    }
    if let Some(balance) = balance {
        if amount > balance {
            return Err(StackPayError::insufficient_balance(balance, amount));
        }
    }
    Ok(())
}

/// Sends from whichever Stacks address the session has connected
pub struct TransferSubmitter {
    token_contract: ContractId,
    asset_identifier: String,
    session: Arc<WalletSession>,
    signer: Arc<dyn ContractCallSigner>,
    ledger: Option<Arc<PaymentLedger>>,
}

impl TransferSubmitter {
    pub fn new(
        config: &StackPayConfig,
        session: Arc<WalletSession>,
        signer: Arc<dyn ContractCallSigner>,
    ) -> Self {
        Self {
            token_contract: config.token_contract.clone(),
            asset_identifier: config.asset_identifier(),
            session,
            signer,
            ledger: None,
        }
    }

    /// Record accepted transfers in a local ledger
    pub fn with_ledger(mut self, ledger: Arc<PaymentLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// `transfer(amount, sender, recipient, none)` with an exact-amount
    /// post-condition on the sender
    pub fn build_transfer(
        &self,
        recipient: &str,
        amount: Amount,
        sender: &str,
    ) -> Result<ContractCall, StackPayError> {
        build_transfer(&self.token_contract, &self.asset_identifier, recipient, amount, sender)
    }

    /// Hand the transfer to the wallet; returns the transaction id
    pub async fn send(&self, recipient: &str, amount: Amount) -> Result<String, StackPayError> {
        let sender = self.session.require_address(Chain::Stacks)?;
        let call = self.build_transfer(recipient, amount, &sender)?;
        log::info!("Submitting transfer of {} to {}", amount, recipient);

        let txid = self.signer.sign_and_submit(call).await.map_err(|e| {
            if e.is_user_cancelled() {
                log::info!("Transfer to {} cancelled by user", recipient);
            } else {
                log::error!("Transfer to {} failed: {}", recipient, e);
            }
            e
        })?;

        log::info!("Transfer submitted: {}", txid);
        if let Some(ledger) = &self.ledger {
            ledger.add(PaymentRecord {
                id: txid.clone(),
                amount,
                recipient: recipient.to_string(),
                memo: "Direct transfer".to_string(),
                status: RequestStatus::Completed,
                tx_id: Some(txid.clone()),
                created_at: Utc::now(),
            });
        }
        Ok(txid)
    }
}

pub fn build_transfer(
    token_contract: &ContractId,
    asset_identifier: &str,
    recipient: &str,
    amount: Amount,
    sender: &str,
) -> Result<ContractCall, StackPayError> {
    let args = vec![
        ClarityValue::uint(amount.base_units()),
        ClarityValue::principal(sender)?,
        ClarityValue::principal(recipient)?,
        ClarityValue::OptionalNone,
    ];

    Ok(ContractCall::new(token_contract, "transfer", args).with_post_condition(
        FungiblePostCondition::sends_exactly(sender, amount, asset_identifier),
    ))
}
