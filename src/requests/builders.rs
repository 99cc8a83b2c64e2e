use crate::amount::Amount;
use crate::clarity::ClarityValue;
use crate::config::{ClaimGuard, ContractId, StackPayConfig};
use crate::error::StackPayError;
use crate::signer::{ContractCall, FungiblePostCondition};

use super::validate_request_id;

/// Builders for the payment and username contract calls
#[derive(Clone, Debug)]
pub struct RequestCalls {
    payment_contract: ContractId,
    username_contract: ContractId,
    asset_identifier: String,
    claim_guard: ClaimGuard,
}

impl RequestCalls {
    pub fn new(config: &StackPayConfig) -> Self {
        Self {
            payment_contract: config.payment_contract.clone(),
            username_contract: config.username_contract.clone(),
            asset_identifier: config.asset_identifier(),
            claim_guard: config.claim_guard,
        }
    }

    pub fn payment_contract(&self) -> &ContractId {
        &self.payment_contract
    }

    fn request_id(id: &str) -> Result<ClarityValue, StackPayError> {
        validate_request_id(id)?;
        ClarityValue::ascii(id)
    }

    fn positive(amount: Amount) -> Result<u64, StackPayError> {
        if amount.is_zero() {
            return Err(StackPayError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }
        Ok(amount.base_units())
    }

    /// `create-payment-request(id, recipient, amount, memo)`; the creator's
    /// funds move into contract custody
    pub fn build_create_escrow(
        &self,
        id: &str,
        recipient: &str,
        amount: Amount,
        memo: &str,
        creator: &str,
    ) -> Result<ContractCall, StackPayError> {
        let args = vec![
            Self::request_id(id)?,
            ClarityValue::principal(recipient)?,
            ClarityValue::uint(Self::positive(amount)?),
            ClarityValue::utf8(memo),
        ];

        Ok(
            ContractCall::new(&self.payment_contract, "create-payment-request", args)
                .with_post_condition(FungiblePostCondition::sends_exactly(
                    creator,
                    amount,
                    &self.asset_identifier,
                )),
        )
    }

    /// `create-invoice-request(id, recipient, amount, memo)`; no funds move
    pub fn build_create_invoice(
        &self,
        id: &str,
        recipient: &str,
        amount: Amount,
        memo: &str,
    ) -> Result<ContractCall, StackPayError> {
        let args = vec![
            Self::request_id(id)?,
            ClarityValue::principal(recipient)?,
            ClarityValue::uint(Self::positive(amount)?),
            ClarityValue::utf8(memo),
        ];
        Ok(ContractCall::new(&self.payment_contract, "create-invoice-request", args))
    }

    /// `claim-payment(id)`, optionally guarded so the contract releases
    /// exactly `amount`
    pub fn build_claim(&self, id: &str, amount: Amount) -> Result<ContractCall, StackPayError> {
        let call = ContractCall::new(
            &self.payment_contract,
            "claim-payment",
            vec![Self::request_id(id)?],
        );

        Ok(match self.claim_guard {
            ClaimGuard::ContractPrincipal => call.with_post_condition(
                FungiblePostCondition::sends_exactly(
                    self.payment_contract.to_string(),
                    amount,
                    &self.asset_identifier,
                ),
            ),
            ClaimGuard::None => call,
        })
    }

    /// `pay-invoice(id)` with an exact-amount post-condition on the payer
    pub fn build_pay_invoice(
        &self,
        id: &str,
        amount: Amount,
        payer: &str,
    ) -> Result<ContractCall, StackPayError> {
        Self::positive(amount)?;
        Ok(
            ContractCall::new(&self.payment_contract, "pay-invoice", vec![Self::request_id(id)?])
                .with_post_condition(FungiblePostCondition::sends_exactly(
                    payer,
                    amount,
                    &self.asset_identifier,
                )),
        )
    }

    /// `cancel-payment-request(id)`; the contract decides who may cancel
    pub fn build_cancel(&self, id: &str) -> Result<ContractCall, StackPayError> {
        Ok(ContractCall::new(
            &self.payment_contract,
            "cancel-payment-request",
            vec![Self::request_id(id)?],
        ))
    }

    /// `register-username(name)` on the registry
    pub fn build_register_username(&self, username: &str) -> Result<ContractCall, StackPayError> {
        let name = username.trim();
        if name.is_empty() {
            return Err(StackPayError::Validation("Username is required".to_string()));
        }
        Ok(ContractCall::new(
            &self.username_contract,
            "register-username",
            vec![ClarityValue::ascii(name)?],
        ))
    }
}
