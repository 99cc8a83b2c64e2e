//! Contract calls and the wallet signing seam
//!
//! Builders produce a [`ContractCall`]; a [`ContractCallSigner`] (the user's
//! wallet) signs and broadcasts it. Nothing in this crate holds keys.

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::amount::Amount;
use crate::api::FunctionArg;
use crate::clarity::ClarityValue;
use crate::config::ContractId;
use crate::error::StackPayError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FungibleConditionCode {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Aborts the transaction unless `principal` moves exactly `amount` of `asset`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FungiblePostCondition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Standard address or `addr.contract` principal
    pub address: String,
    pub condition: FungibleConditionCode,
    pub amount: Amount,
    /// `"{contract-address}.{contract-name}::{asset}"`
    pub asset: String,
}

impl FungiblePostCondition {
    pub fn sends_exactly(address: impl Into<String>, amount: Amount, asset: impl Into<String>) -> Self {
        Self {
            kind: "ft-postcondition",
            address: address.into(),
            condition: FungibleConditionCode::Eq,
            amount,
            asset: asset.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostConditionMode {
    /// Any asset movement not covered by a post-condition aborts
    #[default]
    Deny,
    Allow,
}

/// Unsigned contract call handed to a wallet
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    #[serde(serialize_with = "serialize_args")]
    pub function_args: Vec<ClarityValue>,
    pub post_conditions: Vec<FungiblePostCondition>,
    pub post_condition_mode: PostConditionMode,
}

impl ContractCall {
    pub fn new(contract: &ContractId, function_name: &str, function_args: Vec<ClarityValue>) -> Self {
        Self {
            contract_address: contract.address.clone(),
            contract_name: contract.name.clone(),
            function_name: function_name.to_string(),
            function_args,
            post_conditions: Vec::new(),
            post_condition_mode: PostConditionMode::Deny,
        }
    }

    pub fn with_post_condition(mut self, condition: FungiblePostCondition) -> Self {
        self.post_conditions.push(condition);
        self
    }

    pub fn contract_id(&self) -> String {
        format!("{}.{}", self.contract_address, self.contract_name)
    }

    /// Arguments as the indexer would list them (`hex`, `repr`, `type`)
    pub fn function_arg_records(&self, names: &[&str]) -> Vec<FunctionArg> {
        self.function_args
            .iter()
            .enumerate()
            .map(|(i, arg)| FunctionArg::from_value(names.get(i).copied().unwrap_or(""), arg))
            .collect()
    }
}

fn serialize_args<S: Serializer>(args: &[ClarityValue], serializer: S) -> Result<S::Ok, S::Error> {
    let hex: Vec<String> = args.iter().map(ClarityValue::to_hex).collect();
    hex.serialize(serializer)
}

/// Wallet signing request/response contract
///
/// Implementations return the broadcast transaction id, or
/// `StackPayError::UserCancelled` when the user dismisses the prompt.
#[async_trait]
pub trait ContractCallSigner: Send + Sync {
    async fn sign_and_submit(&self, call: ContractCall) -> Result<String, StackPayError>;
}
