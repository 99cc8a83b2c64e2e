//! Token balance reads

use crate::amount::Amount;
use crate::api::{BalancesResponse, StacksApiClient};
use crate::error::StackPayError;

#[derive(Clone, Debug)]
pub struct BalanceReader {
    api: StacksApiClient,
    asset_identifier: String,
}

impl BalanceReader {
    /// `asset_identifier` is `"{contract-address}.{contract-name}::{asset}"`
    pub fn new(api: StacksApiClient, asset_identifier: impl Into<String>) -> Self {
        Self {
            api,
            asset_identifier: asset_identifier.into(),
        }
    }

    pub fn asset_identifier(&self) -> &str {
        &self.asset_identifier
    }

    /// Token balance of `address`; an address without an entry holds zero
    pub async fn token_balance(&self, address: &str) -> Result<Amount, StackPayError> {
        let balances = self.api.get_balances(address).await?;
        extract_token_balance(&balances, &self.asset_identifier)
    }

    /// Read-degrading variant: `None` (placeholder) when the read fails
    pub async fn token_balance_or_placeholder(&self, address: &str) -> Option<Amount> {
        match self.token_balance(address).await {
            Ok(amount) => Some(amount),
            Err(e) => {
                log::warn!("Balance read for {} failed: {}", address, e);
                None
            }
        }
    }
}

pub fn extract_token_balance(
    balances: &BalancesResponse,
    asset_identifier: &str,
) -> Result<Amount, StackPayError> {
    match balances.fungible_tokens.get(asset_identifier) {
        Some(entry) => Amount::parse_base_units(&entry.balance),
        None => Ok(Amount::ZERO),
    }
}
