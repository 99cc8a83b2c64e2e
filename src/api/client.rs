use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::*;
use crate::clarity::ClarityValue;
use crate::config::ContractId;
use crate::error::StackPayError;

/// HTTP client for the Stacks chain indexer
#[derive(Clone, Debug)]
pub struct StacksApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl StacksApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Map a non-2xx response to `StackPayError::Api`
    async fn check(response: Response) -> Result<Response, StackPayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(StackPayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, StackPayError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, StackPayError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    // ========================================================================
    // Contract reads
    // ========================================================================

    /// `POST /v2/contracts/call-read/{address}/{contract}/{function}`
    pub async fn call_read_only(
        &self,
        contract: &ContractId,
        function: &str,
        sender: &str,
        args: &[ClarityValue],
    ) -> Result<ReadOnlyResponse, StackPayError> {
        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/{}",
            self.base_url, contract.address, contract.name, function
        );
        let body = ReadOnlyRequest {
            sender: sender.to_string(),
            arguments: args.iter().map(ClarityValue::to_hex).collect(),
        };

        let response: ReadOnlyResponse = self.post_json(&url, &body).await?;
        if !response.okay {
            log::debug!(
                "Read-only {}::{} not okay: {}",
                contract,
                function,
                response.cause.as_deref().unwrap_or("no cause")
            );
        }
        Ok(response)
    }

    /// `GET /v2/contracts/interface/{address}/{contract}`
    pub async fn get_contract_interface(&self, contract: &ContractId) -> Result<Value, StackPayError> {
        let url = format!(
            "{}/v2/contracts/interface/{}/{}",
            self.base_url, contract.address, contract.name
        );
        self.get_json(&url).await
    }

    /// `GET /v2/contracts/source/{address}/{contract}`
    pub async fn get_contract_source(
        &self,
        contract: &ContractId,
    ) -> Result<ContractSource, StackPayError> {
        let url = format!(
            "{}/v2/contracts/source/{}/{}?proof=0",
            self.base_url, contract.address, contract.name
        );
        self.get_json(&url).await
    }

    /// `GET /v2/data_var/{address}/{contract}/{var}`
    pub async fn get_data_var(
        &self,
        contract: &ContractId,
        var: &str,
    ) -> Result<ClarityValue, StackPayError> {
        let url = format!(
            "{}/v2/data_var/{}/{}/{}?proof=0",
            self.base_url, contract.address, contract.name, var
        );
        let response: DataResponse = self.get_json(&url).await?;
        response.value()
    }

    /// `POST /v2/map_entry/{address}/{contract}/{map}` with the hex key as body
    pub async fn get_map_entry(
        &self,
        contract: &ContractId,
        map: &str,
        key: &ClarityValue,
    ) -> Result<ClarityValue, StackPayError> {
        let url = format!(
            "{}/v2/map_entry/{}/{}/{}?proof=0",
            self.base_url, contract.address, contract.name, map
        );
        let response: DataResponse = self.post_json(&url, &key.to_hex()).await?;
        response.value()
    }

    // ========================================================================
    // Address reads
    // ========================================================================

    /// `GET /extended/v1/address/{address}/balances`
    pub async fn get_balances(&self, address: &str) -> Result<BalancesResponse, StackPayError> {
        let url = format!("{}/extended/v1/address/{}/balances", self.base_url, address);
        self.get_json(&url).await
    }

    /// Confirmed transactions, newest first, as raw records
    pub async fn get_transactions(&self, address: &str, limit: u32) -> Result<Vec<Value>, StackPayError> {
        let url = format!(
            "{}/extended/v1/address/{}/transactions?limit={}",
            self.base_url, address, limit
        );
        let page: TransactionListResponse = self.get_json(&url).await?;
        log::debug!("{} confirmed transactions for {}", page.results.len(), address);
        Ok(page.results)
    }

    /// Unconfirmed (mempool) transactions as raw records
    pub async fn get_mempool_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<Value>, StackPayError> {
        let url = format!(
            "{}/extended/v1/address/{}/mempool?limit={}",
            self.base_url, address, limit
        );
        let page: TransactionListResponse = self.get_json(&url).await?;
        log::debug!("{} mempool transactions for {}", page.results.len(), address);
        Ok(page.results)
    }
}
