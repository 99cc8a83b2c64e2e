//! Username registry flows
//!
//! One-to-one `username -> address` mapping enforced by the registry
//! contract. The client only reads, pre-checks and reacts to rejections.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::api::StacksApiClient;
use crate::clarity::ClarityValue;
use crate::config::StackPayConfig;
use crate::debounce::Debouncer;
use crate::error::StackPayError;
use crate::mirror::{self, MirroredUsername, NoMirror, RequestMirror};
use crate::requests::RequestCalls;
use crate::resolver::{normalize_username, Resolver};
use crate::session::{Chain, WalletSession};
use crate::signer::ContractCallSigner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Taken,
}

pub struct UsernameRegistry {
    resolver: Resolver,
    calls: RequestCalls,
    wallet: Option<(Arc<WalletSession>, Arc<dyn ContractCallSigner>)>,
    mirror: Arc<dyn RequestMirror>,
    debouncer: Debouncer,
}

impl UsernameRegistry {
    pub fn new(config: &StackPayConfig, api: StacksApiClient) -> Self {
        Self {
            resolver: Resolver::new(api, config.username_contract.clone()),
            calls: RequestCalls::new(config),
            wallet: None,
            mirror: Arc::new(NoMirror),
            debouncer: Debouncer::new(config.debounce),
        }
    }

    /// Registration signs as the session's connected Stacks address
    pub fn with_wallet(
        mut self,
        session: Arc<WalletSession>,
        signer: Arc<dyn ContractCallSigner>,
    ) -> Self {
        self.wallet = Some((session, signer));
        self
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn RequestMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debouncer = Debouncer::new(delay);
        self
    }

    /// Address registered for `name`
    pub async fn lookup(&self, name: &str) -> Result<String, StackPayError> {
        let username = normalize_username(name)?;
        self.resolver.resolve(&format!("@{}", username)).await
    }

    /// A failed lookup reads as available; the registry rejects duplicates anyway
    pub async fn availability(&self, name: &str) -> Result<Availability, StackPayError> {
        let username = normalize_username(name)?;
        ClarityValue::ascii(username).map_err(|e| StackPayError::InvalidInput(e.to_string()))?;

        match self.lookup(username).await {
            Ok(_) => Ok(Availability::Taken),
            Err(StackPayError::UsernameNotFound(_)) => Ok(Availability::Available),
            Err(e) => {
                log::warn!("Availability check for '{}' failed: {}", username, e);
                Ok(Availability::Available)
            }
        }
    }

    /// Debounced availability check for search-as-you-type input;
    /// `None` when superseded
    pub async fn availability_debounced(&self, name: &str) -> Option<Result<Availability, StackPayError>> {
        self.debouncer.run(|| self.availability(name)).await
    }

    /// Username registered by `address`, if any
    pub async fn my_username(&self, address: &str) -> Option<String> {
        self.resolver.lookup_username(address).await
    }

    /// Register `name` for the connected wallet; returns the transaction id
    pub async fn register(&self, name: &str) -> Result<String, StackPayError> {
        let username = normalize_username(name)?.to_string();
        let (session, signer) = self
            .wallet
            .as_ref()
            .ok_or_else(|| StackPayError::NotConnected(Chain::Stacks.to_string()))?;
        let address = session.require_address(Chain::Stacks)?;

        if self.availability(&username).await? == Availability::Taken {
            return Err(StackPayError::UsernameTaken(username));
        }

        let call = self.calls.build_register_username(&username)?;
        let txid = signer.sign_and_submit(call).await?;
        log::info!("Registered username '{}' for {}: {}", username, address, txid);

        let entry = MirroredUsername {
            username,
            address,
            registered_at: Utc::now(),
        };
        if let Err(e) = self.mirror.put_username(&entry).await {
            mirror::report("username write", &e);
        }
        Ok(txid)
    }
}
