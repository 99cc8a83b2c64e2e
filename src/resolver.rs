//! Address/identity resolution
//!
//! Maps user input (a raw chain address, `@username` or `username`) to a
//! canonical address via the on-chain username registry. "Not registered"
//! and "lookup failed" are distinct errors so callers can decide whether to
//! retry.

use std::collections::{BTreeMap, BTreeSet};

use crate::api::StacksApiClient;
use crate::c32::looks_like_address;
use crate::clarity::ClarityValue;
use crate::config::ContractId;
use crate::error::StackPayError;

#[derive(Clone, Debug)]
pub struct Resolver {
    api: StacksApiClient,
    registry: ContractId,
}

impl Resolver {
    pub fn new(api: StacksApiClient, registry: ContractId) -> Self {
        Self { api, registry }
    }

    /// Resolve `input` to a chain address
    ///
    /// Address-shaped input is returned unchanged without a network call.
    pub async fn resolve(&self, input: &str) -> Result<String, StackPayError> {
        let trimmed = input.trim();
        if looks_like_address(trimmed) {
            return Ok(trimmed.to_string());
        }

        let username = normalize_username(trimmed)?;
        let arg = ClarityValue::ascii(username)
            .map_err(|e| StackPayError::InvalidInput(e.to_string()))?;

        let response = self
            .api
            .call_read_only(&self.registry, "get-address", &self.registry.address, &[arg])
            .await
            .map_err(|e| {
                log::warn!("Username lookup for '{}' failed: {}", username, e);
                StackPayError::resolution_failed(username, e.to_string())
            })?;

        if !response.okay {
            return Err(StackPayError::UsernameNotFound(username.to_string()));
        }

        let value = response
            .value()
            .map_err(|e| StackPayError::resolution_failed(username, e.to_string()))?;

        match value.as_ref().and_then(principal_of) {
            Some(address) if address.starts_with('S') => {
                log::debug!("Resolved @{} -> {}", username, address);
                Ok(address)
            }
            _ => Err(StackPayError::UsernameNotFound(username.to_string())),
        }
    }

    /// Reverse lookup (`get-username`); any failure reads as "no username"
    pub async fn lookup_username(&self, address: &str) -> Option<String> {
        let principal = ClarityValue::principal(address).ok()?;
        let response = match self
            .api
            .call_read_only(&self.registry, "get-username", &self.registry.address, &[principal])
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Reverse lookup for {} failed: {}", address, e);
                return None;
            }
        };

        response
            .value()
            .ok()
            .flatten()
            .and_then(|v| v.unwrap_present().and_then(|s| s.as_str().map(str::to_string)))
    }

    /// Best-effort batch reverse lookup for labelling counterparties
    pub async fn resolve_labels<'a, I>(&self, addresses: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = addresses.into_iter().collect();
        let lookups = unique.into_iter().map(|address| async move {
            (address.to_string(), self.lookup_username(address).await)
        });

        futures::future::join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(address, name)| name.map(|n| (address, n)))
            .collect()
    }
}

/// Strip one leading `@`; empty usernames are rejected
pub fn normalize_username(input: &str) -> Result<&str, StackPayError> {
    let trimmed = input.trim();
    let username = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if username.is_empty() {
        return Err(StackPayError::InvalidInput("Username is required".to_string()));
    }
    Ok(username)
}

/// `(some 'ST…)`, `(ok (some 'ST…))` or a bare principal
fn principal_of(value: &ClarityValue) -> Option<String> {
    value.unwrap_present()?.as_principal()
}
