//! Optional off-chain mirror of request metadata
//!
//! Documents are keyed by request id, written on creation and updated on
//! claim. The chain stays authoritative: mirror failures are logged (or
//! silently ignored for permission errors) and never fail the on-chain
//! operation they accompany.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::requests::{RequestKind, RequestStatus};
use crate::storage::Storage;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MirrorError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Mirror backend error: {0}")]
    Backend(String),
}

impl From<crate::error::StackPayError> for MirrorError {
    fn from(err: crate::error::StackPayError) -> Self {
        Self::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredRequest {
    pub request_id: String,
    pub creator: String,
    /// For invoices this is the creator collecting the payment
    pub recipient: String,
    pub amount: Amount,
    pub memo: String,
    pub status: RequestStatus,
    pub request_type: RequestKind,
    pub qr_code_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredUsername {
    pub username: String,
    pub address: String,
    pub registered_at: DateTime<Utc>,
}

#[async_trait]
pub trait RequestMirror: Send + Sync {
    async fn put(&self, request: &MirroredRequest) -> Result<(), MirrorError>;

    async fn get(&self, request_id: &str) -> Result<Option<MirroredRequest>, MirrorError>;

    async fn mark_claimed(
        &self,
        request_id: &str,
        claimed_by: &str,
        tx_id: &str,
    ) -> Result<(), MirrorError>;

    /// Pending requests addressed to `recipient`
    async fn pending_for_recipient(&self, recipient: &str) -> Result<Vec<MirroredRequest>, MirrorError>;

    async fn put_username(&self, _entry: &MirroredUsername) -> Result<(), MirrorError> {
        Ok(())
    }
}

/// Log a mirror failure the way every caller should: permission errors are
/// expected for anonymous readers and stay silent.
pub fn report(operation: &str, err: &MirrorError) {
    match err {
        MirrorError::PermissionDenied(_) => {}
        MirrorError::Backend(e) => log::warn!("Mirror {} failed: {}", operation, e),
    }
}

/// Mirror disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

#[async_trait]
impl RequestMirror for NoMirror {
    async fn put(&self, _request: &MirroredRequest) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn get(&self, _request_id: &str) -> Result<Option<MirroredRequest>, MirrorError> {
        Ok(None)
    }

    async fn mark_claimed(&self, _id: &str, _by: &str, _tx: &str) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn pending_for_recipient(&self, _recipient: &str) -> Result<Vec<MirroredRequest>, MirrorError> {
        Ok(Vec::new())
    }
}

/// JSON documents under `{data_dir}/mirror/`
#[derive(Debug, Clone)]
pub struct FileMirror {
    storage: Storage,
}

impl FileMirror {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Document ids become file names, so only plain identifiers are accepted
    fn document_key(collection: &str, id: &str) -> Result<String, MirrorError> {
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(MirrorError::Backend(format!("unsupported document id '{}'", id)));
        }
        Ok(format!("{}/{}", collection, id))
    }

    fn request_key(request_id: &str) -> Result<String, MirrorError> {
        Self::document_key("mirror", request_id)
    }
}

#[async_trait]
impl RequestMirror for FileMirror {
    async fn put(&self, request: &MirroredRequest) -> Result<(), MirrorError> {
        let key = Self::request_key(&request.request_id)?;
        self.storage.save(&key, request)?;
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Option<MirroredRequest>, MirrorError> {
        let key = Self::request_key(request_id)?;
        Ok(self.storage.load(&key)?)
    }

    async fn mark_claimed(
        &self,
        request_id: &str,
        claimed_by: &str,
        tx_id: &str,
    ) -> Result<(), MirrorError> {
        let key = Self::request_key(request_id)?;
        let mut doc: MirroredRequest = self
            .storage
            .load(&key)?
            .ok_or_else(|| MirrorError::Backend(format!("no document for {}", request_id)))?;

        doc.status = RequestStatus::Completed;
        doc.claimed_by = Some(claimed_by.to_string());
        doc.claimed_at = Some(Utc::now());
        doc.tx_id = Some(tx_id.to_string());
        self.storage.save(&key, &doc)?;
        Ok(())
    }

    async fn pending_for_recipient(&self, recipient: &str) -> Result<Vec<MirroredRequest>, MirrorError> {
        let mut pending = Vec::new();
        for key in self.storage.list("mirror")? {
            match self.storage.load::<MirroredRequest>(&key) {
                Ok(Some(doc)) if doc.recipient == recipient && doc.status == RequestStatus::Pending => {
                    pending.push(doc)
                }
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable mirror document {}: {}", key, e),
            }
        }
        Ok(pending)
    }

    async fn put_username(&self, entry: &MirroredUsername) -> Result<(), MirrorError> {
        let key = Self::document_key("usernames", &entry.username)?;
        self.storage.save(&key, entry)?;
        Ok(())
    }
}
