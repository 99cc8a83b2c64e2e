//! Local payment records
//!
//! Optimistic entries added when the wallet accepts a transfer or request.
//! They are a UI hint only; reconciled chain history is ground truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::amount::Amount;
use crate::requests::RequestStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub amount: Amount,
    pub recipient: String,
    pub memo: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Newest-first in-memory ledger
#[derive(Debug, Default)]
pub struct PaymentLedger {
    records: RwLock<Vec<PaymentRecord>>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, record: PaymentRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(0, record);
        }
    }

    /// Returns whether a record with `id` existed
    pub fn update_status(&self, id: &str, status: RequestStatus) -> bool {
        let Ok(mut records) = self.records.write() else {
            return false;
        };
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.status = record.status.advance(status);
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> Vec<PaymentRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<PaymentRecord> {
        self.records
            .read()
            .ok()
            .and_then(|r| r.iter().find(|p| p.id == id).cloned())
    }

    /// Clear everything (wallet disconnect)
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }
}
