//! Locally cached list of bridge transfers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BridgeStatus;
use crate::amount::Amount;
use crate::error::StackPayError;
use crate::storage::Storage;

const HISTORY_KEY: &str = "bridge_history";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeTransfer {
    /// Deposit transaction hash on the foreign chain
    pub hash: String,
    pub amount: Amount,
    pub date: DateTime<Utc>,
    pub status: BridgeStatus,
}

/// Read-modify-write over a single JSON document; concurrent writers are
/// not coordinated and the last write wins.
#[derive(Debug, Clone)]
pub struct BridgeHistory {
    storage: Storage,
}

impl BridgeHistory {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Newest first
    pub fn list(&self) -> Result<Vec<BridgeTransfer>, StackPayError> {
        self.storage.load_or_default(HISTORY_KEY)
    }

    pub fn record(&self, transfer: BridgeTransfer) -> Result<(), StackPayError> {
        let mut transfers = self.list()?;
        transfers.retain(|t| t.hash != transfer.hash);
        transfers.insert(0, transfer);
        self.storage.save(HISTORY_KEY, &transfers)
    }

    /// Update the status of a known transfer; returns false if unknown
    pub fn set_status(&self, hash: &str, status: BridgeStatus) -> Result<bool, StackPayError> {
        let mut transfers = self.list()?;
        let Some(entry) = transfers.iter_mut().find(|t| t.hash == hash) else {
            return Ok(false);
        };
        entry.status = status;
        self.storage.save(HISTORY_KEY, &transfers)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), StackPayError> {
        self.storage.remove(HISTORY_KEY)
    }
}
