//! Deposit status polling
//!
//! One monitor owns one polling task. The task stops by itself once the
//! receipt is terminal, and is aborted on `stop()` or when the monitor is
//! dropped.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::evm::{self, Eip1193Provider};
use super::history::BridgeHistory;
use super::BridgeStatus;

pub struct BridgeMonitor {
    tx_hash: String,
    status: watch::Receiver<BridgeStatus>,
    handle: JoinHandle<()>,
}

impl BridgeMonitor {
    /// Spawn the polling task; must be called inside a tokio runtime
    pub fn start(
        provider: Arc<dyn Eip1193Provider>,
        tx_hash: impl Into<String>,
        interval: Duration,
        history: Option<BridgeHistory>,
    ) -> Self {
        let tx_hash = tx_hash.into();
        let (sender, status) = watch::channel(BridgeStatus::Pending);

        let hash = tx_hash.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let current = check_status(provider.as_ref(), &hash).await;
                if !current.is_terminal() {
                    continue;
                }

                log::info!("Bridge deposit {} is {}", hash, current);
                if let Some(history) = &history {
                    if let Err(e) = history.set_status(&hash, current) {
                        log::warn!("Failed to persist bridge status for {}: {}", hash, e);
                    }
                }
                let _ = sender.send(current);
                break;
            }
        });

        Self {
            tx_hash,
            status,
            handle,
        }
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn status(&self) -> BridgeStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.clone()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for BridgeMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One receipt lookup; lookup errors and missing receipts read as pending
pub async fn check_status(provider: &dyn Eip1193Provider, tx_hash: &str) -> BridgeStatus {
    match provider
        .request("eth_getTransactionReceipt", json!([tx_hash]))
        .await
    {
        Ok(receipt) => match evm::receipt_status(&receipt) {
            Some(true) => BridgeStatus::Completed,
            Some(false) => BridgeStatus::Failed,
            None => BridgeStatus::Pending,
        },
        Err(e) => {
            log::debug!("Receipt poll for {} failed: {}", tx_hash, e);
            BridgeStatus::Pending
        }
    }
}
