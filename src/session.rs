//! Wallet session
//!
//! The one piece of shared mutable state: the connected Stacks address and
//! the connected foreign-chain (Ethereum) address. Components receive the
//! session as an `Arc<WalletSession>` and read signer addresses from it at
//! the time of use; only `connect`/`disconnect` mutate it.
//!
//! Disconnecting the Stacks wallet clears everything, in memory and on disk,
//! and bumps a reset epoch so dependents can drop derived state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use crate::c32::looks_like_address;
use crate::error::StackPayError;
use crate::storage::Storage;

const SESSION_KEY: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Stacks,
    Ethereum,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stacks => f.write_str("stacks"),
            Self::Ethereum => f.write_str("ethereum"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(String),
}

impl ConnectionState {
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Connected(address) => Some(address),
            _ => None,
        }
    }
}

/// Wallet connection flow (browser extension, WalletConnect, a test fake)
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompt the user and return the connected address
    async fn connect(&self) -> Result<String, StackPayError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default)]
    stacks_address: Option<String>,
    #[serde(default)]
    ethereum_address: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SessionState {
    stacks: ConnectionState,
    ethereum: ConnectionState,
}

impl SessionState {
    fn slot(&mut self, chain: Chain) -> &mut ConnectionState {
        match chain {
            Chain::Stacks => &mut self.stacks,
            Chain::Ethereum => &mut self.ethereum,
        }
    }

    fn get(&self, chain: Chain) -> &ConnectionState {
        match chain {
            Chain::Stacks => &self.stacks,
            Chain::Ethereum => &self.ethereum,
        }
    }
}

pub struct WalletSession {
    state: RwLock<SessionState>,
    storage: Storage,
    resets: watch::Sender<u64>,
}

impl WalletSession {
    /// Fresh, disconnected session
    pub fn new(storage: Storage) -> Arc<Self> {
        let (resets, _) = watch::channel(0);
        Arc::new(Self {
            state: RwLock::new(SessionState {
                stacks: ConnectionState::Disconnected,
                ethereum: ConnectionState::Disconnected,
            }),
            storage,
            resets,
        })
    }

    /// Session restored from storage without re-prompting
    pub fn restore(storage: Storage) -> Result<Arc<Self>, StackPayError> {
        let persisted: PersistedSession = storage.load_or_default(SESSION_KEY)?;
        let session = Self::new(storage);
        {
            let mut state = session.write_state()?;
            if let Some(address) = persisted.stacks_address {
                log::info!("Restored Stacks session for {}", address);
                state.stacks = ConnectionState::Connected(address);
            }
            if let Some(address) = persisted.ethereum_address {
                log::info!("Restored Ethereum session for {}", address);
                state.ethereum = ConnectionState::Connected(address);
            }
        }
        Ok(session)
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, SessionState>, StackPayError> {
        self.state
            .write()
            .map_err(|_| StackPayError::Internal("session lock poisoned".to_string()))
    }

    pub fn state(&self, chain: Chain) -> ConnectionState {
        self.state
            .read()
            .map(|s| s.get(chain).clone())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn address(&self, chain: Chain) -> Option<String> {
        self.state(chain).address().map(str::to_string)
    }

    pub fn is_connected(&self, chain: Chain) -> bool {
        self.address(chain).is_some()
    }

    /// Signer address for `chain`, the only accepted source for write operations
    pub fn require_address(&self, chain: Chain) -> Result<String, StackPayError> {
        self.address(chain)
            .ok_or_else(|| StackPayError::NotConnected(chain.to_string()))
    }

    /// Observe disconnect resets; the value is a monotonically increasing epoch
    pub fn subscribe_resets(&self) -> watch::Receiver<u64> {
        self.resets.subscribe()
    }

    fn persist(&self) -> Result<(), StackPayError> {
        let (stacks_address, ethereum_address) = {
            let state = self
                .state
                .read()
                .map_err(|_| StackPayError::Internal("session lock poisoned".to_string()))?;
            (
                state.stacks.address().map(str::to_string),
                state.ethereum.address().map(str::to_string),
            )
        };
        self.storage.save(
            SESSION_KEY,
            &PersistedSession {
                stacks_address,
                ethereum_address,
                updated_at: Some(Utc::now()),
            },
        )
    }

    /// Run the provider's connection flow for `chain`
    pub async fn connect(
        &self,
        chain: Chain,
        provider: &dyn WalletProvider,
    ) -> Result<String, StackPayError> {
        let previous = {
            let mut state = self.write_state()?;
            let slot = state.slot(chain);
            if *slot == ConnectionState::Connecting {
                return Err(StackPayError::ConnectionFailed(format!(
                    "{} connection already in progress",
                    chain
                )));
            }
            std::mem::replace(slot, ConnectionState::Connecting)
        };

        let result = provider.connect().await.and_then(|address| {
            validate_address(chain, &address)?;
            Ok(address)
        });

        match result {
            Ok(address) => {
                *self.write_state()?.slot(chain) = ConnectionState::Connected(address.clone());
                self.persist()?;
                log::info!("Connected {} wallet: {}", chain, address);
                Ok(address)
            }
            Err(e) => {
                *self.write_state()?.slot(chain) = previous;
                if e.is_user_cancelled() {
                    log::info!("{} connection cancelled by user", chain);
                } else {
                    log::error!("Failed to connect {} wallet: {}", chain, e);
                }
                Err(e)
            }
        }
    }

    /// Stacks: clear all session state and signal a reset.
    /// Ethereum: clear only the foreign address.
    pub fn disconnect(&self, chain: Chain) -> Result<(), StackPayError> {
        match chain {
            Chain::Stacks => {
                {
                    let mut state = self.write_state()?;
                    state.stacks = ConnectionState::Disconnected;
                    state.ethereum = ConnectionState::Disconnected;
                }
                self.storage.remove(SESSION_KEY)?;
                self.resets.send_modify(|epoch| *epoch += 1);
                log::info!("Stacks wallet disconnected, session reset");
            }
            Chain::Ethereum => {
                *self.write_state()?.slot(Chain::Ethereum) = ConnectionState::Disconnected;
                self.persist()?;
                log::info!("Ethereum wallet disconnected");
            }
        }
        Ok(())
    }
}

fn validate_address(chain: Chain, address: &str) -> Result<(), StackPayError> {
    let valid = match chain {
        Chain::Stacks => looks_like_address(address),
        Chain::Ethereum => {
            address.len() == 42
                && address.starts_with("0x")
                && address[2..].chars().all(|c| c.is_ascii_hexdigit())
        }
    };
    if valid {
        Ok(())
    } else {
        Err(StackPayError::ConnectionFailed(format!(
            "wallet returned an invalid {} address: {}",
            chain, address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const STACKS: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";
    const ETHEREUM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    /// Answers every prompt with a fixed result, optionally waiting for a
    /// release first
    struct FakeProvider {
        result: Result<String, StackPayError>,
        gate: Option<Arc<Notify>>,
        prompts: AtomicUsize,
    }

    impl FakeProvider {
        fn returning(address: &str) -> Self {
            Self {
                result: Ok(address.to_string()),
                gate: None,
                prompts: AtomicUsize::new(0),
            }
        }

        fn cancelling() -> Self {
            Self {
                result: Err(StackPayError::UserCancelled),
                gate: None,
                prompts: AtomicUsize::new(0),
            }
        }

        fn gated(address: &str, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::returning(address)
            }
        }
    }

    #[async_trait]
    impl WalletProvider for FakeProvider {
        async fn connect(&self) -> Result<String, StackPayError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.result.clone()
        }
    }

    fn storage(dir: &tempfile::TempDir) -> Storage {
        Storage::new_with_base_dir(dir.path().to_path_buf())
    }

    async fn connected(dir: &tempfile::TempDir) -> Arc<WalletSession> {
        let session = WalletSession::new(storage(dir));
        session
            .connect(Chain::Stacks, &FakeProvider::returning(STACKS))
            .await
            .unwrap();
        session
            .connect(Chain::Ethereum, &FakeProvider::returning(ETHEREUM))
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_connect_persists_and_restores() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = connected(&dir).await;
        assert_eq!(session.require_address(Chain::Stacks).unwrap(), STACKS);

        assert!(storage(&dir).exists(SESSION_KEY));
        let persisted: PersistedSession = storage(&dir).load(SESSION_KEY).unwrap().unwrap();
        assert_eq!(persisted.stacks_address.as_deref(), Some(STACKS));
        assert_eq!(persisted.ethereum_address.as_deref(), Some(ETHEREUM));

        // Restoring needs no provider, so no prompt can happen
        let restored = WalletSession::restore(storage(&dir)).unwrap();
        assert_eq!(
            restored.state(Chain::Stacks),
            ConnectionState::Connected(STACKS.to_string())
        );
        assert_eq!(restored.address(Chain::Ethereum).as_deref(), Some(ETHEREUM));
    }

    #[tokio::test]
    async fn test_disconnect_stacks_resets_everything() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = connected(&dir).await;
        let mut resets = session.subscribe_resets();
        assert_eq!(*resets.borrow(), 0);

        session.disconnect(Chain::Stacks).unwrap();

        assert_eq!(session.state(Chain::Stacks), ConnectionState::Disconnected);
        assert_eq!(session.state(Chain::Ethereum), ConnectionState::Disconnected);
        assert!(!storage(&dir).exists(SESSION_KEY));
        assert!(resets.has_changed().unwrap());
        assert_eq!(*resets.borrow_and_update(), 1);

        let restored = WalletSession::restore(storage(&dir)).unwrap();
        assert!(!restored.is_connected(Chain::Stacks));
        assert!(!restored.is_connected(Chain::Ethereum));
    }

    #[tokio::test]
    async fn test_disconnect_ethereum_keeps_stacks() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = connected(&dir).await;
        let resets = session.subscribe_resets();

        session.disconnect(Chain::Ethereum).unwrap();

        assert_eq!(session.address(Chain::Stacks).as_deref(), Some(STACKS));
        assert!(matches!(
            session.require_address(Chain::Ethereum),
            Err(StackPayError::NotConnected(_))
        ));
        assert!(!resets.has_changed().unwrap());

        let restored = WalletSession::restore(storage(&dir)).unwrap();
        assert_eq!(restored.address(Chain::Stacks).as_deref(), Some(STACKS));
        assert!(!restored.is_connected(Chain::Ethereum));
    }

    #[tokio::test]
    async fn test_concurrent_connect_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = WalletSession::new(storage(&dir));
        let gate = Arc::new(Notify::new());

        let first = {
            let session = session.clone();
            let provider = FakeProvider::gated(STACKS, gate.clone());
            tokio::spawn(async move { session.connect(Chain::Stacks, &provider).await })
        };
        while session.state(Chain::Stacks) != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }

        let second = FakeProvider::returning(STACKS);
        let err = session.connect(Chain::Stacks, &second).await.unwrap_err();
        assert!(matches!(err, StackPayError::ConnectionFailed(_)));
        assert_eq!(second.prompts.load(Ordering::SeqCst), 0);

        // The other chain is tracked independently
        session
            .connect(Chain::Ethereum, &FakeProvider::returning(ETHEREUM))
            .await
            .unwrap();

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), STACKS);
        assert_eq!(session.address(Chain::Stacks).as_deref(), Some(STACKS));
    }

    #[tokio::test]
    async fn test_cancelled_connect_keeps_previous_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = connected(&dir).await;

        let err = session
            .connect(Chain::Stacks, &FakeProvider::cancelling())
            .await
            .unwrap_err();
        assert!(err.is_user_cancelled());
        assert_eq!(session.address(Chain::Stacks).as_deref(), Some(STACKS));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address(Chain::Stacks, "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ").is_ok());
        assert!(validate_address(Chain::Stacks, "0x0000000000000000000000000000000000000000").is_err());
        assert!(validate_address(Chain::Ethereum, "0x52908400098527886E0F7030069857D2E4169EE7").is_ok());
        assert!(validate_address(Chain::Ethereum, "0x1234").is_err());
    }

    #[test]
    fn test_require_address_when_disconnected() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = WalletSession::new(Storage::new_with_base_dir(dir.path().to_path_buf()));

        assert_eq!(session.state(Chain::Stacks), ConnectionState::Disconnected);
        assert!(matches!(
            session.require_address(Chain::Ethereum),
            Err(StackPayError::NotConnected(_))
        ));
    }
}
