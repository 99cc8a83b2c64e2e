//! Bridge flow against the user's foreign-chain wallet
//!
//! Sequence: INIT → CHAIN_CHECK → BALANCE_CHECK → ALLOWANCE_CHECK →
//! (APPROVE) → DEPOSIT → POLLING. Each transaction waits for its receipt
//! before the next one is sent.

use chrono::Utc;
use ethers_core::types::{Address, U256};
use serde_json::json;
use std::sync::Arc;

use super::evm::{self, Eip1193Provider, Erc20, XReserve};
use super::history::{BridgeHistory, BridgeTransfer};
use super::{encode_remote_recipient, BridgeStatus, BridgeStep};
use crate::amount::Amount;
use crate::config::BridgeConfig;
use crate::error::StackPayError;
use crate::session::{Chain, WalletSession};

type StepObserver = Box<dyn Fn(&BridgeStep) + Send + Sync>;

/// Acts as the session's connected Ethereum account
pub struct BridgeOrchestrator {
    config: BridgeConfig,
    session: Arc<WalletSession>,
    wallet: Option<Arc<dyn Eip1193Provider>>,
    history: Option<BridgeHistory>,
    observer: Option<StepObserver>,
}

struct Contracts {
    xreserve: Address,
    xreserve_hex: String,
    usdc: Address,
    usdc_hex: String,
}

impl BridgeOrchestrator {
    /// `wallet` is `None` when no foreign-chain wallet is installed
    pub fn new(
        config: BridgeConfig,
        session: Arc<WalletSession>,
        wallet: Option<Arc<dyn Eip1193Provider>>,
    ) -> Self {
        Self {
            config,
            session,
            wallet,
            history: None,
            observer: None,
        }
    }

    pub fn with_history(mut self, history: BridgeHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn on_step(mut self, observer: impl Fn(&BridgeStep) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn step(&self, step: BridgeStep) {
        log::info!("Bridge step: {}", step.label());
        if let Some(observer) = &self.observer {
            observer(&step);
        }
    }

    fn contracts(&self) -> Result<Contracts, StackPayError> {
        let (Some(xreserve_hex), Some(usdc_hex)) =
            (&self.config.xreserve_address, &self.config.usdc_address)
        else {
            return Err(StackPayError::MissingContractConfig(
                "xReserve and USDC addresses must be set".to_string(),
            ));
        };
        Ok(Contracts {
            xreserve: evm::parse_address(xreserve_hex)?,
            xreserve_hex: xreserve_hex.clone(),
            usdc: evm::parse_address(usdc_hex)?,
            usdc_hex: usdc_hex.clone(),
        })
    }

    /// Bridge `amount` of USDC to `stacks_recipient`; returns the deposit
    /// transaction hash once its receipt confirms success.
    pub async fn bridge(&self, amount: Amount, stacks_recipient: &str) -> Result<String, StackPayError> {
        self.step(BridgeStep::Init);
        let contracts = self.contracts()?;
        let wallet = self.wallet.as_ref().ok_or(StackPayError::WalletNotInstalled)?;
        let account = self.session.require_address(Chain::Ethereum)?;
        let owner = evm::parse_address(&account)?;
        let remote_recipient = encode_remote_recipient(stacks_recipient)?;

        self.step(BridgeStep::ChainCheck);
        self.ensure_chain(wallet.as_ref()).await?;

        self.step(BridgeStep::BalanceCheck);
        if amount < self.config.min_amount {
            return Err(StackPayError::BelowMinimum {
                minimum: self.config.min_amount.to_string(),
            });
        }
        let value = U256::from(amount.base_units());
        let balance = self
            .eth_call(wallet.as_ref(), &contracts.usdc_hex, Erc20::balance_of(owner))
            .await?;
        if balance < value {
            // Below `value`, so it fits in u64
            return Err(StackPayError::insufficient_balance(
                Amount::from_base_units(balance.low_u64()),
                amount,
            ));
        }

        self.step(BridgeStep::AllowanceCheck);
        let allowance = self
            .eth_call(
                wallet.as_ref(),
                &contracts.usdc_hex,
                Erc20::allowance(owner, contracts.xreserve),
            )
            .await?;

        if allowance < value {
            self.step(BridgeStep::Approve { tx_hash: None });
            let approve_hash = self
                .send_transaction(
                    wallet.as_ref(),
                    &account,
                    &contracts.usdc_hex,
                    Erc20::approve(contracts.xreserve, value),
                )
                .await?;
            self.step(BridgeStep::Approve {
                tx_hash: Some(approve_hash.clone()),
            });
            self.wait_for_receipt(wallet.as_ref(), &approve_hash).await?;
        } else {
            log::debug!("Allowance {} covers {}, skipping approve", allowance, value);
        }

        self.step(BridgeStep::Deposit { tx_hash: None });
        let calldata = XReserve::deposit_to_remote(
            value,
            self.config.stacks_domain,
            remote_recipient,
            contracts.usdc,
            U256::zero(),
            &[],
        );
        let deposit_hash = self
            .send_transaction(wallet.as_ref(), &account, &contracts.xreserve_hex, calldata)
            .await?;
        self.step(BridgeStep::Deposit {
            tx_hash: Some(deposit_hash.clone()),
        });
        self.record(&deposit_hash, amount, BridgeStatus::Pending);

        if let Err(e) = self.wait_for_receipt(wallet.as_ref(), &deposit_hash).await {
            if matches!(e, StackPayError::TransactionReverted(_)) {
                self.update(&deposit_hash, BridgeStatus::Failed);
            }
            return Err(e);
        }

        self.step(BridgeStep::Polling {
            tx_hash: deposit_hash.clone(),
        });
        log::info!("Bridge deposit {} confirmed on source chain", deposit_hash);
        Ok(deposit_hash)
    }

    async fn ensure_chain(&self, wallet: &dyn Eip1193Provider) -> Result<(), StackPayError> {
        let expected = self.config.chain_id;
        let actual = evm::decode_quantity(&wallet.request("eth_chainId", json!([])).await?)?;
        if actual == expected {
            return Ok(());
        }

        log::info!("Wallet on chain {}, requesting switch to {}", actual, expected);
        let switched = wallet
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": evm::quantity(expected) }]),
            )
            .await;
        if let Err(e) = switched {
            log::warn!("Chain switch failed: {}", e);
            return Err(StackPayError::WrongNetwork { expected, actual });
        }

        let now = evm::decode_quantity(&wallet.request("eth_chainId", json!([])).await?)?;
        if now != expected {
            return Err(StackPayError::WrongNetwork { expected, actual: now });
        }
        Ok(())
    }

    async fn eth_call(
        &self,
        wallet: &dyn Eip1193Provider,
        to: &str,
        data: String,
    ) -> Result<U256, StackPayError> {
        let result = wallet
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        evm::decode_uint(&result)
    }

    async fn send_transaction(
        &self,
        wallet: &dyn Eip1193Provider,
        from: &str,
        to: &str,
        data: String,
    ) -> Result<String, StackPayError> {
        let result = wallet
            .request(
                "eth_sendTransaction",
                json!([{ "from": from, "to": to, "data": data }]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| StackPayError::InvalidResponse(format!("expected tx hash, got {}", result)))
    }

    async fn wait_for_receipt(
        &self,
        wallet: &dyn Eip1193Provider,
        tx_hash: &str,
    ) -> Result<(), StackPayError> {
        for attempt in 0..self.config.receipt_max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.receipt_poll_interval).await;
            }
            let receipt = match wallet
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await
            {
                Ok(receipt) => receipt,
                Err(e) => {
                    log::warn!("Receipt lookup for {} failed: {}", tx_hash, e);
                    continue;
                }
            };
            match evm::receipt_status(&receipt) {
                Some(true) => return Ok(()),
                Some(false) => return Err(StackPayError::TransactionReverted(tx_hash.to_string())),
                None => {}
            }
        }
        Err(StackPayError::Transport(format!(
            "timed out waiting for receipt of {}",
            tx_hash
        )))
    }

    fn record(&self, hash: &str, amount: Amount, status: BridgeStatus) {
        let Some(history) = &self.history else { return };
        let transfer = BridgeTransfer {
            hash: hash.to_string(),
            amount,
            date: Utc::now(),
            status,
        };
        if let Err(e) = history.record(transfer) {
            log::warn!("Failed to record bridge transfer {}: {}", hash, e);
        }
    }

    fn update(&self, hash: &str, status: BridgeStatus) {
        let Some(history) = &self.history else { return };
        if let Err(e) = history.set_status(hash, status) {
            log::warn!("Failed to update bridge transfer {}: {}", hash, e);
        }
    }
}
