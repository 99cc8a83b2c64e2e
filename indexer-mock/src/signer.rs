/// In-process wallet stand-in
///
/// Signs as a fixed sender and broadcasts straight into a [`MockChain`].
/// Calls that abort on-chain still return their transaction id, the same
/// as a real broadcast. Connecting a session through it yields the sender.

use async_trait::async_trait;
use std::sync::Arc;

use stackpay::signer::{ContractCall, ContractCallSigner};
use stackpay::{StackPayError, WalletProvider};

use crate::chain::{MockChain, SubmittedCall};

pub struct ChainSigner {
    chain: Arc<MockChain>,
    sender: String,
    pending: bool,
    reject: bool,
}

impl ChainSigner {
    pub fn new(chain: Arc<MockChain>, sender: impl Into<String>) -> Self {
        Self {
            chain,
            sender: sender.into(),
            pending: false,
            reject: false,
        }
    }

    /// Leave submitted calls in the mempool
    pub fn pending(mut self) -> Self {
        self.pending = true;
        self
    }

    /// Behave like a user dismissing every wallet prompt
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }
}

#[async_trait]
impl ContractCallSigner for ChainSigner {
    async fn sign_and_submit(&self, call: ContractCall) -> Result<String, StackPayError> {
        if self.reject {
            return Err(StackPayError::UserCancelled);
        }
        let submitted = SubmittedCall::from_contract_call(&self.sender, &call);
        let tx = if self.pending {
            self.chain.submit_pending(submitted)
        } else {
            self.chain.submit(submitted)
        };
        Ok(tx.tx_id)
    }
}

#[async_trait]
impl WalletProvider for ChainSigner {
    async fn connect(&self) -> Result<String, StackPayError> {
        if self.reject {
            return Err(StackPayError::UserCancelled);
        }
        Ok(self.sender.clone())
    }
}
