use chrono::Utc;
use std::sync::Arc;

use super::builders::RequestCalls;
use super::{PaymentRequest, RequestKind, RequestStatus};
use crate::amount::Amount;
use crate::api::StacksApiClient;
use crate::clarity::ClarityValue;
use crate::config::StackPayConfig;
use crate::error::StackPayError;
use crate::ledger::{PaymentLedger, PaymentRecord};
use crate::mirror::{self, MirroredRequest, NoMirror, RequestMirror};
use crate::qr::build_payment_url;
use crate::session::{Chain, WalletSession};
use crate::signer::{ContractCall, ContractCallSigner};

/// Payment-request writes through the wallet, plus request lookup
///
/// Writes act as the session's connected Stacks address. Successful writes
/// update the optional mirror and the local ledger; neither can fail the
/// write itself.
pub struct RequestManager {
    calls: RequestCalls,
    api: StacksApiClient,
    wallet: Option<(Arc<WalletSession>, Arc<dyn ContractCallSigner>)>,
    mirror: Arc<dyn RequestMirror>,
    ledger: Arc<PaymentLedger>,
    app_origin: String,
}

impl RequestManager {
    /// Read-only until a wallet is attached with [`Self::with_wallet`]
    pub fn new(config: &StackPayConfig, api: StacksApiClient) -> Self {
        Self {
            calls: RequestCalls::new(config),
            api,
            wallet: None,
            mirror: Arc::new(NoMirror),
            ledger: Arc::new(PaymentLedger::new()),
            app_origin: config.app_origin.clone(),
        }
    }

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

    pub fn with_ledger(mut self, ledger: Arc<PaymentLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn calls(&self) -> &RequestCalls {
        &self.calls
    }

    pub fn ledger(&self) -> &Arc<PaymentLedger> {
        &self.ledger
    }

    /// Connected Stacks address and its signer
    fn wallet(&self) -> Result<(String, &dyn ContractCallSigner), StackPayError> {
        let (session, signer) = self
            .wallet
            .as_ref()
            .ok_or_else(|| StackPayError::NotConnected(Chain::Stacks.to_string()))?;
        Ok((session.require_address(Chain::Stacks)?, signer.as_ref()))
    }

    async fn submit(&self, signer: &dyn ContractCallSigner, call: ContractCall) -> Result<String, StackPayError> {
        let function = call.function_name.clone();
        match signer.sign_and_submit(call).await {
            Ok(txid) => {
                log::info!("{} submitted: {}", function, txid);
                Ok(txid)
            }
            Err(e) if e.is_user_cancelled() => {
                log::info!("{} cancelled by user", function);
                Err(e)
            }
            Err(e) => {
                log::error!("{} failed: {}", function, e);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_created(
        &self,
        id: &str,
        kind: RequestKind,
        creator: &str,
        recipient: &str,
        amount: Amount,
        memo: &str,
        txid: &str,
    ) {
        self.ledger.add(PaymentRecord {
            id: id.to_string(),
            amount,
            recipient: recipient.to_string(),
            memo: memo.to_string(),
            status: RequestStatus::Pending,
            tx_id: Some(txid.to_string()),
            created_at: Utc::now(),
        });

        let doc = MirroredRequest {
            request_id: id.to_string(),
            creator: creator.to_string(),
            recipient: recipient.to_string(),
            amount,
            memo: memo.to_string(),
            status: RequestStatus::Pending,
            request_type: kind,
            qr_code_url: build_payment_url(&self.app_origin, id),
            created_at: Utc::now(),
            claimed_by: None,
            claimed_at: None,
            tx_id: None,
        };
        if let Err(e) = self.mirror.put(&doc).await {
            mirror::report("write", &e);
        }
    }

    /// Create an escrow request; `amount` leaves the creator's balance now
    pub async fn create_escrow(
        &self,
        id: &str,
        recipient: &str,
        amount: Amount,
        memo: &str,
    ) -> Result<String, StackPayError> {
        let (creator, signer) = self.wallet()?;
        let memo = if memo.trim().is_empty() {
            RequestKind::Escrow.default_memo()
        } else {
            memo
        };
        let call = self
            .calls
            .build_create_escrow(id, recipient, amount, memo, &creator)?;
        let txid = self.submit(signer, call).await?;

        self.record_created(id, RequestKind::Escrow, &creator, recipient, amount, memo, &txid)
            .await;
        Ok(txid)
    }

    /// Create an invoice that `recipient` is asked to pay; no funds move now
    pub async fn create_invoice(
        &self,
        id: &str,
        recipient: &str,
        amount: Amount,
        memo: &str,
    ) -> Result<String, StackPayError> {
        let (creator, signer) = self.wallet()?;
        let memo = if memo.trim().is_empty() {
            RequestKind::Invoice.default_memo()
        } else {
            memo
        };
        let call = self.calls.build_create_invoice(id, recipient, amount, memo)?;
        let txid = self.submit(signer, call).await?;

        self.record_created(id, RequestKind::Invoice, &creator, recipient, amount, memo, &txid)
            .await;
        Ok(txid)
    }

    async fn record_settled(&self, id: &str, by: &str, txid: &str) {
        self.ledger.update_status(id, RequestStatus::Completed);
        if let Err(e) = self.mirror.mark_claimed(id, by, txid).await {
            mirror::report("update", &e);
        }
    }

    /// Claim an escrow request addressed to the connected wallet
    pub async fn claim(&self, id: &str, amount: Amount) -> Result<String, StackPayError> {
        let (claimer, signer) = self.wallet()?;
        let call = self.calls.build_claim(id, amount)?;
        let txid = self.submit(signer, call).await?;
        self.record_settled(id, &claimer, &txid).await;
        Ok(txid)
    }

    pub async fn pay_invoice(&self, id: &str, amount: Amount) -> Result<String, StackPayError> {
        let (payer, signer) = self.wallet()?;
        let call = self.calls.build_pay_invoice(id, amount, &payer)?;
        let txid = self.submit(signer, call).await?;
        self.record_settled(id, &payer, &txid).await;
        Ok(txid)
    }

    pub async fn cancel(&self, id: &str) -> Result<String, StackPayError> {
        let (_, signer) = self.wallet()?;
        let call = self.calls.build_cancel(id)?;
        let txid = self.submit(signer, call).await?;
        self.ledger.update_status(id, RequestStatus::Cancelled);
        Ok(txid)
    }

    /// Look a request up: mirror first (best-effort), then the contract
    pub async fn fetch_request(&self, id: &str) -> Result<Option<PaymentRequest>, StackPayError> {
        match self.mirror.get(id).await {
            Ok(Some(doc)) => {
                log::debug!("Request {} served from mirror", id);
                return Ok(Some(PaymentRequest {
                    id: doc.request_id,
                    creator: doc.creator,
                    recipient: doc.recipient,
                    amount: doc.amount,
                    memo: doc.memo,
                    kind: doc.request_type,
                    status: doc.status,
                }));
            }
            Ok(None) => {}
            Err(e) => mirror::report("read", &e),
        }

        self.fetch_on_chain(id).await
    }

    /// `get-payment-request(id)`; `None` when the contract has no such request
    pub async fn fetch_on_chain(&self, id: &str) -> Result<Option<PaymentRequest>, StackPayError> {
        let contract = self.calls.payment_contract();
        let response = self
            .api
            .call_read_only(
                contract,
                "get-payment-request",
                &contract.address,
                &[ClarityValue::ascii(id)?],
            )
            .await?;

        let value = match response.value()? {
            Some(value) => value,
            None => return Ok(None),
        };
        if value.unwrap_present().is_none() {
            return Ok(None);
        }
        PaymentRequest::from_clarity(id, &value).map(Some)
    }
}
