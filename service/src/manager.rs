/// Payment Service - Orchestration Layer
///
/// Wires the `stackpay` flows to one indexer and one data directory. The
/// service never signs: write endpoints return the unsigned contract call
/// after running the same guards the wallet flow runs.
use std::sync::Arc;

use serde_json::Value;
use stackpay::api::ContractSource;
use stackpay::history::{HistoryFilter, HistoryService};
use stackpay::qr::{build_payment_url, parse_payment_id, render_svg};
use stackpay::requests::{new_request_id, validate_request_id};
use stackpay::resolver::normalize_username;
use stackpay::transfer::build_transfer;
use stackpay::{
    validate_transfer, Amount, Availability, BalanceReader, ClaimAction, FileMirror,
    PaymentRequest, RequestKind, RequestManager, Resolver, StackPayConfig, StackPayError,
    StacksApiClient, Storage, UsernameRegistry,
};

use crate::api::types::*;
use crate::error::ServiceError;

pub struct PaymentService {
    pub config: StackPayConfig,
    pub storage: Storage,
    api: StacksApiClient,
    resolver: Resolver,
    balances: BalanceReader,
    history: HistoryService,
    requests: RequestManager,
    usernames: UsernameRegistry,
}

impl PaymentService {
    // ============================================================================
    // Constructor
    // ============================================================================

    pub fn new(config: StackPayConfig) -> Self {
        let storage = Storage::new_with_base_dir(config.data_dir.clone());
        Self::new_with_storage(config, storage)
    }

    /// Create the service with custom storage (for testing)
    pub fn new_with_storage(config: StackPayConfig, storage: Storage) -> Self {
        let api = StacksApiClient::new(&config.api_url);
        let mirror = Arc::new(FileMirror::new(storage.clone()));

        Self {
            resolver: Resolver::new(api.clone(), config.username_contract.clone()),
            balances: BalanceReader::new(api.clone(), config.asset_identifier()),
            history: HistoryService::new(api.clone(), &config).with_mirror(mirror.clone()),
            requests: RequestManager::new(&config, api.clone()).with_mirror(mirror.clone()),
            usernames: UsernameRegistry::new(&config, api.clone()).with_mirror(mirror),
            api,
            config,
            storage,
        }
    }

    fn parse_amount(text: &str) -> Result<Amount, ServiceError> {
        Ok(text.parse::<Amount>()?)
    }

    fn payment_url(&self, id: &str) -> String {
        build_payment_url(&self.config.app_origin, id)
    }

    // ============================================================================
    // Reads
    // ============================================================================

    pub async fn resolve(&self, input: &str) -> Result<ResolveResponse, ServiceError> {
        let address = self.resolver.resolve(input).await?;
        let username = if input.trim().starts_with('@') {
            Some(normalize_username(input)?.to_string())
        } else {
            self.resolver.lookup_username(&address).await
        };

        Ok(ResolveResponse {
            input: input.to_string(),
            address,
            username,
        })
    }

    pub async fn balance(&self, address: &str) -> Result<BalanceResponse, ServiceError> {
        let balance = self.balances.token_balance(address).await?;
        Ok(BalanceResponse {
            address: address.to_string(),
            balance: balance.to_string(),
            base_units: balance.base_units(),
            asset: self.balances.asset_identifier().to_string(),
        })
    }

    pub async fn history(&self, address: &str, filter: HistoryFilter) -> HistoryResponse {
        let view = self.history.load(address).await;
        let items = filter.apply(&view.items, address).into_iter().cloned().collect();

        HistoryResponse {
            address: address.to_string(),
            filter,
            items,
            stats: view.stats,
            labels: view.labels,
            pending_claims: view.pending_claims,
        }
    }

    pub async fn request(&self, id: &str) -> Result<RequestResponse, ServiceError> {
        let request = self.find_request(id).await?;
        Ok(RequestResponse {
            payment_url: self.payment_url(&request.id),
            request,
        })
    }

    async fn find_request(&self, id: &str) -> Result<PaymentRequest, ServiceError> {
        self.requests
            .fetch_request(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment request {}", id)))
    }

    pub fn qr_svg(&self, id: &str) -> Result<String, ServiceError> {
        Ok(render_svg(&self.payment_url(id))?)
    }

    pub fn decode_qr(&self, text: &str) -> QrDecodeResponse {
        QrDecodeResponse {
            payment_id: parse_payment_id(text),
        }
    }

    pub async fn availability(&self, name: &str) -> Result<AvailabilityResponse, ServiceError> {
        let availability = self.usernames.availability(name).await?;
        Ok(AvailabilityResponse {
            username: normalize_username(name)?.to_string(),
            availability,
        })
    }

    pub async fn contract_interface(&self) -> Result<Value, ServiceError> {
        Ok(self
            .api
            .get_contract_interface(&self.config.payment_contract)
            .await?)
    }

    pub async fn contract_source(&self) -> Result<ContractSource, ServiceError> {
        Ok(self
            .api
            .get_contract_source(&self.config.payment_contract)
            .await?)
    }

    // ============================================================================
    // Prepare (unsigned calls)
    // ============================================================================

    pub async fn prepare_transfer(&self, req: &PrepareTransferRequest) -> Result<PreparedCall, ServiceError> {
        let amount = Self::parse_amount(&req.amount)?;
        let recipient = self.resolver.resolve(&req.recipient).await?;
        let balance = self.balances.token_balance_or_placeholder(&req.sender).await;
        validate_transfer(&recipient, amount, &req.sender, balance)?;

        let call = build_transfer(
            &self.config.token_contract,
            &self.config.asset_identifier(),
            &recipient,
            amount,
            &req.sender,
        )?;
        log::info!("Prepared transfer of {} from {} to {}", amount, req.sender, recipient);

        Ok(PreparedCall {
            recipient: Some(recipient),
            ..PreparedCall::new(call)
        })
    }

    pub async fn prepare_escrow(&self, req: &PrepareRequestRequest) -> Result<PreparedCall, ServiceError> {
        let amount = Self::parse_amount(&req.amount)?;
        let recipient = self.resolver.resolve(&req.recipient).await?;
        let balance = self.balances.token_balance_or_placeholder(&req.creator).await;
        validate_transfer(&recipient, amount, &req.creator, balance)?;

        let id = req.id.clone().unwrap_or_else(new_request_id);
        validate_request_id(&id)?;
        let memo = memo_or_default(req.memo.as_deref(), RequestKind::Escrow);
        let call = self
            .requests
            .calls()
            .build_create_escrow(&id, &recipient, amount, memo, &req.creator)?;
        log::info!("Prepared escrow request {} for {}", id, recipient);

        Ok(PreparedCall {
            recipient: Some(recipient),
            payment_url: Some(self.payment_url(&id)),
            request_id: Some(id),
            ..PreparedCall::new(call)
        })
    }

    pub async fn prepare_invoice(&self, req: &PrepareRequestRequest) -> Result<PreparedCall, ServiceError> {
        let amount = Self::parse_amount(&req.amount)?;
        let recipient = self.resolver.resolve(&req.recipient).await?;
        // No funds move at creation, so no balance guard
        validate_transfer(&recipient, amount, &req.creator, None)?;

        let id = req.id.clone().unwrap_or_else(new_request_id);
        validate_request_id(&id)?;
        let memo = memo_or_default(req.memo.as_deref(), RequestKind::Invoice);
        let call = self
            .requests
            .calls()
            .build_create_invoice(&id, &recipient, amount, memo)?;
        log::info!("Prepared invoice {} for {}", id, recipient);

        Ok(PreparedCall {
            recipient: Some(recipient),
            payment_url: Some(self.payment_url(&id)),
            request_id: Some(id),
            ..PreparedCall::new(call)
        })
    }

    /// Claim or pay, whichever the request kind calls for
    pub async fn prepare_claim(&self, req: &PrepareSettleRequest) -> Result<PreparedCall, ServiceError> {
        let request = self.find_request(&req.id).await?;
        let balance = match request.kind {
            RequestKind::Invoice => self.balances.token_balance_or_placeholder(&req.caller).await,
            RequestKind::Escrow => None,
        };

        let action = ClaimAction::decide(&request, &req.caller, balance)?;
        let calls = self.requests.calls();
        let call = match action {
            ClaimAction::Claim => calls.build_claim(&request.id, request.amount)?,
            ClaimAction::PayInvoice => calls.build_pay_invoice(&request.id, request.amount, &req.caller)?,
        };

        Ok(PreparedCall {
            request_id: Some(request.id),
            action: Some(action),
            ..PreparedCall::new(call)
        })
    }

    pub async fn prepare_pay_invoice(&self, req: &PrepareSettleRequest) -> Result<PreparedCall, ServiceError> {
        let request = self.find_request(&req.id).await?;
        if request.kind != RequestKind::Invoice {
            return Err(StackPayError::Validation(format!("{} is not an invoice", request.id)).into());
        }
        self.prepare_claim(req).await
    }

    pub async fn prepare_cancel(&self, req: &PrepareSettleRequest) -> Result<PreparedCall, ServiceError> {
        let request = self.find_request(&req.id).await?;
        if request.status.is_terminal() {
            return Err(StackPayError::Validation(format!(
                "Payment request is already {}",
                request.status
            ))
            .into());
        }
        if !request.creator.eq_ignore_ascii_case(&req.caller) {
            return Err(StackPayError::Validation(
                "Only the creator can cancel this request".to_string(),
            )
            .into());
        }

        let call = self.requests.calls().build_cancel(&request.id)?;
        Ok(PreparedCall {
            request_id: Some(request.id),
            ..PreparedCall::new(call)
        })
    }

    pub async fn prepare_register_username(
        &self,
        req: &PrepareUsernameRequest,
    ) -> Result<PreparedCall, ServiceError> {
        let username = normalize_username(&req.username)?;
        if self.usernames.availability(username).await? == Availability::Taken {
            return Err(StackPayError::UsernameTaken(username.to_string()).into());
        }
        if let Some(existing) = self.usernames.my_username(&req.address).await {
            return Err(StackPayError::Validation(format!(
                "{} is already registered as @{}",
                req.address, existing
            ))
            .into());
        }

        let call = self.requests.calls().build_register_username(username)?;
        Ok(PreparedCall::new(call))
    }
}

fn memo_or_default(memo: Option<&str>, kind: RequestKind) -> &str {
    match memo.map(str::trim) {
        Some(m) if !m.is_empty() => m,
        _ => kind.default_memo(),
    }
}
