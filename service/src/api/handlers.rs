use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use stackpay::api::ContractSource;
use stackpay::history::HistoryFilter;

use super::types::*;
use crate::error::ServiceError;
use crate::manager::PaymentService;

pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn resolve_handler(
    State(service): State<Arc<PaymentService>>,
    Path(input): Path<String>,
) -> Result<Json<ResolveResponse>, ServiceError> {
    Ok(Json(service.resolve(&input).await?))
}

pub async fn balance_handler(
    State(service): State<Arc<PaymentService>>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ServiceError> {
    Ok(Json(service.balance(&address).await?))
}

pub async fn history_handler(
    State(service): State<Arc<PaymentService>>,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ServiceError> {
    let filter: HistoryFilter = query.filter.as_deref().unwrap_or("all").parse()?;
    Ok(Json(service.history(&address, filter).await))
}

pub async fn request_handler(
    State(service): State<Arc<PaymentService>>,
    Path(id): Path<String>,
) -> Result<Json<RequestResponse>, ServiceError> {
    Ok(Json(service.request(&id).await?))
}

/// Deep link target of the QR code
pub async fn pay_link_handler(
    State(service): State<Arc<PaymentService>>,
    Path(payment_id): Path<String>,
) -> Result<Json<RequestResponse>, ServiceError> {
    log::debug!("Deep link opened for {}", payment_id);
    Ok(Json(service.request(&payment_id).await?))
}

pub async fn qr_handler(
    State(service): State<Arc<PaymentService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let svg = service.qr_svg(&id)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

pub async fn qr_decode_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<QrDecodeRequest>,
) -> Json<QrDecodeResponse> {
    Json(service.decode_qr(&req.text))
}

pub async fn availability_handler(
    State(service): State<Arc<PaymentService>>,
    Path(name): Path<String>,
) -> Result<Json<AvailabilityResponse>, ServiceError> {
    Ok(Json(service.availability(&name).await?))
}

pub async fn contract_interface_handler(
    State(service): State<Arc<PaymentService>>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(service.contract_interface().await?))
}

pub async fn contract_source_handler(
    State(service): State<Arc<PaymentService>>,
) -> Result<Json<ContractSource>, ServiceError> {
    Ok(Json(service.contract_source().await?))
}

// ============================================================================
// Prepare endpoints
// ============================================================================

pub async fn prepare_transfer_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareTransferRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_transfer(&req).await?))
}

pub async fn prepare_escrow_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareRequestRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_escrow(&req).await?))
}

pub async fn prepare_invoice_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareRequestRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_invoice(&req).await?))
}

pub async fn prepare_claim_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareSettleRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_claim(&req).await?))
}

pub async fn prepare_pay_invoice_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareSettleRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_pay_invoice(&req).await?))
}

pub async fn prepare_cancel_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareSettleRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_cancel(&req).await?))
}

pub async fn prepare_register_username_handler(
    State(service): State<Arc<PaymentService>>,
    Json(req): Json<PrepareUsernameRequest>,
) -> Result<Json<PreparedCall>, ServiceError> {
    Ok(Json(service.prepare_register_username(&req).await?))
}
