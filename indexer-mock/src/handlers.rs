/// Axum HTTP handlers for the indexer API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use stackpay::api::{
    BalancesResponse, ContractSource, DataResponse, ReadOnlyRequest, ReadOnlyResponse,
    TransactionListResponse,
};
use stackpay::ClarityValue;

use crate::chain::{MockChain, SubmittedCall};
use crate::types::*;

/// Shared application state
pub type AppState = Arc<MockChain>;

const DEFAULT_PAGE_LIMIT: usize = 50;

/// Custom error type for handlers
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, message).into_response()
    }
}

fn decode_args(hex_args: &[String]) -> Result<Vec<ClarityValue>, ApiError> {
    hex_args
        .iter()
        .map(|hex| {
            ClarityValue::from_hex(hex)
                .map_err(|e| ApiError::BadRequest(format!("Invalid argument {}: {}", hex, e)))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

// ============================================================================
// CONTRACT ENDPOINTS
// ============================================================================

/// POST /v2/contracts/call-read/{address}/{contract}/{function}
pub async fn call_read_only(
    State(chain): State<AppState>,
    Path((address, contract, function)): Path<(String, String, String)>,
    Json(req): Json<ReadOnlyRequest>,
) -> Result<Json<ReadOnlyResponse>, ApiError> {
    let args = decode_args(&req.arguments)?;
    let contract_id = format!("{}.{}", address, contract);
    log::debug!("call-read {}::{} from {}", contract_id, function, req.sender);
    Ok(Json(chain.read_only(&contract_id, &function, &args)))
}

/// GET /v2/contracts/interface/{address}/{contract}
pub async fn get_contract_interface(
    State(chain): State<AppState>,
    Path((address, contract)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let contract_id = format!("{}.{}", address, contract);
    chain
        .contract_interface(&contract_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Contract not found: {}", contract_id)))
}

/// GET /v2/contracts/source/{address}/{contract}
pub async fn get_contract_source(
    State(chain): State<AppState>,
    Path((address, contract)): Path<(String, String)>,
) -> Result<Json<ContractSource>, ApiError> {
    let contract_id = format!("{}.{}", address, contract);
    chain
        .contract_source(&contract_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Contract not found: {}", contract_id)))
}

/// GET /v2/data_var/{address}/{contract}/{var}
pub async fn get_data_var(
    State(chain): State<AppState>,
    Path((address, contract, var)): Path<(String, String, String)>,
) -> Result<Json<DataResponse>, ApiError> {
    let contract_id = format!("{}.{}", address, contract);
    let value = chain
        .data_var(&contract_id, &var)
        .ok_or_else(|| ApiError::NotFound(format!("Data var not found: {}::{}", contract_id, var)))?;
    Ok(Json(DataResponse {
        data: value.to_hex(),
        proof: None,
    }))
}

/// POST /v2/map_entry/{address}/{contract}/{map}
///
/// Body is the hex-encoded key as a JSON string.
pub async fn get_map_entry(
    State(chain): State<AppState>,
    Path((address, contract, map)): Path<(String, String, String)>,
    Json(key): Json<String>,
) -> Result<Json<DataResponse>, ApiError> {
    let key = decode_args(std::slice::from_ref(&key))?
        .pop()
        .ok_or_else(|| ApiError::BadRequest("Missing map key".to_string()))?;
    let contract_id = format!("{}.{}", address, contract);
    let value = chain
        .map_entry(&contract_id, &map, &key)
        .map_err(ApiError::NotFound)?;
    Ok(Json(DataResponse {
        data: value.to_hex(),
        proof: None,
    }))
}

// ============================================================================
// ADDRESS ENDPOINTS
// ============================================================================

/// GET /extended/v1/address/{address}/balances
pub async fn get_balances(
    State(chain): State<AppState>,
    Path(address): Path<String>,
) -> Json<BalancesResponse> {
    Json(chain.balances(&address))
}

/// GET /extended/v1/address/{address}/transactions
pub async fn get_transactions(
    State(chain): State<AppState>,
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
) -> Json<TransactionListResponse> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let results = chain.transactions(&address, limit);
    Json(page_of(results, limit))
}

/// GET /extended/v1/address/{address}/mempool
pub async fn get_mempool(
    State(chain): State<AppState>,
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
) -> Json<TransactionListResponse> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let results = chain.mempool(&address, limit);
    Json(page_of(results, limit))
}

fn page_of(results: Vec<Value>, limit: usize) -> TransactionListResponse {
    TransactionListResponse {
        limit: limit as u32,
        offset: 0,
        total: results.len() as u64,
        results,
    }
}

// ============================================================================
// MOCK HELPER ENDPOINTS (not part of the indexer API)
// ============================================================================

/// POST /mock/usernames
pub async fn register_username(
    State(chain): State<AppState>,
    Json(req): Json<RegisterUsernameRequest>,
) -> StatusCode {
    chain.register_username(&req.username, &req.address);
    StatusCode::CREATED
}

/// POST /mock/fund
pub async fn fund_address(
    State(chain): State<AppState>,
    Json(req): Json<FundRequest>,
) -> Json<FundResponse> {
    let balance = chain.fund(&req.address, req.amount);
    Json(FundResponse {
        address: req.address,
        balance,
    })
}

/// POST /mock/submit
/// Broadcast a contract call as `sender`
pub async fn submit_call(
    State(chain): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let call = SubmittedCall {
        sender: req.sender,
        contract_id: format!("{}.{}", req.contract_address, req.contract_name),
        function_name: req.function_name,
        args: decode_args(&req.function_args)?,
        post_conditions: Vec::new(),
    };

    let tx = if req.pending {
        chain.submit_pending(call)
    } else {
        chain.submit(call)
    };
    Ok(Json(SubmitResponse {
        tx_id: tx.tx_id,
        tx_status: tx.tx_status,
    }))
}

/// POST /mock/confirm
/// Confirm everything in the mempool
pub async fn confirm_pending(State(chain): State<AppState>) -> Json<ConfirmResponse> {
    let confirmed = chain.confirm_pending();
    log::info!("Confirmed {} pending transactions", confirmed);
    Json(ConfirmResponse { confirmed })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
