use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stackpay::StackPayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    StackPay(#[from] StackPayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::StackPay(e) => match e {
                StackPayError::UsernameNotFound(_) => StatusCode::NOT_FOUND,
                StackPayError::UsernameTaken(_) => StatusCode::CONFLICT,
                StackPayError::Validation(_)
                | StackPayError::InvalidInput(_)
                | StackPayError::InvalidAmount(_)
                | StackPayError::InvalidAddress(_)
                | StackPayError::Codec(_)
                | StackPayError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
                e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
