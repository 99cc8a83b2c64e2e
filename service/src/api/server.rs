use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use crate::config::ServiceConfig;
use crate::manager::PaymentService;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origin_list: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    log::info!("CORS configured for origins: {}", allowed_origins.join(","));

    CorsLayer::new()
        .allow_origin(origin_list)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(service: Arc<PaymentService>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        // Reads
        .route("/api/resolve/:input", get(handlers::resolve_handler))
        .route("/api/balance/:address", get(handlers::balance_handler))
        .route("/api/history/:address", get(handlers::history_handler))
        .route("/api/requests/:id", get(handlers::request_handler))
        .route("/pay/:payment_id", get(handlers::pay_link_handler))
        .route("/api/qr/decode", post(handlers::qr_decode_handler))
        .route("/api/qr/:id", get(handlers::qr_handler))
        .route(
            "/api/username/:name/availability",
            get(handlers::availability_handler),
        )
        .route(
            "/api/contract/interface",
            get(handlers::contract_interface_handler),
        )
        .route("/api/contract/source", get(handlers::contract_source_handler))
        // Unsigned calls for the wallet
        .route(
            "/api/prepare/transfer",
            post(handlers::prepare_transfer_handler),
        )
        .route("/api/prepare/escrow", post(handlers::prepare_escrow_handler))
        .route(
            "/api/prepare/invoice",
            post(handlers::prepare_invoice_handler),
        )
        .route("/api/prepare/claim", post(handlers::prepare_claim_handler))
        .route(
            "/api/prepare/pay-invoice",
            post(handlers::prepare_pay_invoice_handler),
        )
        .route("/api/prepare/cancel", post(handlers::prepare_cancel_handler))
        .route(
            "/api/prepare/register-username",
            post(handlers::prepare_register_username_handler),
        )
        .layer(cors_layer(allowed_origins))
        .with_state(service)
}

pub async fn start_server(config: ServiceConfig) -> anyhow::Result<()> {
    let service = Arc::new(PaymentService::new(config.stackpay.clone()));
    let app = create_router(service, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Server listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutdown signal received, exiting gracefully...");
}
