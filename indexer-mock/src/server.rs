/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chain::MockChain;
use crate::handlers::*;

pub fn create_router(chain: Arc<MockChain>) -> Router {
    // Configure CORS to allow requests from the client/tests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Contract endpoints
        .route(
            "/v2/contracts/call-read/:address/:contract/:function",
            post(call_read_only),
        )
        .route("/v2/contracts/interface/:address/:contract", get(get_contract_interface))
        .route("/v2/contracts/source/:address/:contract", get(get_contract_source))
        .route("/v2/data_var/:address/:contract/:var", get(get_data_var))
        .route("/v2/map_entry/:address/:contract/:map", post(get_map_entry))

        // Address endpoints
        .route("/extended/v1/address/:address/balances", get(get_balances))
        .route("/extended/v1/address/:address/transactions", get(get_transactions))
        .route("/extended/v1/address/:address/mempool", get(get_mempool))

        // Mock helper endpoints
        .route("/mock/usernames", post(register_username))
        .route("/mock/fund", post(fund_address))
        .route("/mock/submit", post(submit_call))
        .route("/mock/confirm", post(confirm_pending))

        // Shared state
        .with_state(chain)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(chain: Arc<MockChain>, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(chain);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Indexer mock listening on http://{}", addr);
    log::info!("🔨 Helper endpoints: POST /mock/{{usernames,fund,submit,confirm}}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve on an ephemeral localhost port in the background (for tests);
/// returns the bound address
pub async fn spawn(chain: Arc<MockChain>) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(chain);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("Indexer mock stopped: {}", e);
        }
    });

    log::debug!("Indexer mock on http://{}", addr);
    Ok(addr)
}
