use stackpay_service::api::server;
use stackpay_service::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger (set RUST_LOG=debug for verbose output, RUST_LOG=info for normal)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // BIND_ADDRESS=127.0.0.1:3000 for local development
    let config = ServiceConfig::from_env();

    log::info!("Starting StackPay service on {}", config.bind_address);
    server::start_server(config).await?;
    Ok(())
}
