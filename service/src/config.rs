use stackpay::StackPayConfig;
use std::env;

/// Service configuration from environment variables
///
/// - `BIND_ADDRESS`: listen address (default `0.0.0.0:3000`)
/// - `ALLOWED_ORIGINS`: comma-separated CORS origins; unset allows any
///   origin (development mode)
/// - everything `StackPayConfig::from_env` reads
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub allowed_origins: Vec<String>,
    pub stackpay: StackPayConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind_address,
            allowed_origins,
            stackpay: StackPayConfig::from_env(),
        }
    }
}
