//! Configuration module for environment variables and application settings

use anyhow::Result;
use once_cell::sync::Lazy;
use std::env;

/// Global application configuration loaded from environment variables
pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key for the generative parsing tier. Optional: without it
    /// the parser skips straight to the regex tier.
    pub gemini_api_key: Option<String>,

    /// Jupiter API base URL (mainnet aggregator path)
    pub jupiter_api_url: String,

    /// Service wallet secret key, base58. Payments, test-token minting and
    /// aggregator swaps are signed with this key.
    pub service_wallet_key: Option<String>,

    /// RPC endpoints per network
    pub rpc: RpcConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Retry policy applied to every RPC/HTTP submission
    pub retry: RetryConfig,

    /// Token cache tuning
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub localnet_url: String,
    pub devnet_url: String,
    pub mainnet_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// In-memory metadata cache TTL in seconds
    pub cache_ttl_secs: i64,
    /// Default slippage tolerance against the 100_000 denominator
    /// (500 is 0.5%)
    pub default_slippage_bps: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),

            jupiter_api_url: env::var("JUPITER_API_URL")
                .unwrap_or_else(|_| "https://quote-api.jup.ag/v6".to_string()),

            service_wallet_key: env::var("SERVICE_WALLET_KEY").ok().filter(|k| !k.is_empty()),

            rpc: RpcConfig {
                localnet_url: env::var("LOCALNET_RPC_URL")
                    .unwrap_or_else(|_| "http://localhost:8899".to_string()),
                devnet_url: env::var("DEVNET_RPC_URL")
                    .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string()),
                mainnet_url: env::var("MAINNET_RPC_URL")
                    .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            },

            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },

            retry: RetryConfig {
                max_attempts: env::var("RETRY_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                base_delay_ms: env::var("RETRY_BASE_DELAY_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .unwrap_or(500),
                multiplier: env::var("RETRY_MULTIPLIER")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },

            tokens: TokenConfig {
                cache_ttl_secs: env::var("TOKEN_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                default_slippage_bps: env::var("DEFAULT_SLIPPAGE_BPS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .unwrap_or(500),
            },
        })
    }
}
