//! # Companion Server
//!
//! Backend for a Solana "Web3 assistant": a chat endpoint that parses
//! natural-language payment instructions and executes transfers, a swap
//! engine backed by constant-product pools (Jupiter on mainnet), token
//! metadata resolution with test-token minting, and wallet balance queries.
//!
//! ## Architecture
//! - `server`: HTTP server setup and the route table
//! - `config`: environment variable configuration management
//! - `network`: localnet/devnet/mainnet selection
//! - `math`: integer constant-product swap math
//! - `retry`: the retry/backoff policy wrapping every submission
//! - `routes`: HTTP handlers organized by API domain
//! - `services`: instruction parsing, payments, tokens, swaps
//! - `database`: postgres-backed token metadata cache
//!
//! ## Environment Setup
//! Copy `.env.example` to `.env` and configure:
//! ```bash
//! cp .env.example .env
//! # Edit .env with your keys and endpoints
//! ```
//!
//! ## Running the Server
//! ```bash
//! cargo run
//! ```
//!
//! ## Health Check
//! ```bash
//! curl http://localhost:3000/ping
//! ```

mod config;
mod database;
mod math;
mod network;
mod retry;
mod routes;
mod server;
mod services;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting companion server...");
    tracing::info!(
        "📦 Package: {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        "🏗️  Build profile: {}",
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );

    server::start().await;
}
