//! # Server Module
//!
//! HTTP server setup and route configuration.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CONFIG;
use crate::database::{DatabaseConfig, DatabaseConnection};
use crate::routes::{chat, health, payments, swap, tokens, wallet};
use crate::services::nlp::InstructionParser;
use crate::services::payments::PaymentService;
use crate::services::swap_engine::SwapEngine;
use crate::services::tokens::TokenService;

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub parser: Arc<InstructionParser>,
    pub payments: Arc<PaymentService>,
    pub tokens: Arc<TokenService>,
    pub swaps: Arc<SwapEngine>,
}

/// Starts the HTTP server: connects the database, runs migrations, builds
/// the service graph and serves the API until the process terminates.
pub async fn start() {
    let db_config = DatabaseConfig::from_env().expect("Failed to load DB config from env");
    let db = Arc::new(
        DatabaseConnection::new(db_config)
            .await
            .expect("Failed to connect to DB"),
    );
    db.migrate().await.expect("Failed to run database migrations");

    let token_service = Arc::new(TokenService::new(db.as_ref().clone()));
    let parser = Arc::new(InstructionParser::new(CONFIG.gemini_api_key.clone()));
    let payment_service = Arc::new(PaymentService::new(token_service.clone()));
    let swap_engine = Arc::new(SwapEngine::new(token_service.clone()));

    let app_state = AppState {
        db,
        parser,
        payments: payment_service,
        tokens: token_service,
        swaps: swap_engine,
    };

    let app = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health))
        .route("/api/v1/chat/message", post(chat::chat_message))
        .route("/api/v1/wallet/balance", get(wallet::get_wallet_balance))
        .route("/api/v1/payments/send", post(payments::send_payment))
        .route("/api/v1/payments/prepare", post(payments::prepare_payment))
        .route("/api/v1/tokens", get(tokens::list_tokens))
        .route("/api/v1/tokens/resolve", get(tokens::resolve_token))
        .route("/api/v1/tokens/register", post(tokens::register_token))
        .route("/api/v1/tokens/mint", post(tokens::mint_tokens))
        .route("/api/v1/swap/quote", post(swap::quote_swap))
        .route("/api/v1/swap/execute", post(swap::execute_swap))
        .route("/api/v1/swap/pool/create", post(swap::create_pool))
        .route("/api/v1/swap/pool/add-liquidity", post(swap::add_liquidity))
        .layer(
            ServiceBuilder::new().layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([
                        axum::http::Method::GET,
                        axum::http::Method::POST,
                        axum::http::Method::OPTIONS,
                    ])
                    .allow_headers([
                        axum::http::header::ORIGIN,
                        axum::http::header::CONTENT_TYPE,
                        axum::http::header::ACCEPT,
                    ]),
            ),
        )
        .with_state(app_state);

    let addr = format!("{}:{}", CONFIG.server.host, CONFIG.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address - port may already be in use");

    tracing::info!("🚀 Companion server starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/ping", addr);
    tracing::info!("💬 Chat endpoint available at http://{}/api/v1/chat/message", addr);
    tracing::info!("🔁 Swap endpoints available at http://{}/api/v1/swap/*", addr);

    axum::serve(listener, app).await.expect("Server error");
}
