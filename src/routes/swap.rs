//! # Swap Routes
//!
//! Quotes and execution against the companion program's pools (localnet and
//! devnet) or the Jupiter aggregator (mainnet), plus pool lifecycle helpers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_async::Service;
use tracing::info;

use crate::network::Network;
use crate::routes::{ErrorResponse, error_response};
use crate::server::AppState;
use crate::services::swap_engine::{
    LiquidityReceipt, PoolCreationReceipt, SwapCall, SwapError, SwapQuote, SwapReceipt,
};
use crate::services::tokens::TokenError;

#[derive(Debug, Deserialize)]
pub struct SwapQuoteRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    /// Slippage against the 100_000 denominator; server default when absent
    pub slippage_bps: Option<u64>,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct CreatePoolRequest {
    pub token_a: String,
    pub token_b: String,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct AddLiquidityRequest {
    pub token_a: String,
    pub token_b: String,
    pub amount_a: Decimal,
    /// Required only when the pool is empty
    pub amount_b: Option<Decimal>,
    #[serde(default)]
    pub network: Network,
}

/// Quote a swap. A missing pool is reported in-band via
/// `needs_pool_creation`, not as an error.
pub async fn quote_swap(
    State(state): State<AppState>,
    Json(body): Json<SwapQuoteRequest>,
) -> Result<Json<SwapQuote>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        "Swap quote: {} {} -> {} on {}",
        body.amount, body.from, body.to, body.network
    );

    let quote = state
        .swaps
        .quote(&body.from, &body.to, body.amount, body.slippage_bps, body.network)
        .await
        .map_err(swap_error)?;
    Ok(Json(quote))
}

/// Execute a swap with the service wallet.
pub async fn execute_swap(
    State(state): State<AppState>,
    Json(body): Json<SwapQuoteRequest>,
) -> Result<Json<SwapReceipt>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        "Swap execute: {} {} -> {} on {}",
        body.amount, body.from, body.to, body.network
    );

    let receipt = state
        .swaps
        .call(SwapCall {
            from: body.from,
            to: body.to,
            amount_in: body.amount,
            slippage_bps: body.slippage_bps,
            network: body.network,
        })
        .await
        .map_err(swap_error)?;
    Ok(Json(receipt))
}

/// Create the pool for a token pair.
pub async fn create_pool(
    State(state): State<AppState>,
    Json(body): Json<CreatePoolRequest>,
) -> Result<Json<PoolCreationReceipt>, (StatusCode, Json<ErrorResponse>)> {
    let receipt = state
        .swaps
        .create_pool(&body.token_a, &body.token_b, body.network)
        .await
        .map_err(swap_error)?;
    Ok(Json(receipt))
}

/// Deposit liquidity; the second leg is derived proportionally when the pool
/// already has reserves.
pub async fn add_liquidity(
    State(state): State<AppState>,
    Json(body): Json<AddLiquidityRequest>,
) -> Result<Json<LiquidityReceipt>, (StatusCode, Json<ErrorResponse>)> {
    let receipt = state
        .swaps
        .add_liquidity(
            &body.token_a,
            &body.token_b,
            body.amount_a,
            body.amount_b,
            body.network,
        )
        .await
        .map_err(swap_error)?;
    Ok(Json(receipt))
}

fn swap_error(err: SwapError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        SwapError::Token(TokenError::UnknownToken(_)) | SwapError::NoPool(_, _) => {
            StatusCode::NOT_FOUND
        }
        SwapError::Token(TokenError::InvalidAddress(_))
        | SwapError::Token(TokenError::AmountOverflow(_))
        | SwapError::Token(TokenError::InvalidDecimals(_))
        | SwapError::InvalidAddress(_)
        | SwapError::EmptyPool(_, _) => StatusCode::BAD_REQUEST,
        SwapError::Wallet(_) => StatusCode::SERVICE_UNAVAILABLE,
        SwapError::AggregatorStatus(_) | SwapError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Swap route failed: {err}");
    }
    error_response(status, err.to_string())
}
