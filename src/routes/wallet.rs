//! # Wallet Routes
//!
//! Balance queries for any wallet address, SOL or SPL token, on any of the
//! three supported networks.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::network::Network;
use crate::routes::{ErrorResponse, error_response};
use crate::server::AppState;
use crate::services::payments::PaymentError;
use crate::services::tokens::TokenError;

#[derive(Debug, Deserialize)]
pub struct WalletBalanceQuery {
    /// The wallet public key (base58 encoded)
    pub public_key: String,
    /// Token symbol or mint; defaults to SOL
    pub token: Option<String>,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Serialize)]
pub struct WalletBalanceResponse {
    pub amount: Decimal,
    pub token: String,
    pub network: Network,
    pub public_key: String,
    pub message: String,
}

/// Fetch a wallet balance. A wallet with no token account holds a zero
/// balance; only RPC failures are errors.
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Query(query): Query<WalletBalanceQuery>,
) -> Result<Json<WalletBalanceResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("Fetching wallet balance for: {}", query.public_key);

    let balance = state
        .payments
        .wallet_balance(&query.public_key, query.token.as_deref(), query.network)
        .await
        .map_err(payment_error)?;

    Ok(Json(WalletBalanceResponse {
        message: format!("Your wallet balance is {} {}", balance.amount, balance.token),
        amount: balance.amount,
        token: balance.token,
        network: balance.network,
        public_key: query.public_key,
    }))
}

pub(crate) fn payment_error(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        PaymentError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        PaymentError::Token(TokenError::UnknownToken(_)) => StatusCode::NOT_FOUND,
        PaymentError::Token(TokenError::InvalidAddress(_)) => StatusCode::BAD_REQUEST,
        PaymentError::Token(TokenError::AmountOverflow(_))
        | PaymentError::Token(TokenError::InvalidDecimals(_)) => StatusCode::BAD_REQUEST,
        PaymentError::Wallet(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Payment route failed: {err}");
    }
    error_response(status, err.to_string())
}
