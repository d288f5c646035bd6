//! # Payment Routes
//!
//! Direct payment execution with the service wallet, plus an unsigned
//! variant for callers that sign with their own wallet.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::network::Network;
use crate::routes::wallet::payment_error;
use crate::routes::ErrorResponse;
use crate::server::AppState;
use crate::services::payments::{PaymentReceipt, UnsignedPayment};

#[derive(Debug, Deserialize)]
pub struct SendPaymentRequest {
    pub amount: Decimal,
    /// Symbol or mint address
    pub token: String,
    pub recipient: String,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct PreparePaymentRequest {
    pub sender: String,
    pub amount: Decimal,
    pub token: String,
    pub recipient: String,
    #[serde(default)]
    pub network: Network,
}

/// Execute a payment signed by the service wallet.
pub async fn send_payment(
    State(state): State<AppState>,
    Json(body): Json<SendPaymentRequest>,
) -> Result<Json<PaymentReceipt>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        "Payment request: {} {} -> {} on {}",
        body.amount, body.token, body.recipient, body.network
    );

    let receipt = state
        .payments
        .send_payment(body.amount, &body.token, &body.recipient, body.network)
        .await
        .map_err(payment_error)?;

    Ok(Json(receipt))
}

/// Build an unsigned payment transaction for an external wallet.
pub async fn prepare_payment(
    State(state): State<AppState>,
    Json(body): Json<PreparePaymentRequest>,
) -> Result<Json<UnsignedPayment>, (StatusCode, Json<ErrorResponse>)> {
    let unsigned = state
        .payments
        .build_unsigned_payment(
            &body.sender,
            body.amount,
            &body.token,
            &body.recipient,
            body.network,
        )
        .await
        .map_err(payment_error)?;

    Ok(Json(unsigned))
}
