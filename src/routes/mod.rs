// # Routes Module
//
// - HTTP route handlers, organized by API domain.
//
//  ## Available Route Modules
// - `health`: health check and monitoring endpoints
// - `chat`: the conversational assistant endpoint
// - `wallet`: balance queries
// - `payments`: payment execution and unsigned-transaction preparation
// - `tokens`: token metadata, registration and test minting
// - `swap`: swap quotes, execution and pool lifecycle

use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;

pub mod chat;
pub mod health;
pub mod payments;
pub mod swap;
pub mod tokens;
pub mod wallet;

/// Error body shared by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}
