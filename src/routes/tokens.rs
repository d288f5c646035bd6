//! # Token Routes
//!
//! Token metadata resolution, user registration of custom tokens, and
//! test-token minting on localnet/devnet.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::network::Network;
use crate::routes::{ErrorResponse, error_response};
use crate::server::AppState;
use crate::services::service_keypair;
use crate::services::tokens::{MintReceipt, TokenError, TokenInfo};

#[derive(Debug, Deserialize)]
pub struct ListTokensQuery {
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct ResolveTokenQuery {
    pub symbol: Option<String>,
    pub mint: Option<String>,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct MintTokensRequest {
    pub symbol: String,
    pub amount: Decimal,
    pub recipient: String,
    #[serde(default)]
    pub network: Network,
}

/// List every token recorded for a network.
pub async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<ListTokensQuery>,
) -> Result<Json<Vec<TokenInfo>>, (StatusCode, Json<ErrorResponse>)> {
    let tokens = state
        .tokens
        .list_tokens(query.network)
        .await
        .map_err(token_error)?;
    Ok(Json(tokens))
}

/// Resolve a token by symbol or mint address.
pub async fn resolve_token(
    State(state): State<AppState>,
    Query(query): Query<ResolveTokenQuery>,
) -> Result<Json<TokenInfo>, (StatusCode, Json<ErrorResponse>)> {
    let info = match (&query.symbol, &query.mint) {
        (Some(symbol), _) => state
            .tokens
            .resolve_symbol(symbol, query.network)
            .await
            .map_err(token_error)?,
        (None, Some(mint)) => state
            .tokens
            .resolve_mint(mint, query.network)
            .await
            .map_err(token_error)?,
        (None, None) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "provide either symbol or mint",
            ));
        }
    };
    Ok(Json(info))
}

/// Register user-supplied token metadata.
pub async fn register_token(
    State(state): State<AppState>,
    Json(body): Json<RegisterTokenRequest>,
) -> Result<Json<TokenInfo>, (StatusCode, Json<ErrorResponse>)> {
    info!("Registering token {} ({}) on {}", body.symbol, body.mint, body.network);

    let info = TokenInfo {
        symbol: body.symbol,
        name: body.name,
        mint: body.mint,
        decimals: body.decimals,
        logo_uri: body.logo_uri,
        source: "user-defined".to_string(),
    };
    let registered = state
        .tokens
        .register_token(info, body.network)
        .await
        .map_err(token_error)?;
    Ok(Json(registered))
}

/// Mint test tokens to a wallet. The mint is created first when the symbol
/// is new to the network. Rejected on mainnet.
pub async fn mint_tokens(
    State(state): State<AppState>,
    Json(body): Json<MintTokensRequest>,
) -> Result<Json<MintReceipt>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        "Mint request: {} {} -> {} on {}",
        body.amount, body.symbol, body.recipient, body.network
    );

    let authority = service_keypair().map_err(|e| {
        error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;
    let receipt = state
        .tokens
        .mint_tokens(&body.symbol, body.amount, &body.recipient, body.network, &authority)
        .await
        .map_err(token_error)?;
    Ok(Json(receipt))
}

pub(crate) fn token_error(err: TokenError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        TokenError::UnknownToken(_) => StatusCode::NOT_FOUND,
        TokenError::InvalidAddress(_)
        | TokenError::AmountOverflow(_)
        | TokenError::InvalidDecimals(_) => StatusCode::BAD_REQUEST,
        TokenError::MintingDisabled(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Token route failed: {err}");
    }
    error_response(status, err.to_string())
}
