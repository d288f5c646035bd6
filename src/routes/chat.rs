//! # Chat Route
//!
//! The conversational endpoint: a free-text message comes in, the parser
//! reads it, and the reply mirrors what the assistant UI shows for each
//! outcome, with the structured result alongside for the client.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::network::Network;
use crate::server::AppState;
use crate::services::nlp::PaymentInstruction;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Caller's wallet address, required for balance checks
    pub wallet: Option<String>,
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    None,
    SwitchNetwork,
    Balance,
    Payment,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub action: ChatAction,
    pub parsed: PaymentInstruction,
    pub signature: Option<String>,
    pub explorer_url: Option<String>,
    pub redirect_network: Option<Network>,
}

impl ChatResponse {
    fn plain(reply: impl Into<String>, action: ChatAction, parsed: PaymentInstruction) -> Self {
        Self {
            reply: reply.into(),
            action,
            parsed,
            signature: None,
            explorer_url: None,
            redirect_network: None,
        }
    }
}

/// Handle one chat message.
pub async fn chat_message(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let parsed = state.parser.parse(&body.message).await;
    info!(
        "Chat message parsed: payment={} balance={} confidence={:.2}",
        parsed.is_payment, parsed.is_balance_check, parsed.confidence
    );

    // A network named in the message overrides the session network
    if parsed.is_payment || parsed.is_balance_check {
        if let Some(requested) = parsed.network {
            if requested != body.network {
                let mut response = ChatResponse::plain(
                    format!(
                        "To perform this action on {requested}, I need to switch networks. Redirecting..."
                    ),
                    ChatAction::SwitchNetwork,
                    parsed,
                );
                response.redirect_network = Some(requested);
                return Json(response);
            }
        }
    }

    if parsed.is_balance_check {
        let Some(wallet) = body.wallet.as_deref() else {
            return Json(ChatResponse::plain(
                "Please connect your wallet to check your balance.",
                ChatAction::None,
                parsed,
            ));
        };

        let token = parsed.token.clone();
        return match state
            .payments
            .wallet_balance(wallet, token.as_deref(), body.network)
            .await
        {
            Ok(balance) => Json(ChatResponse::plain(
                format!(
                    "💰 Your wallet balance is {} {}",
                    balance.amount, balance.token
                ),
                ChatAction::Balance,
                parsed,
            )),
            Err(err) => Json(ChatResponse::plain(
                format!("❌ {err}"),
                ChatAction::None,
                parsed,
            )),
        };
    }

    if parsed.is_payment && parsed.confidence > 0.5 {
        let (Some(amount), Some(token), Some(recipient)) =
            (parsed.amount, parsed.token.clone(), parsed.recipient.clone())
        else {
            return Json(ChatResponse::plain(
                "I need a complete payment instruction with amount, token, and recipient \
                 address. For example: 'send 0.1 SOL to address'",
                ChatAction::None,
                parsed,
            ));
        };

        return match state
            .payments
            .send_payment(amount, &token, &recipient, body.network)
            .await
        {
            Ok(receipt) => {
                let mut response = ChatResponse::plain(
                    format!(
                        "✅ {}\n\nTransaction ID: {}\n\nView in [Solana Explorer]({})",
                        receipt.message, receipt.signature, receipt.explorer_url
                    ),
                    ChatAction::Payment,
                    parsed,
                );
                response.signature = Some(receipt.signature);
                response.explorer_url = Some(receipt.explorer_url);
                Json(response)
            }
            Err(err) => Json(ChatResponse::plain(
                format!("❌ {err}"),
                ChatAction::None,
                parsed,
            )),
        };
    }

    if parsed.is_payment {
        return Json(ChatResponse::plain(
            "I'm not completely sure about your payment details. Could you please provide \
             the amount, token type, and recipient address more clearly?",
            ChatAction::None,
            parsed,
        ));
    }

    Json(ChatResponse::plain(
        "I'm here to help with your crypto payments. To send funds, just tell me something \
         like 'send 10 USDC to address...'",
        ChatAction::None,
        parsed,
    ))
}
