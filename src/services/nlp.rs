//! Payment-instruction parser.
//!
//! Free text from the chat goes through three tiers: a literal phrase table
//! (no network call), the Gemini generative API, and a regex fallback that
//! also catches the case where no API key is configured or the model call
//! fails. The parser itself never errors; low confidence is the signal.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::network::Network;

const GEMINI_MODEL: &str = "gemini-2.0-flash-lite";
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Solana addresses are base58, 32 to 44 characters.
static PAYMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:send|transfer|pay)\s+(\d+(?:\.\d+)?)\s*(usdc|sol|usdt|eth)?\s+(?:to|for)?\s*([1-9A-HJ-NP-Za-km-z]{32,44})",
    )
    .expect("payment regex")
});

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(usdc|sol|usdt|eth)?").expect("amount regex"));

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[1-9A-HJ-NP-Za-km-z]{32,44}").expect("address regex"));

/// Exact lowercase phrases resolved without touching the model. Keeps the
/// common "what's my balance" round trip instant and free.
const LITERAL_BALANCE_PHRASES: &[&str] = &[
    "balance",
    "my balance",
    "check balance",
    "check my balance",
    "what is my balance",
    "what's my balance",
    "show my balance",
    "wallet balance",
];

const LITERAL_SMALLTALK_PHRASES: &[&str] = &["help", "hi", "hello", "hey", "gm"];

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("gemini request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gemini returned no usable content")]
    MissingContent,
    #[error("gemini returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured reading of one chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentInstruction {
    pub is_payment: bool,
    pub is_balance_check: bool,
    pub amount: Option<Decimal>,
    pub token: Option<String>,
    pub recipient: Option<String>,
    /// Network override extracted from the text ("on devnet", ...).
    pub network: Option<Network>,
    pub confidence: f64,
}

pub struct InstructionParser {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl InstructionParser {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            model: GEMINI_MODEL.to_string(),
        }
    }

    /// Parse a chat message. Total: every tier failure falls through to the
    /// regex tier, which always produces an answer.
    pub async fn parse(&self, message: &str) -> PaymentInstruction {
        if let Some(mut literal) = self.parse_literal(message) {
            literal.network = Network::from_hint(message);
            return literal;
        }

        if self.api_key.is_some() {
            match self.parse_with_gemini(message).await {
                Ok(mut parsed) => {
                    if parsed.network.is_none() {
                        parsed.network = Network::from_hint(message);
                    }
                    return parsed;
                }
                Err(err) => {
                    tracing::warn!("Gemini parsing failed, falling back to regex: {err}");
                }
            }
        }

        let mut parsed = self.parse_with_regex(message);
        parsed.network = Network::from_hint(message);
        parsed
    }

    /// Tier 1: exact phrase table.
    fn parse_literal(&self, message: &str) -> Option<PaymentInstruction> {
        let normalized = message.trim().trim_end_matches(['?', '!', '.']).to_lowercase();

        if LITERAL_BALANCE_PHRASES.contains(&normalized.as_str()) {
            return Some(PaymentInstruction {
                is_balance_check: true,
                confidence: 1.0,
                ..Default::default()
            });
        }
        if LITERAL_SMALLTALK_PHRASES.contains(&normalized.as_str()) {
            return Some(PaymentInstruction {
                confidence: 1.0,
                ..Default::default()
            });
        }
        None
    }

    /// Tier 2: Gemini generateContent with a JSON-only prompt.
    async fn parse_with_gemini(&self, message: &str) -> Result<PaymentInstruction, NlpError> {
        let api_key = self.api_key.as_deref().ok_or(NlpError::MissingContent)?;

        let prompt = format!(
            r#"You are a cryptocurrency payment parser for a Solana wallet app.

Parse the following message for a cryptocurrency payment or balance instruction.
Extract the following information if present:
1. Is this a payment instruction? (true/false)
2. Is this a balance check? (true/false)
3. Amount to be sent (number)
4. Cryptocurrency token (e.g., SOL, USDC)
5. Recipient address

Assume SOL is the default token if none is specified.
Solana addresses are 32-44 characters long and consist of letters and numbers.

Message: "{message}"

Respond in JSON format only:
{{
  "isPayment": true/false,
  "isBalanceCheck": true/false,
  "amount": number or null,
  "token": "SOL" or other token name, or null,
  "recipient": "address" or null,
  "confidence": number between 0 and 1
}}"#
        );

        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let url = format!("{GEMINI_API_URL}/{}:generateContent?key={api_key}", self.model);
        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            tracing::warn!("Gemini API returned status {}", response.status());
            return Err(NlpError::MissingContent);
        }

        let body: Value = response.json().await?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(NlpError::MissingContent)?;

        let parsed = extract_json(text).ok_or(NlpError::MissingContent)?;
        Ok(instruction_from_model_json(&parsed))
    }

    /// Tier 3: regex fallback, kept semantically identical to the literal
    /// patterns the chat help text advertises.
    fn parse_with_regex(&self, message: &str) -> PaymentInstruction {
        let lower = message.to_lowercase();

        if lower.contains("balance") {
            let token = AMOUNT_RE
                .captures(&lower)
                .and_then(|c| c.get(2))
                .map(|m| m.as_str().to_uppercase())
                .or_else(|| token_mention(&lower));
            return PaymentInstruction {
                is_balance_check: true,
                token,
                confidence: 0.8,
                ..Default::default()
            };
        }

        let has_payment_keyword =
            ["send", "transfer", "pay"].iter().any(|kw| lower.contains(kw));
        if !has_payment_keyword {
            return PaymentInstruction {
                confidence: 0.9,
                ..Default::default()
            };
        }

        // Full "send X [TOKEN] to [ADDRESS]" pattern
        if let Some(caps) = PAYMENT_RE.captures(message) {
            let amount = caps.get(1).and_then(|m| Decimal::from_str(m.as_str()).ok());
            let token = caps
                .get(2)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "SOL".to_string());
            let recipient = caps.get(3).map(|m| m.as_str().to_string());

            let valid_amount = amount.is_some_and(|a| a > Decimal::ZERO);
            let mut confidence = 0.7;
            if !valid_amount {
                confidence -= 0.3;
            }
            if recipient.is_none() {
                confidence -= 0.4;
            }

            return PaymentInstruction {
                is_payment: true,
                amount: amount.filter(|a| *a > Decimal::ZERO),
                token: Some(token),
                recipient,
                confidence,
                ..Default::default()
            };
        }

        // Partial extraction from less structured input
        let amount_caps = AMOUNT_RE.captures(&lower);
        let address = ADDRESS_RE.find(message).map(|m| m.as_str().to_string());
        if amount_caps.is_some() || address.is_some() {
            let amount = amount_caps
                .as_ref()
                .and_then(|c| c.get(1))
                .and_then(|m| Decimal::from_str(m.as_str()).ok());
            let token = amount_caps
                .as_ref()
                .and_then(|c| c.get(2))
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "SOL".to_string());

            return PaymentInstruction {
                is_payment: true,
                amount,
                token: Some(token),
                recipient: address,
                confidence: 0.5,
                ..Default::default()
            };
        }

        PaymentInstruction {
            is_payment: true,
            confidence: 0.3,
            ..Default::default()
        }
    }
}

/// Pull the JSON object out of a model reply that may wrap it in prose or
/// markdown fences.
fn extract_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn instruction_from_model_json(json: &Value) -> PaymentInstruction {
    let amount = match &json["amount"] {
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    };

    let is_payment = json["isPayment"].as_bool().unwrap_or(false);
    let token = json["token"]
        .as_str()
        .map(|t| t.to_uppercase())
        .or_else(|| is_payment.then(|| "SOL".to_string()));

    PaymentInstruction {
        is_payment,
        is_balance_check: json["isBalanceCheck"].as_bool().unwrap_or(false),
        amount,
        token,
        recipient: json["recipient"].as_str().map(String::from),
        network: None,
        confidence: json["confidence"].as_f64().unwrap_or(0.8),
    }
}

fn token_mention(lower: &str) -> Option<String> {
    ["usdc", "sol", "usdt", "eth"]
        .iter()
        .find(|t| lower.contains(*t))
        .map(|t| t.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn parser() -> InstructionParser {
        InstructionParser::new(None)
    }

    #[tokio::test]
    async fn literal_balance_phrases_short_circuit() {
        for phrase in ["balance", "What's my balance?", "check my balance"] {
            let parsed = parser().parse(phrase).await;
            assert!(parsed.is_balance_check, "{phrase}");
            assert_eq!(parsed.confidence, 1.0);
        }
    }

    #[tokio::test]
    async fn literal_smalltalk_is_not_a_payment() {
        let parsed = parser().parse("help").await;
        assert!(!parsed.is_payment);
        assert!(!parsed.is_balance_check);
        assert_eq!(parsed.confidence, 1.0);
    }

    #[tokio::test]
    async fn full_payment_pattern() {
        let parsed = parser().parse(&format!("send 10 USDC to {ADDR}")).await;
        assert!(parsed.is_payment);
        assert_eq!(parsed.amount, Some(Decimal::from(10)));
        assert_eq!(parsed.token.as_deref(), Some("USDC"));
        assert_eq!(parsed.recipient.as_deref(), Some(ADDR));
        assert!(parsed.confidence >= 0.7);
    }

    #[tokio::test]
    async fn token_defaults_to_sol() {
        let parsed = parser().parse(&format!("transfer 0.5 to {ADDR}")).await;
        assert!(parsed.is_payment);
        assert_eq!(parsed.token.as_deref(), Some("SOL"));
        assert_eq!(parsed.amount, Some(Decimal::from_str("0.5").unwrap()));
    }

    #[tokio::test]
    async fn partial_instruction_gets_low_confidence() {
        let parsed = parser().parse("pay 5 usdc please").await;
        assert!(parsed.is_payment);
        assert_eq!(parsed.amount, Some(Decimal::from(5)));
        assert!(parsed.recipient.is_none());
        assert_eq!(parsed.confidence, 0.5);
    }

    #[tokio::test]
    async fn keyword_without_details() {
        let parsed = parser().parse("send money").await;
        assert!(parsed.is_payment);
        assert!(parsed.amount.is_none());
        assert!((parsed.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn non_payment_text() {
        let parsed = parser().parse("how is the weather today").await;
        assert!(!parsed.is_payment);
        assert!(!parsed.is_balance_check);
        assert_eq!(parsed.confidence, 0.9);
    }

    #[tokio::test]
    async fn balance_check_with_token_and_network() {
        let parsed = parser().parse("check my usdc balance on devnet").await;
        assert!(parsed.is_balance_check);
        assert_eq!(parsed.token.as_deref(), Some("USDC"));
        assert_eq!(parsed.network, Some(Network::Devnet));
    }

    #[test]
    fn extracts_json_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"isPayment\": true, \"confidence\": 0.9}\n```";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["isPayment"], Value::Bool(true));
    }

    #[test]
    fn model_json_maps_to_instruction() {
        let value = json!({
            "isPayment": true,
            "isBalanceCheck": false,
            "amount": 2.5,
            "token": "usdc",
            "recipient": ADDR,
            "confidence": 0.95
        });
        let parsed = instruction_from_model_json(&value);
        assert!(parsed.is_payment);
        assert_eq!(parsed.token.as_deref(), Some("USDC"));
        assert_eq!(parsed.amount, Some(Decimal::from_str("2.5").unwrap()));
        assert_eq!(parsed.confidence, 0.95);
    }
}
