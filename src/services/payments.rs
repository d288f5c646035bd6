//! Payment execution.
//!
//! SOL moves through a plain system transfer. Everything else is routed
//! through the companion program's `process_transaction` instruction, which
//! wraps a transfer_checked CPI. Submissions go through the shared retry
//! policy; the unsigned variant hands a base64 transaction back for an
//! external wallet to sign.

use base64::{Engine as _, engine::general_purpose};
use rust_decimal::Decimal;
use serde::Serialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::network::Network;
use crate::retry::RetryPolicy;
use crate::services::tokens::{TokenError, TokenInfo, TokenService, to_base_units, from_base_units};
use crate::services::{
    COMPANION_PROGRAM_ID, WalletKeyError, anchor_discriminator, create_ata_instruction,
    service_keypair,
};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Wallet(#[from] WalletKeyError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("rpc error: {0}")]
    Rpc(#[from] solana_client::client_error::ClientError),
    #[error("transaction encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}

/// A confirmed payment.
#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    pub signature: String,
    pub explorer_url: String,
    pub amount: Decimal,
    pub token: String,
    pub recipient: String,
    pub network: Network,
    pub message: String,
}

/// A payment serialized for an external wallet to sign and submit.
#[derive(Debug, Serialize)]
pub struct UnsignedPayment {
    pub transaction_base64: String,
    pub blockhash: String,
    pub amount: Decimal,
    pub token: String,
    pub recipient: String,
    pub network: Network,
}

/// Wallet balance for one asset.
#[derive(Debug, Serialize)]
pub struct BalanceInfo {
    pub amount: Decimal,
    pub token: String,
    pub network: Network,
}

pub struct PaymentService {
    tokens: Arc<TokenService>,
    retry: RetryPolicy,
}

impl PaymentService {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    fn rpc(&self, network: Network) -> RpcClient {
        RpcClient::new_with_commitment(network.rpc_url(), CommitmentConfig::confirmed())
    }

    /// Resolve by mint address when the token looks like one, by symbol
    /// otherwise.
    async fn resolve_token(
        &self,
        token: &str,
        network: Network,
    ) -> Result<TokenInfo, PaymentError> {
        if token.len() >= 32 && Pubkey::from_str(token).is_ok() {
            Ok(self.tokens.resolve_mint(token, network).await?)
        } else {
            Ok(self.tokens.resolve_symbol(token, network).await?)
        }
    }

    /// Send a payment signed by the service wallet.
    pub async fn send_payment(
        &self,
        amount: Decimal,
        token: &str,
        recipient: &str,
        network: Network,
    ) -> Result<PaymentReceipt, PaymentError> {
        let recipient_pubkey = Pubkey::from_str(recipient)
            .map_err(|_| PaymentError::InvalidAddress(recipient.to_string()))?;
        let keypair = service_keypair()?;
        let rpc = self.rpc(network);

        let (instructions, symbol) = self
            .payment_instructions(&keypair.pubkey(), amount, token, &recipient_pubkey, network)
            .await?;

        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &instructions,
            Some(&keypair.pubkey()),
            &[&keypair],
            blockhash,
        );
        let signature = self
            .retry
            .run("send payment", || rpc.send_and_confirm_transaction(&tx))
            .await?;

        let signature = signature.to_string();
        tracing::info!("Payment confirmed: {signature} ({amount} {symbol} on {network})");

        Ok(PaymentReceipt {
            explorer_url: network.explorer_tx_url(&signature),
            message: format!(
                "Successfully sent {amount} {symbol} to {}...",
                &recipient[..recipient.len().min(8)]
            ),
            signature,
            amount,
            token: symbol,
            recipient: recipient.to_string(),
            network,
        })
    }

    /// Build the same payment for an external sender, base64 encoded and
    /// unsigned.
    pub async fn build_unsigned_payment(
        &self,
        sender: &str,
        amount: Decimal,
        token: &str,
        recipient: &str,
        network: Network,
    ) -> Result<UnsignedPayment, PaymentError> {
        let sender_pubkey = Pubkey::from_str(sender)
            .map_err(|_| PaymentError::InvalidAddress(sender.to_string()))?;
        let recipient_pubkey = Pubkey::from_str(recipient)
            .map_err(|_| PaymentError::InvalidAddress(recipient.to_string()))?;
        let rpc = self.rpc(network);

        let (instructions, symbol) = self
            .payment_instructions(&sender_pubkey, amount, token, &recipient_pubkey, network)
            .await?;

        let blockhash = rpc.get_latest_blockhash().await?;
        let mut tx = Transaction::new_with_payer(&instructions, Some(&sender_pubkey));
        tx.message.recent_blockhash = blockhash;

        let encoded = general_purpose::STANDARD.encode(bincode::serialize(&tx)?);

        Ok(UnsignedPayment {
            transaction_base64: encoded,
            blockhash: blockhash.to_string(),
            amount,
            token: symbol,
            recipient: recipient.to_string(),
            network,
        })
    }

    /// Instruction list for a payment plus the resolved token symbol.
    async fn payment_instructions(
        &self,
        authority: &Pubkey,
        amount: Decimal,
        token: &str,
        recipient: &Pubkey,
        network: Network,
    ) -> Result<(Vec<Instruction>, String), PaymentError> {
        if token.eq_ignore_ascii_case("sol") {
            let lamports = to_base_units(amount, 9)?;
            let ix = system_instruction::transfer(authority, recipient, lamports);
            return Ok((vec![ix], "SOL".to_string()));
        }

        let info = self.resolve_token(token, network).await?;
        let mint = Pubkey::from_str(&info.mint)
            .map_err(|_| PaymentError::InvalidAddress(info.mint.clone()))?;
        let base_amount = to_base_units(amount, info.decimals)?;

        let sender_ata =
            spl_associated_token_account::get_associated_token_address(authority, &mint);
        let recipient_ata =
            spl_associated_token_account::get_associated_token_address(recipient, &mint);

        // Creation is a no-op when the recipient account already exists
        let instructions = vec![
            create_ata_instruction(authority, recipient, &mint),
            process_transaction_instruction(
                authority,
                &sender_ata,
                &mint,
                &recipient_ata,
                base_amount,
            ),
        ];

        Ok((instructions, info.symbol))
    }

    /// SOL or token balance for any wallet. A missing token account reads as
    /// zero, not as an error.
    pub async fn wallet_balance(
        &self,
        address: &str,
        token: Option<&str>,
        network: Network,
    ) -> Result<BalanceInfo, PaymentError> {
        let owner = Pubkey::from_str(address)
            .map_err(|_| PaymentError::InvalidAddress(address.to_string()))?;
        let rpc = self.rpc(network);

        let token = token.unwrap_or("SOL");
        if token.eq_ignore_ascii_case("sol") {
            let lamports = rpc.get_balance(&owner).await?;
            return Ok(BalanceInfo {
                amount: from_base_units(lamports, 9),
                token: "SOL".to_string(),
                network,
            });
        }

        let info = self.resolve_token(token, network).await?;
        let mint = Pubkey::from_str(&info.mint)
            .map_err(|_| PaymentError::InvalidAddress(info.mint.clone()))?;
        let ata = spl_associated_token_account::get_associated_token_address(&owner, &mint);

        let amount = match rpc.get_token_account_balance(&ata).await {
            Ok(balance) => {
                let base: u64 = balance.amount.parse().unwrap_or(0);
                from_base_units(base, balance.decimals)
            }
            Err(_) => Decimal::ZERO,
        };

        Ok(BalanceInfo {
            amount,
            token: info.symbol,
            network,
        })
    }
}

/// `process_transaction(amount)` against the companion program. Account
/// order matches the program's `ProcessTransaction` context.
fn process_transaction_instruction(
    authority: &Pubkey,
    sender_token_account: &Pubkey,
    mint: &Pubkey,
    receiver_token_account: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&anchor_discriminator("process_transaction"));
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program_id: *COMPANION_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(*sender_token_account, false),
            AccountMeta::new(*mint, false),
            AccountMeta::new(*receiver_token_account, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ],
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_instruction_layout() {
        let authority = Pubkey::new_unique();
        let sender_ata = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let receiver_ata = Pubkey::new_unique();

        let ix = process_transaction_instruction(&authority, &sender_ata, &mint, &receiver_ata, 42);

        assert_eq!(ix.program_id, *COMPANION_PROGRAM_ID);
        assert_eq!(ix.data.len(), 16);
        assert_eq!(&ix.data[..8], &[70, 108, 123, 244, 12, 102, 131, 249]);
        assert_eq!(&ix.data[8..], &42u64.to_le_bytes());

        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[0].pubkey, authority);
        assert_eq!(ix.accounts[1].pubkey, sender_ata);
        assert_eq!(ix.accounts[2].pubkey, mint);
        assert_eq!(ix.accounts[3].pubkey, receiver_ata);
        assert_eq!(ix.accounts[4].pubkey, spl_token::ID);
        assert!(!ix.accounts[4].is_writable);
    }

    #[test]
    fn sol_amounts_use_nine_decimals() {
        let amount = Decimal::from_str("1.5").unwrap();
        assert_eq!(to_base_units(amount, 9).unwrap(), 1_500_000_000);
    }
}
