//! Service layer: instruction parsing, payments, token metadata and swaps.

pub mod nlp;
pub mod payments;
pub mod swap_engine;
pub mod tokens;

use once_cell::sync::Lazy;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::str::FromStr;
use thiserror::Error;

use crate::config::CONFIG;

/// On-chain companion program hosting `process_transaction` and the
/// liquidity-pool instructions.
pub static COMPANION_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::from_str("B53vYkHSs1vMQzofYfKjz6Unzv8P4TwCcvvTbMWVnctv")
        .expect("companion program id")
});

/// Eight-byte Anchor instruction discriminator for a global instruction.
pub(crate) fn anchor_discriminator(name: &str) -> [u8; 8] {
    let digest = solana_sdk::hash::hash(format!("global:{name}").as_bytes());
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&digest.to_bytes()[..8]);
    disc
}

/// Associated-token-account creation, always the idempotent variant: a
/// pre-flight existence check over RPC can misread a transient failure as
/// "missing", and the plain create instruction aborts the transaction when
/// the account is already there.
pub(crate) fn create_ata_instruction(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        owner,
        mint,
        &spl_token::ID,
    )
}

#[derive(Debug, Error)]
pub enum WalletKeyError {
    #[error("SERVICE_WALLET_KEY is not configured")]
    Missing,
    #[error("SERVICE_WALLET_KEY is not valid base58")]
    Base58,
    #[error("SERVICE_WALLET_KEY decodes to an invalid keypair")]
    Bytes,
}

/// Service wallet used to sign payments, test mints and aggregator swaps.
pub fn service_keypair() -> Result<Keypair, WalletKeyError> {
    let encoded = CONFIG
        .service_wallet_key
        .as_deref()
        .ok_or(WalletKeyError::Missing)?;
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| WalletKeyError::Base58)?;
    Keypair::try_from(&bytes[..]).map_err(|_| WalletKeyError::Bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signer::Signer;

    #[test]
    fn discriminator_matches_anchor_convention() {
        assert_eq!(
            anchor_discriminator("process_transaction"),
            [70, 108, 123, 244, 12, 102, 131, 249]
        );
        assert_eq!(
            anchor_discriminator("swap"),
            [248, 198, 158, 145, 225, 117, 135, 200]
        );
    }

    #[test]
    fn ata_creation_is_idempotent() {
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ix = create_ata_instruction(&payer, &owner, &mint);

        assert_eq!(ix.program_id, spl_associated_token_account::ID);
        // CreateIdempotent discriminator; plain Create (0) would fail on an
        // existing account
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts[0].pubkey, payer);
        assert!(ix.accounts[0].is_signer);
    }

    #[test]
    fn keypair_roundtrips_through_base58() {
        let kp = Keypair::new();
        let encoded = bs58::encode(kp.to_bytes()).into_string();
        let bytes = bs58::decode(&encoded).into_vec().unwrap();
        let decoded = Keypair::try_from(&bytes[..]).unwrap();
        assert_eq!(decoded.pubkey(), kp.pubkey());
    }
}
