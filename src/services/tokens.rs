//! Token metadata resolution and test-token minting.
//!
//! Resolution walks a tier chain: in-memory cache, the token_metadata table,
//! the Solana Labs token registry, then the mint account itself. Whatever a
//! lower tier finds is written back into the tiers above it.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::CONFIG;
use crate::database::{DatabaseConnection, TokenMetadataRow};
use crate::network::Network;
use crate::retry::RetryPolicy;
use crate::services::create_ata_instruction;

pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Largest decimals value whose whole-token scale still fits in u64 base
/// units; 10^20 already wraps.
pub const MAX_DECIMALS: u8 = 19;

const TOKEN_LIST_URL: &str =
    "https://cdn.jsdelivr.net/gh/solana-labs/token-list@main/src/tokens/solana.tokenlist.json";

/// Well-known mints per network. Localnet has none: everything there is
/// created on demand.
static KNOWN_TOKENS: Lazy<HashMap<Network, HashMap<&'static str, &'static str>>> =
    Lazy::new(|| {
        let mut devnet = HashMap::new();
        devnet.insert("USDC", "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");
        devnet.insert("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");

        let mut mainnet = HashMap::new();
        mainnet.insert("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        mainnet.insert("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");
        mainnet.insert("SOL", NATIVE_MINT);
        mainnet.insert("BONK", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263");
        mainnet.insert("JUP", "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN");

        let mut map = HashMap::new();
        map.insert(Network::Devnet, devnet);
        map.insert(Network::Mainnet, mainnet);
        map
    });

/// Decimals assumed when a mint is created rather than looked up.
fn default_decimals(symbol: &str) -> u8 {
    match symbol {
        "USDC" | "USDT" => 6,
        _ => 9,
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unknown token {0}")]
    UnknownToken(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("token minting is not available on {0}")]
    MintingDisabled(Network),
    #[error("rpc error: {0}")]
    Rpc(#[from] solana_client::client_error::ClientError),
    #[error("instruction build failed: {0}")]
    Instruction(#[from] solana_sdk::program_error::ProgramError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
    #[error("amount {0} does not fit in base units")]
    AmountOverflow(Decimal),
    #[error("token decimals {0} exceed the supported maximum of 19")]
    InvalidDecimals(u8),
}

/// Resolved token metadata, mint address in base58.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub mint: String,
    pub decimals: u8,
    pub logo_uri: Option<String>,
    /// registry, on-chain, known, created or user-defined
    pub source: String,
}

impl TokenInfo {
    pub fn native_sol() -> Self {
        Self {
            symbol: "SOL".to_string(),
            name: "Solana".to_string(),
            mint: NATIVE_MINT.to_string(),
            decimals: 9,
            logo_uri: None,
            source: "known".to_string(),
        }
    }

    fn from_row(row: &TokenMetadataRow) -> Self {
        Self {
            symbol: row.symbol.clone(),
            name: row.name.clone(),
            mint: row.mint.clone(),
            decimals: row.decimals as u8,
            logo_uri: row.logo_uri.clone(),
            source: row.source.clone(),
        }
    }

    fn to_row(&self, network: Network) -> TokenMetadataRow {
        TokenMetadataRow {
            mint: self.mint.clone(),
            network: network.to_string(),
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            decimals: self.decimals as i32,
            logo_uri: self.logo_uri.clone(),
            source: self.source.clone(),
            updated_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryList {
    tokens: Vec<RegistryEntry>,
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    address: String,
    symbol: String,
    name: String,
    decimals: u8,
    #[serde(rename = "logoURI")]
    logo_uri: Option<String>,
}

struct CachedToken {
    info: TokenInfo,
    at: Instant,
}

pub struct TokenService {
    db: DatabaseConnection,
    http: reqwest::Client,
    retry: RetryPolicy,
    /// Keyed by (network, uppercase symbol) and by (network, mint).
    cache: DashMap<(Network, String), CachedToken>,
    ttl: Duration,
    registry: OnceCell<HashMap<String, TokenInfo>>,
}

impl TokenService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            cache: DashMap::new(),
            ttl: Duration::from_secs(CONFIG.tokens.cache_ttl_secs.max(0) as u64),
            registry: OnceCell::new(),
        }
    }

    fn rpc(&self, network: Network) -> RpcClient {
        RpcClient::new(network.rpc_url())
    }

    fn cache_get(&self, network: Network, key: &str) -> Option<TokenInfo> {
        let entry = self.cache.get(&(network, key.to_string()))?;
        if entry.at.elapsed() > self.ttl {
            drop(entry);
            self.cache.remove(&(network, key.to_string()));
            return None;
        }
        Some(entry.info.clone())
    }

    fn cache_put(&self, network: Network, info: &TokenInfo) {
        let now = Instant::now();
        self.cache.insert(
            (network, info.symbol.clone()),
            CachedToken { info: info.clone(), at: now },
        );
        self.cache.insert(
            (network, info.mint.clone()),
            CachedToken { info: info.clone(), at: now },
        );
    }

    async fn persist(&self, network: Network, info: &TokenInfo) {
        if let Err(err) = self.db.upsert_token_metadata(&info.to_row(network)).await {
            tracing::warn!("Failed to persist token metadata for {}: {err}", info.mint);
        }
        self.cache_put(network, info);
    }

    /// Resolve a token by its symbol.
    pub async fn resolve_symbol(
        &self,
        symbol: &str,
        network: Network,
    ) -> Result<TokenInfo, TokenError> {
        let symbol = symbol.to_uppercase();
        if symbol == "SOL" && network != Network::Mainnet {
            return Ok(TokenInfo::native_sol());
        }

        if let Some(info) = self.cache_get(network, &symbol) {
            return Ok(info);
        }

        if let Some(row) = self
            .db
            .get_token_metadata_by_symbol(&symbol, &network.to_string())
            .await?
        {
            let info = TokenInfo::from_row(&row);
            self.cache_put(network, &info);
            return Ok(info);
        }

        if let Some(mint) = KNOWN_TOKENS
            .get(&network)
            .and_then(|tokens| tokens.get(symbol.as_str()))
        {
            let decimals = match self.fetch_mint_decimals(mint, network).await {
                Ok(d) => d,
                Err(err) => {
                    tracing::debug!("Mint lookup for {symbol} failed, using defaults: {err}");
                    default_decimals(&symbol)
                }
            };
            let info = TokenInfo {
                symbol: symbol.clone(),
                name: symbol.clone(),
                mint: mint.to_string(),
                decimals,
                logo_uri: None,
                source: "known".to_string(),
            };
            self.persist(network, &info).await;
            return Ok(info);
        }

        Err(TokenError::UnknownToken(symbol))
    }

    /// Resolve a token by its mint address.
    pub async fn resolve_mint(
        &self,
        mint: &str,
        network: Network,
    ) -> Result<TokenInfo, TokenError> {
        let mint_pubkey =
            Pubkey::from_str(mint).map_err(|_| TokenError::InvalidAddress(mint.to_string()))?;

        if let Some(info) = self.cache_get(network, mint) {
            return Ok(info);
        }

        if let Some(row) = self.db.get_token_metadata(mint, &network.to_string()).await? {
            let info = TokenInfo::from_row(&row);
            self.cache_put(network, &info);
            return Ok(info);
        }

        if network == Network::Mainnet {
            if let Some(info) = self.registry_lookup(mint).await {
                self.persist(network, &info).await;
                return Ok(info);
            }
        }

        // Last tier: the mint account only knows its decimals
        let decimals = self.fetch_mint_decimals_pubkey(&mint_pubkey, network).await?;
        let short = &mint[..mint.len().min(4)];
        let info = TokenInfo {
            symbol: short.to_uppercase(),
            name: format!("Unknown token {short}"),
            mint: mint.to_string(),
            decimals,
            logo_uri: None,
            source: "on-chain".to_string(),
        };
        self.persist(network, &info).await;
        Ok(info)
    }

    /// Resolve a symbol, creating a fresh test mint when the network allows it.
    /// Returns the info and the creation signature when a mint was created.
    pub async fn get_or_create(
        &self,
        symbol: &str,
        network: Network,
        authority: &Keypair,
    ) -> Result<(TokenInfo, Option<String>), TokenError> {
        match self.resolve_symbol(symbol, network).await {
            Ok(info) => Ok((info, None)),
            Err(TokenError::UnknownToken(_)) if network.allows_minting() => {
                let (info, signature) = self.create_mint(symbol, network, authority).await?;
                Ok((info, Some(signature)))
            }
            Err(err) => Err(err),
        }
    }

    /// Create a new SPL mint with the service wallet as mint and freeze
    /// authority.
    async fn create_mint(
        &self,
        symbol: &str,
        network: Network,
        authority: &Keypair,
    ) -> Result<(TokenInfo, String), TokenError> {
        let symbol = symbol.to_uppercase();
        let decimals = default_decimals(&symbol);
        let mint_keypair = Keypair::new();
        let rpc = self.rpc(network);

        tracing::info!(
            "Creating {symbol} test mint {} with {decimals} decimals on {network}",
            mint_keypair.pubkey()
        );

        let rent = rpc
            .get_minimum_balance_for_rent_exemption(spl_token::state::Mint::LEN)
            .await?;
        let create_ix = system_instruction::create_account(
            &authority.pubkey(),
            &mint_keypair.pubkey(),
            rent,
            spl_token::state::Mint::LEN as u64,
            &spl_token::ID,
        );
        let init_ix = spl_token::instruction::initialize_mint(
            &spl_token::ID,
            &mint_keypair.pubkey(),
            &authority.pubkey(),
            Some(&authority.pubkey()),
            decimals,
        )?;

        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &[create_ix, init_ix],
            Some(&authority.pubkey()),
            &[authority, &mint_keypair],
            blockhash,
        );
        let signature = self
            .retry
            .run("create mint", || rpc.send_and_confirm_transaction(&tx))
            .await?;

        let info = TokenInfo {
            symbol: symbol.clone(),
            name: format!("{symbol} Test Token"),
            mint: mint_keypair.pubkey().to_string(),
            decimals,
            logo_uri: None,
            source: "created".to_string(),
        };
        self.persist(network, &info).await;
        Ok((info, signature.to_string()))
    }

    /// Mint test tokens to a recipient, creating their token account when
    /// missing. Rejected on mainnet.
    pub async fn mint_tokens(
        &self,
        symbol: &str,
        amount: Decimal,
        recipient: &str,
        network: Network,
        authority: &Keypair,
    ) -> Result<MintReceipt, TokenError> {
        if !network.allows_minting() {
            return Err(TokenError::MintingDisabled(network));
        }
        let recipient_pubkey = Pubkey::from_str(recipient)
            .map_err(|_| TokenError::InvalidAddress(recipient.to_string()))?;

        let (info, created_signature) = self.get_or_create(symbol, network, authority).await?;
        let mint_pubkey = Pubkey::from_str(&info.mint)
            .map_err(|_| TokenError::InvalidAddress(info.mint.clone()))?;
        let base_amount = to_base_units(amount, info.decimals)?;

        let ata = spl_associated_token_account::get_associated_token_address(
            &recipient_pubkey,
            &mint_pubkey,
        );
        let create_ata_ix =
            create_ata_instruction(&authority.pubkey(), &recipient_pubkey, &mint_pubkey);
        let mint_ix = spl_token::instruction::mint_to(
            &spl_token::ID,
            &mint_pubkey,
            &ata,
            &authority.pubkey(),
            &[],
            base_amount,
        )?;

        let rpc = self.rpc(network);
        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &[create_ata_ix, mint_ix],
            Some(&authority.pubkey()),
            &[authority],
            blockhash,
        );
        let signature = self
            .retry
            .run("mint tokens", || rpc.send_and_confirm_transaction(&tx))
            .await?;

        tracing::info!("Minted {amount} {} to {recipient} on {network}", info.symbol);

        Ok(MintReceipt {
            token: info,
            amount,
            signature: signature.to_string(),
            created_mint_signature: created_signature,
            explorer_url: network.explorer_tx_url(&signature.to_string()),
        })
    }

    /// Record user-supplied token metadata.
    pub async fn register_token(
        &self,
        info: TokenInfo,
        network: Network,
    ) -> Result<TokenInfo, TokenError> {
        if info.decimals > MAX_DECIMALS {
            return Err(TokenError::InvalidDecimals(info.decimals));
        }
        Pubkey::from_str(&info.mint)
            .map_err(|_| TokenError::InvalidAddress(info.mint.clone()))?;
        let info = TokenInfo {
            symbol: info.symbol.to_uppercase(),
            source: "user-defined".to_string(),
            ..info
        };
        self.db.upsert_token_metadata(&info.to_row(network)).await?;
        self.cache_put(network, &info);
        Ok(info)
    }

    /// Every token known for a network, from the durable tier.
    pub async fn list_tokens(&self, network: Network) -> Result<Vec<TokenInfo>, TokenError> {
        let rows = self.db.list_token_metadata(&network.to_string()).await?;
        Ok(rows.iter().map(TokenInfo::from_row).collect())
    }

    async fn registry_lookup(&self, mint: &str) -> Option<TokenInfo> {
        let registry = self
            .registry
            .get_or_try_init(|| self.fetch_registry())
            .await;
        match registry {
            Ok(map) => map.get(mint).cloned(),
            Err(err) => {
                tracing::warn!("Token registry fetch failed: {err}");
                None
            }
        }
    }

    async fn fetch_registry(&self) -> Result<HashMap<String, TokenInfo>, reqwest::Error> {
        tracing::info!("Fetching Solana token registry");
        let list: RegistryList = self
            .http
            .get(TOKEN_LIST_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list
            .tokens
            .into_iter()
            .map(|entry| {
                (
                    entry.address.clone(),
                    TokenInfo {
                        symbol: entry.symbol,
                        name: entry.name,
                        mint: entry.address,
                        decimals: entry.decimals,
                        logo_uri: entry.logo_uri,
                        source: "registry".to_string(),
                    },
                )
            })
            .collect())
    }

    async fn fetch_mint_decimals(
        &self,
        mint: &str,
        network: Network,
    ) -> Result<u8, TokenError> {
        let pubkey =
            Pubkey::from_str(mint).map_err(|_| TokenError::InvalidAddress(mint.to_string()))?;
        self.fetch_mint_decimals_pubkey(&pubkey, network).await
    }

    async fn fetch_mint_decimals_pubkey(
        &self,
        mint: &Pubkey,
        network: Network,
    ) -> Result<u8, TokenError> {
        let rpc = self.rpc(network);
        let account = rpc.get_account(mint).await?;
        let state = spl_token::state::Mint::unpack(&account.data)?;
        Ok(state.decimals)
    }
}

/// Receipt for a completed test mint.
#[derive(Debug, Serialize)]
pub struct MintReceipt {
    pub token: TokenInfo,
    pub amount: Decimal,
    pub signature: String,
    /// Set when the mint itself had to be created first.
    pub created_mint_signature: Option<String>,
    pub explorer_url: String,
}

/// UI amount to base units, truncating any precision beyond the mint's
/// decimals.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, TokenError> {
    if amount < Decimal::ZERO {
        return Err(TokenError::AmountOverflow(amount));
    }
    let scale = 10u64
        .checked_pow(decimals as u32)
        .ok_or(TokenError::InvalidDecimals(decimals))?;
    let scaled = amount
        .checked_mul(Decimal::from(scale))
        .ok_or(TokenError::AmountOverflow(amount))?;
    scaled
        .trunc()
        .to_u64()
        .ok_or(TokenError::AmountOverflow(amount))
}

/// Base units back to a UI amount. Expressed as a scaled integer rather than
/// a division so no power of ten is ever materialized in u64.
pub fn from_base_units(amount: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, u32::from(decimals.min(28)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_unit_conversion_truncates() {
        let amount = Decimal::from_str("1.5").unwrap();
        assert_eq!(to_base_units(amount, 6).unwrap(), 1_500_000);

        // Sub-lamport precision is dropped, not rounded
        let tiny = Decimal::from_str("0.0000000019").unwrap();
        assert_eq!(to_base_units(tiny, 9).unwrap(), 1);

        let negative = Decimal::from_str("-1").unwrap();
        assert!(to_base_units(negative, 6).is_err());
    }

    #[test]
    fn oversized_decimals_never_overflow() {
        // 10^20 wraps u64; the conversion must reject it, not scale by garbage
        assert!(matches!(
            to_base_units(Decimal::from(1), 20),
            Err(TokenError::InvalidDecimals(20))
        ));
        assert!(matches!(
            to_base_units(Decimal::from(1), u8::MAX),
            Err(TokenError::InvalidDecimals(u8::MAX))
        ));

        // The largest supported scale still converts exactly
        assert_eq!(
            to_base_units(Decimal::ONE, MAX_DECIMALS).unwrap(),
            10_000_000_000_000_000_000
        );

        // Reading back stays total for any on-chain decimals value
        assert_eq!(
            from_base_units(1, 20),
            Decimal::from_str("0.00000000000000000001").unwrap()
        );
        assert_eq!(from_base_units(u64::MAX, u8::MAX), from_base_units(u64::MAX, 28));
    }

    #[test]
    fn base_unit_roundtrip() {
        let ui = from_base_units(1_234_567, 6);
        assert_eq!(ui, Decimal::from_str("1.234567").unwrap());
        assert_eq!(to_base_units(ui, 6).unwrap(), 1_234_567);
    }

    #[test]
    fn known_token_tables() {
        let mainnet = KNOWN_TOKENS.get(&Network::Mainnet).unwrap();
        assert_eq!(
            mainnet.get("USDC"),
            Some(&"EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
        );
        assert_eq!(mainnet.get("SOL"), Some(&NATIVE_MINT));
        assert!(KNOWN_TOKENS.get(&Network::Localnet).is_none());
    }

    #[test]
    fn default_decimals_by_symbol() {
        assert_eq!(default_decimals("USDC"), 6);
        assert_eq!(default_decimals("USDT"), 6);
        assert_eq!(default_decimals("SOL"), 9);
        assert_eq!(default_decimals("WIDGET"), 9);
    }

    #[test]
    fn registry_entries_deserialize() {
        let json = r#"{
            "tokens": [{
                "chainId": 101,
                "address": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                "symbol": "USDC",
                "name": "USD Coin",
                "decimals": 6,
                "logoURI": "https://example.com/usdc.png"
            }]
        }"#;
        let list: RegistryList = serde_json::from_str(json).unwrap();
        assert_eq!(list.tokens.len(), 1);
        assert_eq!(list.tokens[0].symbol, "USDC");
        assert_eq!(list.tokens[0].decimals, 6);
    }
}
