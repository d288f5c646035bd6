//! Swap engine.
//!
//! Localnet and devnet swaps run against the companion program's
//! constant-product pools: derive the pool PDA for the pair, read both vault
//! balances fresh, quote with the math module and submit a swap instruction
//! carrying the same min-out the quote promised. Mainnet swaps go through
//! the Jupiter v6 aggregator instead.

use base64::{Engine as _, engine::general_purpose};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use spl_associated_token_account::get_associated_token_address;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tower_async::Service;

use crate::config::CONFIG;
use crate::math;
use crate::network::Network;
use crate::retry::RetryPolicy;
use crate::services::tokens::{
    NATIVE_MINT, TokenError, TokenInfo, TokenService, from_base_units, to_base_units,
};
use crate::services::{
    COMPANION_PROGRAM_ID, WalletKeyError, anchor_discriminator, create_ata_instruction,
    service_keypair,
};

const POOL_SEED: &[u8] = b"pool";

#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Wallet(#[from] WalletKeyError),
    #[error("rpc error: {0}")]
    Rpc(#[from] solana_client::client_error::ClientError),
    #[error("aggregator request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("aggregator returned status {0}")]
    AggregatorStatus(reqwest::StatusCode),
    #[error("malformed aggregator transaction: {0}")]
    Decode(String),
    #[error("service wallet is not a signer of the aggregator transaction")]
    SignerNotFound,
    #[error("no liquidity pool for {0}/{1}")]
    NoPool(String, String),
    #[error("pool for {0}/{1} is empty, both deposit amounts are required")]
    EmptyPool(String, String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Jupiter v6 quote, passed back verbatim in the swap request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupiterQuote {
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "inAmount")]
    pub in_amount: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    #[serde(rename = "outAmount")]
    pub out_amount: String,
    #[serde(rename = "otherAmountThreshold")]
    pub other_amount_threshold: Option<String>,
    #[serde(rename = "swapMode")]
    pub swap_mode: Option<String>,
    #[serde(rename = "slippageBps")]
    pub slippage_bps: Option<u16>,
    #[serde(rename = "priceImpactPct")]
    pub price_impact_pct: Option<String>,
    #[serde(rename = "routePlan")]
    pub route_plan: Option<serde_json::Value>,
    #[serde(rename = "contextSlot")]
    pub context_slot: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JupiterSwapRequest {
    #[serde(rename = "userPublicKey")]
    pub user_public_key: String,
    #[serde(rename = "quoteResponse")]
    pub quote_response: JupiterQuote,
    #[serde(rename = "destinationTokenAccount")]
    pub destination_token_account: Option<String>,
    #[serde(rename = "computeUnitPriceMicroLamports")]
    pub compute_unit_price_micro_lamports: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JupiterSwapResponse {
    #[serde(rename = "swapTransaction")]
    pub swap_transaction: String,
}

/// Derived addresses for one pool. Mints are ordered by their byte
/// representation so both directions of a pair land on the same PDA.
#[derive(Debug, Clone)]
pub struct PoolAddresses {
    pub pool: Pubkey,
    pub authority: Pubkey,
    pub bump: u8,
    pub mint_lo: Pubkey,
    pub mint_hi: Pubkey,
    pub vault_lo: Pubkey,
    pub vault_hi: Pubkey,
}

pub fn pool_addresses(mint_a: &Pubkey, mint_b: &Pubkey) -> PoolAddresses {
    let (lo, hi) = if mint_a.to_bytes() <= mint_b.to_bytes() {
        (*mint_a, *mint_b)
    } else {
        (*mint_b, *mint_a)
    };
    let (pool, bump) = Pubkey::find_program_address(
        &[POOL_SEED, lo.as_ref(), hi.as_ref()],
        &COMPANION_PROGRAM_ID,
    );
    let (authority, _) = Pubkey::find_program_address(
        &[POOL_SEED, lo.as_ref(), hi.as_ref(), &[bump]],
        &COMPANION_PROGRAM_ID,
    );
    let vault_lo = get_associated_token_address(&authority, &lo);
    let vault_hi = get_associated_token_address(&authority, &hi);

    PoolAddresses {
        pool,
        authority,
        bump,
        mint_lo: lo,
        mint_hi: hi,
        vault_lo,
        vault_hi,
    }
}

impl PoolAddresses {
    /// Vaults oriented to a swap direction: (input vault, output vault).
    fn oriented(&self, from_mint: &Pubkey) -> (Pubkey, Pubkey) {
        if *from_mint == self.mint_lo {
            (self.vault_lo, self.vault_hi)
        } else {
            (self.vault_hi, self.vault_lo)
        }
    }
}

/// A quote for a proposed swap. `needs_pool_creation` flags a missing pool
/// instead of erroring so the UI can offer to create it.
#[derive(Debug, Serialize)]
pub struct SwapQuote {
    pub from_token: TokenInfo,
    pub to_token: TokenInfo,
    pub input_amount: Decimal,
    pub expected_output: Decimal,
    pub min_output: Decimal,
    pub price_impact_bps: u64,
    pub needs_pool_creation: bool,
    pub message: Option<String>,
}

/// A confirmed swap.
#[derive(Debug, Serialize)]
pub struct SwapReceipt {
    pub signature: String,
    pub explorer_url: String,
    pub from_token: String,
    pub to_token: String,
    pub input_amount: Decimal,
    pub expected_output: Decimal,
    pub network: Network,
}

#[derive(Debug, Serialize)]
pub struct PoolCreationReceipt {
    pub signature: String,
    pub explorer_url: String,
    pub pool: String,
}

#[derive(Debug, Serialize)]
pub struct LiquidityReceipt {
    pub signature: String,
    pub explorer_url: String,
    pub token_a: String,
    pub token_b: String,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
}

pub struct SwapEngine {
    tokens: Arc<TokenService>,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl SwapEngine {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    fn rpc(&self, network: Network) -> RpcClient {
        RpcClient::new_with_commitment(network.rpc_url(), CommitmentConfig::confirmed())
    }

    fn slippage(&self, requested: Option<u64>) -> u64 {
        requested.unwrap_or(CONFIG.tokens.default_slippage_bps)
    }

    /// Quote a swap without executing it.
    pub async fn quote(
        &self,
        from: &str,
        to: &str,
        amount_in: Decimal,
        slippage_bps: Option<u64>,
        network: Network,
    ) -> Result<SwapQuote, SwapError> {
        let from_token = self.tokens.resolve_symbol(from, network).await?;
        let to_token = self.tokens.resolve_symbol(to, network).await?;
        let slippage = self.slippage(slippage_bps);

        if network == Network::Mainnet {
            return self
                .jupiter_quote_as_swap_quote(from_token, to_token, amount_in, slippage)
                .await;
        }

        let from_mint = parse_pubkey(&from_token.mint)?;
        let to_mint = parse_pubkey(&to_token.mint)?;
        let addrs = pool_addresses(&from_mint, &to_mint);
        let rpc = self.rpc(network);

        if !pool_exists(&rpc, &addrs.pool).await {
            let message = format!(
                "No liquidity pool exists for {}/{}. Would you like to create it?",
                from_token.symbol, to_token.symbol
            );
            return Ok(SwapQuote {
                from_token,
                to_token,
                input_amount: amount_in,
                expected_output: Decimal::ZERO,
                min_output: Decimal::ZERO,
                price_impact_bps: 0,
                needs_pool_creation: true,
                message: Some(message),
            });
        }

        let (vault_in, vault_out) = addrs.oriented(&from_mint);
        let reserve_in = vault_balance(&rpc, &vault_in).await?;
        let reserve_out = vault_balance(&rpc, &vault_out).await?;

        let amount_in_base = to_base_units(amount_in, from_token.decimals)?;
        let out = math::constant_product_quote(amount_in_base, reserve_in, reserve_out);
        let min_out = math::min_amount_out(out, slippage);
        let impact = math::price_impact_bps(out, reserve_out);

        Ok(SwapQuote {
            expected_output: from_base_units(out, to_token.decimals),
            min_output: from_base_units(min_out, to_token.decimals),
            price_impact_bps: impact,
            needs_pool_creation: false,
            message: None,
            from_token,
            to_token,
            input_amount: amount_in,
        })
    }

    /// Execute a swap signed by the service wallet.
    pub async fn execute(
        &self,
        from: &str,
        to: &str,
        amount_in: Decimal,
        slippage_bps: Option<u64>,
        network: Network,
    ) -> Result<SwapReceipt, SwapError> {
        let from_token = self.tokens.resolve_symbol(from, network).await?;
        let to_token = self.tokens.resolve_symbol(to, network).await?;
        let slippage = self.slippage(slippage_bps);

        if network == Network::Mainnet {
            return self
                .jupiter_swap(from_token, to_token, amount_in, slippage)
                .await;
        }

        let keypair = service_keypair()?;
        let from_mint = parse_pubkey(&from_token.mint)?;
        let to_mint = parse_pubkey(&to_token.mint)?;
        let addrs = pool_addresses(&from_mint, &to_mint);
        let rpc = self.rpc(network);

        if !pool_exists(&rpc, &addrs.pool).await {
            return Err(SwapError::NoPool(from_token.symbol, to_token.symbol));
        }

        let (vault_in, vault_out) = addrs.oriented(&from_mint);
        let reserve_in = vault_balance(&rpc, &vault_in).await?;
        let reserve_out = vault_balance(&rpc, &vault_out).await?;

        let amount_in_base =
            to_base_units(amount_in, from_token.decimals)?;
        let expected_out = math::constant_product_quote(amount_in_base, reserve_in, reserve_out);
        let min_out = math::min_amount_out(expected_out, slippage);

        let user = keypair.pubkey();
        let source = get_associated_token_address(&user, &from_mint);
        let destination = get_associated_token_address(&user, &to_mint);

        let create_dest_ix = create_ata_instruction(&user, &user, &to_mint);
        let swap_ix = swap_instruction(
            &user,
            &addrs,
            &source,
            &destination,
            &vault_in,
            &vault_out,
            amount_in_base,
            min_out,
        );

        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &[create_dest_ix, swap_ix],
            Some(&user),
            &[&keypair],
            blockhash,
        );
        let signature = self
            .retry
            .run("pool swap", || rpc.send_and_confirm_transaction(&tx))
            .await?
            .to_string();

        tracing::info!(
            "Swap confirmed: {signature} ({amount_in} {} -> {} on {network})",
            from_token.symbol,
            to_token.symbol
        );

        Ok(SwapReceipt {
            explorer_url: network.explorer_tx_url(&signature),
            signature,
            from_token: from_token.symbol,
            to_token: to_token.symbol,
            input_amount: amount_in,
            expected_output: from_base_units(expected_out, to_token.decimals),
            network,
        })
    }

    /// Create the pool for a pair. Test mints are created on demand off
    /// mainnet.
    pub async fn create_pool(
        &self,
        token_a: &str,
        token_b: &str,
        network: Network,
    ) -> Result<PoolCreationReceipt, SwapError> {
        let keypair = service_keypair()?;
        let (info_a, _) = self.tokens.get_or_create(token_a, network, &keypair).await?;
        let (info_b, _) = self.tokens.get_or_create(token_b, network, &keypair).await?;

        let mint_a = parse_pubkey(&info_a.mint)?;
        let mint_b = parse_pubkey(&info_b.mint)?;
        let addrs = pool_addresses(&mint_a, &mint_b);
        let rpc = self.rpc(network);

        let ix = create_pool_instruction(&keypair.pubkey(), &addrs);
        let blockhash = rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&keypair.pubkey()),
            &[&keypair],
            blockhash,
        );
        let signature = self
            .retry
            .run("create pool", || rpc.send_and_confirm_transaction(&tx))
            .await?
            .to_string();

        tracing::info!(
            "Pool created for {}/{}: {}",
            info_a.symbol,
            info_b.symbol,
            addrs.pool
        );

        Ok(PoolCreationReceipt {
            explorer_url: network.explorer_tx_url(&signature),
            signature,
            pool: addrs.pool.to_string(),
        })
    }

    /// Deposit liquidity. When the pool already has reserves the second leg
    /// is derived proportionally from the first; an empty pool needs both
    /// amounts.
    pub async fn add_liquidity(
        &self,
        token_a: &str,
        token_b: &str,
        amount_a: Decimal,
        amount_b: Option<Decimal>,
        network: Network,
    ) -> Result<LiquidityReceipt, SwapError> {
        let keypair = service_keypair()?;
        let info_a = self.tokens.resolve_symbol(token_a, network).await?;
        let info_b = self.tokens.resolve_symbol(token_b, network).await?;

        let mint_a = parse_pubkey(&info_a.mint)?;
        let mint_b = parse_pubkey(&info_b.mint)?;
        let addrs = pool_addresses(&mint_a, &mint_b);
        let rpc = self.rpc(network);

        if !pool_exists(&rpc, &addrs.pool).await {
            return Err(SwapError::NoPool(info_a.symbol, info_b.symbol));
        }

        let (vault_a, vault_b) = addrs.oriented(&mint_a);
        let reserve_a = vault_balance(&rpc, &vault_a).await?;
        let reserve_b = vault_balance(&rpc, &vault_b).await?;

        let base_a = to_base_units(amount_a, info_a.decimals)?;
        let base_b = if reserve_a > 0 && reserve_b > 0 {
            math::proportional_deposit(base_a, reserve_a, reserve_b)
        } else {
            let amount_b = amount_b
                .ok_or_else(|| SwapError::EmptyPool(info_a.symbol.clone(), info_b.symbol.clone()))?;
            to_base_units(amount_b, info_b.decimals)?
        };

        let user = keypair.pubkey();
        let user_ata_a = get_associated_token_address(&user, &mint_a);
        let user_ata_b = get_associated_token_address(&user, &mint_b);

        // Amounts travel in sorted-mint order, like the accounts
        let a_is_lo = mint_a == addrs.mint_lo;
        let (base_lo, base_hi) = if a_is_lo { (base_a, base_b) } else { (base_b, base_a) };
        let (user_lo, user_hi) = if a_is_lo {
            (user_ata_a, user_ata_b)
        } else {
            (user_ata_b, user_ata_a)
        };

        let ix = add_liquidity_instruction(&user, &addrs, &user_lo, &user_hi, base_lo, base_hi);
        let blockhash = rpc.get_latest_blockhash().await?;
        let tx =
            Transaction::new_signed_with_payer(&[ix], Some(&user), &[&keypair], blockhash);
        let signature = self
            .retry
            .run("add liquidity", || rpc.send_and_confirm_transaction(&tx))
            .await?
            .to_string();

        Ok(LiquidityReceipt {
            explorer_url: network.explorer_tx_url(&signature),
            signature,
            token_a: info_a.symbol,
            token_b: info_b.symbol,
            amount_a,
            amount_b: from_base_units(base_b, info_b.decimals),
        })
    }

    async fn jupiter_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u64,
    ) -> Result<JupiterQuote, SwapError> {
        // Jupiter expresses slippage against 10_000
        let aggregator_slippage = (slippage_bps / 10).max(1);
        let url = format!("{}/quote", CONFIG.jupiter_api_url);
        let params = [
            ("inputMint", input_mint.to_string()),
            ("outputMint", output_mint.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", aggregator_slippage.to_string()),
        ];

        let response = self.http.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(SwapError::AggregatorStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn jupiter_quote_as_swap_quote(
        &self,
        from_token: TokenInfo,
        to_token: TokenInfo,
        amount_in: Decimal,
        slippage_bps: u64,
    ) -> Result<SwapQuote, SwapError> {
        let amount_base =
            to_base_units(amount_in, from_token.decimals)?;
        let quote = self
            .jupiter_quote(&from_token.mint, &to_token.mint, amount_base, slippage_bps)
            .await?;

        let out_base: u64 = quote.out_amount.parse().unwrap_or(0);
        let min_base: u64 = quote
            .other_amount_threshold
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| math::min_amount_out(out_base, slippage_bps));
        let impact = quote
            .price_impact_pct
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|pct| (pct * 100.0) as u64)
            .unwrap_or(0);

        Ok(SwapQuote {
            expected_output: from_base_units(out_base, to_token.decimals),
            min_output: from_base_units(min_base, to_token.decimals),
            price_impact_bps: impact,
            needs_pool_creation: false,
            message: None,
            from_token,
            to_token,
            input_amount: amount_in,
        })
    }

    /// Mainnet path: quote, request the swap transaction, sign it at the
    /// service-wallet index and submit.
    async fn jupiter_swap(
        &self,
        from_token: TokenInfo,
        to_token: TokenInfo,
        amount_in: Decimal,
        slippage_bps: u64,
    ) -> Result<SwapReceipt, SwapError> {
        let keypair = service_keypair()?;
        let rpc = self.rpc(Network::Mainnet);
        let amount_base =
            to_base_units(amount_in, from_token.decimals)?;

        let quote = self
            .jupiter_quote(&from_token.mint, &to_token.mint, amount_base, slippage_bps)
            .await?;
        let expected_base: u64 = quote.out_amount.parse().unwrap_or(0);

        let destination = if to_token.mint == NATIVE_MINT {
            None
        } else {
            let to_mint = parse_pubkey(&to_token.mint)?;
            let ata = get_associated_token_address(&keypair.pubkey(), &to_mint);
            if rpc.get_account(&ata).await.is_err() {
                // Idempotent: a misread of the existence check costs a no-op
                // transaction, not an aborted one
                let ix = create_ata_instruction(&keypair.pubkey(), &keypair.pubkey(), &to_mint);
                let blockhash = rpc.get_latest_blockhash().await?;
                let tx = Transaction::new_signed_with_payer(
                    &[ix],
                    Some(&keypair.pubkey()),
                    &[&keypair],
                    blockhash,
                );
                rpc.send_and_confirm_transaction(&tx).await?;
            }
            Some(ata.to_string())
        };

        let swap_request = JupiterSwapRequest {
            user_public_key: keypair.pubkey().to_string(),
            quote_response: quote,
            destination_token_account: destination,
            compute_unit_price_micro_lamports: Some(30_000_000),
        };

        let url = format!("{}/swap", CONFIG.jupiter_api_url);
        let response = self.http.post(&url).json(&swap_request).send().await?;
        if !response.status().is_success() {
            return Err(SwapError::AggregatorStatus(response.status()));
        }
        let swap_response: JupiterSwapResponse = response.json().await?;

        let tx_bytes = general_purpose::STANDARD
            .decode(&swap_response.swap_transaction)
            .map_err(|e| SwapError::Decode(e.to_string()))?;
        let mut versioned_tx: VersionedTransaction =
            bincode::deserialize(&tx_bytes).map_err(|e| SwapError::Decode(e.to_string()))?;

        let signer_index = versioned_tx
            .message
            .static_account_keys()
            .iter()
            .position(|key| *key == keypair.pubkey())
            .ok_or(SwapError::SignerNotFound)?;
        let message_data = versioned_tx.message.serialize();
        versioned_tx.signatures[signer_index] = keypair.sign_message(&message_data);

        let signature = self
            .retry
            .run("aggregator swap", || {
                rpc.send_and_confirm_transaction(&versioned_tx)
            })
            .await?
            .to_string();

        Ok(SwapReceipt {
            explorer_url: Network::Mainnet.explorer_tx_url(&signature),
            signature,
            from_token: from_token.symbol,
            to_token: to_token.symbol,
            input_amount: amount_in,
            expected_output: from_base_units(expected_base, to_token.decimals),
            network: Network::Mainnet,
        })
    }
}

/// Request shape for driving the engine as a tower service.
#[derive(Debug, Clone)]
pub struct SwapCall {
    pub from: String,
    pub to: String,
    pub amount_in: Decimal,
    pub slippage_bps: Option<u64>,
    pub network: Network,
}

impl Service<SwapCall> for SwapEngine {
    type Response = SwapReceipt;
    type Error = SwapError;

    async fn call(&self, req: SwapCall) -> Result<Self::Response, Self::Error> {
        self.execute(&req.from, &req.to, req.amount_in, req.slippage_bps, req.network)
            .await
    }
}

fn parse_pubkey(value: &str) -> Result<Pubkey, SwapError> {
    Pubkey::from_str(value).map_err(|_| SwapError::InvalidAddress(value.to_string()))
}

async fn pool_exists(rpc: &RpcClient, pool: &Pubkey) -> bool {
    match rpc.get_account(pool).await {
        Ok(account) => account.data.len() > 8,
        Err(_) => false,
    }
}

async fn vault_balance(
    rpc: &RpcClient,
    vault: &Pubkey,
) -> Result<u64, solana_client::client_error::ClientError> {
    let balance = rpc.get_token_account_balance(vault).await?;
    Ok(balance.amount.parse().unwrap_or(0))
}

#[allow(clippy::too_many_arguments)]
fn swap_instruction(
    user: &Pubkey,
    addrs: &PoolAddresses,
    source: &Pubkey,
    destination: &Pubkey,
    vault_in: &Pubkey,
    vault_out: &Pubkey,
    amount_in: u64,
    min_amount_out: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(24);
    data.extend_from_slice(&anchor_discriminator("swap"));
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&min_amount_out.to_le_bytes());

    Instruction {
        program_id: *COMPANION_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(addrs.pool, false),
            AccountMeta::new_readonly(addrs.authority, false),
            AccountMeta::new(*source, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new(*vault_in, false),
            AccountMeta::new(*vault_out, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ],
        data,
    }
}

fn create_pool_instruction(payer: &Pubkey, addrs: &PoolAddresses) -> Instruction {
    Instruction {
        program_id: *COMPANION_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(addrs.pool, false),
            AccountMeta::new_readonly(addrs.authority, false),
            AccountMeta::new_readonly(addrs.mint_lo, false),
            AccountMeta::new_readonly(addrs.mint_hi, false),
            AccountMeta::new(addrs.vault_lo, false),
            AccountMeta::new(addrs.vault_hi, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(spl_associated_token_account::ID, false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ],
        data: anchor_discriminator("create_pool").to_vec(),
    }
}

fn add_liquidity_instruction(
    user: &Pubkey,
    addrs: &PoolAddresses,
    user_lo: &Pubkey,
    user_hi: &Pubkey,
    amount_lo: u64,
    amount_hi: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(24);
    data.extend_from_slice(&anchor_discriminator("add_liquidity"));
    data.extend_from_slice(&amount_lo.to_le_bytes());
    data.extend_from_slice(&amount_hi.to_le_bytes());

    Instruction {
        program_id: *COMPANION_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(addrs.pool, false),
            AccountMeta::new_readonly(addrs.authority, false),
            AccountMeta::new(*user_lo, false),
            AccountMeta::new(*user_hi, false),
            AccountMeta::new(addrs.vault_lo, false),
            AccountMeta::new(addrs.vault_hi, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ],
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_addresses_are_direction_independent() {
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();

        let forward = pool_addresses(&mint_a, &mint_b);
        let backward = pool_addresses(&mint_b, &mint_a);

        assert_eq!(forward.pool, backward.pool);
        assert_eq!(forward.authority, backward.authority);
        assert_eq!(forward.vault_lo, backward.vault_lo);
        assert!(forward.mint_lo.to_bytes() <= forward.mint_hi.to_bytes());
    }

    #[test]
    fn oriented_vaults_follow_swap_direction() {
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();
        let addrs = pool_addresses(&mint_a, &mint_b);

        let (in_lo, out_lo) = addrs.oriented(&addrs.mint_lo);
        assert_eq!(in_lo, addrs.vault_lo);
        assert_eq!(out_lo, addrs.vault_hi);

        let (in_hi, out_hi) = addrs.oriented(&addrs.mint_hi);
        assert_eq!(in_hi, addrs.vault_hi);
        assert_eq!(out_hi, addrs.vault_lo);
    }

    #[test]
    fn swap_instruction_layout() {
        let user = Pubkey::new_unique();
        let addrs = pool_addresses(&Pubkey::new_unique(), &Pubkey::new_unique());
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();

        let ix = swap_instruction(
            &user,
            &addrs,
            &source,
            &destination,
            &addrs.vault_lo,
            &addrs.vault_hi,
            10_000_000,
            19_723_417,
        );

        assert_eq!(ix.program_id, *COMPANION_PROGRAM_ID);
        assert_eq!(ix.data.len(), 24);
        assert_eq!(&ix.data[..8], &[248, 198, 158, 145, 225, 117, 135, 200]);
        assert_eq!(&ix.data[8..16], &10_000_000u64.to_le_bytes());
        assert_eq!(&ix.data[16..24], &19_723_417u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts.len(), 8);
    }

    #[test]
    fn quote_and_min_out_stay_consistent() {
        // Reference pool with reserves of 1e9 and 2e9 base units
        let out = math::constant_product_quote(10_000_000, 1_000_000_000, 2_000_000_000);
        assert_eq!(out, 19_743_161);
        assert_eq!(math::min_amount_out(out, 100), 19_723_417);
    }

    #[test]
    fn engine_is_callable_as_a_service() {
        fn assert_service<S: Service<SwapCall, Response = SwapReceipt, Error = SwapError>>() {}
        assert_service::<SwapEngine>();
    }

    #[test]
    fn jupiter_quote_deserializes() {
        let json = r#"{
            "inputMint": "So11111111111111111111111111111111111111112",
            "inAmount": "1000000000",
            "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "outAmount": "153000000",
            "otherAmountThreshold": "152235000",
            "swapMode": "ExactIn",
            "slippageBps": 50,
            "priceImpactPct": "0.01",
            "routePlan": [],
            "contextSlot": 123456
        }"#;
        let quote: JupiterQuote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.out_amount, "153000000");
        assert_eq!(quote.slippage_bps, Some(50));
    }
}
