// Database Models
//
// Tokio-postgres compatible models. The only persistent entity is token
// metadata, the durable tier of the resolution cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// Trait for converting from tokio-postgres Row
pub trait FromRow {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error>
    where
        Self: Sized;
}

/// One cached token-metadata record, keyed by (mint, network).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadataRow {
    pub mint: String,
    pub network: String,
    pub symbol: String,
    pub name: String,
    pub decimals: i32,
    pub logo_uri: Option<String>,
    /// Where the record came from: registry, on-chain, created, user-defined.
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

impl FromRow for TokenMetadataRow {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            mint: row.try_get("mint")?,
            network: row.try_get("network")?,
            symbol: row.try_get("symbol")?,
            name: row.try_get("name")?,
            decimals: row.try_get("decimals")?,
            logo_uri: row.try_get("logo_uri").ok(),
            source: row.try_get("source")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
