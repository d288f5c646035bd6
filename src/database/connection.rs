// Database Connection Management
//
// Handles PostgreSQL connection pooling using tokio-postgres and deadpool.

use anyhow::{Context, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::str::FromStr;
use std::time::Duration;

use crate::database::models::{FromRow, TokenMetadataRow};

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub max_size: usize,
    pub timeouts: deadpool_postgres::Timeouts,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "companion".to_string(),
            max_size: 16,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(Duration::from_secs(30)),
                recycle: Some(Duration::from_secs(30)),
            },
        }
    }
}

impl DatabaseConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set in the environment")?;

        let config = tokio_postgres::Config::from_str(&database_url)
            .context("Failed to parse DATABASE_URL")?;

        Ok(Self {
            host: config
                .get_hosts()
                .first()
                .map(|h| match h {
                    tokio_postgres::config::Host::Tcp(s) => s.clone(),
                    tokio_postgres::config::Host::Unix(s) => s.to_string_lossy().to_string(),
                })
                .unwrap_or_default(),
            port: config.get_ports().first().cloned().unwrap_or(5432),
            user: config.get_user().map(|u| u.to_string()).unwrap_or_default(),
            password: config
                .get_password()
                .map(|p| String::from_utf8_lossy(p).to_string())
                .unwrap_or_default(),
            dbname: config.get_dbname().map(|d| d.to_string()).unwrap_or_default(),
            ..Self::default()
        })
    }
}

/// Database connection wrapper
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: Pool,
}

impl DatabaseConnection {
    /// Create a new database connection with the provided configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let masked_host = format!("{}:{}/{}", config.host, config.port, config.dbname);
        tracing::info!("🔌 Connecting to database: {}", masked_host);

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.dbname(&config.dbname);

        let tls_connector = TlsConnector::builder()
            .build()
            .context("Failed to build TLS connector")?;
        let tls = MakeTlsConnector::new(tls_connector);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, tls, mgr_config);

        let pool = Pool::builder(mgr)
            .max_size(config.max_size)
            .wait_timeout(config.timeouts.wait)
            .create_timeout(config.timeouts.create)
            .recycle_timeout(config.timeouts.recycle)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .context("Failed to create database pool")?;

        let client = pool
            .get()
            .await
            .context("Failed to get connection from pool")?;
        client
            .query("SELECT 1", &[])
            .await
            .context("Failed to test database connection")?;

        tracing::info!("✅ Database connection established successfully");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        crate::database::migrations::run_migrations(&self.pool).await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get connection for health check")?;
        client
            .query("SELECT 1", &[])
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    /// Fetch cached token metadata by mint address and network
    pub async fn get_token_metadata(
        &self,
        mint: &str,
        network: &str,
    ) -> Result<Option<TokenMetadataRow>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let row = client
            .query_opt(
                "SELECT * FROM token_metadata WHERE mint = $1 AND network = $2",
                &[&mint, &network],
            )
            .await
            .context("Failed to query token metadata by mint")?;
        row.map(|r| TokenMetadataRow::from_row(&r).context("Failed to map token metadata row"))
            .transpose()
    }

    /// Fetch cached token metadata by symbol
    pub async fn get_token_metadata_by_symbol(
        &self,
        symbol: &str,
        network: &str,
    ) -> Result<Option<TokenMetadataRow>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let row = client
            .query_opt(
                "SELECT * FROM token_metadata WHERE network = $1 AND symbol = $2 \
                 ORDER BY updated_at DESC LIMIT 1",
                &[&network, &symbol],
            )
            .await
            .context("Failed to query token metadata by symbol")?;
        row.map(|r| TokenMetadataRow::from_row(&r).context("Failed to map token metadata row"))
            .transpose()
    }

    /// Insert or refresh a token metadata record
    pub async fn upsert_token_metadata(&self, record: &TokenMetadataRow) -> Result<u64> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let n = client
            .execute(
                "INSERT INTO token_metadata \
                     (mint, network, symbol, name, decimals, logo_uri, source, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
                 ON CONFLICT (mint, network) DO UPDATE SET \
                     symbol = EXCLUDED.symbol, \
                     name = EXCLUDED.name, \
                     decimals = EXCLUDED.decimals, \
                     logo_uri = EXCLUDED.logo_uri, \
                     source = EXCLUDED.source, \
                     updated_at = NOW()",
                &[
                    &record.mint,
                    &record.network,
                    &record.symbol,
                    &record.name,
                    &record.decimals,
                    &record.logo_uri,
                    &record.source,
                ],
            )
            .await
            .context("Failed to upsert token metadata")?;
        Ok(n)
    }

    /// List every cached token for a network
    pub async fn list_token_metadata(&self, network: &str) -> Result<Vec<TokenMetadataRow>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let rows = client
            .query(
                "SELECT * FROM token_metadata WHERE network = $1 ORDER BY symbol",
                &[&network],
            )
            .await
            .context("Failed to list token metadata")?;
        rows.iter()
            .map(|r| TokenMetadataRow::from_row(r).context("Failed to map token metadata row"))
            .collect()
    }

    /// Get database connection statistics
    pub fn stats(&self) -> ConnectionStats {
        let status = self.pool.status();
        ConnectionStats {
            size: status.size as u32,
            idle: status.available,
        }
    }
}

/// Database connection statistics
#[derive(Debug)]
pub struct ConnectionStats {
    pub size: u32,
    pub idle: usize,
}
