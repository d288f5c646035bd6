//! # Database Module
//!
//! PostgreSQL integration over tokio-postgres with deadpool pooling. Backs the
//! persistent tier of the token-metadata cache.

pub mod connection;
pub mod migrations;
pub mod models;

pub use connection::{DatabaseConfig, DatabaseConnection};
pub use models::*;
