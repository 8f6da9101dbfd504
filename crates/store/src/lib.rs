//! Storage for the validator dashboard rollup tables.
//!
//! This crate owns the rollup data model and its two backends:
//! - Per-epoch source rows and the hourly, daily and rolling 24h rollups
//! - Set-based fold statements, one statement per bucket
//! - Range partitions (native on PostgreSQL, catalogued on SQLite)

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
mod sql;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::{DailyRow, EpochRow, HourlyRow, MetricFields, Partition, RollingRow};
pub use postgres::PostgresStore;
pub use repos::{DailyRepo, EpochRepo, HourlyRepo, PartitionRepo, RollingRepo};
pub use store::{RollupStore, SqliteStore};

use std::sync::Arc;
use valdash_core::config::DatabaseConfig;

/// Create a rollup store from configuration.
pub async fn from_config(config: &DatabaseConfig) -> StoreResult<Arc<dyn RollupStore>> {
    match config {
        DatabaseConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn RollupStore>)
        }
        DatabaseConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(StoreError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn RollupStore>)
        }
    }
}
