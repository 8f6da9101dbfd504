//! Configuration types shared across crates.

use crate::epoch::EpochTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Chain timing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Genesis unix timestamp in seconds.
    #[serde(default = "default_genesis_timestamp")]
    pub genesis_timestamp: i64,
    /// Slot duration in seconds.
    #[serde(default = "default_seconds_per_slot")]
    pub seconds_per_slot: u64,
    /// Slots per epoch.
    #[serde(default = "default_slots_per_epoch")]
    pub slots_per_epoch: u64,
}

fn default_genesis_timestamp() -> i64 {
    1_606_824_023 // Ethereum mainnet
}

fn default_seconds_per_slot() -> u64 {
    12
}

fn default_slots_per_epoch() -> u64 {
    32
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_timestamp: default_genesis_timestamp(),
            seconds_per_slot: default_seconds_per_slot(),
            slots_per_epoch: default_slots_per_epoch(),
        }
    }
}

impl ChainConfig {
    /// Build the chain clock from this configuration.
    pub fn clock(&self) -> crate::Result<EpochTime> {
        EpochTime::from_unix(
            self.genesis_timestamp,
            self.seconds_per_slot,
            self.slots_per_epoch,
        )
    }

    /// Validate chain timing.
    pub fn validate(&self) -> Result<(), String> {
        self.clock().map(|_| ()).map_err(|e| e.to_string())
    }
}

/// Rollup bucket, partition and retention configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Hourly bucket width in epochs (default: epochs per day / 24).
    #[serde(default)]
    pub hourly_width_epochs: Option<u64>,
    /// Hourly buckets per hourly table partition.
    #[serde(default = "default_hourly_partition_buckets")]
    pub hourly_partition_buckets: u64,
    /// Days per daily table partition.
    #[serde(default = "default_daily_partition_buckets")]
    pub daily_partition_buckets: u64,
    /// How far behind the hourly head hourly partitions are kept
    /// (default: three days of epochs).
    #[serde(default)]
    pub hourly_retention_epochs: Option<u64>,
    /// How far behind the hourly head daily partitions are kept.
    /// Daily data is kept forever when unset.
    #[serde(default)]
    pub daily_retention_epochs: Option<u64>,
}

fn default_hourly_partition_buckets() -> u64 {
    24
}

fn default_daily_partition_buckets() -> u64 {
    6
}

/// Hourly retention used when none is configured, in days.
pub const DEFAULT_HOURLY_RETENTION_DAYS: u64 = 3;

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            hourly_width_epochs: None,
            hourly_partition_buckets: default_hourly_partition_buckets(),
            daily_partition_buckets: default_daily_partition_buckets(),
            hourly_retention_epochs: None,
            daily_retention_epochs: None,
        }
    }
}

impl RollupConfig {
    /// Hourly retention in epochs for the given clock.
    pub fn hourly_retention(&self, clock: &EpochTime) -> u64 {
        self.hourly_retention_epochs
            .unwrap_or(DEFAULT_HOURLY_RETENTION_DAYS * clock.epochs_per_day())
    }

    /// Validate rollup configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.hourly_width_epochs == Some(0) {
            return Err("rollup.hourly_width_epochs cannot be 0".to_string());
        }
        if self.hourly_partition_buckets == 0 {
            return Err("rollup.hourly_partition_buckets cannot be 0".to_string());
        }
        if self.daily_partition_buckets == 0 {
            return Err("rollup.daily_partition_buckets cannot be 0".to_string());
        }
        if self.hourly_retention_epochs == Some(0) {
            return Err(
                "rollup.hourly_retention_epochs cannot be 0 (the head partition would be dropped)"
                    .to_string(),
            );
        }
        if self.daily_retention_epochs == Some(0) {
            return Err("rollup.daily_retention_epochs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Rollup database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite database (testing and small deployments; partitions are emulated).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel queries).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database with native range partitioning.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer VALDASH_DATABASE__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds. This is the only deadline a
        /// rollup step runs under.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(600_000) // 10 minutes, a daily backfill step can be slow
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/rollups.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DatabaseConfig::Sqlite { .. } => Ok(()),
            DatabaseConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields"
                        .to_string(),
                ),
            },
        }
    }
}

/// Scheduler configuration for the exporter binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between rollup ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Bind address for `/metrics` and `/health` (disabled when unset).
    #[serde(default)]
    pub metrics_bind: Option<String>,
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            metrics_bind: None,
        }
    }
}

impl SchedulerConfig {
    /// Tick interval as a std::time::Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Validate scheduler configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("scheduler.interval_secs cannot be 0. \
                 This would cause a panic when creating the tick timer."
                .to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Validate every section, returning the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.chain.validate()?;
        self.rollup.validate()?;
        self.database.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}
