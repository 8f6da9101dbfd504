//! Rollup store trait and the SQLite implementation.

use crate::error::{StoreError, StoreResult, from_db, to_db};
use crate::models::{
    DAILY_TABLE, DailyRow, EpochRow, HOURLY_TABLE, HourlyRow, Partition, ROLLING_TABLE,
    RollingRow, bind_metrics, parent_table,
};
use crate::repos::{DailyRepo, EpochRepo, HourlyRepo, PartitionRepo, RollingRepo};
use crate::sql::{Dialect, RollupQueries, schema};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::Date;
use valdash_core::{EpochRange, Granularity};

/// Combined rollup store trait.
#[async_trait]
pub trait RollupStore:
    EpochRepo + HourlyRepo + DailyRepo + RollingRepo + PartitionRepo + Send + Sync
{
    /// Backend name for logs and metrics labels.
    fn backend(&self) -> &'static str;

    /// Create the rollup tables if they do not exist.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;
}

/// SQLite-based rollup store.
///
/// Range partitions are emulated with the `rollup_partitions` catalogue and
/// insert triggers, so inserts outside any partition fail as they would on
/// PostgreSQL.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    queries: RollupQueries,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(path: impl AsRef<Path>, query_timeout_secs: Option<u64>) -> StoreResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serializes writers; never hold a transaction
        // while querying the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            queries: RollupQueries::new(Dialect::Sqlite),
        };
        store.migrate().await?;

        tracing::warn!(
            query_timeout_secs = query_timeout_secs,
            "SQLite query timeout is advisory only and partitions are emulated. \
             Use PostgreSQL for production rollups."
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl RollupStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn migrate(&self) -> StoreResult<()> {
        let ddl = schema(Dialect::Sqlite);
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl EpochRepo for SqliteStore {
    async fn upsert_epoch_rows(&self, rows: &[EpochRow]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let query = sqlx::query(&self.queries.upsert_epoch)
                .bind(row.epoch)
                .bind(row.validator_index);
            bind_metrics!(query, row.metrics)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn first_epoch(&self) -> StoreResult<Option<u64>> {
        let epoch: Option<i64> =
            sqlx::query_scalar("SELECT MIN(epoch) FROM validator_dashboard_data_epoch")
                .fetch_one(&self.pool)
                .await?;
        Ok(epoch.map(from_db))
    }

    async fn last_epoch(&self) -> StoreResult<Option<u64>> {
        let epoch: Option<i64> =
            sqlx::query_scalar("SELECT MAX(epoch) FROM validator_dashboard_data_epoch")
                .fetch_one(&self.pool)
                .await?;
        Ok(epoch.map(from_db))
    }
}

#[async_trait]
impl HourlyRepo for SqliteStore {
    async fn fold_hour(&self, bucket: EpochRange) -> StoreResult<u64> {
        let result = sqlx::query(&self.queries.fold_hour)
            .bind(to_db(bucket.start)?)
            .bind(to_db(bucket.end)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_write)?;
        Ok(result.rows_affected())
    }

    async fn upsert_hourly_rows(&self, rows: &[HourlyRow]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let query = sqlx::query(&self.queries.upsert_hourly)
                .bind(row.epoch_start)
                .bind(row.validator_index)
                .bind(row.epoch_end);
            bind_metrics!(query, row.metrics)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_write)?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn last_hourly_bounds(&self) -> StoreResult<Option<EpochRange>> {
        let bounds: Option<(i64, i64)> = sqlx::query_as(
            "SELECT epoch_start, MAX(epoch_end) FROM validator_dashboard_data_hourly
             WHERE epoch_start = (SELECT MAX(epoch_start) FROM validator_dashboard_data_hourly)
             GROUP BY epoch_start",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(bounds.map(|(start, end)| EpochRange::new(from_db(start), from_db(end))))
    }

    async fn first_hourly_epoch(&self) -> StoreResult<Option<u64>> {
        let epoch: Option<i64> =
            sqlx::query_scalar("SELECT MIN(epoch_start) FROM validator_dashboard_data_hourly")
                .fetch_one(&self.pool)
                .await?;
        Ok(epoch.map(from_db))
    }

    async fn first_hourly_start_at_or_after(&self, epoch: u64) -> StoreResult<Option<u64>> {
        let start: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(epoch_start) FROM validator_dashboard_data_hourly WHERE epoch_start >= ?",
        )
        .bind(to_db(epoch)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(start.map(from_db))
    }

    async fn hourly_rows(&self, range: EpochRange) -> StoreResult<Vec<HourlyRow>> {
        let rows = sqlx::query_as::<_, HourlyRow>(
            "SELECT * FROM validator_dashboard_data_hourly
             WHERE epoch_start >= ? AND epoch_start < ?
             ORDER BY epoch_start, validator_index",
        )
        .bind(to_db(range.start)?)
        .bind(to_db(range.end)?)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl DailyRepo for SqliteStore {
    async fn fold_day(&self, bounds: EpochRange, day: Date) -> StoreResult<u64> {
        let result = sqlx::query(&self.queries.fold_day)
            .bind(to_db(bounds.start)?)
            .bind(to_db(bounds.end)?)
            .bind(day)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_write)?;
        Ok(result.rows_affected())
    }

    async fn last_daily_bounds(&self) -> StoreResult<Option<EpochRange>> {
        let bounds: Option<(i64, i64)> = sqlx::query_as(
            "SELECT epoch_start, MAX(epoch_end) FROM validator_dashboard_data_daily
             WHERE epoch_start = (SELECT MAX(epoch_start) FROM validator_dashboard_data_daily)
             GROUP BY epoch_start",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(bounds.map(|(start, end)| EpochRange::new(from_db(start), from_db(end))))
    }

    async fn first_daily_epoch(&self) -> StoreResult<Option<u64>> {
        let epoch: Option<i64> =
            sqlx::query_scalar("SELECT MIN(epoch_start) FROM validator_dashboard_data_daily")
                .fetch_one(&self.pool)
                .await?;
        Ok(epoch.map(from_db))
    }

    async fn daily_rows(&self, day: Date) -> StoreResult<Vec<DailyRow>> {
        let rows = sqlx::query_as::<_, DailyRow>(
            "SELECT * FROM validator_dashboard_data_daily WHERE day = ? ORDER BY validator_index",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn daily_days(&self) -> StoreResult<Vec<Date>> {
        let days: Vec<Date> = sqlx::query_scalar(
            "SELECT DISTINCT day FROM validator_dashboard_data_daily ORDER BY day",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(days)
    }
}

#[async_trait]
impl RollingRepo for SqliteStore {
    async fn replace_rolling(&self, window_start: u64, head_start: u64) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {ROLLING_TABLE}"))
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(&self.queries.insert_rolling)
            .bind(to_db(window_start)?)
            .bind(to_db(head_start)?)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_write)?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn clear_rolling(&self) -> StoreResult<()> {
        sqlx::query(&format!("DELETE FROM {ROLLING_TABLE}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rolling_rows(&self) -> StoreResult<Vec<RollingRow>> {
        let rows = sqlx::query_as::<_, RollingRow>(
            "SELECT * FROM validator_dashboard_data_rolling_daily ORDER BY validator_index",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl PartitionRepo for SqliteStore {
    async fn ensure_partition(&self, partition: &Partition) -> StoreResult<bool> {
        let name = partition.name();
        let query = sqlx::query(
            "INSERT OR IGNORE INTO rollup_partitions (partition_name, parent_table, range_start, range_end)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&name)
        .bind(partition.parent_table());
        let query = match partition.days {
            Some(days) => query.bind(days.start).bind(days.end),
            None => query
                .bind(to_db(partition.range.start)?)
                .bind(to_db(partition.range.end)?),
        };
        let created = query.execute(&self.pool).await?.rows_affected() > 0;
        Ok(created)
    }

    async fn drop_partition(&self, partition: &Partition) -> StoreResult<bool> {
        let name = partition.name();
        let mut tx = self.pool.begin().await?;

        let delete_daily = format!("DELETE FROM {DAILY_TABLE} WHERE day >= ?1 AND day < ?2");
        let delete_hourly =
            format!("DELETE FROM {HOURLY_TABLE} WHERE epoch_start >= ?1 AND epoch_start < ?2");
        let query = match partition.days {
            Some(days) => sqlx::query(&delete_daily).bind(days.start).bind(days.end),
            None => sqlx::query(&delete_hourly)
                .bind(to_db(partition.range.start)?)
                .bind(to_db(partition.range.end)?),
        };
        let rows = query.execute(&mut *tx).await?.rows_affected();

        let removed = sqlx::query("DELETE FROM rollup_partitions WHERE partition_name = ?1")
            .bind(&name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::debug!(partition = %name, rows, "Dropped emulated partition");
        Ok(removed > 0)
    }

    async fn partition_exists(&self, partition: &Partition) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM rollup_partitions WHERE partition_name = ?1)",
        )
        .bind(partition.name())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_partitions(&self, granularity: Granularity) -> StoreResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT partition_name FROM rollup_partitions WHERE parent_table = ?1 ORDER BY partition_name",
        )
        .bind(parent_table(granularity))
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}
