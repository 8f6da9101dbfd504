//! PostgreSQL-based rollup store with native range partitioning.

use crate::error::{StoreError, StoreResult, from_db, to_db};
use crate::models::{
    DailyRow, EpochRow, HourlyRow, Partition, ROLLING_TABLE, RollingRow, bind_metrics, iso_date,
    parent_table,
};
use crate::repos::{DailyRepo, EpochRepo, HourlyRepo, PartitionRepo, RollingRepo};
use crate::sql::{Dialect, RollupQueries, schema, schema_statements};
use crate::store::RollupStore;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::Date;
use valdash_core::config::PgSslMode;
use valdash_core::{EpochRange, Granularity};

/// PostgreSQL-based rollup store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    queries: RollupQueries,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters,
    /// so the password can come from the environment.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        // The statement timeout is the only deadline a rollup step runs under.
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            queries: RollupQueries::new(Dialect::Postgres),
        };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl RollupStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn migrate(&self) -> StoreResult<()> {
        let ddl = schema(Dialect::Postgres);
        for statement in schema_statements(&ddl) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl EpochRepo for PostgresStore {
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
impl HourlyRepo for PostgresStore {
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
            "SELECT MIN(epoch_start) FROM validator_dashboard_data_hourly WHERE epoch_start >= $1",
        )
        .bind(to_db(epoch)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(start.map(from_db))
    }

    async fn hourly_rows(&self, range: EpochRange) -> StoreResult<Vec<HourlyRow>> {
        let rows = sqlx::query_as::<_, HourlyRow>(
            "SELECT * FROM validator_dashboard_data_hourly
             WHERE epoch_start >= $1 AND epoch_start < $2
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
impl DailyRepo for PostgresStore {
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
            "SELECT * FROM validator_dashboard_data_daily WHERE day = $1 ORDER BY validator_index",
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
impl RollingRepo for PostgresStore {
    async fn replace_rolling(&self, window_start: u64, head_start: u64) -> StoreResult<u64> {
        // TRUNCATE is transactional in PostgreSQL; concurrent readers block
        // until commit and then see the new snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("TRUNCATE {ROLLING_TABLE}"))
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
        sqlx::query(&format!("TRUNCATE {ROLLING_TABLE}"))
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

/// `FOR VALUES` bounds clause. Partition names and bounds are derived from
/// numbers and dates only, so they are safe to interpolate.
fn partition_bounds(partition: &Partition) -> String {
    match partition.days {
        Some(days) => format!(
            "FOR VALUES FROM ('{}') TO ('{}')",
            iso_date(days.start),
            iso_date(days.end)
        ),
        None => format!(
            "FOR VALUES FROM ({}) TO ({})",
            partition.range.start, partition.range.end
        ),
    }
}

#[async_trait]
impl PartitionRepo for PostgresStore {
    async fn ensure_partition(&self, partition: &Partition) -> StoreResult<bool> {
        if self.partition_exists(partition).await? {
            return Ok(false);
        }
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} PARTITION OF {} {}",
            partition.name(),
            partition.parent_table(),
            partition_bounds(partition)
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(true)
    }

    async fn drop_partition(&self, partition: &Partition) -> StoreResult<bool> {
        let existed = self.partition_exists(partition).await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", partition.name()))
            .execute(&self.pool)
            .await?;
        Ok(existed)
    }

    async fn partition_exists(&self, partition: &Partition) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(partition.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn list_partitions(&self, granularity: Granularity) -> StoreResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT child.relname::TEXT
             FROM pg_inherits
             JOIN pg_class child ON child.oid = pg_inherits.inhrelid
             JOIN pg_class parent ON parent.oid = pg_inherits.inhparent
             JOIN pg_namespace ns ON ns.oid = parent.relnamespace
             WHERE parent.relname = $1 AND ns.nspname = current_schema()
             ORDER BY child.relname",
        )
        .bind(parent_table(granularity))
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use valdash_core::DayRange;

    #[test]
    fn test_hourly_partition_bounds() {
        let partition = Partition::hourly(EpochRange::new(216, 432));
        assert_eq!(partition_bounds(&partition), "FOR VALUES FROM (216) TO (432)");
    }

    #[test]
    fn test_daily_partition_bounds_use_dates() {
        let partition = Partition::daily(
            EpochRange::new(0, 1238),
            DayRange {
                start: date!(2020 - 12 - 01),
                end: date!(2020 - 12 - 07),
            },
        );
        assert_eq!(
            partition_bounds(&partition),
            "FOR VALUES FROM ('2020-12-01') TO ('2020-12-07')"
        );
    }
}
