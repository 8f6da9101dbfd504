//! SQL shared by both backends, generated from the metric column lists.
//!
//! The folds are single `INSERT ... SELECT` statements so a step either
//! writes every validator row of its bucket or none of them.

use crate::models::{DAILY_TABLE, EPOCH_TABLE, HOURLY_TABLE, ROLLING_TABLE};
use valdash_core::metrics::{
    ADDITIVE_COLUMNS, BALANCE_END_COLUMN, BALANCE_START_COLUMN, MergeClass, SLASHED_COLUMN,
    is_float_column, merge_class,
};

/// SQL dialect of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn param(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{n}"),
            Dialect::Postgres => format!("${n}"),
        }
    }

    fn bool_or(self, column: &str) -> String {
        match self {
            Dialect::Sqlite => format!("MAX({column})"),
            Dialect::Postgres => format!("bool_or({column})"),
        }
    }

    fn bigint(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres => "BIGINT",
        }
    }

    fn metric_definition(self, column: &str) -> String {
        match (self, column) {
            (Dialect::Sqlite, SLASHED_COLUMN) => format!("{column} INTEGER NOT NULL DEFAULT 0"),
            (Dialect::Postgres, SLASHED_COLUMN) => {
                format!("{column} BOOLEAN NOT NULL DEFAULT false")
            }
            (_, BALANCE_START_COLUMN) | (_, BALANCE_END_COLUMN) => {
                format!("{column} {}", self.bigint())
            }
            (Dialect::Sqlite, c) if is_float_column(c) => format!("{c} REAL NOT NULL DEFAULT 0"),
            (Dialect::Postgres, c) if is_float_column(c) => {
                format!("{c} DOUBLE PRECISION NOT NULL DEFAULT 0")
            }
            (_, c) => format!("{c} {} NOT NULL DEFAULT 0", self.bigint()),
        }
    }
}

/// Every metric column in bind order.
pub(crate) fn metric_columns() -> Vec<&'static str> {
    let mut columns = ADDITIVE_COLUMNS.to_vec();
    columns.extend([SLASHED_COLUMN, BALANCE_START_COLUMN, BALANCE_END_COLUMN]);
    columns
}

/// Statements prepared once per store.
#[derive(Debug, Clone)]
pub(crate) struct RollupQueries {
    pub upsert_epoch: String,
    pub upsert_hourly: String,
    pub fold_hour: String,
    pub fold_day: String,
    pub insert_rolling: String,
}

impl RollupQueries {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            upsert_epoch: upsert(
                dialect,
                EPOCH_TABLE,
                &["epoch", "validator_index"],
                &[],
            ),
            upsert_hourly: upsert(
                dialect,
                HOURLY_TABLE,
                &["epoch_start", "validator_index"],
                &["epoch_end"],
            ),
            fold_hour: fold_hour(dialect),
            fold_day: fold_day(dialect),
            insert_rolling: insert_rolling(dialect),
        }
    }
}

fn join(parts: impl IntoIterator<Item = String>, separator: &str) -> String {
    parts.into_iter().collect::<Vec<_>>().join(separator)
}

fn update_set(columns: &[&str]) -> String {
    join(
        columns.iter().map(|c| format!("{c} = excluded.{c}")),
        ",\n    ",
    )
}

// Key columns first, then extra columns, then every metric column.
fn upsert(dialect: Dialect, table: &str, key: &[&str], extra: &[&str]) -> String {
    let metrics = metric_columns();
    let columns: Vec<&str> = key
        .iter()
        .chain(extra.iter())
        .chain(metrics.iter())
        .copied()
        .collect();
    let values = join((1..=columns.len()).map(|n| dialect.param(n)), ", ");
    let updated: Vec<&str> = extra.iter().chain(metrics.iter()).copied().collect();

    format!(
        "INSERT INTO {table} ({columns})\nVALUES ({values})\nON CONFLICT ({key}) DO UPDATE SET\n    {updates}",
        columns = columns.join(", "),
        key = key.join(", "),
        updates = update_set(&updated),
    )
}

// Per-validator fold of `source` over rows matching `filter`.
// Boundary columns come from their own CTEs, not from `totals`.
fn totals_cte(dialect: Dialect, source: &str, filter: &str) -> String {
    let folded = join(
        metric_columns()
            .into_iter()
            .filter_map(|c| match merge_class(c)? {
                MergeClass::Additive => Some(format!("SUM({c}) AS {c}")),
                MergeClass::BooleanOr => Some(format!("{} AS {c}", dialect.bool_or(c))),
                MergeClass::BoundaryStart | MergeClass::BoundaryEnd => None,
            }),
        ",\n            ",
    );
    format!(
        "totals AS (
        SELECT validator_index,
            {folded}
        FROM {source}
        WHERE {filter}
        GROUP BY validator_index
    )"
    )
}

fn selected_metrics() -> String {
    join(
        metric_columns().into_iter().map(|c| match merge_class(c) {
            Some(MergeClass::BoundaryStart) => format!("balance_starts.{c}"),
            Some(MergeClass::BoundaryEnd) => format!("balance_ends.{c}"),
            _ => format!("totals.{c}"),
        }),
        ", ",
    )
}

const BALANCE_JOINS: &str = "FROM totals
LEFT JOIN balance_starts ON balance_starts.validator_index = totals.validator_index
LEFT JOIN balance_ends ON balance_ends.validator_index = totals.validator_index";

/// Epoch rows `[$1, $2)` into the hourly bucket starting at `$1`.
/// The stored `epoch_end` is one past the last epoch present.
fn fold_hour(dialect: Dialect) -> String {
    let (start, end) = (dialect.param(1), dialect.param(2));
    let metrics = metric_columns();
    let mut updated = vec!["epoch_end"];
    updated.extend(metrics.iter().copied());

    format!(
        "WITH
    last_epoch AS (
        SELECT MAX(epoch) AS epoch FROM {EPOCH_TABLE}
        WHERE epoch >= {start} AND epoch < {end}
    ),
    balance_starts AS (
        SELECT validator_index, {BALANCE_START_COLUMN} FROM {EPOCH_TABLE}
        WHERE epoch = {start}
    ),
    balance_ends AS (
        SELECT validator_index, {BALANCE_END_COLUMN} FROM {EPOCH_TABLE}
        WHERE epoch = (SELECT epoch FROM last_epoch)
    ),
    {totals}
INSERT INTO {HOURLY_TABLE} (epoch_start, epoch_end, validator_index, {columns})
SELECT {start}, (SELECT epoch FROM last_epoch) + 1, totals.validator_index, {selected}
{BALANCE_JOINS}
WHERE true
ON CONFLICT (epoch_start, validator_index) DO UPDATE SET
    {updates}",
        totals = totals_cte(
            dialect,
            EPOCH_TABLE,
            &format!("epoch >= {start} AND epoch < {end}")
        ),
        columns = metrics.join(", "),
        selected = selected_metrics(),
        updates = update_set(&updated),
    )
}

/// Hourly buckets starting in `[$1, $2)` into the daily row for day `$3`.
/// The stored `epoch_end` is the coverage of the latest hourly bucket.
fn fold_day(dialect: Dialect) -> String {
    let (start, end, day) = (dialect.param(1), dialect.param(2), dialect.param(3));
    let metrics = metric_columns();
    let mut updated = vec!["epoch_start", "epoch_end"];
    updated.extend(metrics.iter().copied());
    let in_range = format!("epoch_start >= {start} AND epoch_start < {end}");

    format!(
        "WITH
    first_bucket AS (
        SELECT MIN(epoch_start) AS epoch_start FROM {HOURLY_TABLE} WHERE {in_range}
    ),
    last_bucket AS (
        SELECT MAX(epoch_start) AS epoch_start FROM {HOURLY_TABLE} WHERE {in_range}
    ),
    coverage AS (
        SELECT MAX(epoch_end) AS epoch_end FROM {HOURLY_TABLE}
        WHERE epoch_start = (SELECT epoch_start FROM last_bucket)
    ),
    balance_starts AS (
        SELECT validator_index, {BALANCE_START_COLUMN} FROM {HOURLY_TABLE}
        WHERE epoch_start = (SELECT epoch_start FROM first_bucket)
    ),
    balance_ends AS (
        SELECT validator_index, {BALANCE_END_COLUMN} FROM {HOURLY_TABLE}
        WHERE epoch_start = (SELECT epoch_start FROM last_bucket)
    ),
    {totals}
INSERT INTO {DAILY_TABLE} (day, epoch_start, epoch_end, validator_index, {columns})
SELECT {day}, {start}, (SELECT epoch_end FROM coverage), totals.validator_index, {selected}
{BALANCE_JOINS}
WHERE true
ON CONFLICT (day, validator_index) DO UPDATE SET
    {updates}",
        totals = totals_cte(dialect, HOURLY_TABLE, &in_range),
        columns = metrics.join(", "),
        selected = selected_metrics(),
        updates = update_set(&updated),
    )
}

/// Hourly buckets starting in `[$1, $2]` into the rolling table, where `$2`
/// is the head bucket. The caller clears the table first.
fn insert_rolling(dialect: Dialect) -> String {
    let (start, head) = (dialect.param(1), dialect.param(2));
    let metrics = metric_columns();
    let in_window = format!("epoch_start >= {start} AND epoch_start <= {head}");

    format!(
        "WITH
    first_bucket AS (
        SELECT MIN(epoch_start) AS epoch_start FROM {HOURLY_TABLE} WHERE {in_window}
    ),
    coverage AS (
        SELECT MAX(epoch_end) AS epoch_end FROM {HOURLY_TABLE} WHERE epoch_start = {head}
    ),
    balance_starts AS (
        SELECT validator_index, {BALANCE_START_COLUMN} FROM {HOURLY_TABLE}
        WHERE epoch_start = (SELECT epoch_start FROM first_bucket)
    ),
    balance_ends AS (
        SELECT validator_index, {BALANCE_END_COLUMN} FROM {HOURLY_TABLE}
        WHERE epoch_start = {head}
    ),
    {totals}
INSERT INTO {ROLLING_TABLE} (validator_index, epoch_start, epoch_end, {columns})
SELECT totals.validator_index, {start}, (SELECT epoch_end FROM coverage), {selected}
{BALANCE_JOINS}",
        totals = totals_cte(dialect, HOURLY_TABLE, &in_window),
        columns = metrics.join(", "),
        selected = selected_metrics(),
    )
}

fn metric_definitions(dialect: Dialect) -> String {
    join(
        metric_columns()
            .into_iter()
            .map(|c| format!("    {}", dialect.metric_definition(c))),
        ",\n",
    )
}

/// Rollup table DDL. Statements are separated by `;` and contain none
/// internally, except SQLite trigger bodies which run as one batch.
pub(crate) fn schema(dialect: Dialect) -> String {
    let metrics = metric_definitions(dialect);
    let int = dialect.bigint();
    let (day_type, hourly_partitioning, daily_partitioning) = match dialect {
        Dialect::Sqlite => ("TEXT", "", ""),
        Dialect::Postgres => (
            "DATE",
            " PARTITION BY RANGE (epoch_start)",
            " PARTITION BY RANGE (day)",
        ),
    };

    let mut ddl = format!(
        "-- Per-epoch source rows
CREATE TABLE IF NOT EXISTS {EPOCH_TABLE} (
    epoch {int} NOT NULL,
    validator_index {int} NOT NULL,
{metrics},
    PRIMARY KEY (epoch, validator_index)
);

-- Hourly rollups
CREATE TABLE IF NOT EXISTS {HOURLY_TABLE} (
    epoch_start {int} NOT NULL,
    epoch_end {int} NOT NULL,
    validator_index {int} NOT NULL,
{metrics},
    PRIMARY KEY (epoch_start, validator_index)
){hourly_partitioning};

-- UTC day rollups
CREATE TABLE IF NOT EXISTS {DAILY_TABLE} (
    day {day_type} NOT NULL,
    epoch_start {int} NOT NULL,
    epoch_end {int} NOT NULL,
    validator_index {int} NOT NULL,
{metrics},
    PRIMARY KEY (day, validator_index)
){daily_partitioning};
CREATE INDEX IF NOT EXISTS idx_daily_epoch_start ON {DAILY_TABLE} (epoch_start);

-- Rolling 24h window, replaced wholesale
CREATE TABLE IF NOT EXISTS {ROLLING_TABLE} (
    validator_index {int} NOT NULL PRIMARY KEY,
    epoch_start {int} NOT NULL,
    epoch_end {int} NOT NULL,
{metrics}
);
"
    );

    if dialect == Dialect::Sqlite {
        ddl.push_str(&sqlite_partition_emulation());
    }
    ddl
}

// SQLite has no declarative partitioning: a catalogue records the ranges and
// triggers reject rows no catalogued range covers.
fn sqlite_partition_emulation() -> String {
    let mut ddl = String::from(
        "
-- Partition catalogue
CREATE TABLE IF NOT EXISTS rollup_partitions (
    partition_name TEXT PRIMARY KEY,
    parent_table TEXT NOT NULL,
    range_start NOT NULL,
    range_end NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rollup_partitions_parent ON rollup_partitions (parent_table, range_start);
",
    );
    for (table, key) in [(HOURLY_TABLE, "epoch_start"), (DAILY_TABLE, "day")] {
        ddl.push_str(&format!(
            "
CREATE TRIGGER IF NOT EXISTS {table}_requires_partition
BEFORE INSERT ON {table}
WHEN NOT EXISTS (
    SELECT 1 FROM rollup_partitions
    WHERE parent_table = '{table}'
      AND range_start <= NEW.{key}
      AND NEW.{key} < range_end
)
BEGIN
    SELECT RAISE(ABORT, 'no partition of relation {table} found for row');
END;
"
        ));
    }
    ddl
}

/// Split a schema into statements, skipping empty and comment-only chunks.
pub(crate) fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}
