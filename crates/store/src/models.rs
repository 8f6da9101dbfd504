//! Database models mapping to the rollup schema.

use sqlx::FromRow;
use time::Date;
use valdash_core::{DayRange, EpochRange, Granularity};

// =============================================================================
// Metric columns
// =============================================================================

/// Per-validator metric columns shared by every rollup table.
///
/// Field order matches `valdash_core::metrics::ADDITIVE_COLUMNS`, followed by
/// `slashed` and the two boundary balances.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct MetricFields {
    pub attestations_source_reward: i64,
    pub attestations_target_reward: i64,
    pub attestations_head_reward: i64,
    pub attestations_inactivity_reward: i64,
    pub attestations_inclusion_reward: i64,
    pub attestations_reward: i64,
    pub attestations_ideal_source_reward: i64,
    pub attestations_ideal_target_reward: i64,
    pub attestations_ideal_head_reward: i64,
    pub attestations_ideal_inactivity_reward: i64,
    pub attestations_ideal_inclusion_reward: i64,
    pub attestations_ideal_reward: i64,
    pub blocks_scheduled: i64,
    pub blocks_proposed: i64,
    pub blocks_cl_reward: i64,
    pub blocks_el_reward: i64,
    pub sync_scheduled: i64,
    pub sync_executed: i64,
    pub sync_rewards: i64,
    pub deposits_count: i64,
    pub deposits_amount: i64,
    pub withdrawals_count: i64,
    pub withdrawals_amount: i64,
    pub inclusion_delay_sum: i64,
    pub sync_chance: f64,
    pub block_chance: f64,
    pub attestations_scheduled: i64,
    pub attestations_executed: i64,
    pub attestation_head_executed: i64,
    pub attestation_source_executed: i64,
    pub attestation_target_executed: i64,
    pub optimal_inclusion_delay_sum: i64,
    pub slashed: bool,
    /// Balance at the first epoch of the range (NULL when that epoch has no row).
    pub balance_start: Option<i64>,
    /// Balance at the last available epoch of the range.
    pub balance_end: Option<i64>,
}

/// Bind every `MetricFields` column in schema order onto a sqlx query.
macro_rules! bind_metrics {
    ($query:expr, $m:expr) => {
        $query
            .bind($m.attestations_source_reward)
            .bind($m.attestations_target_reward)
            .bind($m.attestations_head_reward)
            .bind($m.attestations_inactivity_reward)
            .bind($m.attestations_inclusion_reward)
            .bind($m.attestations_reward)
            .bind($m.attestations_ideal_source_reward)
            .bind($m.attestations_ideal_target_reward)
            .bind($m.attestations_ideal_head_reward)
            .bind($m.attestations_ideal_inactivity_reward)
            .bind($m.attestations_ideal_inclusion_reward)
            .bind($m.attestations_ideal_reward)
            .bind($m.blocks_scheduled)
            .bind($m.blocks_proposed)
            .bind($m.blocks_cl_reward)
            .bind($m.blocks_el_reward)
            .bind($m.sync_scheduled)
            .bind($m.sync_executed)
            .bind($m.sync_rewards)
            .bind($m.deposits_count)
            .bind($m.deposits_amount)
            .bind($m.withdrawals_count)
            .bind($m.withdrawals_amount)
            .bind($m.inclusion_delay_sum)
            .bind($m.sync_chance)
            .bind($m.block_chance)
            .bind($m.attestations_scheduled)
            .bind($m.attestations_executed)
            .bind($m.attestation_head_executed)
            .bind($m.attestation_source_executed)
            .bind($m.attestation_target_executed)
            .bind($m.optimal_inclusion_delay_sum)
            .bind($m.slashed)
            .bind($m.balance_start)
            .bind($m.balance_end)
    };
}
pub(crate) use bind_metrics;

// =============================================================================
// Rollup rows
// =============================================================================

/// Per-epoch validator record written upstream.
#[derive(Debug, Clone, FromRow)]
pub struct EpochRow {
    pub epoch: i64,
    pub validator_index: i64,
    #[sqlx(flatten)]
    pub metrics: MetricFields,
}

/// Hourly bucket row. `epoch_end` is the exclusive end of the epochs covered.
#[derive(Debug, Clone, FromRow)]
pub struct HourlyRow {
    pub epoch_start: i64,
    pub epoch_end: i64,
    pub validator_index: i64,
    #[sqlx(flatten)]
    pub metrics: MetricFields,
}

/// UTC day bucket row keyed by `(day, validator_index)`.
#[derive(Debug, Clone, FromRow)]
pub struct DailyRow {
    pub day: Date,
    pub epoch_start: i64,
    pub epoch_end: i64,
    pub validator_index: i64,
    #[sqlx(flatten)]
    pub metrics: MetricFields,
}

/// Rolling 24h row; the epoch columns describe the window the row covers.
#[derive(Debug, Clone, FromRow)]
pub struct RollingRow {
    pub validator_index: i64,
    pub epoch_start: i64,
    pub epoch_end: i64,
    #[sqlx(flatten)]
    pub metrics: MetricFields,
}

// =============================================================================
// Partitions
// =============================================================================

/// Parent table of the hourly rollups.
pub const HOURLY_TABLE: &str = "validator_dashboard_data_hourly";
/// Parent table of the UTC daily rollups.
pub const DAILY_TABLE: &str = "validator_dashboard_data_daily";
/// Rolling 24h table (unpartitioned, fully replaced).
pub const ROLLING_TABLE: &str = "validator_dashboard_data_rolling_daily";
/// Per-epoch source table.
pub const EPOCH_TABLE: &str = "validator_dashboard_data_epoch";

/// Range partition of a rollup table.
///
/// Hourly partitions are keyed by `epoch_start`; daily partitions are keyed
/// by `day`, so they also carry the calendar days they cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub granularity: Granularity,
    pub range: EpochRange,
    pub days: Option<DayRange>,
}

impl Partition {
    pub fn hourly(range: EpochRange) -> Self {
        Self {
            granularity: Granularity::Hourly,
            range,
            days: None,
        }
    }

    pub fn daily(range: EpochRange, days: DayRange) -> Self {
        Self {
            granularity: Granularity::Daily,
            range,
            days: Some(days),
        }
    }

    /// Partitioned parent table.
    pub fn parent_table(&self) -> &'static str {
        parent_table(self.granularity)
    }

    /// Physical table name, derived only from the range boundaries.
    pub fn name(&self) -> String {
        match self.days {
            Some(days) => format!(
                "{}_{}_{}",
                self.parent_table(),
                compact_date(days.start),
                compact_date(days.end)
            ),
            None => format!(
                "{}_{}_{}",
                self.parent_table(),
                self.range.start,
                self.range.end
            ),
        }
    }
}

/// Parent table for a granularity.
pub fn parent_table(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Hourly => HOURLY_TABLE,
        Granularity::Daily => DAILY_TABLE,
    }
}

/// `YYYYMMDD` label used in partition names.
pub(crate) fn compact_date(day: Date) -> String {
    format!("{:04}{:02}{:02}", day.year(), u8::from(day.month()), day.day())
}

/// `YYYY-MM-DD` literal used in partition bounds.
pub(crate) fn iso_date(day: Date) -> String {
    format!("{:04}-{:02}-{:02}", day.year(), u8::from(day.month()), day.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_hourly_partition_name() {
        let partition = Partition::hourly(EpochRange::new(216, 432));
        assert_eq!(partition.name(), "validator_dashboard_data_hourly_216_432");
        assert_eq!(partition.parent_table(), HOURLY_TABLE);
    }

    #[test]
    fn test_daily_partition_name() {
        let partition = Partition::daily(
            EpochRange::new(0, 1238),
            DayRange {
                start: date!(2020 - 12 - 01),
                end: date!(2020 - 12 - 07),
            },
        );
        assert_eq!(
            partition.name(),
            "validator_dashboard_data_daily_20201201_20201207"
        );
        assert_eq!(iso_date(date!(2020 - 12 - 07)), "2020-12-07");
    }
}
