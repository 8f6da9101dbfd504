//! Layouts, row builders and seeding helpers.

#![allow(dead_code)]

use std::sync::Arc;
use time::macros::datetime;
use valdash_core::{BucketLayout, EpochTime, Granularity};
use valdash_rollup::{
    DailyAggregator, EpochBoundsService, HourlyAggregator, PartitionLifecycleManager,
    RetentionPolicy, RollingWindowAggregator, RollupCoordinator, StoreEpochBounds,
};
use valdash_store::{EpochRow, HourlyRow, MetricFields, RollupStore};

/// Starting balance of every test validator, in gwei.
pub const BASE_BALANCE: i64 = 32_000_000_000;

/// 90 second epochs with genesis at UTC midnight: 30 epochs per day,
/// hourly buckets of 10 epochs, hourly partitions of 30 epochs and daily
/// partitions of two days.
pub fn small_layout() -> BucketLayout {
    let clock = EpochTime::new(datetime!(2024-01-01 00:00 UTC), 90, 32).expect("valid clock");
    BucketLayout::new(clock, 10, 3, 2).expect("valid layout")
}

/// Same epoch length with genesis at noon: days start at epoch 15 and
/// hourly buckets are 5 epochs wide.
pub fn noon_genesis_layout() -> BucketLayout {
    let clock = EpochTime::new(datetime!(2024-01-01 12:00 UTC), 90, 32).expect("valid clock");
    BucketLayout::new(clock, 5, 3, 2).expect("valid layout")
}

/// Genesis at 01:00 UTC: the offset is one epoch, so days are `[0, 29)`,
/// `[29, 59)`, ... while hours stay `[0, 10)`, `[10, 20)`, ... and the last
/// hour of every day runs past midnight.
pub fn straddling_layout() -> BucketLayout {
    let clock = EpochTime::new(datetime!(2024-01-01 01:00 UTC), 90, 32).expect("valid clock");
    BucketLayout::new(clock, 10, 3, 2).expect("valid layout")
}

/// Retention that never reclaims within a test's epoch range.
pub fn keep_everything() -> RetentionPolicy {
    RetentionPolicy {
        hourly_epochs: 10_000,
        daily_epochs: None,
    }
}

pub fn metrics(reward: i64) -> MetricFields {
    MetricFields {
        attestations_reward: reward,
        attestations_scheduled: 1,
        attestations_executed: 1,
        ..MetricFields::default()
    }
}

/// Fold of the columns the row builders populate, in start order. Every
/// other column is expected to stay zero.
pub fn folded<'a>(rows: impl IntoIterator<Item = &'a MetricFields>) -> Option<MetricFields> {
    let mut acc: Option<MetricFields> = None;
    for m in rows {
        match acc.as_mut() {
            Some(acc) => {
                acc.attestations_reward += m.attestations_reward;
                acc.attestations_scheduled += m.attestations_scheduled;
                acc.attestations_executed += m.attestations_executed;
                acc.blocks_proposed += m.blocks_proposed;
                acc.deposits_amount += m.deposits_amount;
                acc.sync_chance += m.sync_chance;
                acc.slashed |= m.slashed;
                acc.balance_end = m.balance_end;
            }
            None => acc = Some(m.clone()),
        }
    }
    acc
}

/// Per-epoch row whose balance grows by `reward` every epoch.
pub fn epoch_row(epoch: u64, validator_index: i64, reward: i64) -> EpochRow {
    let balance = BASE_BALANCE + epoch as i64 * reward;
    EpochRow {
        epoch: epoch as i64,
        validator_index,
        metrics: MetricFields {
            balance_start: Some(balance),
            balance_end: Some(balance + reward),
            ..metrics(reward)
        },
    }
}

/// Rows for every epoch in `[start, end)` for each validator.
pub fn epoch_rows(start: u64, end: u64, validators: &[i64], reward: i64) -> Vec<EpochRow> {
    (start..end)
        .flat_map(|epoch| {
            validators
                .iter()
                .map(move |&validator| epoch_row(epoch, validator, reward))
        })
        .collect()
}

/// A closed hourly row covering `[start, start + width)`.
pub fn hourly_row(start: u64, width: u64, validator_index: i64, reward: i64) -> HourlyRow {
    HourlyRow {
        epoch_start: start as i64,
        epoch_end: (start + width) as i64,
        validator_index,
        metrics: MetricFields {
            balance_start: Some(BASE_BALANCE + start as i64),
            balance_end: Some(BASE_BALANCE + (start + width) as i64),
            ..metrics(reward)
        },
    }
}

/// Ensure hourly partitions for the rows, then write them.
pub async fn seed_hourly(store: &Arc<dyn RollupStore>, layout: &BucketLayout, rows: &[HourlyRow]) {
    let partitions = PartitionLifecycleManager::new(store.clone(), *layout);
    for row in rows {
        partitions
            .ensure_partition_for(Granularity::Hourly, row.epoch_start as u64)
            .await
            .expect("ensure hourly partition");
    }
    store
        .upsert_hourly_rows(rows)
        .await
        .expect("seed hourly rows");
}

pub async fn seed_epochs(store: &Arc<dyn RollupStore>, rows: &[EpochRow]) {
    store
        .upsert_epoch_rows(rows)
        .await
        .expect("seed epoch rows");
}

/// Aggregators sharing one bounds service and partition manager.
#[allow(dead_code)]
pub struct Rollups {
    pub bounds: Arc<dyn EpochBoundsService>,
    pub partitions: Arc<PartitionLifecycleManager>,
    pub hourly: HourlyAggregator,
    pub rolling: RollingWindowAggregator,
    pub daily: DailyAggregator,
}

pub fn rollups(store: &Arc<dyn RollupStore>, layout: BucketLayout) -> Rollups {
    let bounds: Arc<dyn EpochBoundsService> =
        Arc::new(StoreEpochBounds::new(store.clone(), *layout.clock()));
    let partitions = Arc::new(PartitionLifecycleManager::new(store.clone(), layout));
    Rollups {
        hourly: HourlyAggregator::new(store.clone(), bounds.clone(), partitions.clone()),
        rolling: RollingWindowAggregator::new(store.clone(), bounds.clone()),
        daily: DailyAggregator::new(store.clone(), bounds.clone(), partitions.clone()),
        bounds,
        partitions,
    }
}

pub fn coordinator(
    store: &Arc<dyn RollupStore>,
    layout: BucketLayout,
    retention: RetentionPolicy,
) -> RollupCoordinator {
    RollupCoordinator::new(store.clone(), layout, retention)
}
