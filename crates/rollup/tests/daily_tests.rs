//! UTC daily fold tests.

mod common;

use common::*;
use time::macros::date;
use valdash_core::{EpochRange, Granularity};

#[tokio::test]
async fn test_three_closed_hours_fold_into_one_closed_day() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    seed_hourly(
        &store,
        &layout,
        &[
            hourly_row(0, 10, 7, 100),
            hourly_row(10, 10, 7, 100),
            hourly_row(20, 10, 7, 100),
        ],
    )
    .await;
    let rollups = rollups(&store, layout);

    let report = rollups.daily.fold_forward().await.unwrap();
    assert_eq!(report.buckets_folded, 1);
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.partitions_created, 1);
    assert_eq!(report.last_bucket, Some(EpochRange::new(0, 30)));

    let rows = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].validator_index, 7);
    assert_eq!(rows[0].epoch_start, 0);
    assert_eq!(rows[0].epoch_end, 30);
    assert_eq!(rows[0].metrics.attestations_reward, 300);
    assert_eq!(rows[0].metrics.attestations_scheduled, 3);
    assert_eq!(
        store.last_daily_bounds().await.unwrap(),
        Some(EpochRange::new(0, 30))
    );
}

#[tokio::test]
async fn test_closed_day_is_skipped_and_unchanged() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    seed_hourly(
        &store,
        &layout,
        &[
            hourly_row(0, 10, 7, 100),
            hourly_row(10, 10, 7, 100),
            hourly_row(20, 10, 7, 100),
        ],
    )
    .await;
    let rollups = rollups(&store, layout);
    rollups.daily.fold_forward().await.unwrap();
    let before = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();

    let report = rollups.daily.fold_forward().await.unwrap();

    assert_eq!(report.buckets_folded, 0);
    assert_eq!(report.buckets_skipped, 1);
    let after = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(after.len(), before.len());
    assert_eq!(after[0].metrics, before[0].metrics);
    assert_eq!(after[0].epoch_end, before[0].epoch_end);
}

#[tokio::test]
async fn test_open_day_is_recomputed_until_closed() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    seed_hourly(
        &store,
        &layout,
        &[hourly_row(0, 10, 7, 100), hourly_row(10, 10, 7, 100)],
    )
    .await;
    let rollups = rollups(&store, layout);

    rollups.daily.fold_forward().await.unwrap();
    let open = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(open[0].epoch_end, 20);
    assert_eq!(open[0].metrics.attestations_reward, 200);

    // Refolding an open day with unchanged input is idempotent.
    let report = rollups.daily.fold_forward().await.unwrap();
    assert_eq!(report.buckets_folded, 1);
    let refolded = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(refolded[0].metrics, open[0].metrics);

    seed_hourly(&store, &layout, &[hourly_row(20, 10, 7, 100)]).await;
    rollups.daily.fold_forward().await.unwrap();

    let closed = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].epoch_end, 30);
    assert_eq!(closed[0].metrics.attestations_reward, 300);
}

#[tokio::test]
async fn test_daily_row_merges_hourly_rows_by_column_class() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();

    let mut hours = Vec::new();
    for (i, start) in [0u64, 10, 20].into_iter().enumerate() {
        let mut row = hourly_row(start, 10, 1, 50 - 40 * i as i64);
        row.metrics.blocks_proposed = i as i64;
        row.metrics.sync_chance = 0.125 * (i as f64 + 1.0);
        row.metrics.slashed = i == 1;
        row.metrics.deposits_amount = 1_000;
        hours.push(row);
        hours.push(hourly_row(start, 10, 2, 10));
    }
    seed_hourly(&store, &layout, &hours).await;

    rollups(&store, layout).daily.fold_forward().await.unwrap();

    let rows = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        let expected = folded(
            hours
                .iter()
                .filter(|h| h.validator_index == row.validator_index)
                .map(|h| &h.metrics),
        );
        assert_eq!(Some(row.metrics), expected);
    }
}

#[tokio::test]
async fn test_hours_never_leak_across_day_boundary() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    let rollups = rollups(&store, layout);

    seed_hourly(
        &store,
        &layout,
        &[
            hourly_row(0, 10, 7, 100),
            hourly_row(10, 10, 7, 100),
            hourly_row(20, 10, 7, 100),
        ],
    )
    .await;
    rollups.daily.fold_forward().await.unwrap();

    seed_hourly(
        &store,
        &layout,
        &[hourly_row(30, 10, 7, 1), hourly_row(40, 10, 7, 1)],
    )
    .await;
    let report = rollups.daily.fold_forward().await.unwrap();
    assert_eq!(report.buckets_skipped, 1);
    assert_eq!(report.buckets_folded, 1);

    let first = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    let second = store.daily_rows(date!(2024 - 01 - 02)).await.unwrap();
    assert_eq!(first[0].metrics.attestations_reward, 300);
    assert_eq!(second[0].metrics.attestations_reward, 2);
    assert_eq!(second[0].epoch_start, 30);
    assert_eq!(second[0].epoch_end, 50);
    assert_eq!(
        store.daily_days().await.unwrap(),
        vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02)]
    );
}

#[tokio::test]
async fn test_latest_day_never_moves_backward() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    let rollups = rollups(&store, layout);

    let mut previous = 0;
    for start in (0..120).step_by(10) {
        seed_hourly(&store, &layout, &[hourly_row(start, 10, 3, 5)]).await;
        rollups.daily.fold_forward().await.unwrap();

        let latest = store.last_daily_bounds().await.unwrap().unwrap();
        assert!(latest.start >= previous, "latest day moved back at {start}");
        assert_eq!(latest.start, layout.day_bounds(start).start);
        previous = latest.start;
    }
    assert_eq!(store.daily_days().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_bootstrap_starts_at_hourly_head() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    seed_hourly(
        &store,
        &layout,
        &[hourly_row(0, 10, 1, 1), hourly_row(30, 10, 1, 1)],
    )
    .await;

    let report = rollups(&store, layout).daily.fold_forward().await.unwrap();

    assert_eq!(report.buckets_folded, 1);
    assert_eq!(store.daily_days().await.unwrap(), vec![date!(2024 - 01 - 02)]);
}

#[tokio::test]
async fn test_no_hourly_data_is_not_an_error() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();

    let report = rollups(&store, small_layout()).daily.fold_forward().await.unwrap();

    assert_eq!(report, Default::default());
    assert!(store.daily_days().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_day_buckets_follow_utc_midnight() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = noon_genesis_layout();
    assert_eq!(layout.utc_offset(), 15);

    // Genesis day is cut short at genesis: epochs [0, 15).
    seed_hourly(
        &store,
        &layout,
        &[
            hourly_row(0, 5, 1, 10),
            hourly_row(5, 5, 1, 10),
            hourly_row(10, 5, 1, 10),
        ],
    )
    .await;
    let rollups = rollups(&store, layout);
    rollups.daily.fold_forward().await.unwrap();

    let genesis_day = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(genesis_day[0].epoch_start, 0);
    assert_eq!(genesis_day[0].epoch_end, 15);
    assert_eq!(genesis_day[0].metrics.attestations_reward, 30);
    assert_eq!(
        store.last_daily_bounds().await.unwrap(),
        Some(EpochRange::new(0, 15))
    );

    seed_hourly(&store, &layout, &[hourly_row(15, 5, 1, 10)]).await;
    rollups.daily.fold_forward().await.unwrap();

    let next_day = store.daily_rows(date!(2024 - 01 - 02)).await.unwrap();
    assert_eq!(next_day[0].epoch_start, 15);
    assert_eq!(next_day[0].metrics.attestations_reward, 10);

    // The first daily partition spans two UTC days in offset space.
    let partitions = store.list_partitions(Granularity::Daily).await.unwrap();
    assert_eq!(
        partitions,
        vec!["validator_dashboard_data_daily_20240101_20240103".to_string()]
    );
}

#[tokio::test]
async fn test_daily_write_requires_partition() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = small_layout();
    seed_hourly(&store, &layout, &[hourly_row(0, 10, 1, 1)]).await;

    let err = store
        .fold_day(EpochRange::new(0, 30), date!(2024 - 01 - 01))
        .await
        .expect_err("no daily partition exists");

    assert!(err.is_missing_partition(), "unexpected error: {err}");
    assert!(store.daily_days().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_day_refolded_until_hour_across_midnight_closes() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = straddling_layout();
    assert_eq!(layout.day_bounds(0), EpochRange::new(0, 29));
    let rollups = rollups(&store, layout);

    seed_epochs(&store, &epoch_rows(0, 29, &[1], 1)).await;
    rollups.hourly.fold_forward().await.unwrap();
    rollups.daily.fold_forward().await.unwrap();
    let open = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(open[0].epoch_end, 29);
    assert_eq!(open[0].metrics.attestations_reward, 29);

    // Epoch 29 falls on the next UTC day but completes hour [20, 30).
    seed_epochs(&store, &epoch_rows(29, 40, &[1], 1)).await;
    rollups.hourly.fold_forward().await.unwrap();
    let report = rollups.daily.fold_forward().await.unwrap();
    assert_eq!(report.buckets_folded, 2);
    assert_eq!(report.buckets_skipped, 0);

    let first = store.daily_rows(date!(2024 - 01 - 01)).await.unwrap();
    assert_eq!(first[0].epoch_end, 30);
    assert_eq!(first[0].metrics.attestations_reward, 30);
    assert_eq!(first[0].metrics.balance_end, Some(BASE_BALANCE + 30));

    let second = store.daily_rows(date!(2024 - 01 - 02)).await.unwrap();
    assert_eq!(second[0].epoch_start, 29);
    assert_eq!(second[0].epoch_end, 40);
    assert_eq!(second[0].metrics.attestations_reward, 10);
}

#[tokio::test]
async fn test_days_with_straddling_hours_partition_the_hourly_rows() {
    let test = TestRollupStore::new().await.unwrap();
    let store = test.store();
    let layout = straddling_layout();
    let rollups = rollups(&store, layout);

    for start in (0..90).step_by(10) {
        let reward = start as i64 / 10 + 1;
        seed_epochs(&store, &epoch_rows(start, start + 10, &[1, 2], reward)).await;
        rollups.hourly.fold_forward().await.unwrap();
        rollups.daily.fold_forward().await.unwrap();
    }

    let days = store.daily_days().await.unwrap();
    assert_eq!(
        days,
        vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02), date!(2024 - 01 - 03)]
    );
    let hours = store.hourly_rows(EpochRange::new(0, 90)).await.unwrap();
    assert_eq!(hours.len(), 18);

    let mut daily_total = 0;
    for (day, day_start) in days.into_iter().zip([0u64, 29, 59]) {
        let bounds = layout.day_bounds(day_start);
        let rows = store.daily_rows(day).await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            let in_day: Vec<_> = hours
                .iter()
                .filter(|h| h.validator_index == row.validator_index)
                .filter(|h| bounds.contains(h.epoch_start as u64))
                .collect();
            assert_eq!(in_day.len(), 3, "day {day} holds three hours");
            let last = in_day.last().unwrap();

            assert_eq!(row.epoch_start as u64, bounds.start);
            assert_eq!(row.epoch_end, last.epoch_end);
            assert_eq!(
                Some(row.metrics.clone()),
                folded(in_day.iter().map(|h| &h.metrics))
            );
            daily_total += row.metrics.attestations_reward;
        }
    }

    // Every epoch lands in exactly one day.
    let epoch_total: i64 = (0..90).map(|e| (e / 10 + 1) as i64).sum::<i64>() * 2;
    assert_eq!(daily_total, epoch_total);
}
