//! Prometheus metrics for the rollup scheduler.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! Metrics carry no validator data, only pass counts, durations and
//! partition churn. Bind it to an internal address.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};
use valdash_rollup::{FoldReport, PassReport, PassStep};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Pass metrics
pub static PASSES_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "valdash_rollup_passes_completed_total",
        "Total number of rollup passes that completed every step",
    )
    .expect("metric creation failed")
});

pub static PASS_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "valdash_rollup_pass_failures_total",
            "Rollup passes aborted, by failing step",
        ),
        &["step"],
    )
    .expect("metric creation failed")
});

pub static STEP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "valdash_rollup_step_duration_seconds",
            "Duration of each rollup pass step",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
        &["step"],
    )
    .expect("metric creation failed")
});

pub static LAST_PASS_TIMESTAMP: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "valdash_rollup_last_pass_timestamp_seconds",
        "Unix time of the last completed rollup pass",
    )
    .expect("metric creation failed")
});

// Bucket metrics
pub static BUCKETS_FOLDED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "valdash_rollup_buckets_folded_total",
            "Buckets (re)computed, by granularity",
        ),
        &["granularity"],
    )
    .expect("metric creation failed")
});

pub static HOURLY_FOLD_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "valdash_rollup_hourly_fold_failures_total",
        "Hourly folds that stopped on an error",
    )
    .expect("metric creation failed")
});

pub static ROLLING_ROWS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "valdash_rollup_rolling_rows",
        "Rows in the latest rolling 24h snapshot",
    )
    .expect("metric creation failed")
});

// Partition metrics
pub static PARTITIONS_CREATED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "valdash_rollup_partitions_created_total",
            "Partitions created ahead of writes, by granularity",
        ),
        &["granularity"],
    )
    .expect("metric creation failed")
});

pub static PARTITIONS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "valdash_rollup_partitions_dropped_total",
            "Partitions dropped by retention, by granularity",
        ),
        &["granularity"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(PASSES_COMPLETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PASS_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STEP_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(LAST_PASS_TIMESTAMP.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BUCKETS_FOLDED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HOURLY_FOLD_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ROLLING_ROWS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PARTITIONS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PARTITIONS_DROPPED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record the outcome of an hourly fold.
pub fn record_hourly_fold(report: &FoldReport) {
    BUCKETS_FOLDED
        .with_label_values(&["hourly"])
        .inc_by(report.buckets_folded);
    PARTITIONS_CREATED
        .with_label_values(&["hourly"])
        .inc_by(report.partitions_created);
}

/// Record a completed pass.
pub fn record_pass(report: &PassReport) {
    PASSES_COMPLETED.inc();
    LAST_PASS_TIMESTAMP.set(time::OffsetDateTime::now_utc().unix_timestamp());
    ROLLING_ROWS.set(report.rolling.rows_written as i64);

    BUCKETS_FOLDED
        .with_label_values(&["daily"])
        .inc_by(report.daily.buckets_folded);
    PARTITIONS_CREATED
        .with_label_values(&["daily"])
        .inc_by(report.daily.partitions_created);
    PARTITIONS_DROPPED
        .with_label_values(&["hourly"])
        .inc_by(report.hourly_partitions_dropped as u64);
    PARTITIONS_DROPPED
        .with_label_values(&["daily"])
        .inc_by(report.daily_partitions_dropped as u64);

    STEP_DURATION
        .with_label_values(&["rolling"])
        .observe(report.timings.rolling.as_secs_f64());
    STEP_DURATION
        .with_label_values(&["daily"])
        .observe(report.timings.daily.as_secs_f64());
    STEP_DURATION
        .with_label_values(&["retention"])
        .observe(report.timings.retention.as_secs_f64());
}

/// Record an aborted pass under the failing step.
pub fn record_pass_failure(step: Option<PassStep>) {
    let label = step.map_or("unknown", |step| step.as_str());
    PASS_FAILURES.with_label_values(&[label]).inc();
}
