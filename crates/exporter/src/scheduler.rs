//! Periodic rollup ticks.

use crate::metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use valdash_rollup::{PassReport, RollupCoordinator, RollupError};

/// Fold new epochs into hourly buckets, then run one coordinator pass.
///
/// A failed hourly fold is logged and the pass still runs: the rolling and
/// daily steps only read hourly rows that were already committed.
pub async fn run_tick(coordinator: &RollupCoordinator) -> Result<PassReport, RollupError> {
    match coordinator.fold_hourly().await {
        Ok(report) => metrics::record_hourly_fold(&report),
        Err(e) => {
            metrics::HOURLY_FOLD_FAILURES.inc();
            tracing::error!(error = %e, "Hourly fold failed, continuing with the pass");
        }
    }

    match coordinator.run_pass().await {
        Ok(report) => {
            metrics::record_pass(&report);
            Ok(report)
        }
        Err(e) => {
            metrics::record_pass_failure(e.step());
            Err(e)
        }
    }
}

/// Run ticks every `interval` until `shutdown` resolves.
///
/// Errors are logged and the loop continues; the next tick resumes from
/// whatever the previous one committed. Ticks never overlap: a slow tick
/// delays the next one instead of queueing a burst.
pub async fn run_scheduler<S>(coordinator: Arc<RollupCoordinator>, interval: Duration, shutdown: S)
where
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(interval_secs = interval.as_secs(), "Rollup scheduler started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping rollup scheduler");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = run_tick(&coordinator).await {
                    tracing::error!(
                        step = e.step().map(|step| step.as_str()),
                        error = %e,
                        "Rollup pass failed"
                    );
                }
            }
        }
    }
}
