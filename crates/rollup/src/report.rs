//! Outcome summaries returned by the aggregators and the coordinator.

use serde::Serialize;
use std::time::Duration;
use valdash_core::EpochRange;

/// Result of one `fold_forward` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FoldReport {
    /// Buckets aggregated (open or new).
    pub buckets_folded: u64,
    /// Closed buckets left untouched.
    pub buckets_skipped: u64,
    /// Validator rows written across all folded buckets.
    pub rows_written: u64,
    /// Partitions created ahead of the writes.
    pub partitions_created: u64,
    /// Last bucket folded, if any.
    pub last_bucket: Option<EpochRange>,
}

/// Result of one rolling window refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollingReport {
    /// Window covered, `None` when there was no hourly data.
    pub window: Option<EpochRange>,
    /// Validator rows in the new snapshot.
    pub rows_written: u64,
}

/// Wall-clock time spent in each pass step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepTimings {
    pub rolling: Duration,
    pub daily: Duration,
    pub retention: Duration,
}

/// Result of one coordinator pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub rolling: RollingReport,
    pub daily: FoldReport,
    pub hourly_partitions_dropped: usize,
    pub daily_partitions_dropped: usize,
    pub timings: StepTimings,
}

/// Whether `bounds` is the stored latest bucket and its coverage reached `closes_at`.
///
/// `closes_at` is `bounds.end` unless the last finer bucket straddles the
/// boundary (genesis-aligned hours inside UTC-aligned days), in which case it
/// is the end of that finer bucket.
pub(crate) fn is_closed(latest: Option<EpochRange>, bounds: EpochRange, closes_at: u64) -> bool {
    latest.is_some_and(|latest| latest.start == bounds.start && latest.end >= closes_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_closed() {
        let bounds = EpochRange::new(0, 30);
        assert!(is_closed(Some(EpochRange::new(0, 30)), bounds, 30));
        assert!(!is_closed(Some(EpochRange::new(0, 25)), bounds, 30));
        assert!(!is_closed(Some(EpochRange::new(30, 60)), bounds, 30));
        assert!(!is_closed(None, bounds, 30));
    }

    #[test]
    fn test_straddling_bucket_must_close_too() {
        // Day [0, 29) whose last hour is [20, 30).
        let bounds = EpochRange::new(0, 29);
        assert!(!is_closed(Some(EpochRange::new(0, 29)), bounds, 30));
        assert!(is_closed(Some(EpochRange::new(0, 30)), bounds, 30));
    }
}
