//! Rollup error types.

use std::fmt;
use thiserror::Error;
use valdash_core::EpochRange;
use valdash_store::StoreError;

/// Step of a coordinator pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassStep {
    Rolling,
    Daily,
    HourlyRetention,
    DailyRetention,
}

impl PassStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rolling => "rolling",
            Self::Daily => "daily",
            Self::HourlyRetention => "hourly_retention",
            Self::DailyRetention => "daily_retention",
        }
    }
}

impl fmt::Display for PassStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rollup operation errors.
#[derive(Debug, Error)]
pub enum RollupError {
    #[error("{operation} failed for epochs {range}: {source}")]
    Bucket {
        operation: &'static str,
        range: EpochRange,
        #[source]
        source: StoreError,
    },

    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{step} step failed: {source}")]
    Step {
        step: PassStep,
        #[source]
        source: Box<RollupError>,
    },

    #[error("invalid layout: {0}")]
    Layout(#[from] valdash_core::Error),
}

impl RollupError {
    /// Pass step that failed, if this error came from the coordinator.
    pub fn step(&self) -> Option<PassStep> {
        match self {
            RollupError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether the root cause is a write with no covering partition.
    pub fn is_missing_partition(&self) -> bool {
        match self {
            RollupError::Bucket { source, .. } | RollupError::Store { source, .. } => {
                source.is_missing_partition()
            }
            RollupError::Step { source, .. } => source.is_missing_partition(),
            RollupError::Layout(_) => false,
        }
    }

    pub(crate) fn in_step(self, step: PassStep) -> Self {
        RollupError::Step {
            step,
            source: Box::new(self),
        }
    }
}

/// Result type for rollup operations.
pub type Result<T> = std::result::Result<T, RollupError>;

/// Attach the operation name (and bucket range) to store failures.
pub(crate) trait StoreResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T>;
    fn for_bucket(self, operation: &'static str, range: EpochRange) -> Result<T>;
}

impl<T> StoreResultExt<T> for std::result::Result<T, StoreError> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| RollupError::Store { operation, source })
    }

    fn for_bucket(self, operation: &'static str, range: EpochRange) -> Result<T> {
        self.map_err(|source| RollupError::Bucket {
            operation,
            range,
            source,
        })
    }
}
