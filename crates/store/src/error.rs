//! Rollup store error types.

use thiserror::Error;

/// Message fragment both backends raise when a row has no covering partition.
pub(crate) const MISSING_PARTITION_MESSAGE: &str = "no partition of relation";

/// Rollup store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("missing partition: {0}")]
    MissingPartition(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Classify a driver error raised while writing rollup rows.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.message().contains(MISSING_PARTITION_MESSAGE) {
                return StoreError::MissingPartition(db.message().to_string());
            }
        }
        StoreError::Database(err)
    }

    /// Whether the write failed because the target partition does not exist.
    pub fn is_missing_partition(&self) -> bool {
        matches!(self, StoreError::MissingPartition(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Convert an epoch to the signed column type.
pub(crate) fn to_db(epoch: u64) -> StoreResult<i64> {
    i64::try_from(epoch)
        .map_err(|_| StoreError::Internal(format!("epoch {epoch} does not fit in BIGINT")))
}

/// Convert a stored epoch back. Negative values never pass `to_db`.
pub(crate) fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
