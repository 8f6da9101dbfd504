//! Validator metric columns and how they merge across buckets.

/// Columns merged by arithmetic sum.
pub const ADDITIVE_COLUMNS: &[&str] = &[
    "attestations_source_reward",
    "attestations_target_reward",
    "attestations_head_reward",
    "attestations_inactivity_reward",
    "attestations_inclusion_reward",
    "attestations_reward",
    "attestations_ideal_source_reward",
    "attestations_ideal_target_reward",
    "attestations_ideal_head_reward",
    "attestations_ideal_inactivity_reward",
    "attestations_ideal_inclusion_reward",
    "attestations_ideal_reward",
    "blocks_scheduled",
    "blocks_proposed",
    "blocks_cl_reward",
    "blocks_el_reward",
    "sync_scheduled",
    "sync_executed",
    "sync_rewards",
    "deposits_count",
    "deposits_amount",
    "withdrawals_count",
    "withdrawals_amount",
    "inclusion_delay_sum",
    "sync_chance",
    "block_chance",
    "attestations_scheduled",
    "attestations_executed",
    "attestation_head_executed",
    "attestation_source_executed",
    "attestation_target_executed",
    "optimal_inclusion_delay_sum",
];

/// Additive columns stored as double precision rather than integers.
pub const FLOAT_COLUMNS: &[&str] = &["sync_chance", "block_chance"];

/// Column merged by logical OR.
pub const SLASHED_COLUMN: &str = "slashed";

/// Balance taken from the first epoch of the range.
pub const BALANCE_START_COLUMN: &str = "balance_start";

/// Balance taken from the last available epoch of the range.
pub const BALANCE_END_COLUMN: &str = "balance_end";

/// How a column is folded from finer buckets into a coarser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeClass {
    Additive,
    BooleanOr,
    BoundaryStart,
    BoundaryEnd,
}

/// Merge class of a metric column, or `None` for key and coverage columns.
pub fn merge_class(column: &str) -> Option<MergeClass> {
    match column {
        SLASHED_COLUMN => Some(MergeClass::BooleanOr),
        BALANCE_START_COLUMN => Some(MergeClass::BoundaryStart),
        BALANCE_END_COLUMN => Some(MergeClass::BoundaryEnd),
        c if ADDITIVE_COLUMNS.contains(&c) => Some(MergeClass::Additive),
        _ => None,
    }
}

/// Whether an additive column holds floating point values.
pub fn is_float_column(column: &str) -> bool {
    FLOAT_COLUMNS.contains(&column)
}
