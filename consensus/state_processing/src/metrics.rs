#![allow(missing_docs)]

pub use metrics::*;
use std::sync::LazyLock;

/*
 * Epoch processing
 */
pub static EPOCH_TRANSITION_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "epoch_transition_seconds",
        "Time to run a full epoch transition",
    )
});
pub static EPOCH_TRANSITION_STEP_SECONDS: LazyLock<Result<HistogramVec>> = LazyLock::new(|| {
    try_create_histogram_vec(
        "epoch_transition_step_seconds",
        "Time to run each step of the epoch transition",
        &["step"],
    )
});
pub static EPOCH_TRANSITION_COMMIT_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "epoch_transition_commit_seconds",
        "Time to re-hash the state tree after the epoch transition",
    )
});

/*
 * Block processing
 */
pub static PROCESS_BLOCK_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram("process_block_seconds", "Time to apply a block to a state")
});
pub static PROCESS_BLOCK_COMMIT_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "process_block_commit_seconds",
        "Time to re-hash the state tree after applying a block",
    )
});
pub static BLOCK_SIGNATURE_VERIFY_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "process_block_signature_verify_seconds",
        "Time to batch-verify the signatures of a block",
    )
});

/*
 * Hashing
 */
pub static HASH_TREE_ROOT_SECONDS: LazyLock<Result<HistogramVec>> = LazyLock::new(|| {
    try_create_histogram_vec(
        "hash_tree_root_seconds",
        "Time to compute a hash tree root, by object",
        &["source"],
    )
});

/*
 * State caches
 */
pub static STATE_CLONED_COUNT: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "state_cloned_count",
        "Number of state clones per transition",
    )
});
pub static PRE_STATE_VALIDATORS_NODES_POPULATED: LazyLock<Result<IntGaugeVec>> =
    LazyLock::new(|| {
        try_create_int_gauge_vec(
            "pre_state_validators_nodes_populated",
            "Whether the pre-state validator tree cache was populated (hit) or not (miss)",
            &["source"],
        )
    });
pub static PRE_STATE_BALANCES_NODES_POPULATED: LazyLock<Result<IntGaugeVec>> =
    LazyLock::new(|| {
        try_create_int_gauge_vec(
            "pre_state_balances_nodes_populated",
            "Whether the pre-state balances tree cache was populated (hit) or not (miss)",
            &["source"],
        )
    });
pub static POST_STATE_VALIDATORS_NODES_POPULATED: LazyLock<Result<IntGauge>> =
    LazyLock::new(|| {
        try_create_int_gauge(
            "post_state_validators_nodes_populated",
            "Whether the post-state validator tree cache is populated",
        )
    });
pub static POST_STATE_BALANCES_NODES_POPULATED: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "post_state_balances_nodes_populated",
        "Whether the post-state balances tree cache is populated",
    )
});

/*
 * Registry and participation
 */
pub static VALIDATORS_IN_ACTIVATION_QUEUE: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "validators_in_activation_queue",
        "Validators queued for activation at the last epoch transition",
    )
});
pub static VALIDATORS_IN_EXIT_QUEUE: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "validators_in_exit_queue",
        "Validators with a pending exit at the last epoch transition",
    )
});
pub static ATTESTATIONS_PER_BLOCK: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "attestations_per_block",
        "Attestations included in the most recently processed block",
    )
});
pub static PROPOSER_SYNC_AGGREGATE_REWARDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "proposer_rewards_sync_aggregate",
        "Proposer rewards issued for sync aggregate inclusion, in Gwei",
    )
});
pub static PARTICIPATION_PREV_EPOCH_TARGET_ATTESTING_GWEI_PROGRESSIVE_TOTAL: LazyLock<
    Result<IntGauge>,
> = LazyLock::new(|| {
    try_create_int_gauge(
        "participation_prev_epoch_target_attesting_gwei_progressive_total",
        "Progressive total of previous epoch target attesting balance",
    )
});
pub static PARTICIPATION_CURR_EPOCH_TARGET_ATTESTING_GWEI_PROGRESSIVE_TOTAL: LazyLock<
    Result<IntGauge>,
> = LazyLock::new(|| {
    try_create_int_gauge(
        "participation_curr_epoch_target_attesting_gwei_progressive_total",
        "Progressive total of current epoch target attesting balance",
    )
});
