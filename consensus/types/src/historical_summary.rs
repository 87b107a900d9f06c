use crate::Hash256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;
use tree_view::tree_ssz_container;

/// Summary of a period of `SLOTS_PER_HISTORICAL_ROOT` block and state roots
/// (Capella's replacement for `HistoricalBatch`).
///
/// Its tree hash root matches the `HistoricalBatch` of the same roots, so
/// pre-Capella proofs stay valid.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct HistoricalSummary {
    pub block_summary_root: Hash256,
    pub state_summary_root: Hash256,
}

tree_ssz_container!(HistoricalSummary {
    block_summary_root: Hash256,
    state_summary_root: Hash256,
});
