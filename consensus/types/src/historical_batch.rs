use crate::{EthSpec, Hash256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;
use tree_view::Vector;

/// Historical block and state roots, accumulated into `historical_roots`
/// every `SLOTS_PER_HISTORICAL_ROOT` slots (phase 0 through Bellatrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct HistoricalBatch<E: EthSpec> {
    pub block_roots: Vector<Hash256, E::SlotsPerHistoricalRoot>,
    pub state_roots: Vector<Hash256, E::SlotsPerHistoricalRoot>,
}
