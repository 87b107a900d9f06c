use crate::Hash256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;
use tree_view::tree_ssz_container;

/// Contains data obtained from the Eth1 chain.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct Eth1Data {
    pub deposit_root: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_count: u64,
    pub block_hash: Hash256,
}

tree_ssz_container!(Eth1Data {
    deposit_root: Hash256,
    deposit_count: u64,
    block_hash: Hash256,
});
