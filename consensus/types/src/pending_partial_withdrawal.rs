use crate::Epoch;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;
use tree_view::tree_ssz_container;

/// A withdrawal request waiting in the Electra partial-withdrawal queue.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct PendingPartialWithdrawal {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    pub withdrawable_epoch: Epoch,
}

tree_ssz_container!(PendingPartialWithdrawal {
    validator_index: u64,
    amount: u64,
    withdrawable_epoch: Epoch,
});
