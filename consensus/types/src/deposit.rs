use crate::{DepositData, Hash256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::FixedVector;
use ssz_types::typenum::U33;
use tree_hash_derive::TreeHash;

/// The data from the Eth1 chain deposit contract, with its merkle proof
/// against `eth1_data.deposit_root`.
#[derive(Debug, PartialEq, Hash, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Deposit {
    /// `DEPOSIT_CONTRACT_TREE_DEPTH + 1` hashes: the tree is mixed with the
    /// deposit count at its root.
    pub proof: FixedVector<Hash256, U33>,
    pub data: DepositData,
}

pub const DEPOSIT_TREE_DEPTH: usize = 32;
