use crate::{Address, SignedRoot};
use bls::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// A request to change a validator's withdrawal credentials from BLS to an
/// execution address.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BlsToExecutionChange {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    pub from_bls_pubkey: PublicKeyBytes,
    #[serde(with = "serde_utils::address_hex")]
    pub to_execution_address: Address,
}

impl SignedRoot for BlsToExecutionChange {}
