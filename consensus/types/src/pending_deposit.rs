use crate::{Hash256, Slot};
use bls::{PublicKeyBytes, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;
use tree_view::tree_ssz_container;

/// A deposit waiting in the Electra deposit queue.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct PendingDeposit {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    pub signature: SignatureBytes,
    pub slot: Slot,
}

tree_ssz_container!(PendingDeposit {
    pubkey: PublicKeyBytes,
    withdrawal_credentials: Hash256,
    amount: u64,
    signature: SignatureBytes,
    slot: Slot,
});
