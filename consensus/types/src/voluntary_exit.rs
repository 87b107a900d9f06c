use crate::{ChainSpec, Domain, Epoch, ForkName, Hash256, SignedRoot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// An exit voluntarily submitted a validator who wishes to withdraw.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct VoluntaryExit {
    /// Earliest epoch when voluntary exit can be processed.
    pub epoch: Epoch,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
}

impl SignedRoot for VoluntaryExit {}

impl VoluntaryExit {
    /// Voluntary exits are signed over the Capella fork version from Deneb
    /// onwards, so they stay valid across later upgrades.
    pub fn signing_domain(
        &self,
        fork_name: ForkName,
        fork: &crate::Fork,
        genesis_validators_root: Hash256,
        spec: &ChainSpec,
    ) -> Hash256 {
        if fork_name.deneb_enabled() {
            spec.compute_domain(
                Domain::VoluntaryExit,
                spec.capella_fork_version,
                genesis_validators_root,
            )
        } else {
            spec.get_domain(self.epoch, Domain::VoluntaryExit, fork, genesis_validators_root)
        }
    }
}
