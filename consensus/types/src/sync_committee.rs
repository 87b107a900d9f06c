use crate::{EthSpec, FixedVector};
use bls::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use std::collections::HashMap;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Error {
    ArithError(safe_arith::ArithError),
    InvalidSubcommitteeRange {
        start_subcommittee_index: usize,
        end_subcommittee_index: usize,
        sync_committee_index: usize,
    },
}

impl From<safe_arith::ArithError> for Error {
    fn from(e: safe_arith::ArithError) -> Error {
        Error::ArithError(e)
    }
}

/// The committee of validators signing beacon block roots for light clients.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SyncCommittee<E: EthSpec> {
    pub pubkeys: FixedVector<PublicKeyBytes, E::SyncCommitteeSize>,
    pub aggregate_pubkey: PublicKeyBytes,
}

impl<E: EthSpec> SyncCommittee<E> {
    /// A naive `SyncCommittee` of all-empty pubkeys, used as the placeholder
    /// before Altair data is available.
    pub fn naive() -> Self {
        Self {
            pubkeys: FixedVector::from_elem(PublicKeyBytes::empty()),
            aggregate_pubkey: PublicKeyBytes::empty(),
        }
    }

    /// Returns `true` if the pubkey exists in the `SyncCommittee`.
    pub fn contains(&self, pubkey: &PublicKeyBytes) -> bool {
        self.pubkeys.contains(pubkey)
    }

    /// For a given `pubkey`, returns every position it occupies in the committee.
    ///
    /// Members may appear more than once when the validator set is smaller
    /// than the committee.
    pub fn positions_of(&self, pubkey: &PublicKeyBytes) -> Vec<usize> {
        self.pubkeys
            .iter()
            .enumerate()
            .filter_map(|(i, committee_pubkey)| (committee_pubkey == pubkey).then_some(i))
            .collect()
    }

    /// Build a map from pubkey to every committee position it occupies.
    pub fn position_map(&self) -> HashMap<PublicKeyBytes, Vec<usize>> {
        let mut map: HashMap<PublicKeyBytes, Vec<usize>> = HashMap::new();
        for (i, pubkey) in self.pubkeys.iter().enumerate() {
            map.entry(*pubkey).or_default().push(i);
        }
        map
    }
}
