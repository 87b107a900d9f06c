use crate::Epoch;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// Specifies a fork of the `BeaconChain`, to prevent replay attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Fork {
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub previous_version: [u8; 4],
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub current_version: [u8; 4],
    pub epoch: Epoch,
}

impl Fork {
    /// Returns the fork version of the given `epoch`.
    pub fn get_fork_version(&self, epoch: Epoch) -> [u8; 4] {
        if epoch < self.epoch {
            return self.previous_version;
        }
        self.current_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_fork_version() {
        let fork = Fork {
            previous_version: [1, 0, 0, 0],
            current_version: [2, 0, 0, 0],
            epoch: Epoch::new(10),
        };
        assert_eq!(fork.get_fork_version(Epoch::new(9)), [1, 0, 0, 0]);
        assert_eq!(fork.get_fork_version(Epoch::new(10)), [2, 0, 0, 0]);
        assert_eq!(fork.get_fork_version(Epoch::new(11)), [2, 0, 0, 0]);
    }
}
