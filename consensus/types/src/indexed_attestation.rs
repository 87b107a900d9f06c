use crate::{AttestationData, EthSpec};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::VariableList;
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

/// Details an attestation that can be slashable.
///
/// To be included in an `AttesterSlashing`.
#[superstruct(
    variants(Base, Electra),
    variant_attributes(
        derive(
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
            PartialEq,
            Eq,
            Hash,
        ),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug)),
    cast_error(ty = "ssz_types::Error", expr = "ssz_types::Error::OutOfBounds { i: 0, len: 0 }"),
    partial_getter_error(
        ty = "ssz_types::Error",
        expr = "ssz_types::Error::OutOfBounds { i: 0, len: 0 }"
    )
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq, Eq, Hash)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct IndexedAttestation<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "attesting_indices_base"))]
    #[serde(with = "quoted_variable_list_u64")]
    pub attesting_indices: VariableList<u64, E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "attesting_indices_electra"))]
    #[serde(with = "quoted_variable_list_u64")]
    pub attesting_indices: VariableList<u64, E::MaxValidatorsPerSlot>,
    pub data: AttestationData,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> IndexedAttestation<E> {
    /// Check if ``attestation_data_1`` and ``attestation_data_2`` have the same target.
    pub fn is_double_vote(&self, other: &Self) -> bool {
        self.data().target.epoch == other.data().target.epoch && self.data() != other.data()
    }

    /// Check if ``attestation_data_1`` surrounds ``attestation_data_2``.
    pub fn is_surround_vote(&self, other: &Self) -> bool {
        self.data().source.epoch < other.data().source.epoch
            && other.data().target.epoch < self.data().target.epoch
    }

    pub fn attesting_indices_iter(&self) -> std::slice::Iter<'_, u64> {
        match self {
            IndexedAttestation::Base(att) => att.attesting_indices.iter(),
            IndexedAttestation::Electra(att) => att.attesting_indices.iter(),
        }
    }

    pub fn attesting_indices_len(&self) -> usize {
        match self {
            IndexedAttestation::Base(att) => att.attesting_indices.len(),
            IndexedAttestation::Electra(att) => att.attesting_indices.len(),
        }
    }

    pub fn attesting_indices_is_empty(&self) -> bool {
        self.attesting_indices_len() == 0
    }
}

/// Serialize a variable list of `u64` such that each int is a quoted decimal string.
mod quoted_variable_list_u64 {
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};
    use serde_utils::quoted_u64_vec::{QuotedIntVecVisitor, QuotedIntWrapper};
    use ssz_types::VariableList;
    use ssz_types::typenum::Unsigned;

    pub fn serialize<S, T>(value: &VariableList<u64, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Unsigned,
    {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for &int in value.iter() {
            seq.serialize_element(&QuotedIntWrapper { int })?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<VariableList<u64, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Unsigned,
    {
        deserializer
            .deserialize_any(QuotedIntVecVisitor)
            .and_then(|vec| {
                VariableList::new(vec)
                    .map_err(|e| serde::de::Error::custom(format!("invalid length: {:?}", e)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Checkpoint, Epoch, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn indexed_attestation(source_epoch: u64, target_epoch: u64) -> IndexedAttestation<E> {
        IndexedAttestation::Base(IndexedAttestationBase {
            attesting_indices: VariableList::new(vec![0, 1, 2]).unwrap(),
            data: AttestationData {
                source: Checkpoint {
                    epoch: Epoch::new(source_epoch),
                    ..Checkpoint::default()
                },
                target: Checkpoint {
                    epoch: Epoch::new(target_epoch),
                    ..Checkpoint::default()
                },
                ..AttestationData::default()
            },
            signature: SignatureBytes::empty(),
        })
    }

    #[test]
    fn is_double_vote_true() {
        let mut other = indexed_attestation(0, 1);
        if let IndexedAttestation::Base(att) = &mut other {
            att.data.beacon_block_root = crate::Hash256::repeat_byte(1);
        }
        assert!(indexed_attestation(0, 1).is_double_vote(&other));
    }

    #[test]
    fn is_double_vote_false_for_identical_data() {
        let att = indexed_attestation(0, 1);
        assert!(!att.is_double_vote(&indexed_attestation(0, 1)));
    }

    #[test]
    fn is_surround_vote_true() {
        let surrounding = indexed_attestation(0, 3);
        let surrounded = indexed_attestation(1, 2);
        assert!(surrounding.is_surround_vote(&surrounded));
        assert!(!surrounded.is_surround_vote(&surrounding));
    }
}
