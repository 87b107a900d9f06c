use crate::{AttestationData, EthSpec, ForkName, SignedRoot};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, BitVector};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    /// An Electra attestation must set exactly one committee bit.
    InvalidCommitteeLength,
    InvalidCommitteeIndex,
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::SszTypesError(e)
    }
}

/// Details an attestation that can be slashable.
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
        ),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug)),
    cast_error(ty = "Error", expr = "Error::InvalidCommitteeIndex"),
    partial_getter_error(ty = "Error", expr = "Error::InvalidCommitteeIndex")
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct Attestation<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "aggregation_bits_base"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerCommittee>,
    #[superstruct(only(Electra), partial_getter(rename = "aggregation_bits_electra"))]
    pub aggregation_bits: BitList<E::MaxValidatorsPerSlot>,
    pub data: AttestationData,
    pub signature: SignatureBytes,
    #[superstruct(only(Electra))]
    pub committee_bits: BitVector<E::MaxCommitteesPerSlot>,
}

impl<E: EthSpec> Attestation<E> {
    /// The fork this attestation variant belongs to.
    pub fn fork_name(&self, deneb_like: ForkName) -> ForkName {
        match self {
            Attestation::Base(_) => deneb_like,
            Attestation::Electra(_) => ForkName::Electra,
        }
    }

    pub fn num_set_aggregation_bits(&self) -> usize {
        match self {
            Attestation::Base(att) => att.aggregation_bits.num_set_bits(),
            Attestation::Electra(att) => att.aggregation_bits.num_set_bits(),
        }
    }

    pub fn get_aggregation_bit(&self, index: usize) -> Result<bool, ssz::BitfieldError> {
        match self {
            Attestation::Base(att) => att.aggregation_bits.get(index),
            Attestation::Electra(att) => att.aggregation_bits.get(index),
        }
    }

    /// The committee this attestation is for. Electra attestations set the
    /// committee in `committee_bits` and must set exactly one bit.
    pub fn committee_index(&self) -> Result<u64, Error> {
        match self {
            Attestation::Base(att) => Ok(att.data.index),
            Attestation::Electra(att) => {
                let mut committee_indices = att.get_committee_indices();
                let index = committee_indices.pop().ok_or(Error::InvalidCommitteeLength)?;
                if !committee_indices.is_empty() {
                    return Err(Error::InvalidCommitteeLength);
                }
                Ok(index)
            }
        }
    }
}

impl<E: EthSpec> AttestationElectra<E> {
    pub fn get_committee_indices(&self) -> Vec<u64> {
        self.committee_bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| if bit { Some(index as u64) } else { None })
            .collect()
    }
}

impl<'a, E: EthSpec> AttestationRef<'a, E> {
    pub fn clone_as_attestation(self) -> Attestation<E> {
        match self {
            AttestationRef::Base(att) => Attestation::Base(att.clone()),
            AttestationRef::Electra(att) => Attestation::Electra(att.clone()),
        }
    }

    pub fn num_set_aggregation_bits(&self) -> usize {
        match self {
            AttestationRef::Base(att) => att.aggregation_bits.num_set_bits(),
            AttestationRef::Electra(att) => att.aggregation_bits.num_set_bits(),
        }
    }
}

impl<E: EthSpec> SignedRoot for Attestation<E> {}
impl<E: EthSpec> SignedRoot for AttestationBase<E> {}
impl<E: EthSpec> SignedRoot for AttestationElectra<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;
    use ssz::Encode;

    type E = MainnetEthSpec;

    fn base_attestation() -> AttestationBase<E> {
        AttestationBase {
            aggregation_bits: BitList::with_capacity(4).unwrap(),
            data: AttestationData::default(),
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn committee_index_base_comes_from_data() {
        let mut att = base_attestation();
        att.data.index = 3;
        assert_eq!(Attestation::Base(att).committee_index(), Ok(3));
    }

    #[test]
    fn committee_index_electra_requires_exactly_one_bit() {
        let mut att = AttestationElectra::<E> {
            aggregation_bits: BitList::with_capacity(8).unwrap(),
            data: AttestationData::default(),
            signature: SignatureBytes::empty(),
            committee_bits: BitVector::new(),
        };
        assert_eq!(
            Attestation::Electra(att.clone()).committee_index(),
            Err(Error::InvalidCommitteeLength)
        );

        att.committee_bits.set(5, true).unwrap();
        assert_eq!(Attestation::Electra(att.clone()).committee_index(), Ok(5));

        att.committee_bits.set(6, true).unwrap();
        assert_eq!(
            Attestation::Electra(att).committee_index(),
            Err(Error::InvalidCommitteeLength)
        );
    }

    #[test]
    fn ssz_encoding_is_transparent() {
        let att = base_attestation();
        assert_eq!(
            Attestation::Base(att.clone()).as_ssz_bytes(),
            att.as_ssz_bytes()
        );
    }
}
