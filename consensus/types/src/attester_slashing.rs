use crate::{
    BeaconStateError, EthSpec, IndexedAttestation, IndexedAttestationBase,
    IndexedAttestationElectra,
};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

/// Two conflicting attestations.
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
    cast_error(
        ty = "BeaconStateError",
        expr = "BeaconStateError::IncorrectStateVariant"
    ),
    partial_getter_error(
        ty = "BeaconStateError",
        expr = "BeaconStateError::IncorrectStateVariant"
    )
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq, Eq, Hash)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct AttesterSlashing<E: EthSpec> {
    #[superstruct(only(Base), partial_getter(rename = "attestation_1_base"))]
    pub attestation_1: IndexedAttestationBase<E>,
    #[superstruct(only(Electra), partial_getter(rename = "attestation_1_electra"))]
    pub attestation_1: IndexedAttestationElectra<E>,
    #[superstruct(only(Base), partial_getter(rename = "attestation_2_base"))]
    pub attestation_2: IndexedAttestationBase<E>,
    #[superstruct(only(Electra), partial_getter(rename = "attestation_2_electra"))]
    pub attestation_2: IndexedAttestationElectra<E>,
}

impl<'a, E: EthSpec> AttesterSlashingRef<'a, E> {
    pub fn attestation_1(&self) -> IndexedAttestation<E> {
        match self {
            AttesterSlashingRef::Base(slashing) => {
                IndexedAttestation::Base(slashing.attestation_1.clone())
            }
            AttesterSlashingRef::Electra(slashing) => {
                IndexedAttestation::Electra(slashing.attestation_1.clone())
            }
        }
    }

    pub fn attestation_2(&self) -> IndexedAttestation<E> {
        match self {
            AttesterSlashingRef::Base(slashing) => {
                IndexedAttestation::Base(slashing.attestation_2.clone())
            }
            AttesterSlashingRef::Electra(slashing) => {
                IndexedAttestation::Electra(slashing.attestation_2.clone())
            }
        }
    }

    pub fn clone_as_attester_slashing(self) -> AttesterSlashing<E> {
        match self {
            AttesterSlashingRef::Base(slashing) => AttesterSlashing::Base(slashing.clone()),
            AttesterSlashingRef::Electra(slashing) => AttesterSlashing::Electra(slashing.clone()),
        }
    }
}
