use crate::*;
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// The body of a `BeaconChain` block, containing operations.
#[superstruct(
    variants(Base, Altair, Bellatrix, Capella, Deneb, Electra, Fulu),
    variant_attributes(
        derive(
            Debug,
            Clone,
            Default,
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
    cast_error(ty = "Error", expr = "BeaconStateError::IncorrectStateVariant"),
    partial_getter_error(ty = "Error", expr = "BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconBlockBody<E: EthSpec> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: Graffiti,
    pub proposer_slashings: VariableList<ProposerSlashing, E::MaxProposerSlashings>,
    #[superstruct(
        only(Base, Altair, Bellatrix, Capella, Deneb),
        partial_getter(rename = "attester_slashings_base")
    )]
    pub attester_slashings: VariableList<AttesterSlashingBase<E>, E::MaxAttesterSlashings>,
    #[superstruct(
        only(Electra, Fulu),
        partial_getter(rename = "attester_slashings_electra")
    )]
    pub attester_slashings: VariableList<AttesterSlashingElectra<E>, E::MaxAttesterSlashingsElectra>,
    #[superstruct(
        only(Base, Altair, Bellatrix, Capella, Deneb),
        partial_getter(rename = "attestations_base")
    )]
    pub attestations: VariableList<AttestationBase<E>, E::MaxAttestations>,
    #[superstruct(only(Electra, Fulu), partial_getter(rename = "attestations_electra"))]
    pub attestations: VariableList<AttestationElectra<E>, E::MaxAttestationsElectra>,
    pub deposits: VariableList<Deposit, E::MaxDeposits>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, E::MaxVoluntaryExits>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu))]
    pub sync_aggregate: SyncAggregate<E>,
    #[superstruct(only(Bellatrix), partial_getter(rename = "execution_payload_bellatrix"))]
    pub execution_payload: ExecutionPayloadBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "execution_payload_capella"))]
    pub execution_payload: ExecutionPayloadCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "execution_payload_deneb"))]
    pub execution_payload: ExecutionPayloadDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "execution_payload_electra"))]
    pub execution_payload: ExecutionPayloadElectra<E>,
    #[superstruct(only(Fulu), partial_getter(rename = "execution_payload_fulu"))]
    pub execution_payload: ExecutionPayloadFulu<E>,
    #[superstruct(only(Capella, Deneb, Electra, Fulu))]
    pub bls_to_execution_changes:
        VariableList<SignedBlsToExecutionChange, E::MaxBlsToExecutionChanges>,
    #[superstruct(only(Deneb, Electra, Fulu))]
    pub blob_kzg_commitments: KzgCommitments<E>,
    #[superstruct(only(Electra, Fulu))]
    pub execution_requests: ExecutionRequests<E>,
}

pub type KzgCommitments<E> =
    VariableList<KzgCommitment, <E as EthSpec>::MaxBlobCommitmentsPerBlock>;

impl<'a, E: EthSpec> BeaconBlockBodyRef<'a, E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            BeaconBlockBodyRef::Base(_) => ForkName::Base,
            BeaconBlockBodyRef::Altair(_) => ForkName::Altair,
            BeaconBlockBodyRef::Bellatrix(_) => ForkName::Bellatrix,
            BeaconBlockBodyRef::Capella(_) => ForkName::Capella,
            BeaconBlockBodyRef::Deneb(_) => ForkName::Deneb,
            BeaconBlockBodyRef::Electra(_) => ForkName::Electra,
            BeaconBlockBodyRef::Fulu(_) => ForkName::Fulu,
        }
    }

    /// Iterate over the attestations in the block, independent of fork.
    pub fn attestations(&self) -> Box<dyn Iterator<Item = AttestationRef<'a, E>> + 'a> {
        match self {
            BeaconBlockBodyRef::Base(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Altair(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Bellatrix(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Capella(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Deneb(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Base))
            }
            BeaconBlockBodyRef::Electra(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Electra))
            }
            BeaconBlockBodyRef::Fulu(body) => {
                Box::new(body.attestations.iter().map(AttestationRef::Electra))
            }
        }
    }

    pub fn attestations_len(&self) -> usize {
        match self {
            BeaconBlockBodyRef::Base(body) => body.attestations.len(),
            BeaconBlockBodyRef::Altair(body) => body.attestations.len(),
            BeaconBlockBodyRef::Bellatrix(body) => body.attestations.len(),
            BeaconBlockBodyRef::Capella(body) => body.attestations.len(),
            BeaconBlockBodyRef::Deneb(body) => body.attestations.len(),
            BeaconBlockBodyRef::Electra(body) => body.attestations.len(),
            BeaconBlockBodyRef::Fulu(body) => body.attestations.len(),
        }
    }

    /// Iterate over the attester slashings in the block, independent of fork.
    pub fn attester_slashings(
        &self,
    ) -> Box<dyn Iterator<Item = AttesterSlashingRef<'a, E>> + 'a> {
        match self {
            BeaconBlockBodyRef::Base(body) => {
                Box::new(body.attester_slashings.iter().map(AttesterSlashingRef::Base))
            }
            BeaconBlockBodyRef::Altair(body) => {
                Box::new(body.attester_slashings.iter().map(AttesterSlashingRef::Base))
            }
            BeaconBlockBodyRef::Bellatrix(body) => {
                Box::new(body.attester_slashings.iter().map(AttesterSlashingRef::Base))
            }
            BeaconBlockBodyRef::Capella(body) => {
                Box::new(body.attester_slashings.iter().map(AttesterSlashingRef::Base))
            }
            BeaconBlockBodyRef::Deneb(body) => {
                Box::new(body.attester_slashings.iter().map(AttesterSlashingRef::Base))
            }
            BeaconBlockBodyRef::Electra(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Electra),
            ),
            BeaconBlockBodyRef::Fulu(body) => Box::new(
                body.attester_slashings
                    .iter()
                    .map(AttesterSlashingRef::Electra),
            ),
        }
    }

    /// The execution payload, if the fork has one.
    pub fn execution_payload(&self) -> Result<ExecutionPayloadRef<'a, E>, Error> {
        match self {
            BeaconBlockBodyRef::Base(_) | BeaconBlockBodyRef::Altair(_) => {
                Err(BeaconStateError::IncorrectStateVariant)
            }
            BeaconBlockBodyRef::Bellatrix(body) => {
                Ok(ExecutionPayloadRef::Bellatrix(&body.execution_payload))
            }
            BeaconBlockBodyRef::Capella(body) => {
                Ok(ExecutionPayloadRef::Capella(&body.execution_payload))
            }
            BeaconBlockBodyRef::Deneb(body) => {
                Ok(ExecutionPayloadRef::Deneb(&body.execution_payload))
            }
            BeaconBlockBodyRef::Electra(body) => {
                Ok(ExecutionPayloadRef::Electra(&body.execution_payload))
            }
            BeaconBlockBodyRef::Fulu(body) => {
                Ok(ExecutionPayloadRef::Fulu(&body.execution_payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn default_bodies_have_no_operations() {
        let body = BeaconBlockBody::<E>::Base(BeaconBlockBodyBase::default());
        let body_ref = body.to_ref();
        assert_eq!(body_ref.attestations_len(), 0);
        assert_eq!(body_ref.attestations().count(), 0);
        assert_eq!(body_ref.attester_slashings().count(), 0);
        assert!(body_ref.execution_payload().is_err());
        assert!(body_ref.sync_aggregate().is_err());
    }

    #[test]
    fn electra_body_exposes_requests_and_payload() {
        let body = BeaconBlockBody::<E>::Electra(BeaconBlockBodyElectra::default());
        let body_ref = body.to_ref();
        assert!(body_ref.execution_payload().is_ok());
        assert!(body_ref.execution_requests().is_ok());
        assert!(body_ref.blob_kzg_commitments().is_ok());
        assert!(body_ref.sync_aggregate().is_ok());
    }
}
