use super::signature_sets::{
    Error as SignatureSetError, SignatureSet, attester_slashing_signature_sets,
    bls_execution_change_signature_set, block_proposal_signature_set, exit_signature_set,
    proposer_slashing_signature_set, randao_signature_set, sync_aggregate_signature_set,
};
use crate::ConsensusContext;
use crate::per_block_processing::errors::BlockProcessingError;
use tracing::debug;
use types::{BeaconState, BeaconStateError, ChainSpec, EthSpec, IndexedAttestation, SignedBeaconBlock};

/// A failed batch verification, localised to the first offending set.
#[derive(Debug, PartialEq, Clone)]
pub struct BatchFailure {
    /// Which signature failed (e.g. "attestation").
    pub context: String,
    /// The index of the offending operation within its list, if applicable.
    pub index: Option<usize>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// All public keys were found but signature verification failed. The block is invalid.
    SignatureInvalid(BatchFailure),
    /// An attempt to read from the `BeaconState` failed: block validity was
    /// not determined.
    BeaconStateError(BeaconStateError),
    SignatureSetError(SignatureSetError),
    BlockProcessingError(Box<BlockProcessingError>),
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Error {
        Error::BeaconStateError(e)
    }
}

impl From<SignatureSetError> for Error {
    fn from(e: SignatureSetError) -> Error {
        Error::SignatureSetError(e)
    }
}

impl From<BlockProcessingError> for Error {
    fn from(e: BlockProcessingError) -> Error {
        Error::BlockProcessingError(Box::new(e))
    }
}

impl From<Error> for BlockProcessingError {
    fn from(e: Error) -> BlockProcessingError {
        match e {
            Error::SignatureInvalid(failure) => BlockProcessingError::SignatureInvalid {
                context: failure.context,
                index: failure.index,
            },
            Error::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
            Error::SignatureSetError(_) => BlockProcessingError::SignatureInvalid {
                context: "signature_set".into(),
                index: None,
            },
            Error::BlockProcessingError(e) => *e,
        }
    }
}

/// Gathers every signature set in a block so they can be verified in one
/// batch. A failing batch is re-checked set by set to find the offender;
/// verification order within the batch is not observable beyond that.
pub struct BlockSignatureVerifier<'a, E: EthSpec> {
    state: &'a BeaconState<E>,
    spec: &'a ChainSpec,
    sets: Vec<(BatchFailure, SignatureSet<'a>)>,
}

impl<'a, E: EthSpec> BlockSignatureVerifier<'a, E> {
    pub fn new(state: &'a BeaconState<E>, spec: &'a ChainSpec) -> Self {
        Self {
            state,
            spec,
            sets: Vec::new(),
        }
    }

    /// Includes all signatures on the block (except the deposit signatures,
    /// which the deposit contract cannot police) for verification.
    pub fn include_all_signatures(
        &mut self,
        block: &'a SignedBeaconBlock<E>,
        ctxt: &mut ConsensusContext<E>,
    ) -> Result<(), Error> {
        let proposer_index = ctxt.get_proposer_index(self.state, self.spec)?;

        self.include_block_proposal(block, proposer_index)?;
        self.include_randao_reveal(block, proposer_index)?;
        self.include_proposer_slashings(block)?;
        self.include_attester_slashings(block)?;
        self.include_attestations(block)?;
        // Deposits are not included because they can legally have invalid signatures.
        self.include_exits(block)?;
        self.include_sync_aggregate(block)?;
        self.include_bls_to_execution_changes(block)?;

        Ok(())
    }

    fn include_block_proposal(
        &mut self,
        block: &'a SignedBeaconBlock<E>,
        proposer_index: u64,
    ) -> Result<(), Error> {
        let set =
            block_proposal_signature_set(self.state, block, Some(proposer_index), self.spec)?;
        self.sets.push((
            BatchFailure {
                context: "block_proposal".into(),
                index: None,
            },
            set,
        ));
        Ok(())
    }

    fn include_randao_reveal(
        &mut self,
        block: &'a SignedBeaconBlock<E>,
        proposer_index: u64,
    ) -> Result<(), Error> {
        let set = randao_signature_set(
            self.state,
            proposer_index,
            block.message.to_ref(),
            self.spec,
        )?;
        self.sets.push((
            BatchFailure {
                context: "randao".into(),
                index: None,
            },
            set,
        ));
        Ok(())
    }

    fn include_proposer_slashings(&mut self, block: &'a SignedBeaconBlock<E>) -> Result<(), Error> {
        for (i, proposer_slashing) in block
            .message
            .body_ref()
            .proposer_slashings()
            .iter()
            .enumerate()
        {
            let (set_1, set_2) =
                proposer_slashing_signature_set(self.state, proposer_slashing, self.spec)?;
            self.sets.push((
                BatchFailure {
                    context: "proposer_slashing".into(),
                    index: Some(i),
                },
                set_1,
            ));
            self.sets.push((
                BatchFailure {
                    context: "proposer_slashing".into(),
                    index: Some(i),
                },
                set_2,
            ));
        }
        Ok(())
    }

    fn include_attester_slashings(&mut self, block: &'a SignedBeaconBlock<E>) -> Result<(), Error> {
        for (i, attester_slashing) in block.message.body_ref().attester_slashings().enumerate() {
            let (set_1, set_2) =
                attester_slashing_signature_sets(self.state, attester_slashing, self.spec)?;
            self.sets.push((
                BatchFailure {
                    context: "attester_slashing".into(),
                    index: Some(i),
                },
                set_1,
            ));
            self.sets.push((
                BatchFailure {
                    context: "attester_slashing".into(),
                    index: Some(i),
                },
                set_2,
            ));
        }
        Ok(())
    }

    fn include_attestations(&mut self, block: &'a SignedBeaconBlock<E>) -> Result<(), Error> {
        for (i, attestation) in block.message.body_ref().attestations().enumerate() {
            let indexed_attestation: IndexedAttestation<E> =
                super::verify_attestation::get_indexed_attestation(self.state, attestation)
                    .map_err(|_| {
                        Error::SignatureInvalid(BatchFailure {
                            context: "attestation".into(),
                            index: Some(i),
                        })
                    })?;
            let signature = attestation.signature();
            let mut pubkeys = Vec::with_capacity(indexed_attestation.attesting_indices_len());
            for &idx in indexed_attestation.attesting_indices_iter() {
                pubkeys.push(
                    self.state
                        .get_validator(idx as usize)
                        .map_err(Error::BeaconStateError)?
                        .pubkey,
                );
            }
            let domain = self.spec.get_domain(
                indexed_attestation.data().target.epoch,
                types::Domain::BeaconAttester,
                self.state.fork(),
                self.state.genesis_validators_root(),
            );
            let message = {
                use types::SignedRoot;
                indexed_attestation.data().signing_root(domain)
            };
            self.sets.push((
                BatchFailure {
                    context: "attestation".into(),
                    index: Some(i),
                },
                SignatureSet::aggregate(pubkeys, message, signature),
            ));
        }
        Ok(())
    }

    fn include_exits(&mut self, block: &'a SignedBeaconBlock<E>) -> Result<(), Error> {
        for (i, exit) in block
            .message
            .body_ref()
            .voluntary_exits()
            .iter()
            .enumerate()
        {
            let set = exit_signature_set(self.state, exit, self.spec)?;
            self.sets.push((
                BatchFailure {
                    context: "voluntary_exit".into(),
                    index: Some(i),
                },
                set,
            ));
        }
        Ok(())
    }

    fn include_sync_aggregate(&mut self, block: &'a SignedBeaconBlock<E>) -> Result<(), Error> {
        if let Ok(sync_aggregate) = block.message.body_ref().sync_aggregate() {
            let previous_slot = self.state.slot().saturating_sub(1u64);
            let block_root = self.state.get_block_root(previous_slot)?;
            let set = sync_aggregate_signature_set(
                self.state,
                sync_aggregate,
                block_root,
                self.spec,
            )?;
            self.sets.push((
                BatchFailure {
                    context: "sync_aggregate".into(),
                    index: None,
                },
                set,
            ));
        }
        Ok(())
    }

    fn include_bls_to_execution_changes(
        &mut self,
        block: &'a SignedBeaconBlock<E>,
    ) -> Result<(), Error> {
        if let Ok(changes) = block.message.body_ref().bls_to_execution_changes() {
            for (i, change) in changes.iter().enumerate() {
                let set = bls_execution_change_signature_set(self.state, change, self.spec)?;
                self.sets.push((
                    BatchFailure {
                        context: "bls_to_execution_change".into(),
                        index: Some(i),
                    },
                    set,
                ));
            }
        }
        Ok(())
    }

    /// Verify every gathered signature set, localising the first offender if
    /// the batch does not hold.
    pub fn verify(self) -> Result<(), BatchFailure> {
        let all_valid = self.sets.iter().all(|(_, set)| set.verify());
        if all_valid {
            return Ok(());
        }

        // The batch failed: re-check per set to find the offender.
        debug!("block signature batch failed; rechecking individual sets");
        for (failure, set) in &self.sets {
            if !set.verify() {
                return Err(failure.clone());
            }
        }

        // Unreachable in practice: the batch failed but every set passed.
        Err(BatchFailure {
            context: "batch".into(),
            index: None,
        })
    }
}

/// Verify the signature sets of a block without mutating any state, using the
/// bulk strategy.
pub fn verify_block_signatures<E: EthSpec>(
    state: &BeaconState<E>,
    block: &SignedBeaconBlock<E>,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let mut verifier = BlockSignatureVerifier::new(state, spec);
    verifier.include_all_signatures(block, ctxt)?;
    verifier.verify().map_err(Error::SignatureInvalid)
}
