use super::VerifySignatures;
use super::errors::{BlockOperationError, ProposerSlashingInvalid as Invalid, verify};
use super::signature_sets::proposer_slashing_signature_set;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Indicates if a `ProposerSlashing` is valid to be included in a block in the current epoch of
/// the given state.
pub fn verify_proposer_slashing<E: EthSpec>(
    proposer_slashing: &ProposerSlashing,
    state: &BeaconState<E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<()> {
    let header_1 = &proposer_slashing.signed_header_1.message;
    let header_2 = &proposer_slashing.signed_header_2.message;

    // Verify header slots match
    verify!(
        header_1.slot == header_2.slot,
        Invalid::ProposalSlotMismatch(header_1.slot, header_2.slot)
    );

    // Verify header proposer indices match
    verify!(
        header_1.proposer_index == header_2.proposer_index,
        Invalid::ProposerIndexMismatch(header_1.proposer_index, header_2.proposer_index)
    );

    // But the headers are different
    verify!(header_1 != header_2, Invalid::ProposalsIdentical);

    // Check proposer is slashable
    let proposer = state
        .get_validator(header_1.proposer_index as usize)
        .map_err(|_| {
            BlockOperationError::invalid(Invalid::ProposerUnknown(header_1.proposer_index))
        })?;

    verify!(
        proposer.is_slashable_at(state.current_epoch())
            && !state
                .slashings_cache()
                .is_slashed(header_1.proposer_index as usize),
        Invalid::ProposerNotSlashable(header_1.proposer_index)
    );

    if verify_signatures.is_true() {
        let (set_1, set_2) = proposer_slashing_signature_set(state, proposer_slashing, spec)
            .map_err(|e| match e {
                super::signature_sets::Error::ValidatorUnknown(index) => {
                    BlockOperationError::invalid(Invalid::ProposerUnknown(index))
                }
                super::signature_sets::Error::BeaconStateError(e) => {
                    BlockOperationError::BeaconStateError(e)
                }
                super::signature_sets::Error::IncorrectBlockProposer { .. } => {
                    BlockOperationError::invalid(Invalid::BadProposal1Signature)
                }
            })?;
        verify!(set_1.verify(), Invalid::BadProposal1Signature);
        verify!(set_2.verify(), Invalid::BadProposal2Signature);
    }

    Ok(())
}
