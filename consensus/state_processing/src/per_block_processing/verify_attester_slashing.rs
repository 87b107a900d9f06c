use super::VerifySignatures;
use super::errors::{AttesterSlashingInvalid as Invalid, BlockOperationError, verify};
use super::is_valid_indexed_attestation::is_valid_indexed_attestation;
use std::collections::BTreeSet;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Indicates if an `AttesterSlashing` is valid to be included in a block in the current epoch of
/// the given state.
///
/// Returns the sorted indices of the validators which are slashable as a
/// result of this slashing.
pub fn verify_attester_slashing<E: EthSpec>(
    state: &BeaconState<E>,
    attester_slashing: AttesterSlashingRef<'_, E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<Vec<u64>> {
    let attestation_1 = attester_slashing.attestation_1();
    let attestation_2 = attester_slashing.attestation_2();

    // Spec: is_slashable_attestation_data
    verify!(
        attestation_1.is_double_vote(&attestation_2)
            || attestation_1.is_surround_vote(&attestation_2),
        Invalid::NotSlashable
    );

    is_valid_indexed_attestation(state, &attestation_1, verify_signatures, spec)
        .map_err(|e| map_indexed_error(e, true))?;
    is_valid_indexed_attestation(state, &attestation_2, verify_signatures, spec)
        .map_err(|e| map_indexed_error(e, false))?;

    let attesting_indices_1: BTreeSet<u64> =
        attestation_1.attesting_indices_iter().copied().collect();
    let attesting_indices_2: BTreeSet<u64> =
        attestation_2.attesting_indices_iter().copied().collect();

    let current_epoch = state.current_epoch();
    let mut slashable_indices = Vec::new();
    for &index in attesting_indices_1.intersection(&attesting_indices_2) {
        let validator = state
            .get_validator(index as usize)
            .map_err(|_| BlockOperationError::invalid(Invalid::UnknownValidator(index)))?;
        if validator.is_slashable_at(current_epoch)
            && !state.slashings_cache().is_slashed(index as usize)
        {
            slashable_indices.push(index);
        }
    }

    verify!(!slashable_indices.is_empty(), Invalid::NoSlashableIndices);

    Ok(slashable_indices)
}

fn map_indexed_error(
    e: BlockOperationError<super::errors::IndexedAttestationInvalid>,
    is_first: bool,
) -> BlockOperationError<Invalid> {
    match e {
        BlockOperationError::Invalid(reason) => {
            let wrapped = BlockOperationError::Invalid(reason);
            if is_first {
                BlockOperationError::invalid(Invalid::IndexedAttestation1Invalid(wrapped))
            } else {
                BlockOperationError::invalid(Invalid::IndexedAttestation2Invalid(wrapped))
            }
        }
        BlockOperationError::BeaconStateError(e) => BlockOperationError::BeaconStateError(e),
        BlockOperationError::ArithError(e) => BlockOperationError::ArithError(e),
    }
}
