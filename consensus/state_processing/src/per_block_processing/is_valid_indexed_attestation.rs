use super::VerifySignatures;
use super::errors::{BlockOperationError, IndexedAttestationInvalid as Invalid, verify};
use super::signature_sets::indexed_attestation_signature_set;
use itertools::Itertools;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Verify an `IndexedAttestation`.
pub fn is_valid_indexed_attestation<E: EthSpec>(
    state: &BeaconState<E>,
    indexed_attestation: &IndexedAttestation<E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<()> {
    // Verify that indices aren't empty
    verify!(
        !indexed_attestation.attesting_indices_is_empty(),
        Invalid::IndicesEmpty
    );

    // Check that indices are sorted and unique
    let check_sorted = |list: &mut dyn Iterator<Item = &u64>| -> Result<()> {
        for (i, (x, y)) in list.tuple_windows().enumerate() {
            verify!(x < y, Invalid::BadValidatorIndicesOrdering(i));
        }
        Ok(())
    };
    check_sorted(&mut indexed_attestation.attesting_indices_iter())?;

    // Every index must name a known validator.
    for &index in indexed_attestation.attesting_indices_iter() {
        verify!(
            (index as usize) < state.validators().len(),
            Invalid::UnknownValidator(index)
        );
    }

    if verify_signatures.is_true() {
        let signature = match indexed_attestation {
            IndexedAttestation::Base(att) => &att.signature,
            IndexedAttestation::Electra(att) => &att.signature,
        };
        let signature_set =
            indexed_attestation_signature_set(state, signature, indexed_attestation, spec)
                .map_err(|e| match e {
                    super::signature_sets::Error::ValidatorUnknown(index) => {
                        BlockOperationError::invalid(Invalid::UnknownValidator(index))
                    }
                    super::signature_sets::Error::BeaconStateError(e) => {
                        BlockOperationError::BeaconStateError(e)
                    }
                    super::signature_sets::Error::IncorrectBlockProposer { .. } => {
                        BlockOperationError::invalid(Invalid::BadSignature)
                    }
                })?;
        verify!(signature_set.verify(), Invalid::BadSignature);
    }

    Ok(())
}
