use super::errors::{BlockOperationError, BlsExecutionChangeInvalid as Invalid, verify};
use super::signature_sets::bls_execution_change_signature_set;
use crate::VerifySignatures;
use ethereum_hashing::hash;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

fn error(reason: Invalid) -> BlockOperationError<Invalid> {
    BlockOperationError::invalid(reason)
}

/// Indicates if a `BlsToExecutionChange` is valid to be included in a block,
/// where the block is being applied to `state`.
pub fn verify_bls_to_execution_change<E: EthSpec>(
    state: &BeaconState<E>,
    signed_address_change: &SignedBlsToExecutionChange,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<()> {
    let address_change = &signed_address_change.message;

    let validator = state
        .validators()
        .get(address_change.validator_index as usize)
        .ok_or_else(|| error(Invalid::ValidatorUnknown(address_change.validator_index)))?;

    verify!(
        validator
            .withdrawal_credentials
            .as_slice()
            .first()
            .map(|byte| *byte == spec.bls_withdrawal_prefix_byte)
            .unwrap_or(false),
        Invalid::NonBlsWithdrawalCredentials
    );

    // The withdrawal credentials must commit to the hash of the BLS
    // withdrawal pubkey named in the change.
    let pubkey_hash = hash(address_change.from_bls_pubkey.as_serialized());
    verify!(
        validator
            .withdrawal_credentials
            .as_slice()
            .get(1..)
            .map(|credentials| credentials == &pubkey_hash[1..])
            .unwrap_or(false),
        Invalid::WithdrawalCredentialsMismatch
    );

    if verify_signatures.is_true() {
        verify!(
            bls_execution_change_signature_set(state, signed_address_change, spec)
                .map_err(|e| match e {
                    super::signature_sets::Error::ValidatorUnknown(index) =>
                        error(Invalid::ValidatorUnknown(index)),
                    super::signature_sets::Error::BeaconStateError(e) =>
                        BlockOperationError::BeaconStateError(e),
                    super::signature_sets::Error::IncorrectBlockProposer { .. } =>
                        error(Invalid::BadSignature),
                })?
                .verify(),
            Invalid::BadSignature
        );
    }

    Ok(())
}
