use super::errors::{BlockOperationError, ExitInvalid, verify};
use crate::VerifySignatures;
use crate::per_block_processing::signature_sets::{self, exit_signature_set};
use types::{BeaconState, ChainSpec, Epoch, EthSpec, SignedVoluntaryExit};

type Result<T> = std::result::Result<T, BlockOperationError<ExitInvalid>>;

/// Checks that `signed_exit` may be applied to `state`, without applying it.
///
/// The exiting validator must be active, not already on its way out, past
/// both the exit's own activation epoch and the minimum service period, and
/// (from Electra) free of queued partial withdrawals. Only then is the
/// signature considered.
pub fn verify_exit<E: EthSpec>(
    state: &BeaconState<E>,
    current_epoch: Option<Epoch>,
    signed_exit: &SignedVoluntaryExit,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<()> {
    let exit = &signed_exit.message;
    let current_epoch = current_epoch.unwrap_or_else(|| state.current_epoch());

    let validator = state
        .validators()
        .get(exit.validator_index as usize)
        .ok_or_else(|| {
            BlockOperationError::invalid(ExitInvalid::ValidatorUnknown(exit.validator_index))
        })?;

    verify!(
        validator.is_active_at(current_epoch),
        ExitInvalid::NotActive(exit.validator_index)
    );
    verify!(
        validator.exit_epoch == spec.far_future_epoch,
        ExitInvalid::AlreadyExited(exit.validator_index)
    );

    // An exit names the epoch from which it becomes valid.
    verify!(
        current_epoch >= exit.epoch,
        ExitInvalid::FutureEpoch {
            state: current_epoch,
            exit: exit.epoch,
        }
    );

    // The validator must serve out the full committee look-back period first.
    let eligible_epoch = validator
        .activation_epoch
        .safe_add(spec.shard_committee_period)?;
    verify!(
        current_epoch >= eligible_epoch,
        ExitInvalid::TooYoungToExit {
            current_epoch,
            earliest_exit_epoch: eligible_epoch,
        }
    );

    // Electra: a queued partial withdrawal pins the validator in place until
    // it drains.
    if state.fork_name_unchecked().electra_enabled() {
        let queued_balance = state
            .get_pending_balance_to_withdraw(exit.validator_index as usize)
            .map_err(BlockOperationError::BeaconStateError)?;
        verify!(
            queued_balance == 0,
            ExitInvalid::PendingWithdrawalInQueue(exit.validator_index)
        );
    }

    if verify_signatures.is_true() {
        let signature_set =
            exit_signature_set(state, signed_exit, spec).map_err(|e| match e {
                signature_sets::Error::ValidatorUnknown(index) => {
                    BlockOperationError::invalid(ExitInvalid::ValidatorUnknown(index))
                }
                signature_sets::Error::BeaconStateError(e) => {
                    BlockOperationError::BeaconStateError(e)
                }
                signature_sets::Error::IncorrectBlockProposer { .. } => {
                    BlockOperationError::invalid(ExitInvalid::BadSignature)
                }
            })?;
        verify!(signature_set.verify(), ExitInvalid::BadSignature);
    }

    Ok(())
}
