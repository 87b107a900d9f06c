use super::VerifySignatures;
use super::errors::{AttestationInvalid as Invalid, BlockOperationError, verify};
use super::is_valid_indexed_attestation::is_valid_indexed_attestation;
use crate::ConsensusContext;
use safe_arith::SafeArith;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Returns the indexed form of `attestation` if it is valid to be included in
/// a block applied to `state`. Otherwise, returns a descriptive `Err`.
///
/// Optionally verifies the aggregate signature, depending on `verify_signatures`.
pub fn verify_attestation_for_block_inclusion<E: EthSpec>(
    state: &BeaconState<E>,
    attestation: AttestationRef<'_, E>,
    ctxt: &mut ConsensusContext<E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<IndexedAttestation<E>> {
    let data = attestation.data();

    verify!(
        data.slot.safe_add(spec.min_attestation_inclusion_delay)? <= state.slot(),
        Invalid::IncludedTooEarly {
            state: state.slot(),
            delay: spec.min_attestation_inclusion_delay,
            attestation: data.slot,
        }
    );
    if !state.fork_name_unchecked().deneb_enabled() {
        // Deneb removed this upper bound; before it, an attestation ages out
        // of inclusion after one epoch's worth of slots.
        verify!(
            state.slot() <= data.slot.safe_add(E::slots_per_epoch())?,
            Invalid::IncludedTooLate {
                state: state.slot(),
                attestation: data.slot,
            }
        );
    }

    verify_attestation_for_state(state, attestation, ctxt, verify_signatures, spec)
}

/// Returns the indexed form of `attestation` if it is valid with respect to
/// the current and previous epochs of the state.
pub fn verify_attestation_for_state<E: EthSpec>(
    state: &BeaconState<E>,
    attestation: AttestationRef<'_, E>,
    _ctxt: &mut ConsensusContext<E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<IndexedAttestation<E>> {
    let data = attestation.data();

    verify!(
        data.target.epoch == state.previous_epoch() || data.target.epoch == state.current_epoch(),
        Invalid::BadTargetEpoch
    );
    verify!(
        data.target.epoch == data.slot.epoch(E::slots_per_epoch()),
        Invalid::TargetEpochSlotMismatch {
            target_epoch: data.target.epoch,
            slot_epoch: data.slot.epoch(E::slots_per_epoch()),
        }
    );

    let indexed_attestation = get_indexed_attestation(state, attestation)?;

    is_valid_indexed_attestation(state, &indexed_attestation, verify_signatures, spec)?;

    Ok(indexed_attestation)
}

/// Convert `attestation` to its indexed form by resolving the committee(s) it
/// names and collecting the attesting validator indices in sorted order.
pub fn get_indexed_attestation<E: EthSpec>(
    state: &BeaconState<E>,
    attestation: AttestationRef<'_, E>,
) -> Result<IndexedAttestation<E>> {
    match attestation {
        AttestationRef::Base(att) => {
            let committee = state
                .get_beacon_committee(att.data.slot, att.data.index)
                .map_err(BlockOperationError::BeaconStateError)?;

            verify!(
                att.aggregation_bits.len() == committee.committee.len(),
                Invalid::BadAggregationBitfieldLength {
                    committee_len: committee.committee.len(),
                    bitfield_len: att.aggregation_bits.len(),
                }
            );

            let mut attesting_indices = Vec::with_capacity(att.aggregation_bits.num_set_bits());
            for (i, &validator_index) in committee.committee.iter().enumerate() {
                if att
                    .aggregation_bits
                    .get(i)
                    .map_err(|e| BlockOperationError::BeaconStateError(e.into()))?
                {
                    attesting_indices.push(validator_index as u64);
                }
            }
            attesting_indices.sort_unstable();

            Ok(IndexedAttestation::Base(IndexedAttestationBase {
                attesting_indices: VariableList::new(attesting_indices)
                    .map_err(|e| BlockOperationError::BeaconStateError(e.into()))?,
                data: att.data,
                signature: att.signature,
            }))
        }
        AttestationRef::Electra(att) => {
            // Electra moves the committee choice into `committee_bits`,
            // leaving `data.index` pinned to zero.
            verify!(att.data.index == 0, Invalid::NonZeroCommitteeIndex);

            let committees_per_slot = state
                .get_committee_count_at_slot(att.data.slot)
                .map_err(BlockOperationError::BeaconStateError)?;

            let mut attesting_indices = Vec::new();
            let mut committee_offset = 0usize;
            for committee_index in att.get_committee_indices() {
                verify!(
                    committee_index < committees_per_slot,
                    Invalid::BadCommitteeIndex
                );
                let committee = state
                    .get_beacon_committee(att.data.slot, committee_index)
                    .map_err(BlockOperationError::BeaconStateError)?;

                for (i, &validator_index) in committee.committee.iter().enumerate() {
                    let bit_index = committee_offset.safe_add(i)?;
                    if att
                        .aggregation_bits
                        .get(bit_index)
                        .map_err(|e| BlockOperationError::BeaconStateError(e.into()))?
                    {
                        attesting_indices.push(validator_index as u64);
                    }
                }
                committee_offset.safe_add_assign(committee.committee.len())?;
            }

            verify!(
                att.aggregation_bits.len() == committee_offset,
                Invalid::BadAggregationBitfieldLength {
                    committee_len: committee_offset,
                    bitfield_len: att.aggregation_bits.len(),
                }
            );

            attesting_indices.sort_unstable();

            Ok(IndexedAttestation::Electra(IndexedAttestationElectra {
                attesting_indices: VariableList::new(attesting_indices)
                    .map_err(|e| BlockOperationError::BeaconStateError(e.into()))?,
                data: att.data,
                signature: att.signature,
            }))
        }
    }
}
