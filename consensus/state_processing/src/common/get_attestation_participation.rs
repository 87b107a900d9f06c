use integer_sqrt::IntegerSquareRoot;
use smallvec::SmallVec;
use types::consts::altair::{
    NUM_FLAG_INDICES, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX,
};
use types::{AttestationData, BeaconState, BeaconStateError as Error, ChainSpec, EthSpec};

/// Which participation flags an attestation earns when included with the
/// given `inclusion_delay`.
///
/// Each flag pairs a vote check with a timeliness bound:
///
/// - source: the attestation's source checkpoint equals the justified
///   checkpoint in force for its target epoch, included within
///   `isqrt(SLOTS_PER_EPOCH)` slots;
/// - target: additionally, the target root names the first block of the
///   target epoch, included within an epoch (Deneb lifted this bound);
/// - head: additionally, the head vote names the block at the attestation's
///   own slot, included in the very next slot.
///
/// A wrong source vote is an error rather than an empty flag set: such an
/// attestation is invalid and the caller must not have let it get this far.
pub fn get_attestation_participation_flag_indices<E: EthSpec>(
    state: &BeaconState<E>,
    data: &AttestationData,
    inclusion_delay: u64,
    spec: &ChainSpec,
) -> Result<SmallVec<[usize; NUM_FLAG_INDICES]>, Error> {
    let justified_checkpoint = if data.target.epoch == state.current_epoch() {
        state.current_justified_checkpoint()
    } else {
        state.previous_justified_checkpoint()
    };
    if data.source != justified_checkpoint {
        return Err(Error::IncorrectAttestationSource);
    }

    let matches_target =
        data.target.root == state.get_block_root_at_epoch(data.target.epoch)?;
    let matches_head =
        matches_target && data.beacon_block_root == state.get_block_root(data.slot)?;

    let source_is_timely = inclusion_delay <= E::slots_per_epoch().integer_sqrt();
    let target_is_timely = state.fork_name_unchecked().deneb_enabled()
        || inclusion_delay <= E::slots_per_epoch();
    let head_is_timely = inclusion_delay == spec.min_attestation_inclusion_delay;

    let mut flag_indices = SmallVec::new();
    if source_is_timely {
        flag_indices.push(TIMELY_SOURCE_FLAG_INDEX);
    }
    if matches_target && target_is_timely {
        flag_indices.push(TIMELY_TARGET_FLAG_INDEX);
    }
    if matches_head && head_is_timely {
        flag_indices.push(TIMELY_HEAD_FLAG_INDEX);
    }
    Ok(flag_indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::state_at_fork;
    use types::{Checkpoint, Epoch, EthSpec, ForkName, Hash256, Slot};

    type E = crate::test_utils::E;

    fn matching_data(state: &types::BeaconState<E>, slot: Slot) -> AttestationData {
        let epoch = slot.epoch(E::slots_per_epoch());
        AttestationData {
            slot,
            index: 0,
            beacon_block_root: state.get_block_root(slot).unwrap(),
            source: state.current_justified_checkpoint(),
            target: Checkpoint {
                epoch,
                root: state.get_block_root_at_epoch(epoch).unwrap(),
            },
        }
    }

    #[test]
    fn next_slot_inclusion_earns_every_flag() {
        let (state, spec) = state_at_fork(ForkName::Altair, 32, 4);
        let data = matching_data(&state, Slot::new(3));
        let flags =
            get_attestation_participation_flag_indices(&state, &data, 1, &spec).unwrap();
        assert_eq!(
            flags.as_slice(),
            &[
                TIMELY_SOURCE_FLAG_INDEX,
                TIMELY_TARGET_FLAG_INDEX,
                TIMELY_HEAD_FLAG_INDEX
            ]
        );
    }

    #[test]
    fn late_inclusion_drops_head_then_source() {
        // Minimal preset: isqrt(8) == 2 bounds the source flag.
        let (mut state, spec) = state_at_fork(ForkName::Altair, 32, 4);
        *state.slot_mut() = Slot::new(6);
        let data = matching_data(&state, Slot::new(3));

        let flags =
            get_attestation_participation_flag_indices(&state, &data, 2, &spec).unwrap();
        assert_eq!(
            flags.as_slice(),
            &[TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX],
            "delay 2 keeps source and target but not head"
        );

        let flags =
            get_attestation_participation_flag_indices(&state, &data, 3, &spec).unwrap();
        assert_eq!(
            flags.as_slice(),
            &[TIMELY_TARGET_FLAG_INDEX],
            "delay 3 exceeds the source bound"
        );
    }

    #[test]
    fn a_wrong_head_vote_loses_only_the_head_flag() {
        let (state, spec) = state_at_fork(ForkName::Altair, 32, 4);
        let mut data = matching_data(&state, Slot::new(3));
        data.beacon_block_root = Hash256::repeat_byte(0x55);
        let flags =
            get_attestation_participation_flag_indices(&state, &data, 1, &spec).unwrap();
        assert_eq!(
            flags.as_slice(),
            &[TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX]
        );
    }

    #[test]
    fn a_wrong_source_vote_is_an_error() {
        let (state, spec) = state_at_fork(ForkName::Altair, 32, 4);
        let mut data = matching_data(&state, Slot::new(3));
        data.source = Checkpoint {
            epoch: Epoch::new(0),
            root: Hash256::repeat_byte(0x99),
        };
        assert_eq!(
            get_attestation_participation_flag_indices(&state, &data, 1, &spec),
            Err(Error::IncorrectAttestationSource)
        );
    }

    #[test]
    fn deneb_lifts_the_target_timeliness_bound() {
        // An attestation included a full epoch late: pre-Deneb it keeps no
        // target flag, post-Deneb it does.
        let delay = E::slots_per_epoch() + 1;

        let (mut altair_state, altair_spec) = state_at_fork(ForkName::Altair, 32, 4);
        *altair_state.slot_mut() = Slot::new(3) + delay;
        let data = matching_data(&altair_state, Slot::new(3));
        let flags =
            get_attestation_participation_flag_indices(&altair_state, &data, delay, &altair_spec)
                .unwrap();
        assert!(!flags.contains(&TIMELY_TARGET_FLAG_INDEX));

        let (mut deneb_state, deneb_spec) = state_at_fork(ForkName::Deneb, 32, 4);
        *deneb_state.slot_mut() = Slot::new(3) + delay;
        let data = matching_data(&deneb_state, Slot::new(3));
        let flags =
            get_attestation_participation_flag_indices(&deneb_state, &data, delay, &deneb_spec)
                .unwrap();
        assert!(flags.contains(&TIMELY_TARGET_FLAG_INDEX));
    }
}
