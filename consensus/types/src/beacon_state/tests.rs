#![cfg(test)]

use crate::*;
use bls::PublicKeyBytes;
use std::sync::Arc;
use tree_hash::TreeHash;

type E = MinimalEthSpec;

fn pubkey(index: usize) -> PublicKeyBytes {
    let mut bytes = [0u8; 48];
    bytes[0] = 0xaa;
    bytes[1..9].copy_from_slice(&(index as u64).to_le_bytes());
    PublicKeyBytes::deserialize(&bytes).unwrap()
}

fn active_validator(index: usize, spec: &ChainSpec) -> Validator {
    Validator {
        pubkey: pubkey(index),
        withdrawal_credentials: Hash256::repeat_byte(0x01),
        effective_balance: spec.max_effective_balance,
        slashed: false,
        activation_eligibility_epoch: Epoch::new(0),
        activation_epoch: Epoch::new(0),
        exit_epoch: spec.far_future_epoch,
        withdrawable_epoch: spec.far_future_epoch,
    }
}

/// A base state at `slot` with `validator_count` active validators and
/// distinct randao mixes.
fn base_state(validator_count: usize, slot: u64) -> (BeaconState<E>, ChainSpec) {
    let spec = E::default_spec();
    let mut state = BeaconState::new(0, Eth1Data::default(), &spec);

    *state.slot_mut() = Slot::new(slot);
    for i in 0..validator_count {
        state
            .validators_mut()
            .push(active_validator(i, &spec))
            .unwrap();
        state.balances_mut().push(spec.max_effective_balance).unwrap();
    }
    for i in 0..E::epochs_per_historical_vector() {
        state
            .randao_mixes_mut()
            .set(i, Hash256::from_low_u64_be(i as u64 + 1))
            .unwrap();
    }
    (state, spec)
}

mod epoch_math {
    use super::*;

    #[test]
    fn current_previous_next_epoch() {
        let (state, _) = base_state(8, 17);
        // Slot 17 with 8 slots per epoch.
        assert_eq!(state.current_epoch(), Epoch::new(2));
        assert_eq!(state.previous_epoch(), Epoch::new(1));
        assert_eq!(state.next_epoch().unwrap(), Epoch::new(3));
    }

    #[test]
    fn previous_epoch_clamps_at_genesis() {
        let (state, _) = base_state(8, 0);
        assert_eq!(state.previous_epoch(), Epoch::new(0));
    }
}

mod roots {
    use super::*;

    #[test]
    fn block_root_bounds() {
        let (mut state, _) = base_state(8, 10);
        state
            .set_block_root(Slot::new(9), Hash256::repeat_byte(9))
            .unwrap();
        assert_eq!(
            state.get_block_root(Slot::new(9)).unwrap(),
            Hash256::repeat_byte(9)
        );
        // The current slot has no root yet.
        assert_eq!(
            state.get_block_root(Slot::new(10)),
            Err(crate::BeaconStateError::SlotOutOfBounds)
        );
        // Too far in the past.
        let (state_far, _) = base_state(8, 1000);
        assert_eq!(
            state_far.get_block_root(Slot::new(1)),
            Err(crate::BeaconStateError::SlotOutOfBounds)
        );
    }

    #[test]
    fn randao_mix_wraps_by_epoch() {
        let (state, _) = base_state(8, 10);
        let epoch = state.current_epoch();
        let mix = state.get_randao_mix(epoch).unwrap();
        assert_eq!(
            mix,
            Hash256::from_low_u64_be(
                (epoch.as_usize() % E::epochs_per_historical_vector()) as u64 + 1
            )
        );
    }
}

mod committees {
    use super::*;

    #[test]
    fn committee_caches_cover_all_slots_of_the_epoch() {
        let (mut state, spec) = base_state(64, 16);
        state.build_all_committee_caches(&spec).unwrap();

        let epoch = state.current_epoch();
        for slot in epoch.slot_iter(E::slots_per_epoch()) {
            let committees = state.get_beacon_committees_at_slot(slot).unwrap();
            assert!(!committees.is_empty());
            for committee in &committees {
                assert!(!committee.committee.is_empty());
            }
        }
    }

    #[test]
    fn every_active_validator_sits_in_exactly_one_committee() {
        let (mut state, spec) = base_state(64, 16);
        state.build_all_committee_caches(&spec).unwrap();

        let epoch = state.current_epoch();
        let mut seen = vec![0usize; 64];
        for slot in epoch.slot_iter(E::slots_per_epoch()) {
            for committee in state.get_beacon_committees_at_slot(slot).unwrap() {
                for &validator_index in committee.committee {
                    seen[validator_index] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn uninitialized_cache_is_an_error() {
        let (state, _) = base_state(8, 16);
        assert!(matches!(
            state.get_beacon_committee(Slot::new(16), 0),
            Err(crate::BeaconStateError::CommitteeCacheUninitialized(_))
        ));
    }

    #[test]
    fn proposer_is_an_active_validator() {
        let (mut state, spec) = base_state(64, 16);
        state.build_all_committee_caches(&spec).unwrap();
        let proposer = state
            .get_beacon_proposer_index(Slot::new(16), &spec)
            .unwrap();
        assert!(proposer < 64);
        // Deterministic.
        assert_eq!(
            proposer,
            state
                .get_beacon_proposer_index(Slot::new(16), &spec)
                .unwrap()
        );
    }
}

mod tree_backing {
    use super::*;

    #[test]
    fn clone_shares_structure_and_isolates_writes() {
        let (mut state, _) = base_state(32, 8);
        let original_root = state.update_tree_hash_cache().unwrap();

        // Mutate a clone's validator; the original must not move.
        let mut cloned = state.clone();
        let mut validator = cloned.get_validator(3).unwrap();
        validator.activation_epoch = Epoch::new(99);
        cloned.update_validator(3, validator).unwrap();

        assert_eq!(state.update_tree_hash_cache().unwrap(), original_root);
        assert_ne!(cloned.update_tree_hash_cache().unwrap(), original_root);

        // The clone's root equals a freshly-built state with the same change.
        let (mut fresh, _) = base_state(32, 8);
        let mut validator = fresh.get_validator(3).unwrap();
        validator.activation_epoch = Epoch::new(99);
        fresh.update_validator(3, validator).unwrap();
        assert_eq!(
            cloned.update_tree_hash_cache().unwrap(),
            fresh.update_tree_hash_cache().unwrap()
        );
    }

    #[test]
    fn clearing_tree_caches_is_identity_on_the_root() {
        let (mut state, _) = base_state(32, 8);
        let mut validator = state.get_validator(0).unwrap();
        validator.effective_balance = 17_000_000_000;
        state.update_validator(0, validator).unwrap();

        let root = state.update_tree_hash_cache().unwrap();
        state.clear_tree_caches();
        assert_eq!(state.update_tree_hash_cache().unwrap(), root);
    }

    #[test]
    fn dropping_derived_caches_preserves_the_root() {
        let (mut state, spec) = base_state(32, 8);
        state.build_caches(&spec).unwrap();
        let root = state.update_tree_hash_cache().unwrap();
        state.drop_all_caches();
        assert_eq!(state.update_tree_hash_cache().unwrap(), root);
    }
}

mod ssz_round_trips {
    use super::*;
    use ssz::Encode;

    #[test]
    fn base_state_round_trip() {
        let (state, spec) = base_state(8, 3);
        let bytes = state.as_ssz_bytes();
        let decoded = BeaconState::<E>::from_ssz_bytes(&bytes, &spec).unwrap();
        assert_eq!(
            decoded.canonical_root(),
            state.canonical_root(),
            "decode must preserve the tree hash root"
        );
        assert_eq!(decoded.slot(), state.slot());
        assert_eq!(decoded.validators().len(), state.validators().len());
    }

    #[test]
    fn serialized_state_omits_caches() {
        let (mut state, spec) = base_state(8, 3);
        let bytes_before = state.as_ssz_bytes();
        state.build_caches(&spec).unwrap();
        assert_eq!(state.as_ssz_bytes(), bytes_before);
    }
}

mod caches {
    use super::*;

    #[test]
    fn total_active_balance_cache() {
        let (mut state, spec) = base_state(16, 8);
        assert!(state.get_total_active_balance().is_err());
        state.build_total_active_balance_cache(&spec).unwrap();
        assert_eq!(
            state.get_total_active_balance().unwrap(),
            16 * spec.max_effective_balance
        );
    }

    #[test]
    fn pubkey_cache_round_trip() {
        let (mut state, _) = base_state(16, 8);
        state.update_pubkey_cache().unwrap();
        assert_eq!(state.get_validator_index(&pubkey(7)).unwrap(), Some(7));
        assert_eq!(state.get_validator_index(&pubkey(99)).unwrap(), None);
    }

    #[test]
    fn advance_caches_rotates_committees() {
        let (mut state, spec) = base_state(64, 16);
        state.build_all_committee_caches(&spec).unwrap();
        let next = Arc::clone(&state.committee_caches()[RelativeEpoch::Next.index()]);

        *state.slot_mut() = state.slot() + E::slots_per_epoch();
        state.advance_caches();

        assert!(Arc::ptr_eq(
            &state.committee_caches()[RelativeEpoch::Current.index()],
            &next
        ));
    }
}

mod fork_variants {
    use super::*;

    #[test]
    fn partial_getters_fail_on_wrong_fork() {
        let (state, _) = base_state(8, 3);
        assert!(matches!(
            state.current_epoch_participation(),
            Err(crate::BeaconStateError::IncorrectStateVariant)
        ));
        assert!(state.latest_execution_payload_header().is_err());
        assert!(state.pending_deposits().is_err());
        assert!(state.proposer_lookahead().is_err());
        assert!(state.as_altair().is_err());
        assert!(state.as_base().is_ok());
    }

    #[test]
    fn tree_hash_differs_between_slots() {
        let (mut state, _) = base_state(8, 3);
        let root_a = state.tree_hash_root();
        *state.slot_mut() = Slot::new(4);
        assert_ne!(state.tree_hash_root(), root_a);
    }
}
