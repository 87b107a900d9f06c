#![cfg(test)]

use super::errors::{BlockProcessingError, ExitInvalid, HeaderInvalid};
use super::*;
use crate::common::get_attestation_participation_flag_indices;
use crate::test_utils::{E, base_state, pubkey, state_at_fork};
use bls::{SignatureBytes, TestingVerifier};
use types::*;

fn ctxt_at(slot: Slot) -> ConsensusContext<E> {
    ConsensusContext::new(slot)
}

mod block_header {
    use super::*;

    fn header_for(state: &BeaconState<E>, spec: &ChainSpec) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: state.slot(),
            proposer_index: state
                .get_beacon_proposer_index(state.slot(), spec)
                .unwrap() as u64,
            parent_root: state.latest_block_header().canonical_root(),
            state_root: Hash256::default(),
            body_root: Hash256::repeat_byte(0x11),
        }
    }

    #[test]
    fn accepts_a_well_formed_header() {
        let (mut state, spec) = base_state(64, 3);
        // Fill the header state root as `process_slot` would have.
        state.latest_block_header_mut().state_root = Hash256::repeat_byte(0x22);
        let header = header_for(&state, &spec);
        let proposer =
            process_block_header(&mut state, header.clone(), VerifyBlockRoot::True, &mut ctxt_at(Slot::new(3)), &spec)
                .unwrap();
        assert_eq!(proposer, header.proposer_index);
        assert_eq!(*state.latest_block_header(), header);
    }

    #[test]
    fn rejects_a_slot_mismatch() {
        let (mut state, spec) = base_state(64, 3);
        let mut header = header_for(&state, &spec);
        header.slot = Slot::new(4);
        let result = process_block_header(
            &mut state,
            header,
            VerifyBlockRoot::True,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::HeaderInvalid {
                reason: HeaderInvalid::StateSlotMismatch
            })
        ));
    }

    #[test]
    fn rejects_the_wrong_proposer() {
        let (mut state, spec) = base_state(64, 3);
        state.latest_block_header_mut().state_root = Hash256::repeat_byte(0x22);
        let mut header = header_for(&state, &spec);
        header.proposer_index = header.proposer_index.wrapping_add(1) % 64;
        let result = process_block_header(
            &mut state,
            header,
            VerifyBlockRoot::True,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::HeaderInvalid {
                reason: HeaderInvalid::ProposerIndexMismatch { .. }
            })
        ));
    }

    #[test]
    fn rejects_the_wrong_parent_root() {
        let (mut state, spec) = base_state(64, 3);
        state.latest_block_header_mut().state_root = Hash256::repeat_byte(0x22);
        let mut header = header_for(&state, &spec);
        header.parent_root = Hash256::repeat_byte(0xFF);
        let result = process_block_header(
            &mut state,
            header,
            VerifyBlockRoot::True,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::HeaderInvalid {
                reason: HeaderInvalid::ParentBlockRootMismatch { .. }
            })
        ));
    }
}

mod randao {
    use super::*;

    #[test]
    fn mixes_the_reveal_into_the_state() {
        let (mut state, spec) = base_state(64, 3);
        let mix_before = state.get_randao_mix(state.current_epoch()).unwrap();

        let block = BeaconBlock::<E>::empty_at_slot(ForkName::Base, Slot::new(3));
        process_randao(
            &mut state,
            block.to_ref(),
            VerifySignatures::False,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        )
        .unwrap();

        assert_ne!(
            state.get_randao_mix(state.current_epoch()).unwrap(),
            mix_before
        );
    }

    #[test]
    fn rejects_a_bad_reveal_signature() {
        let (mut state, spec) = base_state(64, 3);
        let block = BeaconBlock::<E>::empty_at_slot(ForkName::Base, Slot::new(3));
        let result = process_randao(
            &mut state,
            block.to_ref(),
            VerifySignatures::True,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::RandaoSignatureInvalid)
        ));
    }
}

mod eth1_data {
    use super::*;

    #[test]
    fn votes_accumulate_and_flip_the_data() {
        let (mut state, _spec) = base_state(8, 3);
        let vote = Eth1Data {
            deposit_root: Hash256::repeat_byte(0x01),
            deposit_count: 9,
            block_hash: Hash256::repeat_byte(0x02),
        };

        // Minimal spec: 32 slots per voting period, need > 16 votes.
        for _ in 0..16 {
            process_eth1_data(&mut state, &vote).unwrap();
        }
        assert_ne!(*state.eth1_data(), vote, "not yet a majority");

        process_eth1_data(&mut state, &vote).unwrap();
        assert_eq!(*state.eth1_data(), vote, "majority reached");
    }
}

mod operations {
    use super::*;
    use crate::per_block_processing::process_operations::{
        process_exits, process_proposer_slashings,
    };

    fn signed_header(
        state: &BeaconState<E>,
        proposer_index: u64,
        body_root: Hash256,
        spec: &ChainSpec,
    ) -> SignedBeaconBlockHeader {
        let message = BeaconBlockHeader {
            slot: Slot::new(2),
            proposer_index,
            parent_root: Hash256::repeat_byte(1),
            state_root: Hash256::repeat_byte(2),
            body_root,
        };
        let domain = spec.get_domain(
            Slot::new(2).epoch(E::slots_per_epoch()),
            Domain::BeaconProposer,
            state.fork(),
            state.genesis_validators_root(),
        );
        let signature = TestingVerifier::sign_single(
            &pubkey(proposer_index as usize),
            message.signing_root(domain),
        );
        SignedBeaconBlockHeader { message, signature }
    }

    #[test]
    fn proposer_slashing_slashes_the_proposer() {
        let (mut state, spec) = base_state(64, 3);
        let victim = 7u64;
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(&state, victim, Hash256::repeat_byte(0xAA), &spec),
            signed_header_2: signed_header(&state, victim, Hash256::repeat_byte(0xBB), &spec),
        };

        process_proposer_slashings(
            &mut state,
            &[slashing],
            VerifySignatures::True,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        )
        .unwrap();

        assert!(state.get_validator(victim as usize).unwrap().slashed);
        assert!(
            state.get_balance(victim as usize).unwrap() < spec.max_effective_balance,
            "the slashing penalty must be applied"
        );
    }

    #[test]
    fn identical_headers_are_not_slashable() {
        let (mut state, spec) = base_state(64, 3);
        let header = signed_header(&state, 7, Hash256::repeat_byte(0xAA), &spec);
        let slashing = ProposerSlashing {
            signed_header_1: header.clone(),
            signed_header_2: header,
        };
        let result = process_proposer_slashings(
            &mut state,
            &[slashing],
            VerifySignatures::False,
            &mut ctxt_at(Slot::new(3)),
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::ProposerSlashingInvalid { index: 0, .. })
        ));
    }

    #[test]
    fn exits_initiate_after_the_committee_period() {
        let (mut state, mut spec) = base_state(64, 3);
        spec.shard_committee_period = 0;

        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: Epoch::new(0),
                validator_index: 5,
            },
            signature: SignatureBytes::empty(),
        };
        process_exits(&mut state, &[exit], VerifySignatures::False, &spec).unwrap();

        let validator = state.get_validator(5).unwrap();
        assert_ne!(validator.exit_epoch, spec.far_future_epoch);
        assert_eq!(
            validator.withdrawable_epoch,
            validator.exit_epoch + spec.min_validator_withdrawability_delay.as_u64()
        );
    }

    #[test]
    fn young_validators_cannot_exit() {
        let (mut state, spec) = base_state(64, 3);
        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: Epoch::new(0),
                validator_index: 5,
            },
            signature: SignatureBytes::empty(),
        };
        let result = process_exits(&mut state, &[exit], VerifySignatures::False, &spec);
        assert!(matches!(
            result,
            Err(BlockProcessingError::ExitInvalid {
                index: 0,
                reason: ExitInvalid::TooYoungToExit { .. }
            })
        ));
    }
}

mod attestations {
    use super::*;
    use crate::per_block_processing::process_operations::process_attestation_altair;

    /// A fully-participating attestation for `slot`, valid against `state`.
    fn attestation_for_slot(
        state: &BeaconState<E>,
        slot: Slot,
        index: u64,
    ) -> AttestationBase<E> {
        let committee = state.get_beacon_committee(slot, index).unwrap();
        let mut aggregation_bits = BitList::with_capacity(committee.committee.len()).unwrap();
        for i in 0..committee.committee.len() {
            aggregation_bits.set(i, true).unwrap();
        }
        let epoch = slot.epoch(E::slots_per_epoch());
        AttestationBase {
            aggregation_bits,
            data: AttestationData {
                slot,
                index,
                beacon_block_root: state.get_block_root(slot).unwrap(),
                source: state.current_justified_checkpoint(),
                target: Checkpoint {
                    epoch,
                    root: state
                        .get_block_root_at_epoch(epoch)
                        .unwrap(),
                },
            },
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn altair_attestation_sets_participation_flags_and_pays_the_proposer(
    ) {
        let (mut state, spec) = state_at_fork(ForkName::Altair, 64, 4);
        let attestation = Attestation::Base(attestation_for_slot(&state, Slot::new(3), 0));

        let proposer_index = state
            .get_beacon_proposer_index(Slot::new(4), &spec)
            .unwrap();
        let proposer_balance_before = state.get_balance(proposer_index).unwrap();

        process_attestation_altair(
            &mut state,
            attestation.to_ref(),
            0,
            &mut ctxt_at(Slot::new(4)),
            VerifySignatures::False,
            &spec,
        )
        .unwrap();

        // Every attester in the committee gained at least the source and target flags.
        let committee = state
            .get_beacon_committee(Slot::new(3), 0)
            .unwrap()
            .committee
            .to_vec();
        for validator_index in committee {
            let flags = state
                .current_epoch_participation()
                .unwrap()
                .get(validator_index)
                .unwrap();
            assert!(flags.has_flag(0).unwrap(), "timely source flag");
            assert!(flags.has_flag(1).unwrap(), "timely target flag");
        }

        assert!(
            state.get_balance(proposer_index).unwrap() > proposer_balance_before,
            "the proposer collects the inclusion reward"
        );
    }

    #[test]
    fn participation_flags_match_the_flag_computation() {
        let (state, spec) = state_at_fork(ForkName::Altair, 64, 4);
        let attestation = attestation_for_slot(&state, Slot::new(3), 0);
        let flags = get_attestation_participation_flag_indices(
            &state,
            &attestation.data,
            1,
            &spec,
        )
        .unwrap();
        // Inclusion delay 1 earns all three flags.
        assert_eq!(flags.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn an_attestation_with_the_wrong_source_is_rejected() {
        let (mut state, spec) = state_at_fork(ForkName::Altair, 64, 4);
        let mut attestation = attestation_for_slot(&state, Slot::new(3), 0);
        attestation.data.source.root = Hash256::repeat_byte(0x99);

        let result = process_attestation_altair(
            &mut state,
            Attestation::Base(attestation).to_ref(),
            0,
            &mut ctxt_at(Slot::new(4)),
            VerifySignatures::False,
            &spec,
        );
        assert!(result.is_err());
    }
}

mod electra_requests {
    use super::*;
    use crate::per_block_processing::process_operations::{
        process_consolidation_requests, process_withdrawal_requests,
    };

    #[test]
    fn a_full_exit_request_initiates_an_exit() {
        let (mut state, mut spec) = state_at_fork(ForkName::Electra, 64, 4);
        spec.shard_committee_period = 0;

        let target = 9usize;
        let mut validator = state.get_validator(target).unwrap();
        validator.change_withdrawal_credentials(&Address::repeat_byte(0x55), &spec);
        state.update_validator(target, validator).unwrap();

        let request = WithdrawalRequest {
            source_address: Address::repeat_byte(0x55),
            validator_pubkey: pubkey(target),
            amount: types::consts::electra::FULL_EXIT_REQUEST_AMOUNT,
        };
        process_withdrawal_requests(&mut state, &[request], &spec).unwrap();

        assert_ne!(
            state.get_validator(target).unwrap().exit_epoch,
            spec.far_future_epoch
        );
    }

    #[test]
    fn a_mismatched_source_address_is_ignored() {
        let (mut state, mut spec) = state_at_fork(ForkName::Electra, 64, 4);
        spec.shard_committee_period = 0;

        let target = 9usize;
        let mut validator = state.get_validator(target).unwrap();
        validator.change_withdrawal_credentials(&Address::repeat_byte(0x55), &spec);
        state.update_validator(target, validator).unwrap();

        let request = WithdrawalRequest {
            source_address: Address::repeat_byte(0x66),
            validator_pubkey: pubkey(target),
            amount: types::consts::electra::FULL_EXIT_REQUEST_AMOUNT,
        };
        process_withdrawal_requests(&mut state, &[request], &spec).unwrap();

        assert_eq!(
            state.get_validator(target).unwrap().exit_epoch,
            spec.far_future_epoch,
            "requests that fail validation are skipped, not errors"
        );
    }

    #[test]
    fn a_self_consolidation_switches_to_compounding() {
        let (mut state, mut spec) = state_at_fork(ForkName::Electra, 64, 4);
        spec.shard_committee_period = 0;

        let target = 11usize;
        let mut validator = state.get_validator(target).unwrap();
        validator.change_withdrawal_credentials(&Address::repeat_byte(0x77), &spec);
        state.update_validator(target, validator).unwrap();

        let request = ConsolidationRequest {
            source_address: Address::repeat_byte(0x77),
            source_pubkey: pubkey(target),
            target_pubkey: pubkey(target),
        };
        process_consolidation_requests(&mut state, &[request], &spec).unwrap();

        assert!(
            state
                .get_validator(target)
                .unwrap()
                .has_compounding_withdrawal_credential(&spec)
        );
    }
}
