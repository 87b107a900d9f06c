use crate::per_block_processing::{
    BlockSignatureStrategy, VerifyBlockRoot, errors::BlockProcessingError, per_block_processing,
};
use crate::per_slot_processing::{Error as SlotProcessingError, per_slot_processing};
use crate::{ConsensusContext, metrics};
use tracing::instrument;
use types::{BeaconState, BeaconStateError, ChainSpec, EthSpec, Hash256, SignedBeaconBlock, Slot};

/// Whether to compare the computed post-state root against the block's claim.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum VerifyStateRoot {
    True,
    False,
}

/// Options governing a [`state_transition`] call.
#[derive(Debug, Clone, Copy)]
pub struct StateTransitionOpts {
    pub block_signature_strategy: BlockSignatureStrategy,
    /// Check the block's proposer index and parent root against the state.
    pub verify_proposer: bool,
    pub verify_state_root: VerifyStateRoot,
    /// The wall-clock slot, when known. Blocks further in the future than
    /// this are rejected before any processing.
    pub current_slot: Option<Slot>,
}

impl Default for StateTransitionOpts {
    fn default() -> Self {
        Self {
            block_signature_strategy: BlockSignatureStrategy::VerifyBulk,
            verify_proposer: true,
            verify_state_root: VerifyStateRoot::True,
            current_slot: None,
        }
    }
}

#[derive(Debug)]
pub enum StateTransitionError {
    /// The block is not newer than the pre-state.
    SlotInPast {
        block_slot: Slot,
        state_slot: Slot,
    },
    /// The block claims a slot beyond the wall clock.
    SlotTooFarInFuture {
        block_slot: Slot,
        current_slot: Slot,
    },
    /// The computed post-state root does not match the block's claim.
    InvalidStateRoot {
        block: Hash256,
        local: Hash256,
    },
    SlotProcessing(SlotProcessingError),
    BlockProcessing(Box<BlockProcessingError>),
    BeaconStateError(BeaconStateError),
}

impl From<SlotProcessingError> for StateTransitionError {
    fn from(e: SlotProcessingError) -> Self {
        Self::SlotProcessing(e)
    }
}

impl From<BlockProcessingError> for StateTransitionError {
    fn from(e: BlockProcessingError) -> Self {
        Self::BlockProcessing(Box::new(e))
    }
}

impl From<BeaconStateError> for StateTransitionError {
    fn from(e: BeaconStateError) -> Self {
        Self::BeaconStateError(e)
    }
}

/// Advance `state` to `target_slot`, running epoch processing and fork
/// upgrades at every boundary crossed.
pub fn process_slots<E: EthSpec>(
    state: &mut BeaconState<E>,
    target_slot: Slot,
    spec: &ChainSpec,
) -> Result<(), StateTransitionError> {
    while state.slot() < target_slot {
        per_slot_processing(state, None, spec)?;
    }
    Ok(())
}

/// The top-level state transition: pre-state plus signed block to post-state.
///
/// The pre-state handle is untouched; the returned state is a clone that
/// shares unmodified structure with it. On any error the candidate state is
/// dropped, so callers observe all-or-nothing behaviour.
#[instrument(skip_all, fields(slot = %signed_block.slot()))]
pub fn state_transition<E: EthSpec>(
    pre_state: &BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
    opts: StateTransitionOpts,
    spec: &ChainSpec,
) -> Result<BeaconState<E>, StateTransitionError> {
    let block_slot = signed_block.slot();

    if block_slot <= pre_state.slot() {
        return Err(StateTransitionError::SlotInPast {
            block_slot,
            state_slot: pre_state.slot(),
        });
    }
    if let Some(current_slot) = opts.current_slot {
        // Tolerate one slot of clock disparity, matching the gossip window.
        if block_slot > current_slot.saturating_add(1u64) {
            return Err(StateTransitionError::SlotTooFarInFuture {
                block_slot,
                current_slot,
            });
        }
    }

    metrics::observe(&metrics::STATE_CLONED_COUNT, 1.0);
    observe_pre_state_tree_caches(pre_state);
    let mut state = pre_state.clone();

    process_slots(&mut state, block_slot, spec)?;

    let block_timer = metrics::start_timer(&metrics::PROCESS_BLOCK_SECONDS);
    let mut ctxt = ConsensusContext::new(block_slot)
        .set_current_block_root(signed_block.canonical_root());
    let verify_block_root = if opts.verify_proposer {
        VerifyBlockRoot::True
    } else {
        VerifyBlockRoot::False
    };
    per_block_processing(
        &mut state,
        signed_block,
        opts.block_signature_strategy,
        verify_block_root,
        &mut ctxt,
        spec,
    )?;
    metrics::stop_timer(block_timer);

    metrics::set_gauge(
        &metrics::ATTESTATIONS_PER_BLOCK,
        signed_block.message.body_ref().attestations_len() as i64,
    );

    if opts.verify_state_root == VerifyStateRoot::True {
        let commit_timer = metrics::start_timer(&metrics::PROCESS_BLOCK_COMMIT_SECONDS);
        let local = state.update_tree_hash_cache()?;
        metrics::stop_timer(commit_timer);

        let claimed = signed_block.state_root();
        if local != claimed {
            return Err(StateTransitionError::InvalidStateRoot {
                block: claimed,
                local,
            });
        }
    }

    observe_post_state_tree_caches(&state);

    Ok(state)
}

fn observe_pre_state_tree_caches<E: EthSpec>(state: &BeaconState<E>) {
    let (validators_populated, balances_populated) = state.tree_caches_populated();
    let observe = |metric, populated: bool| {
        let label = if populated { "hit" } else { "miss" };
        metrics::set_gauge_vec(metric, &[label], 1);
    };
    observe(
        &metrics::PRE_STATE_VALIDATORS_NODES_POPULATED,
        validators_populated,
    );
    observe(
        &metrics::PRE_STATE_BALANCES_NODES_POPULATED,
        balances_populated,
    );
}

fn observe_post_state_tree_caches<E: EthSpec>(state: &BeaconState<E>) {
    let (validators_populated, balances_populated) = state.tree_caches_populated();
    metrics::set_gauge(
        &metrics::POST_STATE_VALIDATORS_NODES_POPULATED,
        validators_populated as i64,
    );
    metrics::set_gauge(
        &metrics::POST_STATE_BALANCES_NODES_POPULATED,
        balances_populated as i64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{E, base_state, build_empty_signed_block, state_at_fork};
    use types::{Epoch, ForkName, SyncAggregate};

    fn default_opts() -> StateTransitionOpts {
        StateTransitionOpts::default()
    }

    #[test]
    fn empty_block_applies_to_a_base_state() {
        let (pre_state, spec) = base_state(256, 3);
        let block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);

        let post_state = state_transition(&pre_state, &block, default_opts(), &spec).unwrap();
        assert_eq!(post_state.slot(), Slot::new(4));
        assert_eq!(
            post_state.canonical_root(),
            block.state_root(),
            "claimed state root is the computed one"
        );
    }

    #[test]
    fn the_pre_state_is_preserved() {
        let (mut pre_state, spec) = base_state(64, 3);
        let pre_root = pre_state.update_tree_hash_cache().unwrap();

        let block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);
        let _post_state = state_transition(&pre_state, &block, default_opts(), &spec).unwrap();

        assert_eq!(pre_state.update_tree_hash_cache().unwrap(), pre_root);
    }

    #[test]
    fn the_transition_is_deterministic() {
        let (pre_state, spec) = base_state(64, 3);
        let block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);

        let a = state_transition(&pre_state, &block, default_opts(), &spec).unwrap();
        let b = state_transition(&pre_state, &block, default_opts(), &spec).unwrap();
        assert_eq!(a.canonical_root(), b.canonical_root());
    }

    #[test]
    fn a_block_at_or_before_the_state_slot_is_rejected() {
        let (pre_state, spec) = base_state(64, 4);
        let block = build_empty_signed_block(&pre_state, Slot::new(5), &spec);

        // Rebuild a state that has already reached the block slot.
        let mut late_state = pre_state.clone();
        process_slots(&mut late_state, Slot::new(5), &spec).unwrap();

        let result = state_transition(&late_state, &block, default_opts(), &spec);
        assert!(matches!(
            result,
            Err(StateTransitionError::SlotInPast { .. })
        ));
    }

    #[test]
    fn a_block_beyond_the_clock_is_rejected() {
        let (pre_state, spec) = base_state(64, 3);
        let block = build_empty_signed_block(&pre_state, Slot::new(6), &spec);

        let opts = StateTransitionOpts {
            current_slot: Some(Slot::new(4)),
            ..default_opts()
        };
        let result = state_transition(&pre_state, &block, opts, &spec);
        assert!(matches!(
            result,
            Err(StateTransitionError::SlotTooFarInFuture { .. })
        ));
    }

    #[test]
    fn a_corrupted_state_root_is_rejected() {
        let (pre_state, spec) = base_state(64, 3);
        let mut block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);
        *block.message.state_root_mut() = Hash256::repeat_byte(0xBA);

        // Signature checks off: the tampered block no longer matches its signature.
        let opts = StateTransitionOpts {
            block_signature_strategy: BlockSignatureStrategy::NoVerification,
            ..default_opts()
        };
        let result = state_transition(&pre_state, &block, opts, &spec);
        assert!(matches!(
            result,
            Err(StateTransitionError::InvalidStateRoot { .. })
        ));
    }

    #[test]
    fn a_tampered_block_fails_bulk_signature_verification() {
        let (pre_state, spec) = base_state(64, 3);
        let mut block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);
        *block.message.state_root_mut() = Hash256::repeat_byte(0xBA);

        let result = state_transition(&pre_state, &block, default_opts(), &spec);
        assert!(matches!(
            result,
            Err(StateTransitionError::BlockProcessing(e))
                if matches!(*e, BlockProcessingError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn transition_crosses_the_altair_boundary() {
        // Pre-state in the last slot of the epoch before the Altair fork.
        let mut spec = types::ChainSpec::minimal();
        spec.altair_fork_epoch = Some(Epoch::new(1));

        let (mut pre_state, _) = base_state(64, 0);
        process_slots(&mut pre_state, Slot::new(7), &spec).unwrap();
        assert_eq!(pre_state.fork_name_unchecked(), ForkName::Base);

        let block = build_empty_signed_block(&pre_state, Slot::new(8), &spec);
        let post_state = state_transition(&pre_state, &block, default_opts(), &spec).unwrap();

        assert_eq!(post_state.fork_name_unchecked(), ForkName::Altair);
        assert_eq!(
            post_state.previous_epoch_participation().unwrap().len(),
            post_state.validators().len(),
            "participation must be initialised after the upgrade"
        );
    }

    #[test]
    fn sync_aggregate_infinity_requires_empty_participation() {
        let (pre_state, spec) = state_at_fork(ForkName::Altair, 64, 3);

        // The helper builds blocks with an empty, infinity-signed aggregate,
        // which must pass full signature verification.
        let block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);
        assert!(state_transition(&pre_state, &block, default_opts(), &spec).is_ok());

        // Setting a participation bit while keeping the infinity signature
        // must be rejected.
        let mut tampered = block.clone();
        match &mut tampered.message {
            types::BeaconBlock::Altair(block) => {
                block.body.sync_aggregate = {
                    let mut aggregate = SyncAggregate::<E>::new();
                    aggregate.sync_committee_bits.set(0, true).unwrap();
                    aggregate
                };
            }
            _ => unreachable!("helper builds an altair block"),
        }
        let opts = StateTransitionOpts {
            block_signature_strategy: BlockSignatureStrategy::NoVerification,
            verify_state_root: VerifyStateRoot::False,
            ..default_opts()
        };
        let result = state_transition(&pre_state, &tampered, opts, &spec);
        assert!(matches!(
            result,
            Err(StateTransitionError::BlockProcessing(e))
                if matches!(*e, BlockProcessingError::SyncAggregateInvalid { .. })
        ));
    }

    #[test]
    fn empty_blocks_apply_across_every_fork() {
        for fork in ForkName::list_all() {
            let (pre_state, spec) = state_at_fork(fork, 64, 3);
            let block = build_empty_signed_block(&pre_state, Slot::new(4), &spec);
            let post_state =
                state_transition(&pre_state, &block, default_opts(), &spec)
                    .unwrap_or_else(|e| panic!("{fork}: {e:?}"));
            assert_eq!(post_state.fork_name_unchecked(), fork);
        }
    }
}
