use crate::upgrade::{
    upgrade_to_altair, upgrade_to_bellatrix, upgrade_to_capella, upgrade_to_deneb,
    upgrade_to_electra, upgrade_to_fulu,
};
use crate::{per_epoch_processing::EpochProcessingSummary, *};
use safe_arith::{ArithError, SafeArith};
use tracing::instrument;
use types::*;

#[derive(Debug, PartialEq)]
pub enum Error {
    BeaconStateError(BeaconStateError),
    EpochProcessingError(EpochProcessingError),
    ArithError(ArithError),
    InconsistentStateFork(InconsistentFork),
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Self {
        Self::ArithError(e)
    }
}

/// Advances a state forward by one slot, performing per-epoch processing if required.
///
/// If the root of the supplied `state` is known, then it can be passed as `state_root`. If
/// `state_root` is `None`, the root of `state` will be computed using a cached tree hash.
/// Providing the `state_root` makes this function several orders of magnitude faster.
#[instrument(level = "debug", skip_all)]
pub fn per_slot_processing<E: EthSpec>(
    state: &mut BeaconState<E>,
    state_root: Option<Hash256>,
    spec: &ChainSpec,
) -> Result<Option<EpochProcessingSummary>, Error> {
    // Verify that the `BeaconState` instantiation matches the fork at `state.slot()`.
    state
        .fork_name(spec)
        .map_err(Error::InconsistentStateFork)?;

    cache_state(state, state_root)?;

    let summary = if state.slot() > spec.genesis_slot
        && state.slot().safe_add(1u64)?.safe_rem(E::slots_per_epoch())? == 0
    {
        Some(per_epoch_processing(state, spec)?)
    } else {
        None
    };

    *state.slot_mut() = state.slot().safe_add(1u64)?;

    // Process fork upgrades here. Note that multiple upgrades can potentially run
    // in sequence if they are scheduled in the same Epoch (common in testnets)
    if state.slot().safe_rem(E::slots_per_epoch())? == 0 {
        // If the Altair fork epoch is reached, perform an irregular state upgrade.
        if spec.altair_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_altair(state, spec)?;
        }
        // If the Bellatrix fork epoch is reached, perform an irregular state upgrade.
        if spec.bellatrix_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_bellatrix(state, spec)?;
        }
        // Capella.
        if spec.capella_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_capella(state, spec)?;
        }
        // Deneb.
        if spec.deneb_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_deneb(state, spec)?;
        }
        // Electra.
        if spec.electra_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_electra(state, spec)?;
        }
        // Fulu.
        if spec.fulu_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_fulu(state, spec)?;
        }

        // Additionally build all caches so that all valid states that are advanced always have
        // committee caches built, and we don't have to worry about initialising them at higher
        // layers.
        state.build_caches(spec)?;
    }

    Ok(summary)
}

fn per_epoch_processing<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    crate::per_epoch_processing::process_epoch(state, spec).map_err(Error::EpochProcessingError)
}

#[instrument(skip_all)]
fn cache_state<E: EthSpec>(
    state: &mut BeaconState<E>,
    state_root: Option<Hash256>,
) -> Result<(), Error> {
    let previous_state_root = if let Some(root) = state_root {
        root
    } else {
        state.update_tree_hash_cache()?
    };

    // Note: increment the state slot here to allow use of our `state_root` and `block_root`
    // getter/setter functions.
    //
    // This is a bit hacky, however it gets the job done safely without lots of code.
    let previous_slot = state.slot();
    *state.slot_mut() = previous_slot.safe_add(1u64)?;

    // Store the previous slot's post state transition root.
    state.set_state_root(previous_slot, previous_state_root)?;

    // Cache latest block header state root
    if state.latest_block_header().state_root == Hash256::default() {
        state.latest_block_header_mut().state_root = previous_state_root;
    }

    // Cache block root
    let latest_block_root = state.latest_block_header().canonical_root();
    state.set_block_root(previous_slot, latest_block_root)?;

    // Set the state slot back to what it should be.
    *state.slot_mut() = previous_slot;

    Ok(())
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Error {
        Error::BeaconStateError(e)
    }
}

impl From<EpochProcessingError> for Error {
    fn from(e: EpochProcessingError) -> Error {
        Error::EpochProcessingError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::base_state;

    type E = MinimalEthSpec;

    #[test]
    fn advances_the_slot() {
        let (mut state, spec) = base_state(16, 3);
        per_slot_processing(&mut state, None, &spec).unwrap();
        assert_eq!(state.slot(), Slot::new(4));
    }

    #[test]
    fn caches_the_previous_state_root() {
        let (mut state, spec) = base_state(16, 3);
        let expected_root = state.canonical_root();
        per_slot_processing(&mut state, Some(expected_root), &spec).unwrap();
        assert_eq!(state.get_state_root(Slot::new(3)).unwrap(), expected_root);
    }

    #[test]
    fn fills_the_header_state_root_once() {
        let (mut state, spec) = base_state(16, 3);
        assert_eq!(state.latest_block_header().state_root, Hash256::default());
        let root = state.canonical_root();
        per_slot_processing(&mut state, Some(root), &spec).unwrap();
        assert_eq!(state.latest_block_header().state_root, root);
    }

    #[test]
    fn runs_epoch_processing_at_the_boundary() {
        // The last slot of epoch 0 for the minimal spec is slot 7.
        let (mut state, spec) = base_state(16, 7);
        let summary = per_slot_processing(&mut state, None, &spec).unwrap();
        assert!(summary.is_some(), "epoch boundary must process the epoch");
        assert_eq!(state.slot(), Slot::new(8));
        assert_eq!(state.current_epoch(), Epoch::new(1));

        // Mid-epoch slots do not.
        let summary = per_slot_processing(&mut state, None, &spec).unwrap();
        assert!(summary.is_none());
    }

    #[test]
    fn upgrades_to_altair_at_the_fork_epoch() {
        let mut spec = ChainSpec::minimal();
        spec.altair_fork_epoch = Some(Epoch::new(1));

        let (mut state, _) = base_state(16, 7);
        per_slot_processing(&mut state, None, &spec).unwrap();

        assert_eq!(state.fork_name_unchecked(), ForkName::Altair);
        assert_eq!(state.fork().current_version, spec.altair_fork_version);
        assert_eq!(
            state.previous_epoch_participation().unwrap().len(),
            state.validators().len(),
            "participation must be initialised for every validator"
        );
    }
}
