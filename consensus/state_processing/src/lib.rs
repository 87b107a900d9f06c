//! The beacon chain state transition function.
//!
//! The entry point is [`state_transition`]: pre-state plus signed block in, a
//! fresh post-state out, with the pre-state left untouched (state mutation is
//! copy-on-write through the tree-backed fields). Slot, block and epoch
//! processing are also exposed individually for callers that advance states
//! without blocks.

mod consensus_context;
mod metrics;
mod state_transition;

#[cfg(test)]
pub mod test_utils;

pub mod common;
pub mod epoch_cache;
pub mod per_block_processing;
pub mod per_epoch_processing;
pub mod per_slot_processing;
pub mod upgrade;

pub use consensus_context::ConsensusContext;
pub use epoch_cache::initialize_epoch_cache;
pub use per_block_processing::{
    BlockSignatureStrategy, VerifyBlockRoot, VerifySignatures, block_signature_verifier,
    errors::BlockProcessingError, per_block_processing, signature_sets,
};
pub use per_epoch_processing::{
    EpochProcessingSummary, errors::EpochProcessingError, process_epoch,
};
pub use per_slot_processing::{Error as SlotProcessingError, per_slot_processing};
pub use state_transition::{
    StateTransitionError, StateTransitionOpts, VerifyStateRoot, process_slots, state_transition,
};

pub use types::{BeaconState, BeaconStateError, ChainSpec, EthSpec, Hash256, InconsistentFork};
