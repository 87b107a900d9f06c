use types::{BeaconStateError, EpochCacheError, InconsistentFork};

#[derive(Debug, PartialEq, Clone)]
pub enum EpochProcessingError {
    UnableToDetermineProducer,
    NoBlockRoots,
    BaseRewardQuotientIsZero,
    NoRandaoSeed,
    PreviousTotalBalanceIsZero,
    InclusionDistanceZero,
    ValidatorStatusesInconsistent,
    DeltasInconsistent,
    DeltaOutOfBounds(usize),
    InclusionSlotsInconsistent(usize),
    BeaconStateError(BeaconStateError),
    InclusionError(InclusionError),
    SszTypesError(ssz_types::Error),
    TreeViewError(tree_view::Error),
    ArithError(safe_arith::ArithError),
    InconsistentStateFork(InconsistentFork),
    InvalidJustificationBit(ssz_types::Error),
    InvalidFlagIndex(usize),
    MissingEarliestExitEpoch,
    MissingExitBalanceToConsume,
    EpochCache(EpochCacheError),
    SinglePassMissingActivationQueue,
    ProposerLookaheadOutOfBounds(usize),
}

impl From<InclusionError> for EpochProcessingError {
    fn from(e: InclusionError) -> EpochProcessingError {
        EpochProcessingError::InclusionError(e)
    }
}

impl From<BeaconStateError> for EpochProcessingError {
    fn from(e: BeaconStateError) -> EpochProcessingError {
        EpochProcessingError::BeaconStateError(e)
    }
}

impl From<ssz_types::Error> for EpochProcessingError {
    fn from(e: ssz_types::Error) -> EpochProcessingError {
        EpochProcessingError::SszTypesError(e)
    }
}

impl From<tree_view::Error> for EpochProcessingError {
    fn from(e: tree_view::Error) -> EpochProcessingError {
        EpochProcessingError::TreeViewError(e)
    }
}

impl From<safe_arith::ArithError> for EpochProcessingError {
    fn from(e: safe_arith::ArithError) -> EpochProcessingError {
        EpochProcessingError::ArithError(e)
    }
}

impl From<EpochCacheError> for EpochProcessingError {
    fn from(e: EpochCacheError) -> EpochProcessingError {
        EpochProcessingError::EpochCache(e)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum InclusionError {
    /// The validator did not participate in an attestation in this period.
    NoAttestationsForValidator,
    ArithError(safe_arith::ArithError),
}

impl From<safe_arith::ArithError> for InclusionError {
    fn from(e: safe_arith::ArithError) -> InclusionError {
        InclusionError::ArithError(e)
    }
}
