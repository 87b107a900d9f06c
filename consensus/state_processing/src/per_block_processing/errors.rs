use crate::ConsensusContext;
use crate::consensus_context::ContextError;
use safe_arith::ArithError;
use types::*;

/// Top-level block processing error.
#[derive(Debug, PartialEq, Clone)]
pub enum BlockProcessingError {
    /// Logic error indicating that the wrong state type was provided.
    IncorrectStateType,
    /// The block processed is not consistent with the state's fork schedule.
    InconsistentStateFork(InconsistentFork),
    /// The block header is invalid.
    HeaderInvalid {
        reason: HeaderInvalid,
    },
    /// The proposer's (or another) signature was invalid. The context names
    /// the offending signature set; `index` the offending operation, where
    /// applicable.
    SignatureInvalid {
        context: String,
        index: Option<usize>,
    },
    RandaoSignatureInvalid,
    ProposerSlashingInvalid {
        index: usize,
        reason: ProposerSlashingInvalid,
    },
    AttesterSlashingInvalid {
        index: usize,
        reason: AttesterSlashingInvalid,
    },
    IndexedAttestationInvalid {
        index: usize,
        reason: IndexedAttestationInvalid,
    },
    AttestationInvalid {
        index: usize,
        reason: AttestationInvalid,
    },
    DepositInvalid {
        index: usize,
        reason: DepositInvalid,
    },
    DepositCountInvalid {
        expected: usize,
        found: usize,
    },
    ExitInvalid {
        index: usize,
        reason: ExitInvalid,
    },
    BlsExecutionChangeInvalid {
        index: usize,
        reason: BlsExecutionChangeInvalid,
    },
    SyncAggregateInvalid {
        reason: SyncAggregateInvalid,
    },
    WithdrawalRequestInvalid {
        index: usize,
        reason: WithdrawalRequestInvalid,
    },
    ExecutionPayloadInvalid {
        reason: PayloadInvalid,
    },
    WithdrawalsInvalid {
        reason: WithdrawalsInvalid,
    },
    BlobKzgCommitmentsInvalid {
        found: usize,
        limit: usize,
    },
    /// A withdrawable validator lacked an execution withdrawal address.
    WithdrawalCredentialsInvalid,
    /// Pending attestations do not exist after the Altair fork.
    PendingAttestationInAltair,
    BeaconStateError(BeaconStateError),
    SszTypesError(ssz_types::Error),
    ConsensusContext(ContextError),
    EpochCacheError(EpochCacheError),
    ArithError(ArithError),
}

impl From<BeaconStateError> for BlockProcessingError {
    fn from(e: BeaconStateError) -> Self {
        BlockProcessingError::BeaconStateError(e)
    }
}

impl From<ssz_types::Error> for BlockProcessingError {
    fn from(e: ssz_types::Error) -> Self {
        BlockProcessingError::SszTypesError(e)
    }
}

impl From<tree_view::Error> for BlockProcessingError {
    fn from(e: tree_view::Error) -> Self {
        BlockProcessingError::BeaconStateError(BeaconStateError::TreeViewError(e))
    }
}

impl From<ArithError> for BlockProcessingError {
    fn from(e: ArithError) -> Self {
        BlockProcessingError::ArithError(e)
    }
}

impl From<ContextError> for BlockProcessingError {
    fn from(e: ContextError) -> Self {
        BlockProcessingError::ConsensusContext(e)
    }
}

impl From<EpochCacheError> for BlockProcessingError {
    fn from(e: EpochCacheError) -> Self {
        BlockProcessingError::EpochCacheError(e)
    }
}

impl From<BlockOperationError<HeaderInvalid>> for BlockProcessingError {
    fn from(e: BlockOperationError<HeaderInvalid>) -> Self {
        match e {
            BlockOperationError::Invalid(reason) => BlockProcessingError::HeaderInvalid { reason },
            BlockOperationError::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
            BlockOperationError::ArithError(e) => BlockProcessingError::ArithError(e),
        }
    }
}

impl From<BlockOperationError<SyncAggregateInvalid>> for BlockProcessingError {
    fn from(e: BlockOperationError<SyncAggregateInvalid>) -> Self {
        match e {
            BlockOperationError::Invalid(reason) => {
                BlockProcessingError::SyncAggregateInvalid { reason }
            }
            BlockOperationError::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
            BlockOperationError::ArithError(e) => BlockProcessingError::ArithError(e),
        }
    }
}

impl From<BlockOperationError<PayloadInvalid>> for BlockProcessingError {
    fn from(e: BlockOperationError<PayloadInvalid>) -> Self {
        match e {
            BlockOperationError::Invalid(reason) => {
                BlockProcessingError::ExecutionPayloadInvalid { reason }
            }
            BlockOperationError::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
            BlockOperationError::ArithError(e) => BlockProcessingError::ArithError(e),
        }
    }
}

impl From<BlockOperationError<WithdrawalsInvalid>> for BlockProcessingError {
    fn from(e: BlockOperationError<WithdrawalsInvalid>) -> Self {
        match e {
            BlockOperationError::Invalid(reason) => {
                BlockProcessingError::WithdrawalsInvalid { reason }
            }
            BlockOperationError::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
            BlockOperationError::ArithError(e) => BlockProcessingError::ArithError(e),
        }
    }
}

/// A conversion that consumes `self` and adds an `index` variable to resulting struct.
///
/// Used here to allow converting an error into an upstream error that points to the object that
/// caused the error. For example, pointing to the index of an attestation that caused the
/// `AttestationInvalid` error.
pub trait IntoWithIndex<T>: Sized {
    fn into_with_index(self, index: usize) -> T;
}

/// A wrapper around an operation-specific `Invalid` reason, with the shared
/// failure kinds every verification can hit.
#[derive(Debug, PartialEq, Clone)]
pub enum BlockOperationError<T> {
    Invalid(T),
    BeaconStateError(BeaconStateError),
    ArithError(ArithError),
}

impl<T> BlockOperationError<T> {
    pub fn invalid(reason: T) -> BlockOperationError<T> {
        BlockOperationError::Invalid(reason)
    }
}

impl<T> From<BeaconStateError> for BlockOperationError<T> {
    fn from(e: BeaconStateError) -> Self {
        BlockOperationError::BeaconStateError(e)
    }
}

impl<T> From<ArithError> for BlockOperationError<T> {
    fn from(e: ArithError) -> Self {
        BlockOperationError::ArithError(e)
    }
}

impl<T> From<tree_view::Error> for BlockOperationError<T> {
    fn from(e: tree_view::Error) -> Self {
        BlockOperationError::BeaconStateError(BeaconStateError::TreeViewError(e))
    }
}

/// Emitted when an operation-verification predicate fails.
macro_rules! verify {
    ($condition: expr, $result: expr) => {
        if !$condition {
            return Err($crate::per_block_processing::errors::BlockOperationError::invalid(
                $result,
            ));
        }
    };
}
pub(crate) use verify;

/// Like `verify!` but for the top-level `BlockProcessingError`.
macro_rules! block_verify {
    ($condition: expr, $result: expr) => {
        if !$condition {
            return Err($result);
        }
    };
}
pub(crate) use block_verify;

macro_rules! impl_into_block_processing_error_with_index {
    ($($error: ident),*) => {
        $(
            impl IntoWithIndex<BlockProcessingError> for BlockOperationError<$error> {
                fn into_with_index(self, index: usize) -> BlockProcessingError {
                    match self {
                        BlockOperationError::Invalid(reason) => BlockProcessingError::$error {
                            index,
                            reason
                        },
                        BlockOperationError::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
                        BlockOperationError::ArithError(e) => BlockProcessingError::ArithError(e),
                    }
                }
            }
        )*
    };
}

impl_into_block_processing_error_with_index!(
    ProposerSlashingInvalid,
    AttesterSlashingInvalid,
    IndexedAttestationInvalid,
    AttestationInvalid,
    DepositInvalid,
    ExitInvalid,
    BlsExecutionChangeInvalid,
    WithdrawalRequestInvalid
);

pub type HeaderValidationError = BlockOperationError<HeaderInvalid>;
pub type AttesterSlashingValidationError = BlockOperationError<AttesterSlashingInvalid>;
pub type AttestationValidationError = BlockOperationError<AttestationInvalid>;
pub type ProposerSlashingValidationError = BlockOperationError<ProposerSlashingInvalid>;
pub type DepositValidationError = BlockOperationError<DepositInvalid>;
pub type ExitValidationError = BlockOperationError<ExitInvalid>;
pub type BlsExecutionChangeValidationError = BlockOperationError<BlsExecutionChangeInvalid>;

#[derive(Debug, PartialEq, Clone)]
pub enum HeaderInvalid {
    ProposalSignatureInvalid,
    StateSlotMismatch,
    OlderThanLatestBlockHeader {
        block_slot: Slot,
        latest_block_header_slot: Slot,
    },
    ParentBlockRootMismatch {
        state: Hash256,
        block: Hash256,
    },
    ProposerIndexMismatch {
        block_proposer_index: u64,
        state_proposer_index: u64,
    },
    ProposerSlashed(u64),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ProposerSlashingInvalid {
    /// The proposal signature was invalid.
    BadProposal1Signature,
    /// The proposal signature was invalid.
    BadProposal2Signature,
    /// The two proposals are for different proposers.
    ProposerUnknown(u64),
    /// The two proposals are for different slots.
    ProposalSlotMismatch(Slot, Slot),
    /// The two proposals are for different proposer indices.
    ProposerIndexMismatch(u64, u64),
    /// The proposals are identical and therefore not slashable.
    ProposalsIdentical,
    /// The specified proposer cannot be slashed because they are already slashed, or not active.
    ProposerNotSlashable(u64),
}

#[derive(Debug, PartialEq, Clone)]
pub enum AttesterSlashingInvalid {
    /// The attestations were not in conflict.
    NotSlashable,
    /// The first `IndexedAttestation` was invalid.
    IndexedAttestation1Invalid(BlockOperationError<IndexedAttestationInvalid>),
    /// The second `IndexedAttestation` was invalid.
    IndexedAttestation2Invalid(BlockOperationError<IndexedAttestationInvalid>),
    /// The validator index is unknown. One cannot slash one who does not exist.
    UnknownValidator(u64),
    /// No validator was slashed by the attester slashing.
    NoSlashableIndices,
}

#[derive(Debug, PartialEq, Clone)]
pub enum IndexedAttestationInvalid {
    /// The number of indices exceeds the global maximum.
    MaxIndicesExceed(usize, usize),
    /// The indices were not in increasing order.
    BadValidatorIndicesOrdering(usize),
    /// The indices were empty.
    IndicesEmpty,
    /// The validator index is unknown. One cannot slash one who does not exist.
    UnknownValidator(u64),
    /// The aggregate signature was invalid.
    BadSignature,
}

#[derive(Debug, PartialEq, Clone)]
pub enum AttestationInvalid {
    /// Commmittee index exceeds number of committees in that slot.
    BadCommitteeIndex,
    /// Attestation included before the inclusion delay.
    IncludedTooEarly {
        state: Slot,
        delay: u64,
        attestation: Slot,
    },
    /// Attestation slot is too far in the past to be included in a block.
    IncludedTooLate { state: Slot, attestation: Slot },
    /// Attestation target epoch does not match attestation slot.
    TargetEpochSlotMismatch {
        target_epoch: Epoch,
        slot_epoch: Epoch,
    },
    /// Attestation target epoch does not match the current or previous epoch.
    BadTargetEpoch,
    /// The aggregation bitfield length is not the smallest possible size to represent the
    /// committee.
    BadAggregationBitfieldLength {
        committee_len: usize,
        bitfield_len: usize,
    },
    /// The committee bits in an Electra attestation named a nonexistent committee.
    BadCommitteeBitsLength,
    /// Electra attestations must carry `data.index == 0`.
    NonZeroCommitteeIndex,
    /// There were no set aggregation bits.
    EmptyAggregationBitfield,
    /// The indexed attestation converted from this attestation was invalid.
    BadIndexedAttestation(IndexedAttestationInvalid),
}

#[derive(Debug, PartialEq, Clone)]
pub enum DepositInvalid {
    /// The deposit index does not match the state index.
    BadIndex { state: u64, deposit: u64 },
    /// The signature (proof-of-possession) does not match the given pubkey.
    BadSignature,
    /// The specified `branch` and `index` did not form a valid proof that the deposit is included
    /// in the eth1 deposit root.
    BadMerkleProof,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExitInvalid {
    /// The specified validator is not active.
    NotActive(u64),
    /// The specified validator is not in the state's validator registry.
    ValidatorUnknown(u64),
    /// The specified validator has a non-default exit epoch.
    AlreadyExited(u64),
    /// The exit is for a future epoch.
    FutureEpoch { state: Epoch, exit: Epoch },
    /// The validator has not been active for long enough.
    TooYoungToExit {
        current_epoch: Epoch,
        earliest_exit_epoch: Epoch,
    },
    /// The exit signature was not signed by the validator.
    BadSignature,
    /// The validator has pending withdrawals in the queue (Electra).
    PendingWithdrawalInQueue(u64),
}

#[derive(Debug, PartialEq, Clone)]
pub enum BlsExecutionChangeInvalid {
    /// The specified validator is not in the state's validator registry.
    ValidatorUnknown(u64),
    /// Validator does not have BLS Withdrawal credentials before this change.
    NonBlsWithdrawalCredentials,
    /// Fork or withdrawal credential prefix does not match.
    WithdrawalCredentialsMismatch,
    /// The signature was not signed by the validator's withdrawal key.
    BadSignature,
}

#[derive(Debug, PartialEq, Clone)]
pub enum WithdrawalRequestInvalid {
    /// The pubkey of the request does not correspond to a known validator.
    ValidatorUnknown(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum SyncAggregateInvalid {
    /// The aggregate signature over the selected pubkeys did not verify.
    SignatureInvalid,
    /// The infinity signature was used with a non-empty participation set.
    InfinitySignatureWithParticipants,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PayloadInvalid {
    /// The payload's parent hash does not chain to the header in the state.
    ParentHashMismatch {
        state: ExecutionBlockHash,
        payload: ExecutionBlockHash,
    },
    /// The payload's randao does not match the state's current mix.
    PrevRandaoMismatch { state: Hash256, payload: Hash256 },
    /// The payload timestamp does not match the slot.
    TimestampMismatch { expected: u64, payload: u64 },
    /// The payload fork does not match the state fork.
    ForkMismatch,
    /// Too many blob commitments rode along with the payload's block.
    TooManyBlobCommitments { found: usize, limit: usize },
}

#[derive(Debug, PartialEq, Clone)]
pub enum WithdrawalsInvalid {
    /// The payload carried a different number of withdrawals than expected.
    LengthMismatch { expected: usize, payload: usize },
    /// A payload withdrawal does not match the expected withdrawal.
    WithdrawalMismatch {
        index: usize,
        expected: Box<Withdrawal>,
        payload: Box<Withdrawal>,
    },
    /// The fork does not process withdrawals.
    UnsupportedFork,
}

impl From<BlockOperationError<IndexedAttestationInvalid>>
    for BlockOperationError<AttestationInvalid>
{
    fn from(e: BlockOperationError<IndexedAttestationInvalid>) -> Self {
        match e {
            BlockOperationError::Invalid(reason) => {
                BlockOperationError::invalid(AttestationInvalid::BadIndexedAttestation(reason))
            }
            BlockOperationError::BeaconStateError(e) => BlockOperationError::BeaconStateError(e),
            BlockOperationError::ArithError(e) => BlockOperationError::ArithError(e),
        }
    }
}
