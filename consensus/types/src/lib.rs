//! Types for the beacon chain consensus core.
//!
//! One file per type, fork-variant families via `superstruct`. Heavy
//! per-validator state fields use the tree-backed collections from
//! `tree_view`; block-side collections stay on `ssz_types`.

// Required for big type-level numbers
#![recursion_limit = "128"]

pub mod consts;

pub mod activation_queue;
pub mod attestation;
pub mod attestation_data;
pub mod attester_slashing;
pub mod beacon_block;
pub mod beacon_block_body;
pub mod beacon_block_header;
pub mod beacon_state;
pub mod bls_to_execution_change;
pub mod chain_spec;
pub mod checkpoint;
pub mod deposit;
pub mod deposit_data;
pub mod deposit_message;
pub mod eth1_data;
pub mod eth_spec;
pub mod execution_block_hash;
pub mod execution_payload;
pub mod execution_payload_header;
pub mod execution_requests;
pub mod fork;
pub mod fork_name;
pub mod historical_batch;
pub mod historical_summary;
pub mod indexed_attestation;
pub mod kzg_commitment;
pub mod participation_flags;
pub mod pending_attestation;
pub mod pending_consolidation;
pub mod pending_deposit;
pub mod pending_partial_withdrawal;
pub mod proposer_slashing;
pub mod relative_epoch;
pub mod signed_beacon_block;
pub mod signed_beacon_block_header;
pub mod signed_bls_to_execution_change;
pub mod signed_voluntary_exit;
pub mod signing_data;
pub mod slot_epoch;
pub mod sync_aggregate;
pub mod sync_committee;
pub mod validator;
pub mod voluntary_exit;
pub mod withdrawal;

mod epoch_cache;

pub use crate::activation_queue::ActivationQueue;
pub use crate::attestation::{
    Attestation, AttestationBase, AttestationElectra, AttestationRef, Error as AttestationError,
};
pub use crate::attestation_data::AttestationData;
pub use crate::attester_slashing::{
    AttesterSlashing, AttesterSlashingBase, AttesterSlashingElectra, AttesterSlashingRef,
};
pub use crate::beacon_block::{
    BeaconBlock, BeaconBlockAltair, BeaconBlockBase, BeaconBlockBellatrix, BeaconBlockCapella,
    BeaconBlockDeneb, BeaconBlockElectra, BeaconBlockFulu, BeaconBlockRef,
};
pub use crate::beacon_block_body::{
    BeaconBlockBody, BeaconBlockBodyAltair, BeaconBlockBodyBase, BeaconBlockBodyBellatrix,
    BeaconBlockBodyCapella, BeaconBlockBodyDeneb, BeaconBlockBodyElectra, BeaconBlockBodyFulu,
    BeaconBlockBodyRef, KzgCommitments,
};
pub use crate::beacon_block_header::BeaconBlockHeader;
pub use crate::beacon_state::{
    BeaconCommittee, BeaconState, BeaconStateAltair, BeaconStateBase, BeaconStateBellatrix,
    BeaconStateCapella, BeaconStateDeneb, BeaconStateElectra, BeaconStateFulu, CommitteeCache,
    Error, Error as BeaconStateError, ExitCache, EpochTotalBalances, JustificationBits,
    OwnedBeaconCommittee, ProgressiveBalancesCache, PubkeyCache, SlashingsCache,
    get_active_validator_indices,
};
pub use crate::bls_to_execution_change::BlsToExecutionChange;
pub use crate::chain_spec::{ChainSpec, Domain, ForkData};
pub use crate::checkpoint::Checkpoint;
pub use crate::deposit::{DEPOSIT_TREE_DEPTH, Deposit};
pub use crate::deposit_data::DepositData;
pub use crate::deposit_message::DepositMessage;
pub use crate::epoch_cache::{EpochCache, EpochCacheError, EpochCacheKey};
pub use crate::eth1_data::Eth1Data;
pub use crate::eth_spec::{EthSpec, EthSpecId, MainnetEthSpec, MinimalEthSpec};
pub use crate::execution_block_hash::ExecutionBlockHash;
pub use crate::execution_payload::{
    ExecutionPayload, ExecutionPayloadBellatrix, ExecutionPayloadCapella, ExecutionPayloadDeneb,
    ExecutionPayloadElectra, ExecutionPayloadFulu, ExecutionPayloadRef, Transaction, Transactions,
    Withdrawals,
};
pub use crate::execution_payload_header::{
    ExecutionPayloadHeader, ExecutionPayloadHeaderBellatrix, ExecutionPayloadHeaderCapella,
    ExecutionPayloadHeaderDeneb, ExecutionPayloadHeaderElectra, ExecutionPayloadHeaderFulu,
    ExecutionPayloadHeaderRef,
};
pub use crate::execution_requests::{
    ConsolidationRequest, DepositRequest, ExecutionRequests, WithdrawalRequest,
};
pub use crate::fork::Fork;
pub use crate::fork_name::{ForkName, InconsistentFork};
pub use crate::historical_batch::HistoricalBatch;
pub use crate::historical_summary::HistoricalSummary;
pub use crate::indexed_attestation::{
    IndexedAttestation, IndexedAttestationBase, IndexedAttestationElectra,
};
pub use crate::kzg_commitment::{KzgCommitment, VERSIONED_HASH_VERSION_KZG};
pub use crate::participation_flags::ParticipationFlags;
pub use crate::pending_attestation::PendingAttestation;
pub use crate::pending_consolidation::PendingConsolidation;
pub use crate::pending_deposit::PendingDeposit;
pub use crate::pending_partial_withdrawal::PendingPartialWithdrawal;
pub use crate::proposer_slashing::ProposerSlashing;
pub use crate::relative_epoch::{CACHED_EPOCHS, Error as RelativeEpochError, RelativeEpoch};
pub use crate::signed_beacon_block::SignedBeaconBlock;
pub use crate::signed_beacon_block_header::SignedBeaconBlockHeader;
pub use crate::signed_bls_to_execution_change::SignedBlsToExecutionChange;
pub use crate::signed_voluntary_exit::SignedVoluntaryExit;
pub use crate::signing_data::{SignedRoot, SigningData};
pub use crate::slot_epoch::{Epoch, Slot};
pub use crate::sync_aggregate::SyncAggregate;
pub use crate::sync_committee::SyncCommittee;
pub use crate::validator::Validator;
pub use crate::voluntary_exit::VoluntaryExit;
pub use crate::withdrawal::Withdrawal;

pub use fixed_bytes::{Address, FixedBytesExtended, Hash256, Uint256};
pub use ssz_types::{BitList, BitVector, FixedVector, VariableList, typenum, typenum::Unsigned};
pub use superstruct::superstruct;
pub use tree_view::{List, PoolHandle, Vector};

/// 32 bytes of arbitrary data included with each block.
pub type Graffiti = Hash256;
