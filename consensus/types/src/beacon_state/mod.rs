use crate::*;
use bls::{PublicKeyBytes, SignatureBytes};
use ethereum_hashing::hash;
use int_to_bytes::{int_to_bytes4, int_to_bytes8};
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError};
use ssz_derive::{Decode, Encode};
use ssz_types::BitVector;
use ssz_types::typenum::U4;
use std::sync::Arc;
use superstruct::superstruct;
use swap_or_not_shuffle::compute_shuffled_index;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

pub use self::committee_cache::{
    BeaconCommittee, CommitteeCache, OwnedBeaconCommittee, get_active_validator_indices,
};
pub use self::exit_cache::ExitCache;
pub use self::progressive_balances_cache::{EpochTotalBalances, ProgressiveBalancesCache};
pub use self::pubkey_cache::PubkeyCache;
pub use self::slashings_cache::SlashingsCache;

mod committee_cache;
mod exit_cache;
mod progressive_balances_cache;
mod pubkey_cache;
mod slashings_cache;

#[cfg(test)]
mod tests;

pub type JustificationBits = BitVector<U4>;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// A state for a different hard-fork was required -- a severe logic error.
    IncorrectStateVariant,
    EpochOutOfBounds,
    SlotOutOfBounds,
    UnknownValidator(usize),
    UnableToDetermineProducer,
    InvalidBitfield,
    ValidatorIsWithdrawable,
    UnableToShuffle,
    ShuffleIndexOutOfBounds(usize),
    InsufficientValidators,
    InsufficientRandaoMixes,
    NoCommittee {
        slot: Slot,
        index: u64,
    },
    CommitteeCacheUninitialized(Option<RelativeEpoch>),
    TotalActiveBalanceCacheUninitialized,
    TotalActiveBalanceCacheInconsistent {
        initialized_epoch: Epoch,
        current_epoch: Epoch,
    },
    PubkeyCacheIncomplete {
        cache_len: usize,
        registry_len: usize,
    },
    ExitCacheUninitialized,
    ExitCacheInvalidEpoch {
        max_exit_epoch: Epoch,
        request_epoch: Epoch,
    },
    SlashingsCacheUninitialized {
        initialized_slot: Option<Slot>,
        latest_block_slot: Slot,
    },
    ProgressiveBalancesCacheNotInitialized,
    ProgressiveBalancesCacheInconsistent,
    EpochCacheUninitialized(RelativeEpoch),
    EpochCache(EpochCacheError),
    InvalidFlagIndex(usize),
    ParticipationOutOfBounds(usize),
    InactivityScoresOutOfBounds(usize),
    BalancesOutOfBounds(usize),
    ValidatorRegistryFull,
    IncorrectAttestationSource,
    IncorrectAttestationIndex,
    ProposerLookaheadOutOfBounds(usize),
    MismatchedForkForPayloadHeader {
        state: ForkName,
        header: ForkName,
    },
    RelativeEpochError(relative_epoch::Error),
    SszTypesError(ssz_types::Error),
    TreeViewError(tree_view::Error),
    ArithError(ArithError),
    AttestationError(attestation::Error),
}

impl From<relative_epoch::Error> for Error {
    fn from(e: relative_epoch::Error) -> Error {
        Error::RelativeEpochError(e)
    }
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Error {
        Error::SszTypesError(e)
    }
}

impl From<tree_view::Error> for Error {
    fn from(e: tree_view::Error) -> Error {
        Error::TreeViewError(e)
    }
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Error {
        Error::ArithError(e)
    }
}

impl From<EpochCacheError> for Error {
    fn from(e: EpochCacheError) -> Error {
        Error::EpochCache(e)
    }
}

impl From<attestation::Error> for Error {
    fn from(e: attestation::Error) -> Error {
        Error::AttestationError(e)
    }
}

/// The state of the `BeaconChain` at some slot.
///
/// Heavy per-validator fields are tree-backed (`tree_view::List`/`Vector`),
/// so cloning a state shares structure with its origin and mutation is
/// copy-on-write. Caches ride along inside each variant and are excluded
/// from SSZ and tree hashing.
#[superstruct(
    variants(Base, Altair, Bellatrix, Capella, Deneb, Electra, Fulu),
    variant_attributes(
        derive(
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
        ),
        serde(bound = "E: EthSpec"),
    ),
    cast_error(ty = "Error", expr = "Error::IncorrectStateVariant"),
    partial_getter_error(ty = "Error", expr = "Error::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconState<E: EthSpec> {
    // Versioning
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub genesis_time: u64,
    #[superstruct(getter(copy))]
    pub genesis_validators_root: Hash256,
    #[superstruct(getter(copy))]
    pub slot: Slot,
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: Vector<Hash256, E::SlotsPerHistoricalRoot>,
    pub state_roots: Vector<Hash256, E::SlotsPerHistoricalRoot>,
    pub historical_roots: List<Hash256, E::HistoricalRootsLimit>,

    // Ethereum 1.0 chain data
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: List<Eth1Data, E::SlotsPerEth1VotingPeriod>,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub eth1_deposit_index: u64,

    // Registry
    pub validators: List<Validator, E::ValidatorRegistryLimit>,
    pub balances: List<u64, E::ValidatorRegistryLimit>,

    // Randomness
    pub randao_mixes: Vector<Hash256, E::EpochsPerHistoricalVector>,

    // Slashings
    pub slashings: Vector<u64, E::EpochsPerSlashingsVector>,

    // Attestations (genesis fork only)
    #[superstruct(only(Base))]
    pub previous_epoch_attestations:
        VariableList<PendingAttestation<E>, E::MaxPendingAttestations>,
    #[superstruct(only(Base))]
    pub current_epoch_attestations: VariableList<PendingAttestation<E>, E::MaxPendingAttestations>,

    // Participation (Altair and later)
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu))]
    pub previous_epoch_participation: List<ParticipationFlags, E::ValidatorRegistryLimit>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu))]
    pub current_epoch_participation: List<ParticipationFlags, E::ValidatorRegistryLimit>,

    // Finality
    pub justification_bits: JustificationBits,
    #[superstruct(getter(copy))]
    pub previous_justified_checkpoint: Checkpoint,
    #[superstruct(getter(copy))]
    pub current_justified_checkpoint: Checkpoint,
    #[superstruct(getter(copy))]
    pub finalized_checkpoint: Checkpoint,

    // Inactivity
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu))]
    pub inactivity_scores: List<u64, E::ValidatorRegistryLimit>,

    // Light-client sync committees
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu))]
    pub current_sync_committee: Arc<SyncCommittee<E>>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu))]
    pub next_sync_committee: Arc<SyncCommittee<E>>,

    // Execution
    #[superstruct(
        only(Bellatrix),
        partial_getter(rename = "latest_execution_payload_header_bellatrix")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderBellatrix<E>,
    #[superstruct(
        only(Capella),
        partial_getter(rename = "latest_execution_payload_header_capella")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderCapella<E>,
    #[superstruct(
        only(Deneb),
        partial_getter(rename = "latest_execution_payload_header_deneb")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderDeneb<E>,
    #[superstruct(
        only(Electra),
        partial_getter(rename = "latest_execution_payload_header_electra")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderElectra<E>,
    #[superstruct(
        only(Fulu),
        partial_getter(rename = "latest_execution_payload_header_fulu")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderFulu<E>,

    // Capella
    #[superstruct(only(Capella, Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub next_withdrawal_index: u64,
    #[superstruct(only(Capella, Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub next_withdrawal_validator_index: u64,
    #[superstruct(only(Capella, Deneb, Electra, Fulu))]
    pub historical_summaries: List<HistoricalSummary, E::HistoricalRootsLimit>,

    // Electra
    #[superstruct(only(Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_requests_start_index: u64,
    #[superstruct(only(Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_balance_to_consume: u64,
    #[superstruct(only(Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub exit_balance_to_consume: u64,
    #[superstruct(only(Electra, Fulu), partial_getter(copy))]
    pub earliest_exit_epoch: Epoch,
    #[superstruct(only(Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub consolidation_balance_to_consume: u64,
    #[superstruct(only(Electra, Fulu), partial_getter(copy))]
    pub earliest_consolidation_epoch: Epoch,
    #[superstruct(only(Electra, Fulu))]
    pub pending_deposits: List<PendingDeposit, E::PendingDepositsLimit>,
    #[superstruct(only(Electra, Fulu))]
    pub pending_partial_withdrawals:
        List<PendingPartialWithdrawal, E::PendingPartialWithdrawalsLimit>,
    #[superstruct(only(Electra, Fulu))]
    pub pending_consolidations: List<PendingConsolidation, E::PendingConsolidationsLimit>,

    // Fulu
    #[superstruct(only(Fulu))]
    pub proposer_lookahead: Vector<u64, E::ProposerLookaheadSlots>,

    // Caching (not in the spec)
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[superstruct(getter(copy))]
    pub total_active_balance: Option<(Epoch, u64)>,
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub progressive_balances_cache: ProgressiveBalancesCache,
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub committee_caches: [Arc<CommitteeCache>; CACHED_EPOCHS],
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub pubkey_cache: PubkeyCache,
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub exit_cache: ExitCache,
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub slashings_cache: SlashingsCache,
    #[serde(skip)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub epoch_cache: EpochCache,
}

impl<E: EthSpec> BeaconState<E> {
    /// Create a new genesis-flavoured state.
    ///
    /// Not a complete genesis state: it does not contain validators.
    pub fn new(genesis_time: u64, eth1_data: Eth1Data, spec: &ChainSpec) -> Self {
        BeaconState::Base(BeaconStateBase {
            // Versioning
            genesis_time,
            genesis_validators_root: Hash256::default(),
            slot: spec.genesis_slot,
            fork: Fork {
                previous_version: spec.genesis_fork_version,
                current_version: spec.genesis_fork_version,
                epoch: E::genesis_epoch(),
            },

            // History
            latest_block_header: BeaconBlock::<E>::empty_at_slot(
                ForkName::Base,
                spec.genesis_slot,
            )
            .temporary_block_header(),
            block_roots: Vector::default(),
            state_roots: Vector::default(),
            historical_roots: List::default(),

            // Eth1
            eth1_data,
            eth1_data_votes: List::default(),
            eth1_deposit_index: 0,

            // Validator registry
            validators: List::default(),
            balances: List::default(),

            // Randomness
            randao_mixes: Vector::default(),

            // Slashings
            slashings: Vector::default(),

            // Attestations
            previous_epoch_attestations: VariableList::default(),
            current_epoch_attestations: VariableList::default(),

            // Finality
            justification_bits: BitVector::new(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),

            // Caching
            total_active_balance: None,
            progressive_balances_cache: ProgressiveBalancesCache::default(),
            committee_caches: <[Arc<CommitteeCache>; CACHED_EPOCHS]>::default(),
            pubkey_cache: PubkeyCache::default(),
            exit_cache: ExitCache::default(),
            slashings_cache: SlashingsCache::default(),
            epoch_cache: EpochCache::default(),
        })
    }

    /// Returns the name of the fork pertaining to `self`, without checking
    /// it against the fork schedule.
    pub fn fork_name_unchecked(&self) -> ForkName {
        match self {
            BeaconState::Base(_) => ForkName::Base,
            BeaconState::Altair(_) => ForkName::Altair,
            BeaconState::Bellatrix(_) => ForkName::Bellatrix,
            BeaconState::Capella(_) => ForkName::Capella,
            BeaconState::Deneb(_) => ForkName::Deneb,
            BeaconState::Electra(_) => ForkName::Electra,
            BeaconState::Fulu(_) => ForkName::Fulu,
        }
    }

    /// Returns the name of the fork pertaining to `self`, checking the
    /// variant against the fork schedule at `self.slot()`.
    pub fn fork_name(&self, spec: &ChainSpec) -> Result<ForkName, InconsistentFork> {
        let fork_at_slot = spec.fork_name_at_slot::<E>(self.slot());
        let object_fork = self.fork_name_unchecked();

        if fork_at_slot == object_fork {
            Ok(object_fork)
        } else {
            Err(InconsistentFork {
                fork_at_slot,
                object_fork,
            })
        }
    }

    /// SSZ decode with fork variant determined by the fork schedule and the
    /// slot embedded in the bytes.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &ChainSpec) -> Result<Self, DecodeError> {
        let slot = Self::slot_from_ssz_bytes(bytes)?;
        Self::from_ssz_bytes_by_fork(bytes, spec.fork_name_at_slot::<E>(slot))
    }

    pub fn from_ssz_bytes_by_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, DecodeError> {
        match fork_name {
            ForkName::Base => BeaconStateBase::from_ssz_bytes(bytes).map(Self::Base),
            ForkName::Altair => BeaconStateAltair::from_ssz_bytes(bytes).map(Self::Altair),
            ForkName::Bellatrix => {
                BeaconStateBellatrix::from_ssz_bytes(bytes).map(Self::Bellatrix)
            }
            ForkName::Capella => BeaconStateCapella::from_ssz_bytes(bytes).map(Self::Capella),
            ForkName::Deneb => BeaconStateDeneb::from_ssz_bytes(bytes).map(Self::Deneb),
            ForkName::Electra => BeaconStateElectra::from_ssz_bytes(bytes).map(Self::Electra),
            ForkName::Fulu => BeaconStateFulu::from_ssz_bytes(bytes).map(Self::Fulu),
        }
    }

    /// The slot is the third field of the state, after two fixed 8/32-byte fields.
    fn slot_from_ssz_bytes(bytes: &[u8]) -> Result<Slot, DecodeError> {
        let start = <u64 as Decode>::ssz_fixed_len() + <Hash256 as Decode>::ssz_fixed_len();
        let end = start + <Slot as Decode>::ssz_fixed_len();
        let slot_bytes = bytes
            .get(start..end)
            .ok_or(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: end,
            })?;
        Slot::from_ssz_bytes(slot_bytes)
    }

    /// The epoch corresponding to `self.slot()`.
    pub fn current_epoch(&self) -> Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    /// The epoch prior to `self.current_epoch()`, clamped at genesis.
    pub fn previous_epoch(&self) -> Epoch {
        let current_epoch = self.current_epoch();
        if current_epoch > E::genesis_epoch() {
            current_epoch
                .safe_sub(1u64)
                .expect("current epoch greater than genesis implies greater than 0")
        } else {
            current_epoch
        }
    }

    /// The epoch following `self.current_epoch()`.
    pub fn next_epoch(&self) -> Result<Epoch, Error> {
        Ok(self.current_epoch().safe_add(1u64)?)
    }

    /// Returns the `tree_hash_root` of the state.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    /// Recompute any stale interior hashes and return the state root.
    ///
    /// Tree-backed fields carry their own hash caches, so only subtrees
    /// touched since the last call are re-hashed.
    pub fn update_tree_hash_cache(&mut self) -> Result<Hash256, Error> {
        Ok(self.tree_hash_root())
    }

    /*
     * Validator registry
     */

    pub fn get_validator(&self, validator_index: usize) -> Result<Validator, Error> {
        self.validators()
            .get(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    pub fn update_validator(
        &mut self,
        validator_index: usize,
        validator: Validator,
    ) -> Result<(), Error> {
        self.validators_mut()
            .set(validator_index, validator)
            .map_err(Into::into)
    }

    pub fn get_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.balances()
            .get(validator_index)
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    pub fn set_balance(&mut self, validator_index: usize, balance: u64) -> Result<(), Error> {
        self.balances_mut()
            .set(validator_index, balance)
            .map_err(Into::into)
    }

    /// Returns a list of indices of all validators active at `epoch`.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Result<Vec<usize>, Error> {
        Ok(get_active_validator_indices(self.validators().iter(), epoch))
    }

    /// Adds a new validator to the registry, returning its index.
    ///
    /// Pushes companion entries onto every per-validator list of the fork.
    pub fn add_validator_to_registry(
        &mut self,
        pubkey: PublicKeyBytes,
        withdrawal_credentials: Hash256,
        amount: u64,
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        let fork_name = self.fork_name_unchecked();
        let index = self.validators().len();

        let mut validator = Validator {
            pubkey,
            withdrawal_credentials,
            activation_eligibility_epoch: spec.far_future_epoch,
            activation_epoch: spec.far_future_epoch,
            exit_epoch: spec.far_future_epoch,
            withdrawable_epoch: spec.far_future_epoch,
            effective_balance: 0,
            slashed: false,
        };
        let max_effective_balance = validator.get_max_effective_balance(spec, fork_name);
        validator.effective_balance = std::cmp::min(
            amount.safe_sub(amount.safe_rem(spec.effective_balance_increment)?)?,
            max_effective_balance,
        );

        self.validators_mut().push(validator)?;
        self.balances_mut().push(amount)?;

        if fork_name.altair_enabled() {
            self.previous_epoch_participation_mut()?
                .push(ParticipationFlags::default())?;
            self.current_epoch_participation_mut()?
                .push(ParticipationFlags::default())?;
            self.inactivity_scores_mut()?.push(0)?;
        }

        // Keep the pubkey cache covering the whole registry if it did before.
        self.pubkey_cache_mut().insert(pubkey, index);

        Ok(index)
    }

    /// Looks up a validator index by pubkey; the pubkey cache must cover the
    /// whole registry.
    pub fn get_validator_index(&self, pubkey: &PublicKeyBytes) -> Result<Option<usize>, Error> {
        let cache_len = self.pubkey_cache().len();
        let registry_len = self.validators().len();
        if cache_len != registry_len {
            return Err(Error::PubkeyCacheIncomplete {
                cache_len,
                registry_len,
            });
        }
        Ok(self.pubkey_cache().get(pubkey))
    }

    /*
     * Block and state roots
     */

    /// Safely obtains the index for `block_roots`, if that index is valid for reading.
    fn get_latest_block_roots_index(&self, slot: Slot) -> Result<usize, Error> {
        if slot < self.slot() && self.slot() <= slot + E::slots_per_historical_root() as u64 {
            Ok(slot.as_usize().safe_rem(E::slots_per_historical_root())?)
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// Return the block root at a recent `slot`.
    pub fn get_block_root(&self, slot: Slot) -> Result<Hash256, Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        self.block_roots().get(i).ok_or(Error::SlotOutOfBounds)
    }

    /// Return the block root at a recent `epoch`.
    pub fn get_block_root_at_epoch(&self, epoch: Epoch) -> Result<Hash256, Error> {
        self.get_block_root(epoch.start_slot(E::slots_per_epoch()))
    }

    pub fn set_block_root(&mut self, slot: Slot, block_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        self.block_roots_mut().set(i, block_root)?;
        Ok(())
    }

    pub fn get_state_root(&self, slot: Slot) -> Result<Hash256, Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        self.state_roots().get(i).ok_or(Error::SlotOutOfBounds)
    }

    pub fn set_state_root(&mut self, slot: Slot, state_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        self.state_roots_mut().set(i, state_root)?;
        Ok(())
    }

    /// The block root of the decision block for proposer shuffling at the
    /// current epoch: the last block of the previous epoch.
    pub fn proposer_shuffling_decision_root(&self) -> Result<Hash256, Error> {
        let decision_slot = self
            .current_epoch()
            .start_slot(E::slots_per_epoch())
            .saturating_sub(1u64);
        if decision_slot == self.slot() {
            Ok(self.latest_block_header().canonical_root())
        } else {
            self.get_block_root(decision_slot)
        }
    }

    /*
     * Randao
     */

    /// Return the randao mix at a recent `epoch`.
    pub fn get_randao_mix(&self, epoch: Epoch) -> Result<Hash256, Error> {
        let i = epoch
            .as_usize()
            .safe_rem(E::epochs_per_historical_vector())?;
        self.randao_mixes()
            .get(i)
            .ok_or(Error::InsufficientRandaoMixes)
    }

    /// XOR-mix a new randao reveal hash into the current epoch's mix.
    pub fn update_randao_mix(&mut self, epoch: Epoch, signature_hash: Hash256) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(E::epochs_per_historical_vector())?;
        let current = self.get_randao_mix(epoch)?;
        let mut mix = [0; 32];
        for (j, byte) in mix.iter_mut().enumerate() {
            *byte = current.as_slice()[j] ^ signature_hash.as_slice()[j];
        }
        self.randao_mixes_mut().set(i, Hash256::from(mix))?;
        Ok(())
    }

    pub fn set_randao_mix(&mut self, epoch: Epoch, mix: Hash256) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(E::epochs_per_historical_vector())?;
        self.randao_mixes_mut().set(i, mix)?;
        Ok(())
    }

    /// Generate a seed for the given `epoch` and `domain`.
    pub fn get_seed(
        &self,
        epoch: Epoch,
        domain_type: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        // Bypass the safe getter for the randao mix: the seed lookahead means
        // the index wraps, by design of the historical vector length.
        let i = epoch
            .safe_add(E::epochs_per_historical_vector() as u64)?
            .safe_sub(spec.min_seed_lookahead)?
            .safe_sub(1u64)?;
        let i_mod = i.as_usize().safe_rem(E::epochs_per_historical_vector())?;
        let mix = self
            .randao_mixes()
            .get(i_mod)
            .ok_or(Error::InsufficientRandaoMixes)?;

        let domain_bytes = int_to_bytes4(spec.get_domain_constant(domain_type));
        let epoch_bytes = int_to_bytes8(epoch.as_u64());

        const NUM_DOMAIN_BYTES: usize = 4;
        const NUM_EPOCH_BYTES: usize = 8;
        const MIX_OFFSET: usize = NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES;
        const NUM_MIX_BYTES: usize = 32;

        let mut preimage = [0; NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES + NUM_MIX_BYTES];
        preimage[0..NUM_DOMAIN_BYTES].copy_from_slice(&domain_bytes);
        preimage[NUM_DOMAIN_BYTES..MIX_OFFSET].copy_from_slice(&epoch_bytes);
        preimage[MIX_OFFSET..].copy_from_slice(mix.as_slice());

        Ok(Hash256::from_slice(&hash(&preimage)))
    }

    /*
     * Slashings
     */

    pub fn get_slashings_at(&self, epoch: Epoch) -> Result<u64, Error> {
        let i = epoch.as_usize().safe_rem(E::epochs_per_slashings_vector())?;
        self.slashings().get(i).ok_or(Error::EpochOutOfBounds)
    }

    pub fn set_slashings_at(&mut self, epoch: Epoch, value: u64) -> Result<(), Error> {
        let i = epoch.as_usize().safe_rem(E::epochs_per_slashings_vector())?;
        self.slashings_mut().set(i, value)?;
        Ok(())
    }

    /// The sum of the slashings vector.
    pub fn get_total_slashings(&self) -> Result<u64, Error> {
        let mut total: u64 = 0;
        for slashing in self.slashings().iter() {
            total.safe_add_assign(slashing)?;
        }
        Ok(total)
    }

    /*
     * Participation
     */

    pub fn get_epoch_participation(
        &self,
        epoch: Epoch,
    ) -> Result<&List<ParticipationFlags, E::ValidatorRegistryLimit>, Error> {
        if epoch == self.current_epoch() {
            self.current_epoch_participation()
        } else if epoch == self.previous_epoch() {
            self.previous_epoch_participation()
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    pub fn get_epoch_participation_mut(
        &mut self,
        epoch: Epoch,
        previous_epoch: Epoch,
        current_epoch: Epoch,
    ) -> Result<&mut List<ParticipationFlags, E::ValidatorRegistryLimit>, Error> {
        if epoch == current_epoch {
            self.current_epoch_participation_mut()
        } else if epoch == previous_epoch {
            self.previous_epoch_participation_mut()
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    /*
     * Committees and proposers
     */

    /// Returns the cache for some `RelativeEpoch`, erroring if the cache is
    /// not initialized for that epoch.
    pub fn committee_cache(
        &self,
        relative_epoch: RelativeEpoch,
    ) -> Result<&Arc<CommitteeCache>, Error> {
        let i = relative_epoch.index();
        let cache = &self.committee_caches()[i];

        if cache.is_initialized_at(relative_epoch.into_epoch(self.current_epoch())) {
            Ok(cache)
        } else {
            Err(Error::CommitteeCacheUninitialized(Some(relative_epoch)))
        }
    }

    /// Build an epoch cache, unless it is has already been built.
    pub fn build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let i = relative_epoch.index();
        let epoch = relative_epoch.into_epoch(self.current_epoch());

        if !self.committee_caches()[i].is_initialized_at(epoch) {
            let cache = CommitteeCache::initialized(self, epoch, spec)?;
            self.committee_caches_mut()[i] = Arc::new(cache);
        }
        Ok(())
    }

    pub fn build_all_committee_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_committee_cache(RelativeEpoch::Previous, spec)?;
        self.build_committee_cache(RelativeEpoch::Current, spec)?;
        self.build_committee_cache(RelativeEpoch::Next, spec)?;
        Ok(())
    }

    /// Advance the committee caches when the state moves into a new epoch:
    /// current becomes previous, next becomes current.
    pub fn advance_caches(&mut self) {
        let caches = self.committee_caches_mut();
        caches.rotate_left(1);
        caches[RelativeEpoch::Next.index()] = Arc::new(CommitteeCache::default());
    }

    pub fn get_beacon_committee(
        &self,
        slot: Slot,
        index: u64,
    ) -> Result<BeaconCommittee<'_>, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        let cache = self.committee_cache(relative_epoch)?;

        cache
            .get_beacon_committee(slot, index)
            .ok_or(Error::NoCommittee { slot, index })
    }

    pub fn get_beacon_committees_at_slot(
        &self,
        slot: Slot,
    ) -> Result<Vec<BeaconCommittee<'_>>, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        let cache = self.committee_cache(relative_epoch)?;
        cache.get_beacon_committees_at_slot(slot)
    }

    pub fn get_committee_count_at_slot(&self, slot: Slot) -> Result<u64, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        Ok(self.committee_cache(relative_epoch)?.committees_per_slot())
    }

    /// Returns the beacon proposer index for `slot` in the epoch of the slot.
    pub fn get_beacon_proposer_index(
        &self,
        slot: Slot,
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());

        // Fulu states carry a precomputed lookahead for the current and next epoch.
        if let Ok(lookahead) = self.proposer_lookahead() {
            let current_epoch_start = self.current_epoch().start_slot(E::slots_per_epoch());
            if slot >= current_epoch_start {
                let position = slot.as_usize().safe_sub(current_epoch_start.as_usize())?;
                if position < lookahead.len() {
                    let proposer = lookahead
                        .get(position)
                        .ok_or(Error::ProposerLookaheadOutOfBounds(position))?;
                    return Ok(proposer as usize);
                }
            }
        }

        let indices = self.get_active_validator_indices(epoch)?;
        let seed = self.get_beacon_proposer_seed(slot, spec)?;
        self.compute_proposer_index(&indices, &seed, spec)
    }

    /// Compute the proposer indices for every slot of `epoch`.
    pub fn get_beacon_proposer_indices(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<Vec<usize>, Error> {
        let indices = self.get_active_validator_indices(epoch)?;
        epoch
            .slot_iter(E::slots_per_epoch())
            .map(|slot| {
                let seed = self.get_beacon_proposer_seed(slot, spec)?;
                self.compute_proposer_index(&indices, &seed, spec)
            })
            .collect()
    }

    /// Compute the seed to use for the beacon proposer selection at the given `slot`.
    fn get_beacon_proposer_seed(&self, slot: Slot, spec: &ChainSpec) -> Result<Vec<u8>, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let mut preimage = self
            .get_seed(epoch, Domain::BeaconProposer, spec)?
            .as_slice()
            .to_vec();
        preimage.append(&mut int_to_bytes8(slot.as_u64()));
        Ok(hash(&preimage))
    }

    /// Effective-balance-weighted sampling over `indices`.
    ///
    /// Electra widened the random value from one byte to two so that the
    /// 2048 ETH maximum effective balance keeps an unbiased sample.
    pub fn compute_proposer_index(
        &self,
        indices: &[usize],
        seed: &[u8],
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        if indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let fork_name = self.fork_name_unchecked();
        let max_effective_balance = spec.max_effective_balance_for_fork(fork_name);
        let max_random_value = if fork_name.electra_enabled() {
            u16::MAX as u64
        } else {
            u8::MAX as u64
        };

        let mut i = 0;
        loop {
            let shuffled_index = compute_shuffled_index(
                i.safe_rem(indices.len())?,
                indices.len(),
                seed,
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;
            let candidate_index = *indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;
            let random_value = self.shuffling_random_value(i, seed, fork_name)?;
            let effective_balance = self.get_validator(candidate_index)?.effective_balance;

            if effective_balance.safe_mul(max_random_value)?
                >= max_effective_balance.safe_mul(random_value)?
            {
                return Ok(candidate_index);
            }
            i.safe_add_assign(1)?;
        }
    }

    fn shuffling_random_value(
        &self,
        i: usize,
        seed: &[u8],
        fork_name: ForkName,
    ) -> Result<u64, Error> {
        if fork_name.electra_enabled() {
            Self::shuffling_random_u16(i, seed).map(u64::from)
        } else {
            Self::shuffling_random_byte(i, seed).map(u64::from)
        }
    }

    /// Get a random byte from the given `seed`.
    fn shuffling_random_byte(i: usize, seed: &[u8]) -> Result<u8, Error> {
        let mut preimage = seed.to_vec();
        preimage.append(&mut int_to_bytes8(i.safe_div(32)? as u64));
        let index = i.safe_rem(32)?;

        hash(&preimage)
            .get(index)
            .copied()
            .ok_or(Error::ShuffleIndexOutOfBounds(index))
    }

    /// Get two random bytes from the given `seed`, as a `u16`.
    fn shuffling_random_u16(i: usize, seed: &[u8]) -> Result<u16, Error> {
        let mut preimage = seed.to_vec();
        preimage.append(&mut int_to_bytes8(i.safe_div(16)? as u64));
        let offset = i.safe_rem(16)?.safe_mul(2)?;

        let digest = hash(&preimage);
        let bytes = digest
            .get(offset..offset.safe_add(2)?)
            .ok_or(Error::ShuffleIndexOutOfBounds(offset))?;
        Ok(u16::from_le_bytes(
            bytes.try_into().expect("slice is two bytes"),
        ))
    }

    /*
     * Sync committees
     */

    /// Compute the sync committee for the *next* sync committee period.
    pub fn get_next_sync_committee(&self, spec: &ChainSpec) -> Result<SyncCommittee<E>, Error> {
        let sync_committee_indices = self.get_next_sync_committee_indices(spec)?;

        let pubkeys = sync_committee_indices
            .iter()
            .map(|&index| Ok(self.get_validator(index)?.pubkey))
            .collect::<Result<Vec<PublicKeyBytes>, Error>>()?;
        let aggregate_pubkey = bls::eth_aggregate_pubkeys(&pubkeys);

        Ok(SyncCommittee {
            pubkeys: FixedVector::new(pubkeys)?,
            aggregate_pubkey,
        })
    }

    /// Effective-balance-weighted sampling of `SYNC_COMMITTEE_SIZE` indices
    /// (with repetition) for the next sync committee period.
    pub fn get_next_sync_committee_indices(
        &self,
        spec: &ChainSpec,
    ) -> Result<Vec<usize>, Error> {
        let fork_name = self.fork_name_unchecked();
        let epoch = self.current_epoch().safe_add(1u64)?;

        let active_validator_indices = self.get_active_validator_indices(epoch)?;
        let active_validator_count = active_validator_indices.len();
        if active_validator_count == 0 {
            return Err(Error::InsufficientValidators);
        }

        let seed = self.get_seed(epoch, Domain::SyncCommittee, spec)?;

        let max_effective_balance = spec.max_effective_balance_for_fork(fork_name);
        let max_random_value = if fork_name.electra_enabled() {
            u16::MAX as u64
        } else {
            u8::MAX as u64
        };

        let mut i = 0;
        let mut sync_committee_indices = Vec::with_capacity(E::sync_committee_size());
        while sync_committee_indices.len() < E::sync_committee_size() {
            let shuffled_index = compute_shuffled_index(
                i.safe_rem(active_validator_count)?,
                active_validator_count,
                seed.as_slice(),
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;
            let candidate_index = *active_validator_indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;
            let random_value = self.shuffling_random_value(i, seed.as_slice(), fork_name)?;
            let effective_balance = self.get_validator(candidate_index)?.effective_balance;

            if effective_balance.safe_mul(max_random_value)?
                >= max_effective_balance.safe_mul(random_value)?
            {
                sync_committee_indices.push(candidate_index);
            }
            i.safe_add_assign(1)?;
        }
        Ok(sync_committee_indices)
    }

    /*
     * Balances and churn
     */

    /// Implementation of `get_total_balance`, matching the spec.
    ///
    /// Returns minimum `EFFECTIVE_BALANCE_INCREMENT`, to avoid div by 0.
    pub fn get_total_balance(
        &self,
        validator_indices: &[usize],
        spec: &ChainSpec,
    ) -> Result<u64, Error> {
        let mut total = 0u64;
        for &index in validator_indices {
            total.safe_add_assign(self.get_validator(index)?.effective_balance)?;
        }
        Ok(std::cmp::max(total, spec.effective_balance_increment))
    }

    /// The total effective balance of active validators at the current
    /// epoch, from the cache.
    pub fn get_total_active_balance(&self) -> Result<u64, Error> {
        self.get_total_active_balance_at_epoch(self.current_epoch())
    }

    pub fn get_total_active_balance_at_epoch(&self, epoch: Epoch) -> Result<u64, Error> {
        let (initialized_epoch, balance) = self
            .total_active_balance()
            .ok_or(Error::TotalActiveBalanceCacheUninitialized)?;

        if initialized_epoch == epoch {
            Ok(balance)
        } else {
            Err(Error::TotalActiveBalanceCacheInconsistent {
                initialized_epoch,
                current_epoch: epoch,
            })
        }
    }

    pub fn set_total_active_balance(&mut self, epoch: Epoch, balance: u64, spec: &ChainSpec) {
        let safe_balance = std::cmp::max(balance, spec.effective_balance_increment);
        *self.total_active_balance_mut() = Some((epoch, safe_balance));
    }

    /// Build the total active balance cache for the current epoch if it is
    /// not already built.
    pub fn build_total_active_balance_cache(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        let current_epoch = self.current_epoch();
        if self
            .get_total_active_balance_at_epoch(current_epoch)
            .is_err()
        {
            let mut total = 0u64;
            for validator in self.validators().iter() {
                if validator.is_active_at(current_epoch) {
                    total.safe_add_assign(validator.effective_balance)?;
                }
            }
            self.set_total_active_balance(current_epoch, total, spec);
        }
        Ok(())
    }

    /// Return the churn limit for the current epoch (number of validators who can leave per
    /// epoch).
    pub fn get_validator_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        Ok(std::cmp::max(
            spec.min_per_epoch_churn_limit,
            (self
                .committee_cache(RelativeEpoch::Current)?
                .active_validator_count() as u64)
                .safe_div(spec.churn_limit_quotient)?,
        ))
    }

    /// Return the activation churn limit for the current epoch (number of validators who can
    /// enter per epoch). Deneb introduced a cap on top of the exit churn.
    pub fn get_activation_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        let fork_name = self.fork_name_unchecked();
        Ok(if fork_name.deneb_enabled() {
            std::cmp::min(
                spec.max_per_epoch_activation_churn_limit,
                self.get_validator_churn_limit(spec)?,
            )
        } else {
            self.get_validator_churn_limit(spec)?
        })
    }

    /*
     * Execution payload header
     */

    pub fn latest_execution_payload_header(
        &self,
    ) -> Result<ExecutionPayloadHeaderRef<'_, E>, Error> {
        match self {
            BeaconState::Base(_) | BeaconState::Altair(_) => Err(Error::IncorrectStateVariant),
            BeaconState::Bellatrix(state) => Ok(ExecutionPayloadHeaderRef::Bellatrix(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Capella(state) => Ok(ExecutionPayloadHeaderRef::Capella(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Deneb(state) => Ok(ExecutionPayloadHeaderRef::Deneb(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Electra(state) => Ok(ExecutionPayloadHeaderRef::Electra(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Fulu(state) => Ok(ExecutionPayloadHeaderRef::Fulu(
                &state.latest_execution_payload_header,
            )),
        }
    }

    /// Replace the latest payload header with one from a processed payload of
    /// the same fork.
    pub fn set_latest_execution_payload_header(
        &mut self,
        header: ExecutionPayloadHeader<E>,
    ) -> Result<(), Error> {
        match (self, header) {
            (BeaconState::Bellatrix(state), ExecutionPayloadHeader::Bellatrix(header)) => {
                state.latest_execution_payload_header = header;
                Ok(())
            }
            (BeaconState::Capella(state), ExecutionPayloadHeader::Capella(header)) => {
                state.latest_execution_payload_header = header;
                Ok(())
            }
            (BeaconState::Deneb(state), ExecutionPayloadHeader::Deneb(header)) => {
                state.latest_execution_payload_header = header;
                Ok(())
            }
            (BeaconState::Electra(state), ExecutionPayloadHeader::Electra(header)) => {
                state.latest_execution_payload_header = header;
                Ok(())
            }
            (BeaconState::Fulu(state), ExecutionPayloadHeader::Fulu(header)) => {
                state.latest_execution_payload_header = header;
                Ok(())
            }
            (state, header) => Err(Error::MismatchedForkForPayloadHeader {
                state: state.fork_name_unchecked(),
                header: header.fork_name(),
            }),
        }
    }

    /*
     * Electra balance queues
     */

    /// The sum of the amounts queued for withdrawal by `validator_index`.
    pub fn get_pending_balance_to_withdraw(&self, validator_index: usize) -> Result<u64, Error> {
        let mut pending_balance = 0u64;
        for withdrawal in self.pending_partial_withdrawals()?.iter() {
            if withdrawal.validator_index as usize == validator_index {
                pending_balance.safe_add_assign(withdrawal.amount)?;
            }
        }
        Ok(pending_balance)
    }

    /// Move any balance above the minimum activation balance into the
    /// pending-deposit queue.
    ///
    /// The queued entry carries the infinity signature and the genesis slot,
    /// marking it as an internal transfer rather than a deposit request.
    pub fn queue_excess_active_balance(
        &mut self,
        validator_index: usize,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let balance = self.get_balance(validator_index)?;
        if balance > spec.min_activation_balance {
            let excess_balance = balance.safe_sub(spec.min_activation_balance)?;
            self.set_balance(validator_index, spec.min_activation_balance)?;
            let validator = self.get_validator(validator_index)?;
            self.pending_deposits_mut()?.push(PendingDeposit {
                pubkey: validator.pubkey,
                withdrawal_credentials: validator.withdrawal_credentials,
                amount: excess_balance,
                signature: SignatureBytes::infinity(),
                slot: spec.genesis_slot,
            })?;
        }
        Ok(())
    }

    /// Change a validator's withdrawal credentials to the compounding (0x02)
    /// prefix and queue its excess balance.
    pub fn switch_to_compounding_validator(
        &mut self,
        validator_index: usize,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let mut validator = self.get_validator(validator_index)?;
        let mut credentials = validator.withdrawal_credentials.0;
        credentials[0] = spec.compounding_withdrawal_prefix_byte;
        validator.withdrawal_credentials = Hash256::from(credentials);
        self.update_validator(validator_index, validator)?;
        self.queue_excess_active_balance(validator_index, spec)
    }

    /*
     * Finality
     */

    /// Is the state in an inactivity leak, i.e. have more than
    /// `MIN_EPOCHS_TO_INACTIVITY_PENALTY` epochs passed since finality?
    pub fn is_in_inactivity_leak(
        &self,
        previous_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<bool, Error> {
        Ok(
            (previous_epoch.safe_sub(self.finalized_checkpoint().epoch)?).as_u64()
                > spec.min_epochs_to_inactivity_penalty,
        )
    }

    /*
     * Remaining caches
     */

    /// Build every cache a fully-processed state is expected to carry.
    pub fn build_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_all_committee_caches(spec)?;
        self.build_total_active_balance_cache(spec)?;
        self.update_pubkey_cache()?;
        self.build_exit_cache(spec)?;
        self.build_slashings_cache()?;
        Ok(())
    }

    /// Build the exit cache, if it needs to be built.
    pub fn build_exit_cache(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        if self.exit_cache().check_initialized().is_err() {
            let validators = self.validators().to_vec();
            *self.exit_cache_mut() = ExitCache::new(validators.iter(), spec)?;
        }
        Ok(())
    }

    /// Build the slashings cache if it needs to be built.
    pub fn build_slashings_cache(&mut self) -> Result<(), Error> {
        let latest_block_slot = self.latest_block_header().slot;
        if self.slashings_cache().is_initialized(latest_block_slot).is_err() {
            let validators = self.validators().to_vec();
            *self.slashings_cache_mut() = SlashingsCache::new(latest_block_slot, validators.iter());
        }
        Ok(())
    }

    /// Updates the pubkey cache, if required.
    ///
    /// Adds all `pubkeys` from the `validators` which are not already in the cache. Will
    /// never re-add a pubkey.
    pub fn update_pubkey_cache(&mut self) -> Result<(), Error> {
        let start = self.pubkey_cache().len();
        let pubkeys: Vec<(usize, PublicKeyBytes)> = self
            .validators()
            .iter_from(start)?
            .enumerate()
            .map(|(offset, validator)| (start + offset, validator.pubkey))
            .collect();
        for (index, pubkey) in pubkeys {
            if !self.pubkey_cache_mut().insert(pubkey, index) {
                return Err(Error::PubkeyCacheIncomplete {
                    cache_len: index,
                    registry_len: self.validators().len(),
                });
            }
        }
        Ok(())
    }

    /// Drop every derived cache, forcing reconstruction on next use. The
    /// tree-backed fields are untouched, so the state root is unchanged.
    pub fn drop_all_caches(&mut self) {
        *self.total_active_balance_mut() = None;
        *self.committee_caches_mut() = <[Arc<CommitteeCache>; CACHED_EPOCHS]>::default();
        *self.pubkey_cache_mut() = PubkeyCache::default();
        *self.exit_cache_mut() = ExitCache::default();
        *self.slashings_cache_mut() = SlashingsCache::default();
        *self.progressive_balances_cache_mut() = ProgressiveBalancesCache::default();
        *self.epoch_cache_mut() = EpochCache::default();
    }

    /// Clear the element caches of the tree-backed validator and balance
    /// lists. An identity on the state root; used to test exactly that.
    pub fn clear_tree_caches(&mut self) {
        self.validators().clear_cache();
        self.balances().clear_cache();
    }

    /// Whether the heavy tree-backed lists currently hold decoded elements.
    ///
    /// Feeds the populated-cache hit/miss metrics around the state transition.
    pub fn tree_caches_populated(&self) -> (bool, bool) {
        (
            !self.validators().is_cache_empty(),
            !self.balances().is_cache_empty(),
        )
    }
}

