use crate::{ChainSpec, Epoch, Slot};
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz_types::typenum::{
    U1, U2, U4, U8, U16, U32, U64, U128, U256, U512, U1024, U2048, U4096, U8192, U65536,
    U131072, U262144, U1048576, U16777216, U134217728, U1073741824, U1099511627776, Unsigned,
};
use std::fmt::{self, Debug};
use std::str::FromStr;

const MAINNET: &str = "mainnet";
const MINIMAL: &str = "minimal";

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum EthSpecId {
    Mainnet,
    Minimal,
}

impl FromStr for EthSpecId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MAINNET => Ok(EthSpecId::Mainnet),
            MINIMAL => Ok(EthSpecId::Minimal),
            _ => Err(format!("Unknown eth spec: {}", s)),
        }
    }
}

impl fmt::Display for EthSpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EthSpecId::Mainnet => MAINNET,
            EthSpecId::Minimal => MINIMAL,
        };
        write!(f, "{}", s)
    }
}

/// The type-level preset: list limits and vector lengths as `typenum`
/// unsigned integers, so SSZ types can be sized at compile time.
pub trait EthSpec:
    'static + Default + Sync + Send + Clone + Debug + PartialEq + Eq + std::hash::Hash
{
    /*
     * Misc
     */
    type MaxValidatorsPerCommittee: Unsigned
        + Clone
        + Sync
        + Send
        + Debug
        + PartialEq
        + Eq
        + std::hash::Hash;
    type MaxCommitteesPerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxValidatorsPerSlot: Unsigned
        + Clone
        + Sync
        + Send
        + Debug
        + PartialEq
        + Eq
        + std::hash::Hash;
    /*
     * Time parameters
     */
    type SlotsPerEpoch: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type EpochsPerEth1VotingPeriod: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SlotsPerEth1VotingPeriod: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SlotsPerHistoricalRoot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * State list lengths
     */
    type EpochsPerHistoricalVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type EpochsPerSlashingsVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type HistoricalRootsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type ValidatorRegistryLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Max operations per block
     */
    type MaxProposerSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttesterSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxDeposits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxVoluntaryExits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Derived values (set these CAREFULLY)
     */
    /// The length of the `{previous,current}_epoch_attestations` lists.
    ///
    /// Must be set to `MaxAttestations * SlotsPerEpoch`.
    type MaxPendingAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * New in Altair
     */
    type SyncCommitteeSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * New in Bellatrix
     */
    type MaxBytesPerTransaction: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxTransactionsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerLogsBloom: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxExtraDataBytes: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * New in Capella
     */
    type MaxBlsToExecutionChanges: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxWithdrawalsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * New in Deneb
     */
    type MaxBlobCommitmentsPerBlock: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * New in Electra
     */
    type MaxAttesterSlashingsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttestationsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type PendingDepositsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type PendingPartialWithdrawalsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type PendingConsolidationsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxDepositRequestsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxWithdrawalRequestsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxConsolidationRequestsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * New in Fulu
     */
    /// Must be set to `(MinSeedLookahead + 1) * SlotsPerEpoch`.
    type ProposerLookaheadSlots: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;

    fn default_spec() -> ChainSpec;

    fn spec_id() -> EthSpecId;

    /// Returns the `SLOTS_PER_EPOCH` constant for this specification.
    ///
    /// Spec v0.12.1
    fn slots_per_epoch() -> u64 {
        Self::SlotsPerEpoch::to_u64()
    }

    fn genesis_epoch() -> Epoch {
        Epoch::new(0)
    }

    /// Returns the number of committees per slot for the given number of
    /// active validator indices.
    fn get_committee_count_per_slot(
        active_validator_count: usize,
        spec: &ChainSpec,
    ) -> Result<usize, ArithError> {
        let slots_per_epoch = Self::SlotsPerEpoch::to_usize();

        Ok(std::cmp::max(
            1,
            std::cmp::min(
                spec.max_committees_per_slot,
                active_validator_count
                    .safe_div(slots_per_epoch)?
                    .safe_div(spec.target_committee_size)?,
            ),
        ))
    }

    /// Returns the minimum number of validators required for this spec.
    ///
    /// This is the _absolute_ minimum, the number required to make the calculations of the spec
    /// valid. It is not the recommended number.
    fn minimum_validator_count() -> usize {
        Self::SlotsPerEpoch::to_usize()
    }

    fn slots_per_eth1_voting_period() -> usize {
        Self::SlotsPerEth1VotingPeriod::to_usize()
    }

    fn slots_per_historical_root() -> usize {
        Self::SlotsPerHistoricalRoot::to_usize()
    }

    fn epochs_per_historical_vector() -> usize {
        Self::EpochsPerHistoricalVector::to_usize()
    }

    fn epochs_per_slashings_vector() -> usize {
        Self::EpochsPerSlashingsVector::to_usize()
    }

    fn validator_registry_limit() -> usize {
        Self::ValidatorRegistryLimit::to_usize()
    }

    fn sync_committee_size() -> usize {
        Self::SyncCommitteeSize::to_usize()
    }

    fn max_deposits() -> usize {
        Self::MaxDeposits::to_usize()
    }

    fn max_extra_data_bytes() -> usize {
        Self::MaxExtraDataBytes::to_usize()
    }

    fn max_bytes_per_transaction() -> usize {
        Self::MaxBytesPerTransaction::to_usize()
    }

    fn max_transactions_per_payload() -> usize {
        Self::MaxTransactionsPerPayload::to_usize()
    }

    fn max_withdrawals_per_payload() -> usize {
        Self::MaxWithdrawalsPerPayload::to_usize()
    }

    fn max_blob_commitments_per_block() -> usize {
        Self::MaxBlobCommitmentsPerBlock::to_usize()
    }

    fn pending_deposits_limit() -> usize {
        Self::PendingDepositsLimit::to_usize()
    }

    fn proposer_lookahead_slots() -> usize {
        Self::ProposerLookaheadSlots::to_usize()
    }

    /// The first slot of the epoch `current_epoch - MIN_SEED_LOOKAHEAD`, clamped at genesis.
    fn compute_start_slot_at_epoch(epoch: Epoch) -> Slot {
        epoch.start_slot(Self::slots_per_epoch())
    }
}

/// Macro to inherit some type values from another EthSpec.
#[macro_export]
macro_rules! params_from_eth_spec {
    ($spec_ty:ty { $($ty_name:ident),+ }) => {
        $(type $ty_name = <$spec_ty as EthSpec>::$ty_name;)+
    }
}

/// Ethereum Foundation specifications.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct MainnetEthSpec;

impl EthSpec for MainnetEthSpec {
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U64;
    type MaxValidatorsPerSlot = U131072;
    type SlotsPerEpoch = U32;
    type EpochsPerEth1VotingPeriod = U64;
    type SlotsPerEth1VotingPeriod = U2048; // 64 epochs * 32 slots
    type SlotsPerHistoricalRoot = U8192;
    type EpochsPerHistoricalVector = U65536;
    type EpochsPerSlashingsVector = U8192;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttestations = U128;
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxPendingAttestations = U4096; // 128 max attestations * 32 slots per epoch
    type SyncCommitteeSize = U512;
    type MaxBytesPerTransaction = U1073741824; // 1,073,741,824
    type MaxTransactionsPerPayload = U1048576; // 1,048,576
    type BytesPerLogsBloom = U256;
    type MaxExtraDataBytes = U32;
    type MaxBlsToExecutionChanges = U16;
    type MaxWithdrawalsPerPayload = U16;
    type MaxBlobCommitmentsPerBlock = U4096;
    type MaxAttesterSlashingsElectra = U1;
    type MaxAttestationsElectra = U8;
    type PendingDepositsLimit = U134217728;
    type PendingPartialWithdrawalsLimit = U134217728;
    type PendingConsolidationsLimit = U262144;
    type MaxDepositRequestsPerPayload = U8192;
    type MaxWithdrawalRequestsPerPayload = U16;
    type MaxConsolidationRequestsPerPayload = U2;
    type ProposerLookaheadSlots = U64; // (1 min seed lookahead + 1) * 32 slots

    fn default_spec() -> ChainSpec {
        ChainSpec::mainnet()
    }

    fn spec_id() -> EthSpecId {
        EthSpecId::Mainnet
    }
}

/// Ethereum Foundation minimal spec, as defined in the eth2.0-specs repo.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct MinimalEthSpec;

impl EthSpec for MinimalEthSpec {
    type MaxCommitteesPerSlot = U4;
    type MaxValidatorsPerSlot = U8192;
    type SlotsPerEpoch = U8;
    type EpochsPerEth1VotingPeriod = U4;
    type SlotsPerEth1VotingPeriod = U32; // 4 epochs * 8 slots
    type SlotsPerHistoricalRoot = U64;
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type MaxPendingAttestations = U1024; // 128 max attestations * 8 slots per epoch
    type SyncCommitteeSize = U32;
    type MaxWithdrawalsPerPayload = U4;
    type MaxBlobCommitmentsPerBlock = U16;
    type MaxDepositRequestsPerPayload = U4;
    type MaxWithdrawalRequestsPerPayload = U2;
    type MaxConsolidationRequestsPerPayload = U1;
    type PendingPartialWithdrawalsLimit = U64;
    type PendingConsolidationsLimit = U64;
    type ProposerLookaheadSlots = U16; // (1 min seed lookahead + 1) * 8 slots

    params_from_eth_spec!(MainnetEthSpec {
        MaxValidatorsPerCommittee,
        HistoricalRootsLimit,
        ValidatorRegistryLimit,
        MaxProposerSlashings,
        MaxAttesterSlashings,
        MaxAttestations,
        MaxDeposits,
        MaxVoluntaryExits,
        MaxBytesPerTransaction,
        MaxTransactionsPerPayload,
        BytesPerLogsBloom,
        MaxExtraDataBytes,
        MaxBlsToExecutionChanges,
        MaxAttesterSlashingsElectra,
        MaxAttestationsElectra,
        PendingDepositsLimit
    });

    fn default_spec() -> ChainSpec {
        ChainSpec::minimal()
    }

    fn spec_id() -> EthSpecId {
        EthSpecId::Minimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_slots_per_epoch() {
        assert_eq!(MainnetEthSpec::slots_per_epoch(), 32);
        assert_eq!(MinimalEthSpec::slots_per_epoch(), 8);
    }

    #[test]
    fn derived_lengths_are_consistent() {
        assert_eq!(
            MainnetEthSpec::slots_per_eth1_voting_period(),
            64 * 32,
        );
        assert_eq!(MinimalEthSpec::slots_per_eth1_voting_period(), 4 * 8);
        assert_eq!(
            MainnetEthSpec::proposer_lookahead_slots(),
            2 * MainnetEthSpec::slots_per_epoch() as usize
        );
        assert_eq!(
            MinimalEthSpec::proposer_lookahead_slots(),
            2 * MinimalEthSpec::slots_per_epoch() as usize
        );
    }

    #[test]
    fn committee_count_per_slot_bounds() {
        let spec = MainnetEthSpec::default_spec();
        // Tiny validator set: still at least one committee.
        assert_eq!(
            MainnetEthSpec::get_committee_count_per_slot(1, &spec).unwrap(),
            1
        );
        // Enormous validator set: capped by max committees.
        assert_eq!(
            MainnetEthSpec::get_committee_count_per_slot(100_000_000, &spec).unwrap(),
            spec.max_committees_per_slot
        );
    }
}
