use crate::{Epoch, EthSpec, ForkName, Hash256, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use std::time::Duration;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// Each of the BLS signature domains.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Domain {
    BeaconProposer,
    BeaconAttester,
    Randao,
    Deposit,
    VoluntaryExit,
    SelectionProof,
    AggregateAndProof,
    SyncCommittee,
    SyncCommitteeSelectionProof,
    ContributionAndProof,
    BlsToExecutionChange,
}

/// Specifies a fork which allows nodes to identify each other on the network.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct ForkData {
    #[serde(with = "serde_utils::bytes_4_hex")]
    pub current_version: [u8; 4],
    pub genesis_validators_root: Hash256,
}

/// Holds all the "constants" for a BeaconChain.
///
/// Chain specs are split into a main `ChainSpec` struct with one field per
/// constant, and constructors for the mainnet and minimal presets.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSpec {
    /*
     * Constants
     */
    pub genesis_slot: Slot,
    pub far_future_epoch: Epoch,
    pub base_rewards_per_epoch: u64,
    pub deposit_contract_tree_depth: u64,

    /*
     * Misc
     */
    pub max_committees_per_slot: usize,
    pub target_committee_size: usize,
    pub min_per_epoch_churn_limit: u64,
    pub churn_limit_quotient: u64,
    pub shuffle_round_count: u8,

    /*
     * Gwei values
     */
    pub min_deposit_amount: u64,
    pub max_effective_balance: u64,
    pub ejection_balance: u64,
    pub effective_balance_increment: u64,
    pub hysteresis_quotient: u64,
    pub hysteresis_downward_multiplier: u64,
    pub hysteresis_upward_multiplier: u64,

    /*
     * Initial values
     */
    pub bls_withdrawal_prefix_byte: u8,
    pub eth1_address_withdrawal_prefix_byte: u8,
    pub compounding_withdrawal_prefix_byte: u8,

    /*
     * Time parameters
     */
    pub genesis_delay: u64,
    pub seconds_per_slot: u64,
    pub min_attestation_inclusion_delay: u64,
    pub min_seed_lookahead: Epoch,
    pub max_seed_lookahead: Epoch,
    pub min_epochs_to_inactivity_penalty: u64,
    pub min_validator_withdrawability_delay: Epoch,
    pub shard_committee_period: u64,
    pub maximum_gossip_clock_disparity_millis: u64,

    /*
     * Reward and penalty quotients
     */
    pub base_reward_factor: u64,
    pub whistleblower_reward_quotient: u64,
    pub proposer_reward_quotient: u64,
    pub inactivity_penalty_quotient: u64,
    pub min_slashing_penalty_quotient: u64,
    pub proportional_slashing_multiplier: u64,

    /*
     * Signature domains
     */
    pub domain_beacon_proposer: u32,
    pub domain_beacon_attester: u32,
    pub domain_randao: u32,
    pub domain_deposit: u32,
    pub domain_voluntary_exit: u32,
    pub domain_selection_proof: u32,
    pub domain_aggregate_and_proof: u32,
    pub domain_bls_to_execution_change: u32,

    /*
     * Fork schedule
     */
    pub genesis_fork_version: [u8; 4],
    pub altair_fork_version: [u8; 4],
    pub altair_fork_epoch: Option<Epoch>,
    pub bellatrix_fork_version: [u8; 4],
    pub bellatrix_fork_epoch: Option<Epoch>,
    pub capella_fork_version: [u8; 4],
    pub capella_fork_epoch: Option<Epoch>,
    pub deneb_fork_version: [u8; 4],
    pub deneb_fork_epoch: Option<Epoch>,
    pub electra_fork_version: [u8; 4],
    pub electra_fork_epoch: Option<Epoch>,
    pub fulu_fork_version: [u8; 4],
    pub fulu_fork_epoch: Option<Epoch>,

    /*
     * Altair
     */
    pub inactivity_penalty_quotient_altair: u64,
    pub min_slashing_penalty_quotient_altair: u64,
    pub proportional_slashing_multiplier_altair: u64,
    pub epochs_per_sync_committee_period: Epoch,
    pub inactivity_score_bias: u64,
    pub inactivity_score_recovery_rate: u64,
    pub domain_sync_committee: u32,
    pub domain_sync_committee_selection_proof: u32,
    pub domain_contribution_and_proof: u32,

    /*
     * Bellatrix
     */
    pub inactivity_penalty_quotient_bellatrix: u64,
    pub min_slashing_penalty_quotient_bellatrix: u64,
    pub proportional_slashing_multiplier_bellatrix: u64,

    /*
     * Deneb
     */
    pub max_per_epoch_activation_churn_limit: u64,

    /*
     * Capella
     */
    pub max_validators_per_withdrawals_sweep: u64,

    /*
     * Electra
     */
    pub min_activation_balance: u64,
    pub max_effective_balance_electra: u64,
    pub min_slashing_penalty_quotient_electra: u64,
    pub whistleblower_reward_quotient_electra: u64,
    pub min_per_epoch_churn_limit_electra: u64,
    pub max_per_epoch_activation_exit_churn_limit: u64,
    pub max_pending_partials_per_withdrawals_sweep: u64,
    pub max_pending_deposits_per_epoch: u64,
}

impl ChainSpec {
    /// The epoch at which `fork_name` activates, if scheduled.
    pub fn fork_epoch(&self, fork_name: ForkName) -> Option<Epoch> {
        match fork_name {
            ForkName::Base => Some(Epoch::new(0)),
            ForkName::Altair => self.altair_fork_epoch,
            ForkName::Bellatrix => self.bellatrix_fork_epoch,
            ForkName::Capella => self.capella_fork_epoch,
            ForkName::Deneb => self.deneb_fork_epoch,
            ForkName::Electra => self.electra_fork_epoch,
            ForkName::Fulu => self.fulu_fork_epoch,
        }
    }

    /// Returns the name of the fork which is active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        let mut result = ForkName::Base;
        for fork in ForkName::list_all() {
            if let Some(fork_epoch) = self.fork_epoch(fork) {
                if epoch >= fork_epoch {
                    result = fork;
                }
            }
        }
        result
    }

    /// Returns the name of the fork which is active at `slot`.
    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    /// Returns the fork version of `fork_name`.
    pub fn fork_version_for_name(&self, fork_name: ForkName) -> [u8; 4] {
        match fork_name {
            ForkName::Base => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
            ForkName::Bellatrix => self.bellatrix_fork_version,
            ForkName::Capella => self.capella_fork_version,
            ForkName::Deneb => self.deneb_fork_version,
            ForkName::Electra => self.electra_fork_version,
            ForkName::Fulu => self.fulu_fork_version,
        }
    }

    /// For a given fork name, return the epoch at which it activates and the
    /// *next* scheduled fork boundary, if any.
    pub fn next_fork_epoch(&self, current_fork: ForkName) -> Option<(ForkName, Epoch)> {
        let next = current_fork.next_fork()?;
        self.fork_epoch(next).map(|epoch| (next, epoch))
    }

    /// The clock tolerance applied when accepting objects slightly ahead of
    /// the local clock.
    pub fn maximum_gossip_clock_disparity(&self) -> Duration {
        Duration::from_millis(self.maximum_gossip_clock_disparity_millis)
    }

    pub fn inactivity_penalty_quotient_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.bellatrix_enabled() {
            self.inactivity_penalty_quotient_bellatrix
        } else if fork_name.altair_enabled() {
            self.inactivity_penalty_quotient_altair
        } else {
            self.inactivity_penalty_quotient
        }
    }

    pub fn min_slashing_penalty_quotient_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.electra_enabled() {
            self.min_slashing_penalty_quotient_electra
        } else if fork_name.bellatrix_enabled() {
            self.min_slashing_penalty_quotient_bellatrix
        } else if fork_name.altair_enabled() {
            self.min_slashing_penalty_quotient_altair
        } else {
            self.min_slashing_penalty_quotient
        }
    }

    pub fn proportional_slashing_multiplier_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.bellatrix_enabled() {
            self.proportional_slashing_multiplier_bellatrix
        } else if fork_name.altair_enabled() {
            self.proportional_slashing_multiplier_altair
        } else {
            self.proportional_slashing_multiplier
        }
    }

    pub fn whistleblower_reward_quotient_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.electra_enabled() {
            self.whistleblower_reward_quotient_electra
        } else {
            self.whistleblower_reward_quotient
        }
    }

    pub fn max_effective_balance_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.electra_enabled() {
            self.max_effective_balance_electra
        } else {
            self.max_effective_balance
        }
    }

    /// Electra churn limit in Gwei, based on the total active balance.
    pub fn get_balance_churn_limit(
        &self,
        total_active_balance: u64,
    ) -> Result<u64, safe_arith::ArithError> {
        use safe_arith::SafeArith;
        let churn = std::cmp::max(
            self.min_per_epoch_churn_limit_electra,
            total_active_balance.safe_div(self.churn_limit_quotient)?,
        );
        churn
            .safe_sub(churn.safe_rem(self.effective_balance_increment)?)
    }

    /// Electra activation/exit churn limit, capped by
    /// `max_per_epoch_activation_exit_churn_limit`.
    pub fn get_activation_exit_churn_limit(
        &self,
        total_active_balance: u64,
    ) -> Result<u64, safe_arith::ArithError> {
        Ok(std::cmp::min(
            self.max_per_epoch_activation_exit_churn_limit,
            self.get_balance_churn_limit(total_active_balance)?,
        ))
    }

    /// Gets the domain for a message, given its epoch and the fork state.
    pub fn get_domain(
        &self,
        epoch: Epoch,
        domain: Domain,
        fork: &crate::Fork,
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let fork_version = fork.get_fork_version(epoch);
        self.compute_domain(domain, fork_version, genesis_validators_root)
    }

    /// Deposits are valid across forks and use the genesis fork version.
    pub fn get_deposit_domain(&self) -> Hash256 {
        self.compute_domain(Domain::Deposit, self.genesis_fork_version, Hash256::default())
    }

    /// Compute a domain by applying the given `fork_version`.
    pub fn compute_domain(
        &self,
        domain: Domain,
        fork_version: [u8; 4],
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let domain_constant = self.as_u32(domain);

        let mut domain = [0; 32];
        domain[0..4].copy_from_slice(&domain_constant.to_le_bytes());
        domain[4..].copy_from_slice(
            ForkData {
                current_version: fork_version,
                genesis_validators_root,
            }
            .tree_hash_root()
            .as_slice()
            .get(..28)
            .expect("fork has is 32 bytes so first 28 bytes should exist"),
        );

        Hash256::from(domain)
    }

    /// The raw constant for a domain, as used in seed derivation.
    pub fn get_domain_constant(&self, domain: Domain) -> u32 {
        self.as_u32(domain)
    }

    fn as_u32(&self, domain: Domain) -> u32 {
        match domain {
            Domain::BeaconProposer => self.domain_beacon_proposer,
            Domain::BeaconAttester => self.domain_beacon_attester,
            Domain::Randao => self.domain_randao,
            Domain::Deposit => self.domain_deposit,
            Domain::VoluntaryExit => self.domain_voluntary_exit,
            Domain::SelectionProof => self.domain_selection_proof,
            Domain::AggregateAndProof => self.domain_aggregate_and_proof,
            Domain::SyncCommittee => self.domain_sync_committee,
            Domain::SyncCommitteeSelectionProof => self.domain_sync_committee_selection_proof,
            Domain::ContributionAndProof => self.domain_contribution_and_proof,
            Domain::BlsToExecutionChange => self.domain_bls_to_execution_change,
        }
    }

    /// Returns a `ChainSpec` compatible with the Ethereum Foundation specification.
    pub fn mainnet() -> Self {
        Self {
            /*
             * Constants
             */
            genesis_slot: Slot::new(0),
            far_future_epoch: Epoch::new(u64::MAX),
            base_rewards_per_epoch: 4,
            deposit_contract_tree_depth: 32,

            /*
             * Misc
             */
            max_committees_per_slot: 64,
            target_committee_size: 128,
            min_per_epoch_churn_limit: 4,
            churn_limit_quotient: 65_536,
            shuffle_round_count: 90,

            /*
             * Gwei values
             */
            min_deposit_amount: u64::pow(2, 0).saturating_mul(u64::pow(10, 9)),
            max_effective_balance: u64::pow(2, 5).saturating_mul(u64::pow(10, 9)),
            ejection_balance: u64::pow(2, 4).saturating_mul(u64::pow(10, 9)),
            effective_balance_increment: u64::pow(2, 0).saturating_mul(u64::pow(10, 9)),
            hysteresis_quotient: 4,
            hysteresis_downward_multiplier: 1,
            hysteresis_upward_multiplier: 5,

            /*
             * Initial values
             */
            bls_withdrawal_prefix_byte: 0x00,
            eth1_address_withdrawal_prefix_byte: 0x01,
            compounding_withdrawal_prefix_byte: 0x02,

            /*
             * Time parameters
             */
            genesis_delay: 604800, // 7 days
            seconds_per_slot: 12,
            min_attestation_inclusion_delay: 1,
            min_seed_lookahead: Epoch::new(1),
            max_seed_lookahead: Epoch::new(4),
            min_epochs_to_inactivity_penalty: 4,
            min_validator_withdrawability_delay: Epoch::new(256),
            shard_committee_period: 256,
            maximum_gossip_clock_disparity_millis: 500,

            /*
             * Reward and penalty quotients
             */
            base_reward_factor: 64,
            whistleblower_reward_quotient: 512,
            proposer_reward_quotient: 8,
            inactivity_penalty_quotient: u64::pow(2, 26),
            min_slashing_penalty_quotient: 128,
            proportional_slashing_multiplier: 1,

            /*
             * Signature domains
             */
            domain_beacon_proposer: 0,
            domain_beacon_attester: 1,
            domain_randao: 2,
            domain_deposit: 3,
            domain_voluntary_exit: 4,
            domain_selection_proof: 5,
            domain_aggregate_and_proof: 6,
            domain_bls_to_execution_change: 10,

            /*
             * Fork schedule
             */
            genesis_fork_version: [0, 0, 0, 0],
            altair_fork_version: [1, 0, 0, 0],
            altair_fork_epoch: Some(Epoch::new(74240)),
            bellatrix_fork_version: [2, 0, 0, 0],
            bellatrix_fork_epoch: Some(Epoch::new(144896)),
            capella_fork_version: [3, 0, 0, 0],
            capella_fork_epoch: Some(Epoch::new(194048)),
            deneb_fork_version: [4, 0, 0, 0],
            deneb_fork_epoch: Some(Epoch::new(269568)),
            electra_fork_version: [5, 0, 0, 0],
            electra_fork_epoch: Some(Epoch::new(364032)),
            fulu_fork_version: [6, 0, 0, 0],
            fulu_fork_epoch: None,

            /*
             * Altair
             */
            inactivity_penalty_quotient_altair: u64::pow(2, 24).saturating_mul(3),
            min_slashing_penalty_quotient_altair: 64,
            proportional_slashing_multiplier_altair: 2,
            epochs_per_sync_committee_period: Epoch::new(256),
            inactivity_score_bias: 4,
            inactivity_score_recovery_rate: 16,
            domain_sync_committee: 7,
            domain_sync_committee_selection_proof: 8,
            domain_contribution_and_proof: 9,

            /*
             * Bellatrix
             */
            inactivity_penalty_quotient_bellatrix: u64::pow(2, 24),
            min_slashing_penalty_quotient_bellatrix: 32,
            proportional_slashing_multiplier_bellatrix: 3,

            /*
             * Deneb
             */
            max_per_epoch_activation_churn_limit: 8,

            /*
             * Capella
             */
            max_validators_per_withdrawals_sweep: 16384,

            /*
             * Electra
             */
            min_activation_balance: u64::pow(2, 5).saturating_mul(u64::pow(10, 9)),
            max_effective_balance_electra: u64::pow(2, 11).saturating_mul(u64::pow(10, 9)),
            min_slashing_penalty_quotient_electra: u64::pow(2, 12),
            whistleblower_reward_quotient_electra: u64::pow(2, 12),
            min_per_epoch_churn_limit_electra: u64::pow(2, 7).saturating_mul(u64::pow(10, 9)),
            max_per_epoch_activation_exit_churn_limit: u64::pow(2, 8)
                .saturating_mul(u64::pow(10, 9)),
            max_pending_partials_per_withdrawals_sweep: u64::pow(2, 3),
            max_pending_deposits_per_epoch: 16,
        }
    }

    /// Returns a `ChainSpec` compatible with the minimal preset, suitable for testing.
    pub fn minimal() -> Self {
        Self {
            max_committees_per_slot: 4,
            target_committee_size: 4,
            churn_limit_quotient: 32,
            shuffle_round_count: 10,
            min_validator_withdrawability_delay: Epoch::new(256),
            shard_committee_period: 64,
            epochs_per_sync_committee_period: Epoch::new(8),
            max_per_epoch_activation_churn_limit: 4,
            max_validators_per_withdrawals_sweep: 16,
            max_pending_partials_per_withdrawals_sweep: u64::pow(2, 1),
            genesis_delay: 300,
            seconds_per_slot: 6,
            altair_fork_version: [1, 0, 0, 1],
            altair_fork_epoch: None,
            bellatrix_fork_version: [2, 0, 0, 1],
            bellatrix_fork_epoch: None,
            capella_fork_version: [3, 0, 0, 1],
            capella_fork_epoch: None,
            deneb_fork_version: [4, 0, 0, 1],
            deneb_fork_epoch: None,
            electra_fork_version: [5, 0, 0, 1],
            electra_fork_epoch: None,
            fulu_fork_version: [6, 0, 0, 1],
            fulu_fork_epoch: None,
            genesis_fork_version: [0, 0, 0, 1],
            ..ChainSpec::mainnet()
        }
    }

    /// A minimal spec with every fork enabled from genesis, handy in tests.
    pub fn minimal_all_forks_at_genesis() -> Self {
        Self {
            altair_fork_epoch: Some(Epoch::new(0)),
            bellatrix_fork_epoch: Some(Epoch::new(0)),
            capella_fork_epoch: Some(Epoch::new(0)),
            deneb_fork_epoch: Some(Epoch::new(0)),
            electra_fork_epoch: Some(Epoch::new(0)),
            fulu_fork_epoch: Some(Epoch::new(0)),
            ..ChainSpec::minimal()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_name_at_epoch_with_schedule() {
        let mut spec = ChainSpec::minimal();
        spec.altair_fork_epoch = Some(Epoch::new(2));
        spec.bellatrix_fork_epoch = Some(Epoch::new(4));

        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(1)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(2)), ForkName::Altair);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(3)), ForkName::Altair);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(4)), ForkName::Bellatrix);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(100)), ForkName::Bellatrix);
    }

    #[test]
    fn unscheduled_forks_stay_inactive() {
        let spec = ChainSpec::minimal();
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(1_000_000)), ForkName::Base);
    }

    #[test]
    fn domains_differ_by_type_and_fork() {
        let spec = ChainSpec::minimal();
        let fork = crate::Fork {
            previous_version: [0, 0, 0, 1],
            current_version: [1, 0, 0, 1],
            epoch: Epoch::new(5),
        };
        let root = Hash256::default();

        let attester_before =
            spec.get_domain(Epoch::new(4), Domain::BeaconAttester, &fork, root);
        let attester_after = spec.get_domain(Epoch::new(5), Domain::BeaconAttester, &fork, root);
        let proposer_before =
            spec.get_domain(Epoch::new(4), Domain::BeaconProposer, &fork, root);

        assert_ne!(attester_before, attester_after);
        assert_ne!(attester_before, proposer_before);
    }

    #[test]
    fn gossip_clock_disparity_is_configurable() {
        let mut spec = ChainSpec::mainnet();
        assert_eq!(
            spec.maximum_gossip_clock_disparity(),
            Duration::from_millis(500)
        );
        spec.maximum_gossip_clock_disparity_millis = 250;
        assert_eq!(
            spec.maximum_gossip_clock_disparity(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn electra_churn_limits() {
        let spec = ChainSpec::mainnet();
        let total_active_balance = 32_000_000 * 10u64.pow(9);
        let churn = spec.get_balance_churn_limit(total_active_balance).unwrap();
        // Rounded down to an increment boundary.
        assert_eq!(churn % spec.effective_balance_increment, 0);
        assert!(
            spec.get_activation_exit_churn_limit(total_active_balance)
                .unwrap()
                <= spec.max_per_epoch_activation_exit_churn_limit
        );
    }
}
