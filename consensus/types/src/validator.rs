use crate::{Address, BeaconState, ChainSpec, Epoch, EthSpec, ForkName, Hash256};
use bls::PublicKeyBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;
use tree_view::tree_ssz_container;

/// Information about a `BeaconChain` validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

tree_ssz_container!(Validator {
    pubkey: PublicKeyBytes,
    withdrawal_credentials: Hash256,
    effective_balance: u64,
    slashed: bool,
    activation_eligibility_epoch: Epoch,
    activation_epoch: Epoch,
    exit_epoch: Epoch,
    withdrawable_epoch: Epoch,
});

impl Validator {
    /// Returns `true` if the validator is considered active at some epoch.
    pub fn is_active_at(&self, epoch: Epoch) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    /// Returns `true` if the validator is slashable at some epoch.
    pub fn is_slashable_at(&self, epoch: Epoch) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }

    /// Returns `true` if the validator is considered exited at some epoch.
    pub fn is_exited_at(&self, epoch: Epoch) -> bool {
        self.exit_epoch <= epoch
    }

    /// Returns `true` if the validator is able to withdraw at some epoch.
    pub fn is_withdrawable_at(&self, epoch: Epoch) -> bool {
        epoch >= self.withdrawable_epoch
    }

    /// Returns `true` if the validator is eligible to join the activation queue.
    ///
    /// Calls the fork-appropriate variant based on `current_fork`.
    pub fn is_eligible_for_activation_queue(
        &self,
        current_fork: ForkName,
        spec: &ChainSpec,
    ) -> bool {
        if current_fork.electra_enabled() {
            self.activation_eligibility_epoch == spec.far_future_epoch
                && self.effective_balance >= spec.min_activation_balance
        } else {
            self.activation_eligibility_epoch == spec.far_future_epoch
                && self.effective_balance == spec.max_effective_balance
        }
    }

    /// Returns `true` if the validator is eligible to be activated.
    pub fn is_eligible_for_activation<E: EthSpec>(
        &self,
        state: &BeaconState<E>,
        spec: &ChainSpec,
    ) -> bool {
        // Placement in queue is finalized
        self.activation_eligibility_epoch <= state.finalized_checkpoint().epoch
            // Has not yet been activated
            && self.activation_epoch == spec.far_future_epoch
    }

    /// Returns `true` if the validator *could* be eligible for activation at `epoch`.
    ///
    /// Eligibility depends on finalization, so we assume best-possible finalization. This function
    /// returning true is a necessary but *not sufficient* condition for a validator to activate in
    /// the epoch transition at the end of `epoch`.
    pub fn could_be_eligible_for_activation_at(&self, epoch: Epoch, spec: &ChainSpec) -> bool {
        // Has not yet been activated
        self.activation_epoch == spec.far_future_epoch
            // Placement in queue could be finalized.
            //
            // NOTE: the epoch distance is 1 rather than 2 because we consider the activations that
            // occur at the *end* of `epoch`, after `process_justification_and_finalization` has
            // already updated the justification and finalization checkpoints.
            && self.activation_eligibility_epoch < epoch
    }

    /// Returns `true` if the validator has 0x01 withdrawal credentials.
    pub fn has_eth1_withdrawal_credential(&self, spec: &ChainSpec) -> bool {
        self.withdrawal_credentials
            .as_slice()
            .first()
            .map(|byte| *byte == spec.eth1_address_withdrawal_prefix_byte)
            .unwrap_or(false)
    }

    /// Returns `true` if the validator has 0x02 (compounding) withdrawal credentials.
    pub fn has_compounding_withdrawal_credential(&self, spec: &ChainSpec) -> bool {
        self.withdrawal_credentials
            .as_slice()
            .first()
            .map(|byte| *byte == spec.compounding_withdrawal_prefix_byte)
            .unwrap_or(false)
    }

    /// Returns `true` if the validator has 0x01 or 0x02 withdrawal credentials.
    pub fn has_execution_withdrawal_credential(&self, spec: &ChainSpec) -> bool {
        self.has_eth1_withdrawal_credential(spec)
            || self.has_compounding_withdrawal_credential(spec)
    }

    /// Returns the execution withdrawal address if the credential prefix allows one.
    pub fn get_execution_withdrawal_address(&self, spec: &ChainSpec) -> Option<Address> {
        self.has_execution_withdrawal_credential(spec)
            .then(|| {
                self.withdrawal_credentials
                    .as_slice()
                    .get(12..)
                    .map(Address::from_slice)
            })
            .flatten()
    }

    /// Replaces the withdrawal credentials with 0x01 credentials for `execution_address`.
    pub fn change_withdrawal_credentials(&mut self, execution_address: &Address, spec: &ChainSpec) {
        let mut bytes = [0u8; 32];
        bytes[0] = spec.eth1_address_withdrawal_prefix_byte;
        bytes[12..].copy_from_slice(execution_address.as_slice());
        self.withdrawal_credentials = Hash256::from(bytes);
    }

    /// The maximum effective balance for this validator (fork and credential dependent).
    pub fn get_max_effective_balance(&self, spec: &ChainSpec, current_fork: ForkName) -> u64 {
        if current_fork.electra_enabled() {
            if self.has_compounding_withdrawal_credential(spec) {
                spec.max_effective_balance_electra
            } else {
                spec.min_activation_balance
            }
        } else {
            spec.max_effective_balance
        }
    }

    /// Returns `true` if the validator is fully withdrawable at some epoch.
    pub fn is_fully_withdrawable_at(
        &self,
        balance: u64,
        epoch: Epoch,
        spec: &ChainSpec,
        current_fork: ForkName,
    ) -> bool {
        let credential_ok = if current_fork.electra_enabled() {
            self.has_execution_withdrawal_credential(spec)
        } else {
            self.has_eth1_withdrawal_credential(spec)
        };
        credential_ok && self.withdrawable_epoch <= epoch && balance > 0
    }

    /// Returns `true` if the validator is partially withdrawable.
    pub fn is_partially_withdrawable_validator(
        &self,
        balance: u64,
        spec: &ChainSpec,
        current_fork: ForkName,
    ) -> bool {
        let max_effective_balance = self.get_max_effective_balance(spec, current_fork);
        let credential_ok = if current_fork.electra_enabled() {
            self.has_execution_withdrawal_credential(spec)
        } else {
            self.has_eth1_withdrawal_credential(spec)
        };
        credential_ok
            && self.effective_balance == max_effective_balance
            && balance > max_effective_balance
    }
}

impl Default for Validator {
    /// Yields a "default" `Validator`. Primarily used for testing.
    fn default() -> Self {
        Self {
            pubkey: PublicKeyBytes::empty(),
            withdrawal_credentials: Hash256::default(),
            activation_eligibility_epoch: Epoch::from(u64::MAX),
            activation_epoch: Epoch::from(u64::MAX),
            exit_epoch: Epoch::from(u64::MAX),
            withdrawable_epoch: Epoch::from(u64::MAX),
            slashed: false,
            effective_balance: u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ChainSpec {
        ChainSpec::minimal()
    }

    #[test]
    fn default_is_not_active() {
        let v = Validator::default();
        let epoch = Epoch::new(0);
        assert!(!v.is_active_at(epoch));
        assert!(!v.is_exited_at(epoch));
        assert!(!v.is_withdrawable_at(epoch));
        assert!(!v.slashed);
    }

    #[test]
    fn is_active_at() {
        let epoch = Epoch::new(10);
        let v = Validator {
            activation_epoch: epoch,
            ..Validator::default()
        };
        assert!(!v.is_active_at(epoch - 1u64));
        assert!(v.is_active_at(epoch));
        assert!(v.is_active_at(epoch + 1u64));
    }

    #[test]
    fn withdrawal_credential_prefixes() {
        let spec = spec();
        let mut v = Validator::default();

        let mut credentials = [0u8; 32];
        credentials[0] = spec.bls_withdrawal_prefix_byte;
        v.withdrawal_credentials = Hash256::from(credentials);
        assert!(!v.has_eth1_withdrawal_credential(&spec));
        assert!(!v.has_execution_withdrawal_credential(&spec));

        v.change_withdrawal_credentials(&Address::repeat_byte(0x42), &spec);
        assert!(v.has_eth1_withdrawal_credential(&spec));
        assert!(v.has_execution_withdrawal_credential(&spec));
        assert!(!v.has_compounding_withdrawal_credential(&spec));
        assert_eq!(
            v.get_execution_withdrawal_address(&spec),
            Some(Address::repeat_byte(0x42))
        );
    }

    #[test]
    fn max_effective_balance_by_fork() {
        let spec = spec();
        let mut v = Validator::default();
        assert_eq!(
            v.get_max_effective_balance(&spec, ForkName::Deneb),
            spec.max_effective_balance
        );
        assert_eq!(
            v.get_max_effective_balance(&spec, ForkName::Electra),
            spec.min_activation_balance
        );

        let mut credentials = [0u8; 32];
        credentials[0] = spec.compounding_withdrawal_prefix_byte;
        v.withdrawal_credentials = Hash256::from(credentials);
        assert_eq!(
            v.get_max_effective_balance(&spec, ForkName::Electra),
            spec.max_effective_balance_electra
        );
    }
}
