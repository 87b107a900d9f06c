use super::Error;
use crate::consts::altair::NUM_FLAG_INDICES;
use crate::{ChainSpec, Epoch, ParticipationFlags};
use safe_arith::SafeArith;

/// Running totals of the unslashed participating balance for each
/// participation flag, for the previous and current epochs.
///
/// Kept up to date as attestations arrive so justification can be computed
/// without a full sweep of the participation lists.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressiveBalancesCache {
    inner: Option<Inner>,
}

#[derive(Debug, Clone, PartialEq)]
struct Inner {
    pub current_epoch: Epoch,
    pub previous_epoch_cache: EpochTotalBalances,
    pub current_epoch_cache: EpochTotalBalances,
}

/// Per-epoch unslashed participating balances, one total per flag.
#[derive(Debug, PartialEq, Clone)]
pub struct EpochTotalBalances {
    pub total_flag_balances: [u64; NUM_FLAG_INDICES],
}

impl EpochTotalBalances {
    pub fn new(spec: &ChainSpec) -> Self {
        // A zero-participation epoch still counts one effective balance
        // increment per flag, avoiding div-by-zero in reward calculations.
        Self {
            total_flag_balances: [spec.effective_balance_increment; NUM_FLAG_INDICES],
        }
    }

    pub fn total_flag_balance(&self, flag_index: usize) -> Result<u64, Error> {
        self.total_flag_balances
            .get(flag_index)
            .copied()
            .ok_or(Error::InvalidFlagIndex(flag_index))
    }

    pub fn on_new_attestation(
        &mut self,
        is_slashed: bool,
        flag_index: usize,
        validator_effective_balance: u64,
    ) -> Result<(), Error> {
        if is_slashed {
            return Ok(());
        }
        let balance = self
            .total_flag_balances
            .get_mut(flag_index)
            .ok_or(Error::InvalidFlagIndex(flag_index))?;
        balance.safe_add_assign(validator_effective_balance)?;
        Ok(())
    }

    pub fn on_slashing(
        &mut self,
        participation_flags: ParticipationFlags,
        validator_effective_balance: u64,
    ) -> Result<(), Error> {
        for flag_index in 0..NUM_FLAG_INDICES {
            if participation_flags
                .has_flag(flag_index)
                .map_err(|_| Error::InvalidFlagIndex(flag_index))?
            {
                self.total_flag_balances
                    .get_mut(flag_index)
                    .ok_or(Error::InvalidFlagIndex(flag_index))?
                    .safe_sub_assign(validator_effective_balance)?;
            }
        }
        Ok(())
    }

    pub fn on_effective_balance_change(
        &mut self,
        is_slashed: bool,
        current_epoch_participation_flags: ParticipationFlags,
        old_effective_balance: u64,
        new_effective_balance: u64,
    ) -> Result<(), Error> {
        // If the validator is slashed then we should not update the effective balance, because this
        // validator's effective balance has already been removed from the totals.
        if is_slashed {
            return Ok(());
        }
        for flag_index in 0..NUM_FLAG_INDICES {
            if current_epoch_participation_flags
                .has_flag(flag_index)
                .map_err(|_| Error::InvalidFlagIndex(flag_index))?
            {
                let total = self
                    .total_flag_balances
                    .get_mut(flag_index)
                    .ok_or(Error::InvalidFlagIndex(flag_index))?;
                if new_effective_balance > old_effective_balance {
                    total.safe_add_assign(
                        new_effective_balance.safe_sub(old_effective_balance)?,
                    )?;
                } else {
                    total.safe_sub_assign(
                        old_effective_balance.safe_sub(new_effective_balance)?,
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl ProgressiveBalancesCache {
    pub fn initialize(
        &mut self,
        current_epoch: Epoch,
        previous_epoch_cache: EpochTotalBalances,
        current_epoch_cache: EpochTotalBalances,
    ) {
        self.inner = Some(Inner {
            current_epoch,
            previous_epoch_cache,
            current_epoch_cache,
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    pub fn is_initialized_at(&self, epoch: Epoch) -> bool {
        matches!(&self.inner, Some(inner) if inner.current_epoch == epoch)
    }

    /// When a new attestation is processed, we update the relevant epoch's totals.
    pub fn on_new_attestation(
        &mut self,
        epoch: Epoch,
        is_slashed: bool,
        flag_index: usize,
        validator_effective_balance: u64,
    ) -> Result<(), Error> {
        let cache = self.get_inner_mut()?;
        if epoch == cache.current_epoch {
            cache.current_epoch_cache.on_new_attestation(
                is_slashed,
                flag_index,
                validator_effective_balance,
            )?;
        } else if epoch.safe_add(1u64)? == cache.current_epoch {
            cache.previous_epoch_cache.on_new_attestation(
                is_slashed,
                flag_index,
                validator_effective_balance,
            )?;
        } else {
            return Err(Error::ProgressiveBalancesCacheInconsistent);
        }
        Ok(())
    }

    /// When a validator is slashed, we reduce the `current_epoch_target_attesting_balance` by the
    /// validator's effective balance to exclude the validator weight.
    pub fn on_slashing(
        &mut self,
        previous_epoch_participation: ParticipationFlags,
        current_epoch_participation: ParticipationFlags,
        effective_balance: u64,
    ) -> Result<(), Error> {
        let cache = self.get_inner_mut()?;
        cache
            .previous_epoch_cache
            .on_slashing(previous_epoch_participation, effective_balance)?;
        cache
            .current_epoch_cache
            .on_slashing(current_epoch_participation, effective_balance)?;
        Ok(())
    }

    /// When a validator's effective balance changes, we adjust the flag totals it participates in.
    pub fn on_effective_balance_change(
        &mut self,
        is_slashed: bool,
        current_epoch_participation: ParticipationFlags,
        old_effective_balance: u64,
        new_effective_balance: u64,
    ) -> Result<(), Error> {
        let cache = self.get_inner_mut()?;
        cache.current_epoch_cache.on_effective_balance_change(
            is_slashed,
            current_epoch_participation,
            old_effective_balance,
            new_effective_balance,
        )?;
        Ok(())
    }

    /// On epoch transition, the balance cache of the current epoch becomes the previous epoch's
    /// cache, and a new cache is created for the upcoming epoch.
    pub fn on_epoch_transition(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        let cache = self.get_inner_mut()?;
        cache.current_epoch.safe_add_assign(1u64)?;
        cache.previous_epoch_cache = std::mem::replace(
            &mut cache.current_epoch_cache,
            EpochTotalBalances::new(spec),
        );
        Ok(())
    }

    pub fn previous_epoch_flag_attesting_balance(&self, flag_index: usize) -> Result<u64, Error> {
        self.get_inner()?
            .previous_epoch_cache
            .total_flag_balance(flag_index)
    }

    pub fn previous_epoch_target_attesting_balance(&self) -> Result<u64, Error> {
        self.previous_epoch_flag_attesting_balance(
            crate::consts::altair::TIMELY_TARGET_FLAG_INDEX,
        )
    }

    pub fn current_epoch_target_attesting_balance(&self) -> Result<u64, Error> {
        self.get_inner()?
            .current_epoch_cache
            .total_flag_balance(crate::consts::altair::TIMELY_TARGET_FLAG_INDEX)
    }

    fn get_inner(&self) -> Result<&Inner, Error> {
        self.inner
            .as_ref()
            .ok_or(Error::ProgressiveBalancesCacheNotInitialized)
    }

    fn get_inner_mut(&mut self) -> Result<&mut Inner, Error> {
        self.inner
            .as_mut()
            .ok_or(Error::ProgressiveBalancesCacheNotInitialized)
    }
}
