use super::Error;
use crate::{Slot, Validator};
use std::collections::HashSet;
use std::sync::Arc;

/// Cache of slashed validator indices, as of some block slot.
///
/// Block processing consults it to detect a validator being slashed twice in
/// one block, which the registry alone cannot see until the second slashing
/// lands.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SlashingsCache {
    latest_block_slot: Option<Slot>,
    slashed_validators: Arc<HashSet<usize>>,
}

impl SlashingsCache {
    /// Initialize a new cache for the given list of validators.
    pub fn new<'a, V, I>(latest_block_slot: Slot, validators: V) -> Self
    where
        V: IntoIterator<Item = &'a Validator, IntoIter = I>,
        I: Iterator<Item = &'a Validator>,
    {
        let slashed_validators = validators
            .into_iter()
            .enumerate()
            .filter_map(|(i, validator)| validator.slashed.then_some(i))
            .collect();
        Self {
            latest_block_slot: Some(latest_block_slot),
            slashed_validators: Arc::new(slashed_validators),
        }
    }

    pub fn is_initialized(&self, slot: Slot) -> Result<(), Error> {
        if self.latest_block_slot == Some(slot) {
            Ok(())
        } else {
            Err(Error::SlashingsCacheUninitialized {
                initialized_slot: self.latest_block_slot,
                latest_block_slot: slot,
            })
        }
    }

    pub fn update_latest_block_slot(&mut self, latest_block_slot: Slot) {
        self.latest_block_slot = Some(latest_block_slot);
    }

    pub fn record_validator_slashing(
        &mut self,
        block_slot: Slot,
        validator_index: usize,
    ) -> Result<(), Error> {
        self.is_initialized(block_slot)?;
        Arc::make_mut(&mut self.slashed_validators).insert(validator_index);
        Ok(())
    }

    pub fn is_slashed(&self, validator_index: usize) -> bool {
        self.slashed_validators.contains(&validator_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_queries_slashings() {
        let mut slashed = Validator::default();
        slashed.slashed = true;
        let honest = Validator::default();
        let validators = vec![honest, slashed];

        let mut cache = SlashingsCache::new(Slot::new(3), validators.iter());
        assert!(!cache.is_slashed(0));
        assert!(cache.is_slashed(1));

        assert!(cache.record_validator_slashing(Slot::new(4), 0).is_err());
        cache.update_latest_block_slot(Slot::new(4));
        cache.record_validator_slashing(Slot::new(4), 0).unwrap();
        assert!(cache.is_slashed(0));
    }
}
