use super::Error;
use crate::{ChainSpec, Epoch, Validator};
use safe_arith::SafeArith;
use std::collections::HashMap;
use std::sync::Arc;

/// Map from exit epoch to the number of validators with that exit epoch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExitCache {
    /// True if the cache has been initialized.
    initialized: bool,
    /// Maximum `exit_epoch` of any validator.
    max_exit_epoch: Epoch,
    /// Number of validators known to be exiting at `max_exit_epoch`.
    max_exit_epoch_churn: u64,
    exit_epoch_counts: Arc<HashMap<Epoch, u64>>,
}

impl ExitCache {
    /// Initialize a new cache for the given list of validators.
    pub fn new<'a, V, I>(validators: V, spec: &ChainSpec) -> Result<Self, Error>
    where
        V: IntoIterator<Item = &'a Validator, IntoIter = I>,
        I: ExactSizeIterator + Iterator<Item = &'a Validator>,
    {
        let mut exit_cache = ExitCache {
            initialized: true,
            ..ExitCache::default()
        };
        // Add all validators with a non-default exit epoch to the cache.
        validators
            .into_iter()
            .filter(|validator| validator.exit_epoch != spec.far_future_epoch)
            .try_for_each(|validator| exit_cache.record_validator_exit(validator.exit_epoch))?;
        Ok(exit_cache)
    }

    /// Check that the cache is initialized and return an error if it is not.
    pub fn check_initialized(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::ExitCacheUninitialized)
        }
    }

    /// Record the exit epoch of a validator. Must be called only once per exiting validator.
    pub fn record_validator_exit(&mut self, exit_epoch: Epoch) -> Result<(), Error> {
        self.check_initialized()?;
        let counts = Arc::make_mut(&mut self.exit_epoch_counts);
        counts
            .entry(exit_epoch)
            .or_insert(0)
            .safe_add_assign(1)?;

        if exit_epoch > self.max_exit_epoch {
            self.max_exit_epoch = exit_epoch;
            self.max_exit_epoch_churn = 1;
        } else if exit_epoch == self.max_exit_epoch {
            self.max_exit_epoch_churn.safe_add_assign(1)?;
        }
        Ok(())
    }

    /// Get the largest exit epoch with a non-zero exit epoch count.
    pub fn max_epoch(&self) -> Result<Option<Epoch>, Error> {
        self.check_initialized()?;
        Ok((self.max_exit_epoch_churn > 0).then_some(self.max_exit_epoch))
    }

    /// Get number of validators with the given exit epoch. (Return 0 for the default exit epoch.)
    pub fn get_churn_at(&self, exit_epoch: Epoch) -> Result<u64, Error> {
        self.check_initialized()?;
        Ok(self
            .exit_epoch_counts
            .get(&exit_epoch)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_cache_errors() {
        let cache = ExitCache::default();
        assert!(matches!(
            cache.max_epoch(),
            Err(Error::ExitCacheUninitialized)
        ));
    }

    #[test]
    fn counts_exits_per_epoch() {
        let spec = ChainSpec::minimal();
        let mut exiting = Validator::default();
        exiting.exit_epoch = Epoch::new(5);
        let not_exiting = Validator::default();

        let validators = vec![exiting.clone(), exiting, not_exiting];
        let mut cache = ExitCache::new(validators.iter(), &spec).unwrap();

        assert_eq!(cache.max_epoch().unwrap(), Some(Epoch::new(5)));
        assert_eq!(cache.get_churn_at(Epoch::new(5)).unwrap(), 2);
        assert_eq!(cache.get_churn_at(Epoch::new(6)).unwrap(), 0);

        cache.record_validator_exit(Epoch::new(6)).unwrap();
        assert_eq!(cache.max_epoch().unwrap(), Some(Epoch::new(6)));
        assert_eq!(cache.get_churn_at(Epoch::new(6)).unwrap(), 1);
    }
}
