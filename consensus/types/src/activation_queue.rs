use crate::{ChainSpec, Epoch, Validator};
use std::collections::BTreeSet;

/// Validators eligible (or nearly eligible) for activation, ordered by
/// eligibility epoch then index, precomputed one epoch ahead.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct ActivationQueue {
    /// Validators represented by `(eligibility_epoch, index)` in sorted order.
    ///
    /// These validators are not *necessarily* going to be activated. Their activation depends
    /// on how finalization is updated, and the `churn_limit`.
    queue: BTreeSet<(Epoch, usize)>,
}

impl ActivationQueue {
    /// Check if `validator` could be eligible for activation in the next epoch and add them to
    /// the tentative activation queue if this is the case.
    pub fn add_if_could_be_eligible_for_activation(
        &mut self,
        index: usize,
        validator: &Validator,
        next_epoch: Epoch,
        spec: &ChainSpec,
    ) {
        if validator.could_be_eligible_for_activation_at(next_epoch, spec) {
            self.queue
                .insert((validator.activation_eligibility_epoch, index));
        }
    }

    /// Determine the final activation queue after accounting for finalization & the churn limit.
    pub fn get_validators_eligible_for_activation(
        &self,
        finalized_epoch: Epoch,
        churn_limit: usize,
    ) -> BTreeSet<usize> {
        self.queue
            .iter()
            .filter_map(|&(eligibility_epoch, index)| {
                (eligibility_epoch <= finalized_epoch).then_some(index)
            })
            .take(churn_limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_respects_finality_and_churn() {
        let spec = ChainSpec::minimal();
        let mut queue = ActivationQueue::default();
        let next_epoch = Epoch::new(10);

        for (i, eligibility_epoch) in [(0, 2), (1, 5), (2, 9), (3, 20)] {
            let validator = Validator {
                activation_eligibility_epoch: Epoch::new(eligibility_epoch),
                activation_epoch: spec.far_future_epoch,
                ..Validator::default()
            };
            queue.add_if_could_be_eligible_for_activation(i, &validator, next_epoch, &spec);
        }

        // Finalized epoch 5: validators 0 and 1 eligible; churn 1 keeps only the first.
        assert_eq!(
            queue.get_validators_eligible_for_activation(Epoch::new(5), 1),
            BTreeSet::from([0])
        );
        assert_eq!(
            queue.get_validators_eligible_for_activation(Epoch::new(5), 10),
            BTreeSet::from([0, 1])
        );
        // Validator 3 is not yet eligible at all (eligibility epoch past next_epoch).
        assert_eq!(
            queue.get_validators_eligible_for_activation(Epoch::new(100), 10),
            BTreeSet::from([0, 1, 2])
        );
    }
}
