//! Constants that are fixed by the protocol upgrade that introduced them,
//! rather than configured per network.

pub mod altair {
    /// Position of each participation flag within a validator's
    /// `ParticipationFlags` byte.
    pub const TIMELY_SOURCE_FLAG_INDEX: usize = 0;
    pub const TIMELY_TARGET_FLAG_INDEX: usize = 1;
    pub const TIMELY_HEAD_FLAG_INDEX: usize = 2;
    pub const NUM_FLAG_INDICES: usize = 3;

    /// Reward weights. The flag weights, the sync committee weight and the
    /// proposer weight together exhaust `WEIGHT_DENOMINATOR`.
    pub const TIMELY_SOURCE_WEIGHT: u64 = 14;
    pub const TIMELY_TARGET_WEIGHT: u64 = 26;
    pub const TIMELY_HEAD_WEIGHT: u64 = 14;
    pub const SYNC_REWARD_WEIGHT: u64 = 2;
    pub const PROPOSER_WEIGHT: u64 = 8;
    pub const WEIGHT_DENOMINATOR: u64 = 64;

    /// The flag weights, indexed by `*_FLAG_INDEX`.
    pub const PARTICIPATION_FLAG_WEIGHTS: [u64; NUM_FLAG_INDICES] = [
        TIMELY_SOURCE_WEIGHT,
        TIMELY_TARGET_WEIGHT,
        TIMELY_HEAD_WEIGHT,
    ];
}

pub mod electra {
    /// An execution-layer withdrawal request for this amount asks for a full
    /// exit rather than a partial withdrawal.
    pub const FULL_EXIT_REQUEST_AMOUNT: u64 = 0;
    /// Sentinel for `deposit_requests_start_index` until the first
    /// execution-layer deposit request is seen.
    pub const UNSET_DEPOSIT_REQUESTS_START_INDEX: u64 = u64::MAX;
}

#[cfg(test)]
mod tests {
    use super::altair::*;

    #[test]
    fn weights_exhaust_the_denominator() {
        let total: u64 = PARTICIPATION_FLAG_WEIGHTS.iter().sum::<u64>()
            + SYNC_REWARD_WEIGHT
            + PROPOSER_WEIGHT;
        assert_eq!(total, WEIGHT_DENOMINATOR);
    }

    #[test]
    fn flag_weights_line_up_with_their_indices() {
        assert_eq!(
            PARTICIPATION_FLAG_WEIGHTS[TIMELY_SOURCE_FLAG_INDEX],
            TIMELY_SOURCE_WEIGHT
        );
        assert_eq!(
            PARTICIPATION_FLAG_WEIGHTS[TIMELY_TARGET_FLAG_INDEX],
            TIMELY_TARGET_WEIGHT
        );
        assert_eq!(
            PARTICIPATION_FLAG_WEIGHTS[TIMELY_HEAD_FLAG_INDEX],
            TIMELY_HEAD_WEIGHT
        );
    }
}
