use crate::{PIVOT_VIEW_SIZE, SEED_SIZE, TOTAL_SIZE};
use ethereum_hashing::hash_fixed;

/// Returns the index of `index` after a single application of the swap-or-not
/// permutation over a list of `list_size` elements.
///
/// Returns `None` under any of the following conditions:
///  - `list_size == 0`
///  - `index >= list_size`
///  - `list_size > 2**24`
///  - `list_size > usize::MAX / 2`
pub fn compute_shuffled_index(
    index: usize,
    list_size: usize,
    seed: &[u8],
    shuffle_round_count: u8,
) -> Option<usize> {
    if list_size == 0
        || index >= list_size
        || list_size > usize::MAX / 2
        || list_size > 2usize.pow(24)
        || seed.len() != SEED_SIZE
    {
        return None;
    }

    let mut index = index;
    let mut buf = [0u8; TOTAL_SIZE];
    buf[0..SEED_SIZE].copy_from_slice(seed);

    for round in 0..shuffle_round_count {
        buf[SEED_SIZE] = round;

        let pivot = u64::from_le_bytes(
            hash_fixed(&buf[0..PIVOT_VIEW_SIZE])[0..8].try_into().ok()?,
        ) as usize
            % list_size;

        let flip = (pivot + (list_size - index)) % list_size;
        let position = std::cmp::max(index, flip);

        buf[PIVOT_VIEW_SIZE..].copy_from_slice(&((position / 256) as u32).to_le_bytes());
        let source = hash_fixed(&buf);

        let byte = source[(position % 256) / 8];
        let bit = (byte >> (position % 8)) % 2;

        if bit == 1 {
            index = flip;
        }
    }

    Some(index)
}
