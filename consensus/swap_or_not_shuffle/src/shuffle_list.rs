use crate::{PIVOT_VIEW_SIZE, SEED_SIZE, TOTAL_SIZE};
use ethereum_hashing::hash_fixed;

/// A buffer of `seed || round || position_window`, re-hashed as the window
/// changes so each 256-index window costs a single hash per round.
struct Buf([u8; TOTAL_SIZE]);

impl Buf {
    fn new(seed: &[u8]) -> Self {
        let mut buf = [0u8; TOTAL_SIZE];
        buf[0..SEED_SIZE].copy_from_slice(seed);
        Self(buf)
    }

    fn set_round(&mut self, round: u8) {
        self.0[SEED_SIZE] = round;
    }

    /// Returns the pivot for the current round, modulo nothing: the caller
    /// reduces it by the list size.
    fn hash_pivot(&self) -> u64 {
        let digest = hash_fixed(&self.0[0..PIVOT_VIEW_SIZE]);
        u64::from_le_bytes(digest[0..8].try_into().expect("digest has 32 bytes"))
    }

    fn mix_in_position(&mut self, position_window: usize) {
        self.0[PIVOT_VIEW_SIZE..].copy_from_slice(&(position_window as u32).to_le_bytes());
    }

    fn hash(&self) -> [u8; 32] {
        hash_fixed(&self.0)
    }
}

/// Shuffles an entire list using the swap-or-not algorithm.
///
/// With `forwards == false` the result satisfies
/// `output[i] == input[compute_shuffled_index(i, n, seed, rounds)]` (the
/// committee ordering); `forwards == true` applies the inverse permutation.
///
/// Returns `None` under any of the following conditions:
///  - `list_size > usize::MAX / 2`
///  - `list_size > 2**24`
///  - `seed.len() != 32`
pub fn shuffle_list(
    mut input: Vec<usize>,
    rounds: u8,
    seed: &[u8],
    forwards: bool,
) -> Option<Vec<usize>> {
    let list_size = input.len();

    if list_size > usize::MAX / 2 || list_size > 2usize.pow(24) || seed.len() != SEED_SIZE {
        return None;
    }
    if list_size < 2 || rounds == 0 {
        return Some(input);
    }

    let mut buf = Buf::new(seed);

    // Each round's swap rule is an involution on index pairs `{i, flip}`, so
    // applying the swaps of rounds `r-1, r-2, .., 0` to the array realises the
    // composite permutation that `compute_shuffled_index` applies to a single
    // index with rounds `0, 1, .., r-1`. The `forwards` direction reverses the
    // round order, giving the inverse permutation.
    let round_order: Vec<u8> = if forwards {
        (0..rounds).collect()
    } else {
        (0..rounds).rev().collect()
    };

    for round in round_order {
        buf.set_round(round);
        let pivot = (buf.hash_pivot() as usize) % list_size;

        // Cache one window hash at a time; `flip` decreases by one per step
        // (mod n) so window changes are infrequent.
        let mut current_window = usize::MAX;
        let mut source = [0u8; 32];

        for i in 0..list_size {
            let flip = (pivot + (list_size - i)) % list_size;
            if i >= flip {
                continue;
            }

            // position == max(i, flip) == flip here.
            let window = flip / 256;
            if window != current_window {
                buf.mix_in_position(window);
                source = buf.hash();
                current_window = window;
            }

            let byte = source[(flip % 256) / 8];
            let bit = (byte >> (flip % 8)) % 2;

            if bit == 1 {
                input.swap(i, flip);
            }
        }
    }

    Some(input)
}
