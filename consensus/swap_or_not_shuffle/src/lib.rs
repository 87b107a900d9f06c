//! The "swap-or-not" shuffle used to compute beacon chain committees.
//!
//! Two entry points are provided:
//!
//! - `compute_shuffled_index`: maps a single index through the permutation.
//! - `shuffle_list`: permutes a whole list at once, hashing each 256-index
//!   window once per round instead of once per element.
//!
//! `shuffle_list(input, rounds, seed, false)` yields `output` such that
//! `output[i] == input[compute_shuffled_index(i, n, seed, rounds)]`;
//! passing `forwards = true` applies the inverse permutation.

mod compute_shuffled_index;
mod shuffle_list;

pub use compute_shuffled_index::compute_shuffled_index;
pub use shuffle_list::shuffle_list;

const SEED_SIZE: usize = 32;
const ROUND_SIZE: usize = 1;
const POSITION_WINDOW_SIZE: usize = 4;
const PIVOT_VIEW_SIZE: usize = SEED_SIZE + ROUND_SIZE;
const TOTAL_SIZE: usize = SEED_SIZE + ROUND_SIZE + POSITION_WINDOW_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    fn shuffled_via_single_index(n: usize, seed: &[u8], rounds: u8) -> Vec<usize> {
        (0..n)
            .map(|i| compute_shuffled_index(i, n, seed, rounds).unwrap())
            .collect()
    }

    #[test]
    fn returns_none_for_zero_length_list() {
        assert_eq!(None, compute_shuffled_index(100, 0, &[42, 32], 10));
    }

    #[test]
    fn returns_none_for_out_of_bounds_index() {
        assert_eq!(None, compute_shuffled_index(100, 100, &[42, 32], 10));
    }

    #[test]
    fn single_index_is_a_permutation() {
        let seed = [7; 32];
        let shuffled = shuffled_via_single_index(97, &seed, 10);
        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..97).collect::<Vec<_>>());
    }

    #[test]
    fn zero_rounds_is_the_identity() {
        let seed = [7; 32];
        assert_eq!(compute_shuffled_index(5, 10, &seed, 0), Some(5));
        let list = shuffle_list((0..10).collect(), 0, &seed, false).unwrap();
        assert_eq!(list, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn list_shuffle_matches_single_index_shuffle() {
        let seed = [42; 32];
        for n in [1, 2, 3, 31, 32, 33, 255, 256, 257, 1000] {
            let shuffled = shuffle_list((0..n).collect(), 10, &seed, false).unwrap();
            let expected: Vec<usize> = shuffled_via_single_index(n, &seed, 10)
                .into_iter()
                .collect();
            assert_eq!(shuffled, expected, "mismatch for n = {n}");
        }
    }

    #[test]
    fn forwards_inverts_backwards() {
        let seed = [13; 32];
        let n = 128;
        let shuffled = shuffle_list((0..n).collect(), 10, &seed, false).unwrap();
        let unshuffled = shuffle_list(shuffled, 10, &seed, true).unwrap();
        assert_eq!(unshuffled, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn different_seeds_give_different_orders() {
        let a = shuffle_list((0..100).collect(), 10, &[1; 32], false).unwrap();
        let b = shuffle_list((0..100).collect(), 10, &[2; 32], false).unwrap();
        assert_ne!(a, b);
    }
}
