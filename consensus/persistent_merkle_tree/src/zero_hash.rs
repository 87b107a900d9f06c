use ethereum_hashing::hash32_concat;
use std::sync::LazyLock;

/// The deepest subtree the pool can pad with zero hashes. Beacon state lists
/// top out at depth 40 (`validators`, limit 2**40), so 64 leaves plenty of
/// headroom.
pub const MAX_TREE_DEPTH: usize = 64;

/// `ZERO_HASHES[d]` is the root of a depth-`d` subtree whose leaves are all
/// zero, so `ZERO_HASHES[0]` is 32 zero bytes.
static ZERO_HASHES: LazyLock<[[u8; 32]; MAX_TREE_DEPTH + 1]> = LazyLock::new(|| {
    let mut hashes = [[0; 32]; MAX_TREE_DEPTH + 1];
    for depth in 1..=MAX_TREE_DEPTH {
        hashes[depth] = hash32_concat(&hashes[depth - 1], &hashes[depth - 1]);
    }
    hashes
});

/// Returns the root of an all-zero subtree of `depth`.
///
/// Panics if `depth > MAX_TREE_DEPTH`; depths are fixed by SSZ types and a
/// larger depth is a bug, not an input error.
pub fn zero_hash(depth: usize) -> &'static [u8; 32] {
    ZERO_HASHES
        .get(depth)
        .unwrap_or_else(|| panic!("zero hash depth {depth} exceeds {MAX_TREE_DEPTH}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_zero_is_all_zero() {
        assert_eq!(zero_hash(0), &[0; 32]);
    }

    #[test]
    fn each_depth_is_hash_of_the_previous() {
        for depth in 0..MAX_TREE_DEPTH {
            assert_eq!(
                zero_hash(depth + 1),
                &hash32_concat(zero_hash(depth), zero_hash(depth))
            );
        }
    }

    #[test]
    fn matches_the_hashing_crate_table() {
        // `ethereum_hashing` precomputes the same series to a shallower depth.
        for (depth, expected) in ethereum_hashing::ZERO_HASHES.iter().enumerate() {
            assert_eq!(zero_hash(depth).as_slice(), expected.as_slice());
        }
    }

    #[test]
    #[should_panic]
    fn panics_beyond_max_depth() {
        zero_hash(MAX_TREE_DEPTH + 1);
    }
}
