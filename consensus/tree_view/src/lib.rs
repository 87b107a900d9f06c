//! Typed SSZ views over the persistent Merkle-tree pool.
//!
//! [`Vector`] and [`List`] store their elements as pool subtrees instead of
//! contiguous memory: reading descends the tree, writing rebuilds one path
//! copy-on-write, and cloning bumps a single refcount. They slot into the
//! usual derive stack — both implement `ssz::Encode`/`Decode`,
//! `tree_hash::TreeHash` and serde, so a container can mix tree-backed and
//! value-backed fields freely.
//!
//! Element layout follows SSZ merkleisation: basic types pack into 32-byte
//! chunks ([`TreeSsz::PACKED_BYTES`]), composite types occupy a subtree of
//! their own ([`tree_ssz_container!`]). List roots mix the length in at the
//! top; the length itself lives beside the tree, not in it.
//!
//! Pools are shared per thread by default ([`PoolHandle::thread_default`]),
//! which is what makes cross-state structural sharing work: every state on a
//! thread allocates from the same arena, and a cloned state is one refcount
//! away from its origin.

mod list;
mod pool_handle;
mod raw;
mod tree_ssz;
mod vector;

#[cfg(test)]
mod container_tests;

pub use list::List;
pub use pool_handle::PoolHandle;
pub use tree_ssz::{TreeSsz, field_node, field_from_node, merkleize_nodes};
pub use vector::Vector;

pub use ssz_types::typenum;
pub use ssz_types::typenum::Unsigned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Index past the current length.
    OutOfBounds { i: usize, len: usize },
    /// Push or set past a list's type-level limit.
    ListFull { max_len: usize },
    /// A fixed-length vector constructed from the wrong number of elements.
    InvalidVectorLength { got: usize, expected: usize },
    Pool(persistent_merkle_tree::Error),
}

impl From<persistent_merkle_tree::Error> for Error {
    fn from(e: persistent_merkle_tree::Error) -> Self {
        Error::Pool(e)
    }
}

/// Smallest `depth` with `2^depth >= n`.
pub(crate) const fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_log2_small_values() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1 << 40), 40);
    }
}
