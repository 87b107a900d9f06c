//! An arena-backed persistent binary Merkle tree.
//!
//! Nodes live in a [`NodePool`]: an append-only vector of slots with a free
//! list, addressed by stable [`NodeId`]s. Trees built over the pool share
//! structure freely; every node carries an exact reference count and updates
//! are copy-on-write, so cloning a multi-megabyte tree costs one refcount
//! bump and mutating it costs one path of fresh nodes.
//!
//! Branch hashes are computed lazily and cached; replacing a child marks the
//! branch dirty and [`NodePool::get_hash`] re-hashes exactly the dirty
//! region on its next call.
//!
//! The pool is deliberately single-threaded: hash caches are unguarded and
//! callers that want parallelism run one pool per state lineage.

mod leak;
mod pool;
mod zero_hash;

pub use leak::{LeakCheck, LeakReport};
pub use pool::{NodeId, NodePool, Side};
pub use zero_hash::{MAX_TREE_DEPTH, zero_hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The arena is out of addressable slots.
    PoolExhausted,
    /// A subtree of the given depth cannot hold this many leaves.
    TooManyLeaves { depth: u32, leaves: usize },
    /// Generalized index `0` is invalid, as is any index that descends
    /// through a leaf.
    InvalidGindex(u64),
    /// The operation requires a branch node.
    NotABranch(NodeId),
    /// A subtree deeper than the zero-hash table can represent.
    DepthTooLarge(u32),
}
