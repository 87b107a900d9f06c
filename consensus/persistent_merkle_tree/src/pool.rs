use crate::leak::{LeakCheck, LeakReport, LeakTracker};
use crate::zero_hash::{MAX_TREE_DEPTH, zero_hash};
use crate::Error;
use ethereum_hashing::hash32_concat;
use std::fmt;
use std::panic::Location;

/// A stable handle to a node in a [`NodePool`], valid until the node's
/// refcount reaches zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Copy)]
enum Kind {
    Leaf,
    Branch {
        left: NodeId,
        right: NodeId,
        /// The cached hash is stale. Leaves are never dirty: their hash is
        /// their content.
        dirty: bool,
    },
}

struct Slot {
    /// Number of parent slots plus external holders. Zero means the slot is
    /// free and on the free list.
    refcount: u32,
    hash: [u8; 32],
    kind: Kind,
}

/// Arena of reference-counted Merkle nodes with structural sharing.
pub struct NodePool {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    /// Interned all-zero subtree per depth, pinned by a permanent pool
    /// reference so padding never allocates.
    zero_nodes: Vec<NodeId>,
    leak: LeakTracker,
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

impl NodePool {
    pub fn new() -> Self {
        Self::with_leak_check(LeakCheck::Off)
    }

    pub fn with_leak_check(check: LeakCheck) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            zero_nodes: Vec::new(),
            leak: LeakTracker::new(check),
        }
    }

    /// Number of nodes currently allocated (including pinned zero nodes).
    pub fn live_node_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Live nodes the leak detector is tracking, with their allocation sites
    /// and ref/unref history. An empty report from a paranoid pool after all
    /// external handles are dropped means no leaks.
    pub fn leak_report(&self) -> Vec<LeakReport> {
        self.leak.live_reports(|index| {
            self.slots
                .get(index as usize)
                .map(|slot| slot.refcount)
                .unwrap_or(0)
        })
    }

    pub fn refcount(&self, id: NodeId) -> u32 {
        self.slot(id).refcount
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.slot(id).kind, Kind::Leaf)
    }

    /// The children of a branch, `None` for a leaf.
    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match self.slot(id).kind {
            Kind::Leaf => None,
            Kind::Branch { left, right, .. } => Some((left, right)),
        }
    }

    /// The raw content of a leaf, `None` for a branch.
    pub fn leaf_bytes(&self, id: NodeId) -> Option<&[u8; 32]> {
        let slot = self.slot(id);
        match slot.kind {
            Kind::Leaf => Some(&slot.hash),
            Kind::Branch { .. } => None,
        }
    }

    /// Allocates a leaf holding `bytes`. The caller owns the returned
    /// reference.
    #[track_caller]
    pub fn new_leaf(&mut self, bytes: [u8; 32]) -> Result<NodeId, Error> {
        self.alloc(
            Slot {
                refcount: 1,
                hash: bytes,
                kind: Kind::Leaf,
            },
            false,
        )
    }

    /// Allocates a branch over `left` and `right`, bumping both children's
    /// refcounts. The hash is computed lazily on first read. The caller owns
    /// the returned reference.
    #[track_caller]
    pub fn new_branch(&mut self, left: NodeId, right: NodeId) -> Result<NodeId, Error> {
        self.ref_node(left);
        self.ref_node(right);
        self.alloc_branch_owning(left, right)
    }

    /// Like `new_branch` but takes ownership of the caller's references to
    /// both children instead of bumping them.
    #[track_caller]
    fn alloc_branch_owning(&mut self, left: NodeId, right: NodeId) -> Result<NodeId, Error> {
        // Validate both children before allocating.
        let _ = self.slot(left);
        let _ = self.slot(right);
        self.alloc(
            Slot {
                refcount: 1,
                hash: [0; 32],
                kind: Kind::Branch {
                    left,
                    right,
                    dirty: true,
                },
            },
            false,
        )
    }

    /// Adds an external reference to `id`.
    #[track_caller]
    pub fn ref_node(&mut self, id: NodeId) {
        let location = Location::caller();
        let slot = self.slot_mut(id);
        slot.refcount = slot
            .refcount
            .checked_add(1)
            .unwrap_or_else(|| panic!("refcount overflow on {id:?}"));
        self.leak.on_ref(id.0, location);
    }

    /// Releases one reference to `id`. When the count reaches zero the slot
    /// is freed and both children (for a branch) are released in turn.
    ///
    /// Panics if `id` is already free: refcounts are exact and a double
    /// release is a broken invariant, not an input error.
    #[track_caller]
    pub fn unref(&mut self, id: NodeId) {
        let location = Location::caller();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let slot = self.slot_mut(id);
            slot.refcount -= 1;
            self.leak.on_unref(id.0, location);
            if self.slots[id.index()].refcount == 0 {
                if let Kind::Branch { left, right, .. } = self.slots[id.index()].kind {
                    stack.push(left);
                    stack.push(right);
                }
                self.free_list.push(id.0);
                self.leak.on_free(id.0, location);
            }
        }
    }

    /// Returns the hash of `id`, re-hashing any dirty branches beneath it and
    /// caching the results. Idempotent.
    pub fn get_hash(&mut self, id: NodeId) -> [u8; 32] {
        match self.slot(id).kind {
            Kind::Leaf => self.slot(id).hash,
            Kind::Branch {
                left,
                right,
                dirty,
            } => {
                if !dirty {
                    return self.slot(id).hash;
                }
                let left_hash = self.get_hash(left);
                let right_hash = self.get_hash(right);
                let hash = hash32_concat(&left_hash, &right_hash);
                let slot = self.slot_mut(id);
                slot.hash = hash;
                if let Kind::Branch { dirty, .. } = &mut slot.kind {
                    *dirty = false;
                }
                hash
            }
        }
    }

    /// Marks a branch's cached hash stale without touching its children.
    ///
    /// Needed when a descendant was mutated in place: the child pointer is
    /// unchanged but every ancestor hash is now stale. No-op on leaves.
    pub fn mark_dirty(&mut self, id: NodeId) {
        if let Kind::Branch { dirty, .. } = &mut self.slot_mut(id).kind {
            *dirty = true;
        }
    }

    /// Replaces one child of a branch, copy-on-write.
    ///
    /// Consumes the caller's reference to `id` *and* to `new_child`, and
    /// returns an owned reference to the branch to use in their place: `id`
    /// itself (mutated and marked dirty) when the caller was the only holder,
    /// or a fresh branch when the node is shared.
    #[track_caller]
    pub fn set_child(
        &mut self,
        id: NodeId,
        side: Side,
        new_child: NodeId,
    ) -> Result<NodeId, Error> {
        let (left, right) = self.children(id).ok_or(Error::NotABranch(id))?;
        let (old, kept) = match side {
            Side::Left => (left, right),
            Side::Right => (right, left),
        };

        if new_child == old {
            // Nothing changes; release the duplicate reference.
            self.unref(new_child);
            return Ok(id);
        }

        if self.slot(id).refcount == 1 {
            match &mut self.slot_mut(id).kind {
                Kind::Branch {
                    left,
                    right,
                    dirty,
                } => {
                    match side {
                        Side::Left => *left = new_child,
                        Side::Right => *right = new_child,
                    }
                    *dirty = true;
                }
                Kind::Leaf => unreachable!("children() returned Some for a leaf"),
            }
            self.unref(old);
            Ok(id)
        } else {
            self.ref_node(kept);
            let (new_left, new_right) = match side {
                Side::Left => (new_child, kept),
                Side::Right => (kept, new_child),
            };
            let branch = self.alloc_branch_owning(new_left, new_right)?;
            self.unref(id);
            Ok(branch)
        }
    }

    /// Builds a balanced subtree of `depth` over `leaves`, padding missing
    /// subtrees with interned zero nodes (shared, no allocation).
    #[track_caller]
    pub fn fill_with_contents(
        &mut self,
        depth: u32,
        leaves: &[[u8; 32]],
    ) -> Result<NodeId, Error> {
        if depth as usize > MAX_TREE_DEPTH {
            return Err(Error::DepthTooLarge(depth));
        }
        let capacity = 1u128 << depth;
        if leaves.len() as u128 > capacity {
            return Err(Error::TooManyLeaves {
                depth,
                leaves: leaves.len(),
            });
        }
        self.subtree_from_contents(depth, leaves)
    }

    fn subtree_from_contents(&mut self, depth: u32, leaves: &[[u8; 32]]) -> Result<NodeId, Error> {
        if leaves.is_empty() {
            let zero = self.zero_node(depth)?;
            self.ref_node(zero);
            return Ok(zero);
        }
        if depth == 0 {
            return self.new_leaf(leaves[0]);
        }
        let half = 1usize << (depth - 1);
        let split = leaves.len().min(half);
        let left = self.subtree_from_contents(depth - 1, &leaves[..split])?;
        let right = self.subtree_from_contents(depth - 1, &leaves[split..])?;
        self.alloc_branch_owning(left, right)
    }

    /// The interned all-zero subtree of `depth`. The pool holds a permanent
    /// pin, so the node never frees and `set_child` never mutates it in
    /// place.
    pub fn zero_node(&mut self, depth: u32) -> Result<NodeId, Error> {
        if depth as usize > MAX_TREE_DEPTH {
            return Err(Error::DepthTooLarge(depth));
        }
        while self.zero_nodes.len() <= depth as usize {
            let next_depth = self.zero_nodes.len();
            let node = if next_depth == 0 {
                self.alloc(
                    Slot {
                        refcount: 1,
                        hash: [0; 32],
                        kind: Kind::Leaf,
                    },
                    true,
                )?
            } else {
                let child = self.zero_nodes[next_depth - 1];
                let slot = self.slot_mut(child);
                slot.refcount += 2;
                self.alloc(
                    Slot {
                        refcount: 1,
                        hash: *zero_hash(next_depth),
                        kind: Kind::Branch {
                            left: child,
                            right: child,
                            dirty: false,
                        },
                    },
                    true,
                )?
            };
            self.zero_nodes.push(node);
        }
        Ok(self.zero_nodes[depth as usize])
    }

    /// Descends from `root` by the bits of a generalized index: `1` is the
    /// root, `2n` and `2n + 1` the children of `n`.
    pub fn navigate(&self, root: NodeId, gindex: u64) -> Result<NodeId, Error> {
        if gindex == 0 {
            return Err(Error::InvalidGindex(gindex));
        }
        let depth = 63 - gindex.leading_zeros();
        let mut node = root;
        for i in (0..depth).rev() {
            let (left, right) = self
                .children(node)
                .ok_or(Error::InvalidGindex(gindex))?;
            node = if (gindex >> i) & 1 == 1 { right } else { left };
        }
        Ok(node)
    }

    /// Returns the sibling hashes along the path to `gindex`, bottom-up, in
    /// the order `merkle_proof::verify_merkle_proof` expects.
    pub fn generate_proof(&mut self, root: NodeId, gindex: u64) -> Result<Vec<[u8; 32]>, Error> {
        if gindex == 0 {
            return Err(Error::InvalidGindex(gindex));
        }
        let depth = 63 - gindex.leading_zeros();
        let mut proof = Vec::with_capacity(depth as usize);
        let mut node = root;
        for i in (0..depth).rev() {
            let (left, right) = self
                .children(node)
                .ok_or(Error::InvalidGindex(gindex))?;
            let (next, sibling) = if (gindex >> i) & 1 == 1 {
                (right, left)
            } else {
                (left, right)
            };
            proof.push(self.get_hash(sibling));
            node = next;
        }
        proof.reverse();
        Ok(proof)
    }

    #[track_caller]
    fn alloc(&mut self, slot: Slot, pinned: bool) -> Result<NodeId, Error> {
        let location = Location::caller();
        let index = if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = slot;
            index
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| Error::PoolExhausted)?;
            if index == u32::MAX {
                return Err(Error::PoolExhausted);
            }
            self.slots.push(slot);
            index
        };
        self.leak.on_alloc(index, pinned, location);
        Ok(NodeId(index))
    }

    fn slot(&self, id: NodeId) -> &Slot {
        let slot = self
            .slots
            .get(id.index())
            .unwrap_or_else(|| panic!("{id:?} out of bounds for pool of {}", self.slots.len()));
        if slot.refcount == 0 {
            self.leak.panic_use_after_free(id.0);
        }
        slot
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        let total = self.slots.len();
        let leak = &self.leak;
        let slot = self
            .slots
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("{id:?} out of bounds for pool of {total}"));
        if slot.refcount == 0 {
            leak.panic_use_after_free(id.0);
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merkle_proof::verify_merkle_proof;
    use fixed_bytes::Hash256;

    fn leaf_bytes(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn leaf_hash_is_its_contents() {
        let mut pool = NodePool::new();
        let leaf = pool.new_leaf(leaf_bytes(7)).unwrap();
        assert_eq!(pool.get_hash(leaf), leaf_bytes(7));
    }

    #[test]
    fn branch_hash_is_pairwise_sha256() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        let branch = pool.new_branch(a, b).unwrap();
        assert_eq!(
            pool.get_hash(branch),
            hash32_concat(&leaf_bytes(1), &leaf_bytes(2))
        );
        // Idempotent.
        assert_eq!(
            pool.get_hash(branch),
            hash32_concat(&leaf_bytes(1), &leaf_bytes(2))
        );
    }

    #[test]
    fn unref_frees_descendants_exactly_once() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        let branch = pool.new_branch(a, b).unwrap();
        // Drop our direct leaf refs; the branch keeps them alive.
        pool.unref(a);
        pool.unref(b);
        assert_eq!(pool.live_node_count(), 3);

        pool.unref(branch);
        assert_eq!(pool.live_node_count(), 0);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        pool.unref(a);
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        assert_eq!(a.as_u32(), b.as_u32());
        assert_eq!(pool.live_node_count(), 1);
    }

    #[test]
    #[should_panic(expected = "freed node")]
    fn unref_of_freed_node_panics() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        pool.unref(a);
        pool.unref(a);
    }

    #[test]
    fn set_child_in_place_when_unshared() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        let branch = pool.new_branch(a, b).unwrap();
        pool.unref(a);
        pool.unref(b);
        let _ = pool.get_hash(branch);

        let c = pool.new_leaf(leaf_bytes(3)).unwrap();
        let updated = pool.set_child(branch, Side::Right, c).unwrap();
        assert_eq!(updated, branch, "unshared branch mutates in place");
        assert_eq!(
            pool.get_hash(updated),
            hash32_concat(&leaf_bytes(1), &leaf_bytes(3))
        );
        pool.unref(updated);
        assert_eq!(pool.live_node_count(), 0);
    }

    #[test]
    fn set_child_copies_when_shared() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        let branch = pool.new_branch(a, b).unwrap();
        pool.unref(a);
        pool.unref(b);

        // A second holder of the branch.
        pool.ref_node(branch);

        let c = pool.new_leaf(leaf_bytes(3)).unwrap();
        let updated = pool.set_child(branch, Side::Right, c).unwrap();
        assert_ne!(updated, branch, "shared branch must not mutate in place");

        // The original is unaffected.
        assert_eq!(
            pool.get_hash(branch),
            hash32_concat(&leaf_bytes(1), &leaf_bytes(2))
        );
        assert_eq!(
            pool.get_hash(updated),
            hash32_concat(&leaf_bytes(1), &leaf_bytes(3))
        );

        // The left leaf is shared between both branches.
        assert_eq!(pool.refcount(a), 2);

        pool.unref(branch);
        pool.unref(updated);
        assert_eq!(pool.live_node_count(), 0);
    }

    #[test]
    fn set_child_with_same_child_is_a_no_op() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        let branch = pool.new_branch(a, b).unwrap();
        pool.unref(a);

        // Transfer our `b` ref back into the same position.
        let updated = pool.set_child(branch, Side::Right, b).unwrap();
        assert_eq!(updated, branch);
        assert_eq!(pool.refcount(b), 1);
        pool.unref(branch);
        assert_eq!(pool.live_node_count(), 0);
    }

    #[test]
    fn fill_with_contents_pads_with_zero_hashes() {
        let mut pool = NodePool::new();
        // Depth 2 with one leaf: H(H(leaf, z0), z1).
        let leaves = [leaf_bytes(9)];
        let root = pool.fill_with_contents(2, &leaves).unwrap();
        let expected = hash32_concat(
            &hash32_concat(&leaf_bytes(9), zero_hash(0)),
            zero_hash(1),
        );
        assert_eq!(pool.get_hash(root), expected);
    }

    #[test]
    fn fill_with_contents_empty_is_the_zero_subtree() {
        let mut pool = NodePool::new();
        let root = pool.fill_with_contents(10, &[]).unwrap();
        assert_eq!(pool.get_hash(root), *zero_hash(10));
        // Interned: the chain of 11 zero nodes, nothing else.
        assert_eq!(pool.live_node_count(), 11);
    }

    #[test]
    fn fill_with_contents_rejects_overflow() {
        let mut pool = NodePool::new();
        let leaves = vec![[0u8; 32]; 3];
        assert_eq!(
            pool.fill_with_contents(1, &leaves),
            Err(Error::TooManyLeaves { depth: 1, leaves: 3 })
        );
    }

    #[test]
    fn navigate_by_gindex() {
        let mut pool = NodePool::new();
        let a = pool.new_leaf(leaf_bytes(1)).unwrap();
        let b = pool.new_leaf(leaf_bytes(2)).unwrap();
        let c = pool.new_leaf(leaf_bytes(3)).unwrap();
        let d = pool.new_leaf(leaf_bytes(4)).unwrap();
        let left = pool.new_branch(a, b).unwrap();
        let right = pool.new_branch(c, d).unwrap();
        let root = pool.new_branch(left, right).unwrap();

        assert_eq!(pool.navigate(root, 1).unwrap(), root);
        assert_eq!(pool.navigate(root, 2).unwrap(), left);
        assert_eq!(pool.navigate(root, 3).unwrap(), right);
        assert_eq!(pool.navigate(root, 4).unwrap(), a);
        assert_eq!(pool.navigate(root, 7).unwrap(), d);

        assert_eq!(pool.navigate(root, 0), Err(Error::InvalidGindex(0)));
        // Descending through a leaf is out of range for this tree shape.
        assert_eq!(pool.navigate(root, 8), Err(Error::InvalidGindex(8)));
    }

    #[test]
    fn proofs_verify_against_the_root() {
        let mut pool = NodePool::new();
        let leaves: Vec<[u8; 32]> = (1..=4u8).map(leaf_bytes).collect();
        let root = pool.fill_with_contents(2, &leaves).unwrap();
        let root_hash = Hash256::from(pool.get_hash(root));

        for (i, leaf) in leaves.iter().enumerate() {
            let gindex = 4 + i as u64;
            let proof = pool.generate_proof(root, gindex).unwrap();
            let branch: Vec<Hash256> = proof.iter().map(|h| Hash256::from(*h)).collect();
            assert!(verify_merkle_proof(
                Hash256::from(*leaf),
                &branch,
                2,
                i,
                root_hash
            ));
        }
    }

    #[test]
    fn structural_sharing_bounds_memory() {
        let mut pool = NodePool::new();
        let leaves: Vec<[u8; 32]> = (0..16u8).map(leaf_bytes).collect();
        let root = pool.fill_with_contents(4, &leaves).unwrap();
        let base_count = pool.live_node_count();

        // "Clone" the tree.
        pool.ref_node(root);

        // Mutate one leaf of the clone: only one path of new nodes appears.
        let new_leaf = pool.new_leaf(leaf_bytes(0xFF)).unwrap();
        let mut path = vec![root];
        let mut node = root;
        for _ in 0..3 {
            let (left, _) = pool.children(node).unwrap();
            path.push(left);
            node = left;
        }
        // Replace the leftmost leaf, rebuilding upwards.
        let mut child = new_leaf;
        for &parent in path.iter().rev() {
            pool.ref_node(parent);
            child = pool.set_child(parent, Side::Left, child).unwrap();
        }
        let new_root = child;
        assert_ne!(new_root, root);
        // One new node per level (4 branches) plus the new leaf.
        assert_eq!(pool.live_node_count(), base_count + 5);

        // Original tree unchanged.
        let original = pool.fill_with_contents(4, &leaves).unwrap();
        let expected = pool.get_hash(original);
        assert_eq!(pool.get_hash(root), expected);
    }
}
