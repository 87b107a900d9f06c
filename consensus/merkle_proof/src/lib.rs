use ethereum_hashing::{ZERO_HASHES, hash32_concat};
use fixed_bytes::{FixedBytesExtended, Hash256};
use safe_arith::ArithError;

const MAX_TREE_DEPTH: usize = 32;

/// Right-sparse Merkle tree.
///
/// Efficiently represents a tree of fixed depth where only the first N indices
/// are populated by non-zero leaves (typically a contract tree).
#[derive(Debug, PartialEq)]
pub enum MerkleTree {
    /// Finalized subtree for which only the hash is stored.
    Leaf(Hash256),
    /// Internal node with hash, left subtree and right subtree.
    Node(Hash256, Box<Self>, Box<Self>),
    /// Zero subtree of a given depth.
    ///
    /// It represents a Merkle tree of 2^depth zero leaves.
    Zero(usize),
}

#[derive(Debug, PartialEq, Clone)]
pub enum MerkleTreeError {
    /// Trying to push in a leaf
    LeafReached,
    /// No more space in the MerkleTree
    MerkleTreeFull,
    /// MerkleTree is invalid
    Invalid,
    /// Incorrect Depth provided
    DepthTooSmall,
    /// Overflow occurred
    ArithError,
}

impl MerkleTree {
    /// Create a new Merkle tree from a list of leaves and a fixed depth.
    pub fn create(leaves: &[Hash256], depth: usize) -> Self {
        use MerkleTree::*;

        if leaves.is_empty() {
            return Zero(depth);
        }

        match depth {
            0 => {
                debug_assert_eq!(leaves.len(), 1);
                Leaf(leaves[0])
            }
            _ => {
                // Split leaves into left and right subtrees
                let subtree_capacity = 2usize.pow(depth as u32 - 1);
                let (left_leaves, right_leaves) = if leaves.len() <= subtree_capacity {
                    (leaves, &[] as &[Hash256])
                } else {
                    leaves.split_at(subtree_capacity)
                };

                let left_subtree = MerkleTree::create(left_leaves, depth - 1);
                let right_subtree = MerkleTree::create(right_leaves, depth - 1);
                let hash = Hash256::from(hash32_concat(
                    left_subtree.hash().as_slice(),
                    right_subtree.hash().as_slice(),
                ));

                Node(hash, Box::new(left_subtree), Box::new(right_subtree))
            }
        }
    }

    /// Push an element in the MerkleTree.
    ///
    /// MerkleTree and depth must be correct, as the algorithm expects valid data.
    pub fn push_leaf(&mut self, elem: Hash256, depth: usize) -> Result<(), MerkleTreeError> {
        use MerkleTree::*;

        if depth == 0 {
            return Err(MerkleTreeError::DepthTooSmall);
        }

        match self {
            Leaf(_) => return Err(MerkleTreeError::LeafReached),
            Zero(_) => {
                *self = MerkleTree::create(&[elem], depth);
            }
            Node(ref mut hash, ref mut left, ref mut right) => {
                let left: &mut MerkleTree = &mut *left;
                let right: &mut MerkleTree = &mut *right;
                match (&*left, &*right) {
                    // Tree is full
                    (Leaf(_), Leaf(_)) => return Err(MerkleTreeError::MerkleTreeFull),
                    // There is a right node so insert in right node
                    (Node(_, _, _), Node(_, _, _)) => {
                        right.push_leaf(elem, depth - 1)?;
                    }
                    // Both branches are zero, insert in left one
                    (Zero(_), Zero(_)) => {
                        *left = MerkleTree::create(&[elem], depth - 1);
                    }
                    // Leaf on left branch and zero on right branch, insert on right side
                    (Leaf(_), Zero(_)) => {
                        *right = MerkleTree::create(&[elem], depth - 1);
                    }
                    // Try inserting on the left node -> if it fails because it is full, insert in right side.
                    (Node(_, _, _), Zero(_)) => {
                        match left.push_leaf(elem, depth - 1) {
                            Ok(_) => (),
                            // Left node is full, insert in right node
                            Err(MerkleTreeError::MerkleTreeFull) => {
                                *right = MerkleTree::create(&[elem], depth - 1);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    // All other possibilities are invalid MerkleTrees
                    (_, _) => return Err(MerkleTreeError::Invalid),
                }
                *hash = Hash256::from(hash32_concat(
                    left.hash().as_slice(),
                    right.hash().as_slice(),
                ));
            }
        }

        Ok(())
    }

    /// Retrieve the root hash of this Merkle tree.
    pub fn hash(&self) -> Hash256 {
        match *self {
            MerkleTree::Leaf(h) => h,
            MerkleTree::Node(h, _, _) => h,
            MerkleTree::Zero(depth) => Hash256::from_slice(&ZERO_HASHES[depth]),
        }
    }

    /// Get a reference to the left and right subtrees if they exist.
    pub fn left_and_right_branches(&self) -> Option<(&Self, &Self)> {
        match *self {
            MerkleTree::Leaf(_) | MerkleTree::Zero(0) => None,
            MerkleTree::Node(_, ref l, ref r) => Some((l, r)),
            MerkleTree::Zero(depth) => Some((&ZERO_NODES[depth - 1], &ZERO_NODES[depth - 1])),
        }
    }

    /// Is this Merkle tree a leaf?
    pub fn is_leaf(&self) -> bool {
        matches!(self, MerkleTree::Leaf(_))
    }

    /// Return the leaf at `index` and a Merkle proof of its inclusion.
    ///
    /// The Merkle proof is in "bottom-up" order, starting with a leaf node
    /// and moving up the tree. Its length will be exactly equal to `depth`.
    pub fn generate_proof(
        &self,
        index: usize,
        depth: usize,
    ) -> Result<(Hash256, Vec<Hash256>), MerkleTreeError> {
        let mut proof = vec![];
        let mut current_node = self;
        let mut current_depth = depth;
        while current_depth > 0 {
            let ith_bit = (index >> (current_depth - 1)) & 0x01;
            // Note: unwrap is safe because leaves are only ever constructed at depth == 0.
            let (left, right) = current_node
                .left_and_right_branches()
                .ok_or(MerkleTreeError::Invalid)?;

            // Go right, include the left branch in the proof.
            if ith_bit == 1 {
                proof.push(left.hash());
                current_node = right;
            } else {
                proof.push(right.hash());
                current_node = left;
            }
            current_depth -= 1;
        }

        debug_assert_eq!(proof.len(), depth);
        debug_assert!(current_node.is_leaf() || matches!(current_node, MerkleTree::Zero(0)));

        // Put proof in bottom-up order.
        proof.reverse();

        Ok((current_node.hash(), proof))
    }
}

/// Verify a proof that `leaf` exists at `index` in a Merkle tree rooted at `root`.
///
/// The `branch` argument is the main component of the proof: it should be a list of internal
/// node hashes such that the root can be reconstructed (in bottom-up order).
pub fn verify_merkle_proof(
    leaf: Hash256,
    branch: &[Hash256],
    depth: usize,
    index: usize,
    root: Hash256,
) -> bool {
    if branch.len() == depth {
        merkle_root_from_branch(leaf, branch, depth, index) == root
    } else {
        false
    }
}

/// Compute a root hash from a leaf and a Merkle proof.
pub fn merkle_root_from_branch(
    leaf: Hash256,
    branch: &[Hash256],
    depth: usize,
    index: usize,
) -> Hash256 {
    assert_eq!(branch.len(), depth, "proof length should equal depth");

    let mut merkle_root = leaf.as_slice().to_vec();

    for (i, leaf) in branch.iter().enumerate().take(depth) {
        let ith_bit = (index >> i) & 0x01;
        if ith_bit == 1 {
            merkle_root = hash32_concat(leaf.as_slice(), &merkle_root)[..].to_vec();
        } else {
            let mut input = merkle_root;
            input.extend_from_slice(leaf.as_slice());
            merkle_root = ethereum_hashing::hash(&input);
        }
    }

    Hash256::from_slice(&merkle_root)
}

impl From<ArithError> for MerkleTreeError {
    fn from(_: ArithError) -> Self {
        MerkleTreeError::ArithError
    }
}

/// Zero nodes to act as "synthetic" left and right subtrees of other zero nodes.
static ZERO_NODES: std::sync::LazyLock<Vec<MerkleTree>> =
    std::sync::LazyLock::new(|| (0..=MAX_TREE_DEPTH).map(MerkleTree::Zero).collect());

#[cfg(test)]
mod tests {
    use super::*;

    /// Check that we can:
    /// 1. Build a MerkleTree from arbitrary leaves and an arbitrary depth.
    /// 2. Generate valid proofs for all of the leaves of this MerkleTree.
    fn build_and_prove(leaves: Vec<Hash256>, depth: usize) {
        let merkle_tree = MerkleTree::create(&leaves, depth);
        let merkle_root = merkle_tree.hash();

        for (i, leaf) in leaves.iter().enumerate() {
            let (stored_leaf, branch) = merkle_tree.generate_proof(i, depth).unwrap();
            assert_eq!(*leaf, stored_leaf);
            assert!(verify_merkle_proof(*leaf, &branch, depth, i, merkle_root));
            // A proof for the wrong index should fail.
            assert!(!verify_merkle_proof(
                *leaf,
                &branch,
                depth,
                (i + 1) % (1 << depth),
                merkle_root
            ));
        }
    }

    #[test]
    fn sparse_zero_correct() {
        let depth = 2;
        let zero = Hash256::zero();
        let dense_tree = MerkleTree::create(&[zero, zero, zero, zero], depth);
        let sparse_tree = MerkleTree::create(&[], depth);
        assert_eq!(dense_tree.hash(), sparse_tree.hash());
    }

    #[test]
    fn create_small_example() {
        // Construct a small merkle tree manually and check that it's consistent with
        // the MerkleTree type.
        let leaf_b00 = Hash256::from([0xAA; 32]);
        let leaf_b01 = Hash256::from([0xBB; 32]);
        let leaf_b10 = Hash256::from([0xCC; 32]);
        let leaf_b11 = Hash256::from([0xDD; 32]);

        let node_b0x = Hash256::from(hash32_concat(leaf_b00.as_slice(), leaf_b01.as_slice()));
        let node_b1x = Hash256::from(hash32_concat(leaf_b10.as_slice(), leaf_b11.as_slice()));

        let root = Hash256::from(hash32_concat(node_b0x.as_slice(), node_b1x.as_slice()));

        let tree = MerkleTree::create(&[leaf_b00, leaf_b01, leaf_b10, leaf_b11], 2);
        assert_eq!(tree.hash(), root);
    }

    #[test]
    fn verify_small_example() {
        // Construct a small merkle tree manually
        let leaf_b00 = Hash256::from([0xAA; 32]);
        let leaf_b01 = Hash256::from([0xBB; 32]);
        let leaf_b10 = Hash256::from([0xCC; 32]);
        let leaf_b11 = Hash256::from([0xDD; 32]);

        let node_b0x = Hash256::from(hash32_concat(leaf_b00.as_slice(), leaf_b01.as_slice()));
        let node_b1x = Hash256::from(hash32_concat(leaf_b10.as_slice(), leaf_b11.as_slice()));

        let root = Hash256::from(hash32_concat(node_b0x.as_slice(), node_b1x.as_slice()));

        // Run some proofs
        assert!(verify_merkle_proof(
            leaf_b00,
            &[leaf_b01, node_b1x],
            2,
            0b00,
            root
        ));
        assert!(verify_merkle_proof(
            leaf_b01,
            &[leaf_b00, node_b1x],
            2,
            0b01,
            root
        ));
        assert!(verify_merkle_proof(
            leaf_b10,
            &[leaf_b11, node_b0x],
            2,
            0b10,
            root
        ));
        assert!(verify_merkle_proof(
            leaf_b11,
            &[leaf_b10, node_b0x],
            2,
            0b11,
            root
        ));
        assert!(!verify_merkle_proof(
            leaf_b11,
            &[leaf_b10],
            1,
            0b11,
            root
        ));

        // Ensure proofs with incorrect branches fail.
        assert!(!verify_merkle_proof(
            leaf_b11,
            &[leaf_b10, node_b1x],
            2,
            0b11,
            root
        ));
    }

    #[test]
    fn push_leaf_matches_create() {
        let depth = 3;
        let leaves: Vec<Hash256> = (1..=5u64)
            .map(Hash256::from_low_u64_be)
            .collect();

        let mut incremental = MerkleTree::create(&[], depth);
        for leaf in &leaves {
            incremental.push_leaf(*leaf, depth).unwrap();
        }
        assert_eq!(incremental.hash(), MerkleTree::create(&leaves, depth).hash());
    }

    #[test]
    fn push_leaf_on_full_tree_errors() {
        let depth = 1;
        let mut tree = MerkleTree::create(
            &[Hash256::from_low_u64_be(1), Hash256::from_low_u64_be(2)],
            depth,
        );
        assert_eq!(
            tree.push_leaf(Hash256::from_low_u64_be(3), depth),
            Err(MerkleTreeError::MerkleTreeFull)
        );
    }

    #[test]
    fn build_and_prove_various_sizes() {
        for n in [1usize, 2, 3, 5, 8] {
            let leaves: Vec<Hash256> = (0..n as u64)
                .map(|i| Hash256::from_low_u64_be(i + 1))
                .collect();
            build_and_prove(leaves, 4);
        }
    }
}
