use crate::Error;
use bls::{PublicKeyBytes, SignatureBytes};
use fixed_bytes::Hash256;
use persistent_merkle_tree::{NodeId, NodePool};
use ssz::{Decode, Encode};

/// The chunk layout of a type inside a pool-backed tree.
///
/// Basic types pack side-by-side into 32-byte chunks; composite types occupy
/// a subtree whose leaves are their field roots. The two cases are mutually
/// exclusive: a packed type never implements the subtree methods and vice
/// versa.
pub trait TreeSsz: Clone + Encode + Decode {
    /// Bytes this type occupies inside a packed chunk, or `None` for types
    /// stored as a subtree.
    const PACKED_BYTES: Option<usize>;

    /// Depth of this type's own subtree. Zero for packed types.
    const SUBTREE_DEPTH: u32;

    fn write_packed(&self, _buf: &mut [u8]) {
        unreachable!("type is not packed")
    }

    fn read_packed(_buf: &[u8]) -> Self {
        unreachable!("type is not packed")
    }

    fn to_subtree(&self, _pool: &mut NodePool) -> Result<NodeId, Error> {
        unreachable!("type has no subtree form")
    }

    fn from_subtree(_pool: &NodePool, _node: NodeId) -> Result<Self, Error> {
        unreachable!("type has no subtree form")
    }
}

impl TreeSsz for u8 {
    const PACKED_BYTES: Option<usize> = Some(1);
    const SUBTREE_DEPTH: u32 = 0;

    fn write_packed(&self, buf: &mut [u8]) {
        buf[0] = *self;
    }

    fn read_packed(buf: &[u8]) -> Self {
        buf[0]
    }
}

impl TreeSsz for u32 {
    const PACKED_BYTES: Option<usize> = Some(4);
    const SUBTREE_DEPTH: u32 = 0;

    fn write_packed(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn read_packed(buf: &[u8]) -> Self {
        u32::from_le_bytes(buf.try_into().expect("buf is PACKED_BYTES long"))
    }
}

impl TreeSsz for u64 {
    const PACKED_BYTES: Option<usize> = Some(8);
    const SUBTREE_DEPTH: u32 = 0;

    fn write_packed(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn read_packed(buf: &[u8]) -> Self {
        u64::from_le_bytes(buf.try_into().expect("buf is PACKED_BYTES long"))
    }
}

impl TreeSsz for bool {
    const PACKED_BYTES: Option<usize> = Some(1);
    const SUBTREE_DEPTH: u32 = 0;

    fn write_packed(&self, buf: &mut [u8]) {
        buf[0] = *self as u8;
    }

    fn read_packed(buf: &[u8]) -> Self {
        buf[0] != 0
    }
}

impl TreeSsz for Hash256 {
    const PACKED_BYTES: Option<usize> = Some(32);
    const SUBTREE_DEPTH: u32 = 0;

    fn write_packed(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self.as_slice());
    }

    fn read_packed(buf: &[u8]) -> Self {
        Hash256::from_slice(buf)
    }
}

/// 48 bytes: two chunks, depth-1 subtree.
impl TreeSsz for PublicKeyBytes {
    const PACKED_BYTES: Option<usize> = None;
    const SUBTREE_DEPTH: u32 = 1;

    fn to_subtree(&self, pool: &mut NodePool) -> Result<NodeId, Error> {
        let bytes = self.serialize();
        let mut chunks = [[0u8; 32]; 2];
        chunks[0].copy_from_slice(&bytes[0..32]);
        chunks[1][0..16].copy_from_slice(&bytes[32..48]);
        Ok(pool.fill_with_contents(1, &chunks)?)
    }

    fn from_subtree(pool: &NodePool, node: NodeId) -> Result<Self, Error> {
        let (left, right) = pool
            .children(node)
            .ok_or(Error::Pool(persistent_merkle_tree::Error::NotABranch(node)))?;
        let mut bytes = [0u8; 48];
        bytes[0..32].copy_from_slice(leaf_contents(pool, left)?);
        bytes[32..48].copy_from_slice(&leaf_contents(pool, right)?[0..16]);
        Ok(PublicKeyBytes::deserialize(&bytes).expect("48 bytes"))
    }
}

/// 96 bytes: three chunks, depth-2 subtree.
impl TreeSsz for SignatureBytes {
    const PACKED_BYTES: Option<usize> = None;
    const SUBTREE_DEPTH: u32 = 2;

    fn to_subtree(&self, pool: &mut NodePool) -> Result<NodeId, Error> {
        let bytes = self.serialize();
        let mut chunks = [[0u8; 32]; 3];
        chunks[0].copy_from_slice(&bytes[0..32]);
        chunks[1].copy_from_slice(&bytes[32..64]);
        chunks[2].copy_from_slice(&bytes[64..96]);
        Ok(pool.fill_with_contents(2, &chunks)?)
    }

    fn from_subtree(pool: &NodePool, node: NodeId) -> Result<Self, Error> {
        let mut bytes = [0u8; 96];
        for (i, chunk) in bytes.chunks_mut(32).enumerate() {
            let leaf = pool.navigate(node, 4 + i as u64)?;
            chunk.copy_from_slice(leaf_contents(pool, leaf)?);
        }
        Ok(SignatureBytes::deserialize(&bytes).expect("96 bytes"))
    }
}

pub(crate) fn leaf_contents<'a>(
    pool: &'a NodePool,
    node: NodeId,
) -> Result<&'a [u8; 32], Error> {
    pool.leaf_bytes(node)
        .ok_or(Error::Pool(persistent_merkle_tree::Error::NotABranch(node)))
}

/// Builds the tree node for one container field: a padded leaf for packed
/// types, the type's own subtree otherwise. The caller owns the returned
/// reference.
pub fn field_node<T: TreeSsz>(value: &T, pool: &mut NodePool) -> Result<NodeId, Error> {
    if let Some(width) = T::PACKED_BYTES {
        let mut chunk = [0u8; 32];
        value.write_packed(&mut chunk[0..width]);
        Ok(pool.new_leaf(chunk)?)
    } else {
        value.to_subtree(pool)
    }
}

/// Reads one container field back out of its node.
pub fn field_from_node<T: TreeSsz>(pool: &NodePool, node: NodeId) -> Result<T, Error> {
    if let Some(width) = T::PACKED_BYTES {
        Ok(T::read_packed(&leaf_contents(pool, node)?[0..width]))
    } else {
        T::from_subtree(pool, node)
    }
}

/// Merkleizes pre-built nodes into a balanced subtree of `depth`, padding
/// with interned zero subtrees. Consumes the caller's references to `nodes`.
pub fn merkleize_nodes(
    pool: &mut NodePool,
    depth: u32,
    nodes: &[NodeId],
) -> Result<NodeId, Error> {
    if nodes.is_empty() {
        let zero = pool.zero_node(depth)?;
        pool.ref_node(zero);
        return Ok(zero);
    }
    if depth == 0 {
        // A single node fills the whole subtree.
        return Ok(nodes[0]);
    }
    let half = 1usize << (depth - 1);
    let split = nodes.len().min(half);
    let left = merkleize_nodes(pool, depth - 1, &nodes[..split])?;
    let right = merkleize_nodes(pool, depth - 1, &nodes[split..])?;
    let branch = pool.new_branch(left, right)?;
    pool.unref(left);
    pool.unref(right);
    Ok(branch)
}

/// Implements [`TreeSsz`] for a fixed-size container: the subtree's leaves
/// are the field roots, in declaration order, padded to the next power of
/// two. The resulting root matches the type's SSZ `tree_hash_root`.
#[macro_export]
macro_rules! tree_ssz_container {
    ($type:ty { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::TreeSsz for $type {
            const PACKED_BYTES: Option<usize> = None;
            const SUBTREE_DEPTH: u32 = {
                let num_fields = [$(stringify!($field)),+].len();
                if num_fields <= 1 {
                    0
                } else {
                    usize::BITS - (num_fields - 1).leading_zeros()
                }
            };

            fn to_subtree(
                &self,
                pool: &mut persistent_merkle_tree::NodePool,
            ) -> Result<persistent_merkle_tree::NodeId, $crate::Error> {
                let nodes = [
                    $( $crate::field_node::<$fty>(&self.$field, pool)? ),+
                ];
                $crate::merkleize_nodes(pool, Self::SUBTREE_DEPTH, &nodes)
            }

            fn from_subtree(
                pool: &persistent_merkle_tree::NodePool,
                node: persistent_merkle_tree::NodeId,
            ) -> Result<Self, $crate::Error> {
                let base = 1u64 << Self::SUBTREE_DEPTH;
                let mut field_index = 0u64;
                Ok(Self {
                    $(
                        $field: {
                            let field_node = pool
                                .navigate(node, base + field_index)
                                .map_err($crate::Error::Pool)?;
                            field_index += 1;
                            $crate::field_from_node::<$fty>(pool, field_node)?
                        }
                    ),+
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolHandle;
    use tree_hash::TreeHash;

    #[test]
    fn u64_round_trips_through_a_chunk() {
        let mut buf = [0u8; 8];
        0xdead_beef_u64.write_packed(&mut buf);
        assert_eq!(u64::read_packed(&buf), 0xdead_beef);
    }

    #[test]
    fn pubkey_subtree_root_matches_tree_hash() {
        let pool_handle = PoolHandle::new();
        let mut pool = pool_handle.borrow_mut();
        let pubkey = PublicKeyBytes::deserialize(&[0xab; 48]).unwrap();

        let node = pubkey.to_subtree(&mut pool).unwrap();
        assert_eq!(
            Hash256::from(pool.get_hash(node)),
            pubkey.tree_hash_root()
        );
        assert_eq!(PublicKeyBytes::from_subtree(&pool, node).unwrap(), pubkey);
    }

    #[test]
    fn signature_subtree_root_matches_tree_hash() {
        let pool_handle = PoolHandle::new();
        let mut pool = pool_handle.borrow_mut();
        let signature = SignatureBytes::deserialize(&[0xcd; 96]).unwrap();

        let node = signature.to_subtree(&mut pool).unwrap();
        assert_eq!(
            Hash256::from(pool.get_hash(node)),
            signature.tree_hash_root()
        );
        assert_eq!(
            SignatureBytes::from_subtree(&pool, node).unwrap(),
            signature
        );
    }
}
