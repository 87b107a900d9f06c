//! Element-level operations shared by `Vector` and `List`.
//!
//! An element lives either packed inside a 32-byte chunk leaf or as its own
//! subtree hanging off a chunk position. All functions address chunks by
//! their position under a tree of fixed `depth` (the type-level capacity),
//! so missing chunks resolve to interned zero subtrees.

use crate::tree_ssz::leaf_contents;
use crate::{Error, TreeSsz};
use persistent_merkle_tree::{NodeId, NodePool, Side};

/// Chunks needed for `len` elements of `T`.
pub(crate) fn chunk_count<T: TreeSsz>(len: usize) -> usize {
    match T::PACKED_BYTES {
        Some(width) => len.saturating_mul(width).div_ceil(32),
        None => len,
    }
}

/// Tree depth over the chunks of a capacity-`capacity` collection.
pub(crate) fn capacity_depth<T: TreeSsz>(capacity: usize) -> u32 {
    crate::ceil_log2(chunk_count::<T>(capacity))
}

pub(crate) fn get_element<T: TreeSsz>(
    pool: &NodePool,
    root: NodeId,
    depth: u32,
    i: usize,
) -> Result<T, Error> {
    if let Some(width) = T::PACKED_BYTES {
        let per_chunk = 32 / width;
        let chunk = i / per_chunk;
        let offset = (i % per_chunk) * width;
        let leaf = pool.navigate(root, chunk_gindex(depth, chunk))?;
        let bytes = leaf_contents(pool, leaf)?;
        Ok(T::read_packed(&bytes[offset..offset + width]))
    } else {
        let node = pool.navigate(root, chunk_gindex(depth, i))?;
        T::from_subtree(pool, node)
    }
}

/// Writes element `i`, returning the root to use afterwards.
///
/// Does not consume the caller's reference to `root`; when the returned id
/// differs the caller must release its old root.
pub(crate) fn set_element<T: TreeSsz>(
    pool: &mut NodePool,
    root: NodeId,
    depth: u32,
    i: usize,
    value: &T,
) -> Result<NodeId, Error> {
    let (position, new_node) = if let Some(width) = T::PACKED_BYTES {
        let per_chunk = 32 / width;
        let chunk = i / per_chunk;
        let offset = (i % per_chunk) * width;
        // Patch the value into a copy of the chunk's current contents.
        let leaf = pool.navigate(root, chunk_gindex(depth, chunk))?;
        let mut bytes = *leaf_contents(pool, leaf)?;
        value.write_packed(&mut bytes[offset..offset + width]);
        (chunk, pool.new_leaf(bytes)?)
    } else {
        (i, value.to_subtree(pool)?)
    };

    replace_chunk(pool, root, depth, position as u64, new_node)
}

/// Replaces the subtree at chunk `position`, copy-on-write along the path.
///
/// Takes ownership of the caller's reference to `new_node`. Does not consume
/// the reference to `root`.
fn replace_chunk(
    pool: &mut NodePool,
    root: NodeId,
    depth: u32,
    position: u64,
    new_node: NodeId,
) -> Result<NodeId, Error> {
    let gindex = (1u64 << depth) | position;
    replace_at(pool, root, depth, gindex, new_node)
}

fn replace_at(
    pool: &mut NodePool,
    node: NodeId,
    level: u32,
    gindex: u64,
    new_node: NodeId,
) -> Result<NodeId, Error> {
    if level == 0 {
        if new_node == node {
            // Writing the value that is already there (e.g. a shared zero
            // subtree); release the duplicate reference.
            pool.unref(new_node);
        }
        return Ok(new_node);
    }

    let (left, right) = pool
        .children(node)
        .ok_or(Error::Pool(persistent_merkle_tree::Error::InvalidGindex(
            gindex,
        )))?;
    let bit = (gindex >> (level - 1)) & 1;
    let (old_child, side) = if bit == 1 {
        (right, Side::Right)
    } else {
        (left, Side::Left)
    };

    let new_child = replace_at(pool, old_child, level - 1, gindex, new_node)?;

    if new_child == old_child {
        // The child kept its identity (mutated in place, or untouched); the
        // cached hash here may be stale either way.
        pool.mark_dirty(node);
        return Ok(node);
    }

    if pool.refcount(node) == 1 {
        // Sole owner: `set_child` mutates in place and the id is preserved.
        Ok(pool.set_child(node, side, new_child)?)
    } else {
        // Shared: balance the reference `set_child` consumes, leaving the
        // original holders untouched and returning a branch we own.
        pool.ref_node(node);
        Ok(pool.set_child(node, side, new_child)?)
    }
}

pub(crate) fn chunk_gindex(depth: u32, chunk: usize) -> u64 {
    (1u64 << depth) | chunk as u64
}

/// Builds the chunk tree for `values`, zero-padded to `depth`.
pub(crate) fn build_tree<T: TreeSsz>(
    pool: &mut NodePool,
    depth: u32,
    values: &[T],
) -> Result<NodeId, Error> {
    if let Some(width) = T::PACKED_BYTES {
        let per_chunk = 32 / width;
        let chunks: Vec<[u8; 32]> = values
            .chunks(per_chunk)
            .map(|group| {
                let mut chunk = [0u8; 32];
                for (j, value) in group.iter().enumerate() {
                    value.write_packed(&mut chunk[j * width..(j + 1) * width]);
                }
                chunk
            })
            .collect();
        Ok(pool.fill_with_contents(depth, &chunks)?)
    } else {
        let nodes = values
            .iter()
            .map(|value| value.to_subtree(pool))
            .collect::<Result<Vec<_>, _>>()?;
        crate::merkleize_nodes(pool, depth, &nodes)
    }
}
