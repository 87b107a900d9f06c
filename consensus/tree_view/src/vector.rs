use crate::raw;
use crate::{Error, PoolHandle, TreeSsz, Unsigned};
use fixed_bytes::Hash256;
use persistent_merkle_tree::NodeId;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

/// A fixed-length SSZ vector backed by a pool subtree.
///
/// Always exactly `N` elements long; elements that were never written read
/// back as `T`'s all-zero default thanks to zero-subtree padding.
pub struct Vector<T: TreeSsz, N: Unsigned> {
    pool: PoolHandle,
    root: NodeId,
    /// Sparse cache of decoded elements, invalidated per-index on write.
    cache: RefCell<HashMap<usize, T>>,
    _phantom: PhantomData<N>,
}

impl<T: TreeSsz, N: Unsigned> Vector<T, N> {
    fn depth() -> u32 {
        raw::capacity_depth::<T>(N::to_usize())
    }

    /// Builds a vector from exactly `N` values on the thread pool.
    pub fn new(values: Vec<T>) -> Result<Self, Error> {
        Self::new_in(PoolHandle::thread_default(), values)
    }

    pub fn new_in(pool: PoolHandle, values: Vec<T>) -> Result<Self, Error> {
        if values.len() != N::to_usize() {
            return Err(Error::InvalidVectorLength {
                got: values.len(),
                expected: N::to_usize(),
            });
        }
        let root = raw::build_tree(&mut pool.borrow_mut(), Self::depth(), &values)?;
        Ok(Self {
            pool,
            root,
            cache: RefCell::new(HashMap::new()),
            _phantom: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        N::to_usize()
    }

    pub fn is_empty(&self) -> bool {
        N::to_usize() == 0
    }

    pub fn get(&self, i: usize) -> Option<T> {
        if i >= N::to_usize() {
            return None;
        }
        if let Some(cached) = self.cache.borrow().get(&i) {
            return Some(cached.clone());
        }
        let value =
            raw::get_element::<T>(&self.pool.borrow(), self.root, Self::depth(), i).ok()?;
        self.cache.borrow_mut().insert(i, value.clone());
        Some(value)
    }

    pub fn set(&mut self, i: usize, value: T) -> Result<(), Error> {
        if i >= N::to_usize() {
            return Err(Error::OutOfBounds {
                i,
                len: N::to_usize(),
            });
        }
        let new_root = {
            let mut pool = self.pool.borrow_mut();
            let new_root = raw::set_element(&mut pool, self.root, Self::depth(), i, &value)?;
            if new_root != self.root {
                pool.unref(self.root);
            }
            new_root
        };
        self.root = new_root;
        self.cache.borrow_mut().insert(i, value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..N::to_usize()).map(move |i| self.get(i).expect("index is within the fixed length"))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Recomputes any dirty hashes bottom-up and returns the stable root.
    pub fn commit(&self) -> Hash256 {
        Hash256::from(self.pool.borrow_mut().get_hash(self.root))
    }

    /// Drops the element cache; tree identity (and therefore the committed
    /// root) is unaffected.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Whether the element cache currently holds no decoded elements.
    pub fn is_cache_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }
}

impl<T: TreeSsz, N: Unsigned> Clone for Vector<T, N> {
    fn clone(&self) -> Self {
        self.pool.borrow_mut().ref_node(self.root);
        Self {
            pool: self.pool.clone(),
            root: self.root,
            cache: RefCell::new(HashMap::new()),
            _phantom: PhantomData,
        }
    }
}

impl<T: TreeSsz, N: Unsigned> Drop for Vector<T, N> {
    fn drop(&mut self) {
        self.pool.borrow_mut().unref(self.root);
    }
}

impl<T: TreeSsz, N: Unsigned> Default for Vector<T, N> {
    /// The all-zero vector: a single interned zero subtree.
    fn default() -> Self {
        let pool = PoolHandle::thread_default();
        let root = {
            let mut p = pool.borrow_mut();
            let zero = p.zero_node(Self::depth()).expect("depth fits the zero table");
            p.ref_node(zero);
            zero
        };
        Self {
            pool,
            root,
            cache: RefCell::new(HashMap::new()),
            _phantom: PhantomData,
        }
    }
}

impl<T: TreeSsz, N: Unsigned> PartialEq for Vector<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.commit() == other.commit()
    }
}

impl<T: TreeSsz, N: Unsigned> fmt::Debug for Vector<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("len", &N::to_usize())
            .finish()
    }
}

impl<T: TreeSsz, N: Unsigned> TreeHash for Vector<T, N> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.commit()
    }
}

impl<T: TreeSsz, N: Unsigned> Encode for Vector<T, N> {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <T as Encode>::ssz_fixed_len() * N::to_usize()
    }

    fn ssz_bytes_len(&self) -> usize {
        <Self as Encode>::ssz_fixed_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        for element in self.iter() {
            element.ssz_append(buf);
        }
    }
}

impl<T: TreeSsz, N: Unsigned> Decode for Vector<T, N> {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <T as Decode>::ssz_fixed_len() * N::to_usize()
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let expected = <Self as Decode>::ssz_fixed_len();
        if bytes.len() != expected {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected,
            });
        }
        let values = bytes
            .chunks(<T as Decode>::ssz_fixed_len())
            .map(T::from_ssz_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values).map_err(|e| {
            DecodeError::BytesInvalid(format!("failed to build vector tree: {e:?}"))
        })
    }
}

impl<T: TreeSsz + Serialize, N: Unsigned> Serialize for Vector<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self.iter() {
            seq.serialize_element(&element)?;
        }
        seq.end()
    }
}

impl<'de, T, N> Deserialize<'de> for Vector<T, N>
where
    T: TreeSsz + Deserialize<'de>,
    N: Unsigned,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<T>::deserialize(deserializer)?;
        Self::new(values).map_err(|e| serde::de::Error::custom(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typenum::{U4, U8};
    use fixed_bytes::FixedBytesExtended;
    use tree_hash::TreeHash;

    #[test]
    fn default_vector_reads_zeroes() {
        let vector = Vector::<u64, U8>::default();
        assert_eq!(vector.len(), 8);
        assert!(vector.iter().all(|v| v == 0));
    }

    #[test]
    fn new_requires_exact_length() {
        assert!(Vector::<u64, U4>::new(vec![1, 2, 3]).is_err());
        assert!(Vector::<u64, U4>::new(vec![1, 2, 3, 4]).is_ok());
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut vector = Vector::<u64, U8>::new((0..8).collect()).unwrap();
        assert_eq!(vector.get(3), Some(3));
        vector.set(3, 999).unwrap();
        assert_eq!(vector.get(3), Some(999));
        assert_eq!(vector.get(2), Some(2));
        assert!(vector.set(8, 0).is_err());
    }

    #[test]
    fn root_matches_value_level_tree_hash() {
        let values: Vec<u64> = (1..=8).collect();
        let vector = Vector::<u64, U8>::new(values.clone()).unwrap();
        let value_backed = ssz_types::FixedVector::<u64, U8>::new(values).unwrap();
        assert_eq!(vector.tree_hash_root(), value_backed.tree_hash_root());
    }

    #[test]
    fn hash256_vector_root_matches_value_level() {
        let values: Vec<Hash256> = (0..4u64).map(Hash256::from_low_u64_be).collect();
        let vector = Vector::<Hash256, U4>::new(values.clone()).unwrap();
        let value_backed = ssz_types::FixedVector::<Hash256, U4>::new(values).unwrap();
        assert_eq!(vector.tree_hash_root(), value_backed.tree_hash_root());
    }

    #[test]
    fn clone_is_isolated() {
        let original = Vector::<u64, U8>::new((0..8).collect()).unwrap();
        let root_before = original.commit();

        let mut cloned = original.clone();
        cloned.set(0, 42).unwrap();

        assert_eq!(original.commit(), root_before);
        assert_ne!(cloned.commit(), root_before);
        assert_eq!(original.get(0), Some(0));
        assert_eq!(cloned.get(0), Some(42));
    }

    #[test]
    fn clear_cache_preserves_root() {
        let mut vector = Vector::<u64, U8>::new((0..8).collect()).unwrap();
        vector.set(5, 1234).unwrap();
        let root = vector.commit();
        vector.clear_cache();
        assert_eq!(vector.commit(), root);
        assert_eq!(vector.get(5), Some(1234));
    }

    #[test]
    fn ssz_round_trip() {
        let vector = Vector::<u64, U4>::new(vec![5, 6, 7, 8]).unwrap();
        let bytes = vector.as_ssz_bytes();
        assert_eq!(bytes.len(), 32);
        let decoded = Vector::<u64, U4>::from_ssz_bytes(&bytes).unwrap();
        assert_eq!(decoded, vector);
    }
}
