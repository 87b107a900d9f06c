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

/// A variable-length SSZ list backed by a pool subtree.
///
/// The tree always has the depth of the type-level limit `N`; the length
/// lives beside the tree and is mixed into the root on hashing
/// (`mix_in_length`), so pushes never restructure the tree.
pub struct List<T: TreeSsz, N: Unsigned> {
    pool: PoolHandle,
    root: NodeId,
    len: usize,
    cache: RefCell<HashMap<usize, T>>,
    _phantom: PhantomData<N>,
}

impl<T: TreeSsz, N: Unsigned> List<T, N> {
    fn depth() -> u32 {
        raw::capacity_depth::<T>(N::to_usize())
    }

    pub fn empty() -> Self {
        Self::empty_in(PoolHandle::thread_default())
    }

    pub fn empty_in(pool: PoolHandle) -> Self {
        let root = {
            let mut p = pool.borrow_mut();
            let zero = p.zero_node(Self::depth()).expect("depth fits the zero table");
            p.ref_node(zero);
            zero
        };
        Self {
            pool,
            root,
            len: 0,
            cache: RefCell::new(HashMap::new()),
            _phantom: PhantomData,
        }
    }

    pub fn new(values: Vec<T>) -> Result<Self, Error> {
        Self::new_in(PoolHandle::thread_default(), values)
    }

    pub fn new_in(pool: PoolHandle, values: Vec<T>) -> Result<Self, Error> {
        if values.len() > N::to_usize() {
            return Err(Error::ListFull {
                max_len: N::to_usize(),
            });
        }
        let root = raw::build_tree(&mut pool.borrow_mut(), Self::depth(), &values)?;
        Ok(Self {
            pool,
            root,
            len: values.len(),
            cache: RefCell::new(HashMap::new()),
            _phantom: PhantomData,
        })
    }

    pub fn try_from_iter(iter: impl IntoIterator<Item = T>) -> Result<Self, Error> {
        Self::new(iter.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_len() -> usize {
        N::to_usize()
    }

    pub fn get(&self, i: usize) -> Option<T> {
        if i >= self.len {
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
        if i >= self.len {
            return Err(Error::OutOfBounds { i, len: self.len });
        }
        self.write(i, value)
    }

    pub fn push(&mut self, value: T) -> Result<(), Error> {
        if self.len == N::to_usize() {
            return Err(Error::ListFull {
                max_len: N::to_usize(),
            });
        }
        self.write(self.len, value)?;
        self.len += 1;
        Ok(())
    }

    fn write(&mut self, i: usize, value: T) -> Result<(), Error> {
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
        (0..self.len).map(move |i| self.get(i).expect("index is below the length"))
    }

    /// Iterate from `index` onwards; errors if `index` is past the end.
    pub fn iter_from(&self, index: usize) -> Result<impl Iterator<Item = T> + '_, Error> {
        if index > self.len {
            return Err(Error::OutOfBounds {
                i: index,
                len: self.len,
            });
        }
        Ok((index..self.len).map(move |i| self.get(i).expect("index is below the length")))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Recomputes any dirty hashes and returns `mix_in_length(root, len)`.
    pub fn commit(&self) -> Hash256 {
        let inner = Hash256::from(self.pool.borrow_mut().get_hash(self.root));
        tree_hash::mix_in_length(&inner, self.len)
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

impl<T: TreeSsz, N: Unsigned> Clone for List<T, N> {
    fn clone(&self) -> Self {
        self.pool.borrow_mut().ref_node(self.root);
        Self {
            pool: self.pool.clone(),
            root: self.root,
            len: self.len,
            cache: RefCell::new(HashMap::new()),
            _phantom: PhantomData,
        }
    }
}

impl<T: TreeSsz, N: Unsigned> Drop for List<T, N> {
    fn drop(&mut self) {
        self.pool.borrow_mut().unref(self.root);
    }
}

impl<T: TreeSsz, N: Unsigned> Default for List<T, N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: TreeSsz, N: Unsigned> PartialEq for List<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.commit() == other.commit()
    }
}

impl<T: TreeSsz, N: Unsigned> fmt::Debug for List<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("len", &self.len)
            .field("max_len", &N::to_usize())
            .finish()
    }
}

impl<T: TreeSsz, N: Unsigned> TreeHash for List<T, N> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::List
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("List should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("List should never be packed.")
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.commit()
    }
}

impl<T: TreeSsz, N: Unsigned> Encode for List<T, N> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_bytes_len(&self) -> usize {
        self.len * <T as Encode>::ssz_fixed_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        for element in self.iter() {
            element.ssz_append(buf);
        }
    }
}

impl<T: TreeSsz, N: Unsigned> Decode for List<T, N> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let element_len = <T as Decode>::ssz_fixed_len();
        if bytes.len() % element_len != 0 {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: bytes.len() / element_len * element_len,
            });
        }
        let n = bytes.len() / element_len;
        if n > N::to_usize() {
            return Err(DecodeError::BytesInvalid(format!(
                "list of {} exceeds limit {}",
                n,
                N::to_usize()
            )));
        }
        let values = bytes
            .chunks(element_len)
            .map(T::from_ssz_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values)
            .map_err(|e| DecodeError::BytesInvalid(format!("failed to build list tree: {e:?}")))
    }
}

impl<T: TreeSsz + Serialize, N: Unsigned> Serialize for List<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len))?;
        for element in self.iter() {
            seq.serialize_element(&element)?;
        }
        seq.end()
    }
}

impl<'de, T, N> Deserialize<'de> for List<T, N>
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
    use crate::typenum::{U4, U1024};
    use fixed_bytes::FixedBytesExtended;
    use persistent_merkle_tree::LeakCheck;
    use tree_hash::TreeHash;

    #[test]
    fn empty_list_root_matches_value_level() {
        let list = List::<u64, U1024>::empty();
        let value_backed = ssz_types::VariableList::<u64, U1024>::new(vec![]).unwrap();
        assert_eq!(list.tree_hash_root(), value_backed.tree_hash_root());
    }

    #[test]
    fn push_get_and_limit() {
        let mut list = List::<u64, U4>::empty();
        for i in 0..4 {
            list.push(i * 10).unwrap();
        }
        assert_eq!(list.len(), 4);
        assert_eq!(list.get(2), Some(20));
        assert_eq!(list.get(4), None);
        assert_eq!(
            list.push(50),
            Err(Error::ListFull { max_len: 4 }),
            "a full list must refuse the push"
        );
    }

    #[test]
    fn set_past_length_is_out_of_bounds() {
        let mut list = List::<u64, U4>::new(vec![1, 2]).unwrap();
        assert_eq!(list.set(2, 9), Err(Error::OutOfBounds { i: 2, len: 2 }));
        list.set(1, 9).unwrap();
        assert_eq!(list.to_vec(), vec![1, 9]);
    }

    #[test]
    fn root_matches_value_level_tree_hash() {
        let values: Vec<u64> = (0..100).collect();
        let list = List::<u64, U1024>::new(values.clone()).unwrap();
        let value_backed = ssz_types::VariableList::<u64, U1024>::new(values).unwrap();
        assert_eq!(list.tree_hash_root(), value_backed.tree_hash_root());
    }

    #[test]
    fn hash256_list_matches_value_level() {
        let values: Vec<Hash256> = (0..5u64).map(Hash256::from_low_u64_be).collect();
        let list = List::<Hash256, U1024>::new(values.clone()).unwrap();
        let value_backed = ssz_types::VariableList::<Hash256, U1024>::new(values).unwrap();
        assert_eq!(list.tree_hash_root(), value_backed.tree_hash_root());
    }

    #[test]
    fn length_is_mixed_into_the_root() {
        // Same contents, different length is impossible; but pushing a zero
        // element changes only the length, and the root must move.
        let list_a = List::<u64, U1024>::new(vec![0, 0]).unwrap();
        let list_b = List::<u64, U1024>::new(vec![0, 0, 0]).unwrap();
        assert_ne!(list_a.tree_hash_root(), list_b.tree_hash_root());
    }

    #[test]
    fn sequence_of_sets_then_commit_matches_fresh_build() {
        let mut list = List::<u64, U1024>::new((0..50).collect()).unwrap();
        list.set(0, 100).unwrap();
        list.set(49, 200).unwrap();
        list.set(25, 300).unwrap();

        let mut expected: Vec<u64> = (0..50).collect();
        expected[0] = 100;
        expected[49] = 200;
        expected[25] = 300;
        let fresh = List::<u64, U1024>::new(expected).unwrap();

        assert_eq!(list.commit(), fresh.commit());
    }

    #[test]
    fn clone_shares_structure_and_stays_isolated() {
        let original = List::<u64, U1024>::new((0..100).collect()).unwrap();
        let root_before = original.commit();

        let mut cloned = original.clone();
        cloned.set(10, 9999).unwrap();
        cloned.push(123).unwrap();

        assert_eq!(original.commit(), root_before);
        assert_eq!(original.len(), 100);
        assert_eq!(cloned.len(), 101);
        assert_eq!(original.get(10), Some(10));
        assert_eq!(cloned.get(10), Some(9999));
    }

    #[test]
    fn clear_cache_is_identity_on_the_root() {
        let mut list = List::<u64, U1024>::new((0..10).collect()).unwrap();
        list.set(3, 42).unwrap();
        let root = list.commit();
        list.clear_cache();
        assert_eq!(list.commit(), root);
        assert_eq!(list.get(3), Some(42));
    }

    #[test]
    fn drop_releases_every_node() {
        let pool = PoolHandle::with_leak_check(LeakCheck::Paranoid);
        {
            let mut list = List::<u64, U1024>::new_in(pool.clone(), (0..64).collect()).unwrap();
            list.set(5, 1).unwrap();
            let _ = list.commit();
            let clone = list.clone();
            drop(list);
            drop(clone);
        }
        assert!(pool.borrow().leak_report().is_empty());
    }

    #[test]
    fn ssz_round_trip() {
        let list = List::<u64, U1024>::new(vec![7, 8, 9]).unwrap();
        let bytes = list.as_ssz_bytes();
        assert_eq!(bytes.len(), 24);
        let decoded = List::<u64, U1024>::from_ssz_bytes(&bytes).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn iter_from_skips_the_prefix() {
        let list = List::<u64, U1024>::new((0..10).collect()).unwrap();
        let tail: Vec<u64> = list.iter_from(7).unwrap().collect();
        assert_eq!(tail, vec![7, 8, 9]);
        assert!(list.iter_from(11).is_err());
    }
}
