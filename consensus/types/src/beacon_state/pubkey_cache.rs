use bls::PublicKeyBytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps validator pubkeys to their registry index.
///
/// The map is kept behind an `Arc` so cloning a state is cheap; the first
/// insert after a clone pays for the copy.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct PubkeyCache {
    /// Maintain the number of keys added to the map. It is not sufficient to just use the size
    /// of the map, as it will not increase when duplicate keys are added. Duplicate keys are
    /// used during testing.
    len: usize,
    map: Arc<HashMap<PublicKeyBytes, usize>>,
}

impl PubkeyCache {
    /// Returns the number of validator indices already in the map.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a validator index into the map.
    ///
    /// The added index must equal the number of validators already added to the map. This ensures
    /// that an index is never skipped.
    pub fn insert(&mut self, pubkey: PublicKeyBytes, index: usize) -> bool {
        if index == self.len {
            Arc::make_mut(&mut self.map).insert(pubkey, index);
            self.len += 1;
            true
        } else {
            false
        }
    }

    /// Looks up a validator index for `pubkey`, if any.
    pub fn get(&self, pubkey: &PublicKeyBytes) -> Option<usize> {
        self.map.get(pubkey).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey(byte: u8) -> PublicKeyBytes {
        PublicKeyBytes::deserialize(&[byte; 48]).unwrap()
    }

    #[test]
    fn inserts_must_be_sequential() {
        let mut cache = PubkeyCache::default();
        assert!(cache.insert(pubkey(0), 0));
        assert!(!cache.insert(pubkey(1), 2), "gap must be rejected");
        assert!(cache.insert(pubkey(1), 1));
        assert_eq!(cache.get(&pubkey(1)), Some(1));
        assert_eq!(cache.get(&pubkey(9)), None);
    }

    #[test]
    fn clone_is_isolated() {
        let mut cache = PubkeyCache::default();
        cache.insert(pubkey(0), 0);
        let cloned = cache.clone();
        cache.insert(pubkey(1), 1);
        assert_eq!(cloned.get(&pubkey(1)), None);
        assert_eq!(cache.get(&pubkey(1)), Some(1));
    }
}
