//! Composite elements: containers as vector/list elements, end to end.

use crate::typenum::{U2, U64};
use crate::{List, PoolHandle, TreeSsz, Vector, tree_ssz_container};
use bls::PublicKeyBytes;
use fixed_bytes::Hash256;
use persistent_merkle_tree::LeakCheck;
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

#[derive(Debug, Clone, PartialEq, Default, Encode, Decode, TreeHash)]
struct Pair {
    a: u32,
    b: u64,
}

tree_ssz_container!(Pair { a: u32, b: u64 });

#[derive(Debug, Clone, PartialEq, Default, Encode, Decode, TreeHash)]
struct Record {
    pubkey: PublicKeyBytes,
    withdrawal_credentials: Hash256,
    amount: u64,
    slashed: bool,
}

tree_ssz_container!(Record {
    pubkey: PublicKeyBytes,
    withdrawal_credentials: Hash256,
    amount: u64,
    slashed: bool,
});

fn record(byte: u8, amount: u64) -> Record {
    Record {
        pubkey: PublicKeyBytes::deserialize(&[byte; 48]).unwrap(),
        withdrawal_credentials: Hash256::repeat_byte(byte),
        amount,
        slashed: amount % 2 == 1,
    }
}

#[test]
fn container_subtree_root_matches_derive() {
    let pool_handle = PoolHandle::new();
    let mut pool = pool_handle.borrow_mut();
    let value = record(3, 77);

    let node = value.to_subtree(&mut pool).unwrap();
    assert_eq!(Hash256::from(pool.get_hash(node)), value.tree_hash_root());
    assert_eq!(Record::from_subtree(&pool, node).unwrap(), value);
}

#[test]
fn composite_vector_set_get_commit() {
    // Build a two-element vector of containers, replace index 1, and check
    // the committed root equals the root of the natively-built value.
    let mut vector =
        Vector::<Pair, U2>::new(vec![Pair { a: 1, b: 1111 }, Pair { a: 2, b: 2222 }]).unwrap();

    assert_eq!(vector.get(1), Some(Pair { a: 2, b: 2222 }));

    vector.set(1, Pair { a: 9, b: 9999 }).unwrap();

    let expected =
        Vector::<Pair, U2>::new(vec![Pair { a: 1, b: 1111 }, Pair { a: 9, b: 9999 }]).unwrap();
    assert_eq!(vector.commit(), expected.commit());
    assert_eq!(vector.get(1), Some(Pair { a: 9, b: 9999 }));
    assert_eq!(vector.get(0), Some(Pair { a: 1, b: 1111 }));
}

#[test]
fn composite_list_matches_value_level_root() {
    let values: Vec<Record> = (0..5).map(|i| record(i as u8, i * 1000)).collect();
    let list = List::<Record, U64>::new(values.clone()).unwrap();

    let value_backed = ssz_types::VariableList::<Record, U64>::new(values).unwrap();
    assert_eq!(list.tree_hash_root(), value_backed.tree_hash_root());
}

#[test]
fn composite_list_push_and_mutate() {
    let mut list = List::<Record, U64>::empty();
    for i in 0..10 {
        list.push(record(i as u8, i)).unwrap();
    }
    let mut updated = record(3, 3);
    updated.amount = 1_000_000;
    list.set(3, updated.clone()).unwrap();

    let mut expected: Vec<Record> = (0..10).map(|i| record(i as u8, i)).collect();
    expected[3] = updated;
    let fresh = List::<Record, U64>::new(expected).unwrap();

    assert_eq!(list.commit(), fresh.commit());
}

#[test]
fn composite_mutation_releases_replaced_subtrees() {
    let pool = PoolHandle::with_leak_check(LeakCheck::Paranoid);
    {
        let mut list = List::<Record, U64>::new_in(
            pool.clone(),
            (0..8).map(|i| record(i as u8, i)).collect(),
        )
        .unwrap();
        let _ = list.commit();
        list.set(0, record(0xFF, 123)).unwrap();
        let _ = list.commit();
    }
    assert!(pool.borrow().leak_report().is_empty());
}
