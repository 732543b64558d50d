//! Dictionary deduplication and clash handling.

use std::sync::Arc;

use planb::codec::VariableValSerde;
use planb::{Hash, HashFactory, Serde, Val};

use crate::common::*;

/// Every payload hashes to zero.
struct CollidingHashFactory;

impl HashFactory for CollidingHashFactory {
    fn create(&self, _bytes: &[u8]) -> Hash {
        Hash::from_bytes(&[0u8; 8]).unwrap()
    }

    fn hash_length(&self) -> usize {
        8
    }
}

fn put(t: &TestEnv, serde: &VariableValSerde, key: &str, value: &Val) {
    t.env
        .write(|w| {
            let mut out = Vec::new();
            serde.write(w, value, &mut out)?;
            w.put(t.primary, key.as_bytes(), &out)
        })
        .unwrap();
}

fn get(t: &TestEnv, serde: &VariableValSerde, key: &str) -> Option<Val> {
    t.env
        .read(|txn| match t.primary.get(txn, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde.read(txn, bytes)?)),
            None => Ok(None),
        })
        .unwrap()
}

#[test]
fn test_equal_values_share_one_entry() {
    let t = TestEnv::new();
    let serde = VariableValSerde::new(Arc::clone(&t.dictionary), 16);
    let value = Val::from("a value comfortably above the inline threshold");

    for i in 0..100 {
        put(&t, &serde, &format!("key-{i:03}"), &value);
    }

    assert_eq!(t.primary_len(), 100);
    assert_eq!(t.dictionary_len(), 1);
    assert_eq!(get(&t, &serde, "key-042"), Some(value));
}

#[test]
fn test_distinct_values_get_distinct_entries() {
    let t = TestEnv::new();
    let serde = VariableValSerde::new(Arc::clone(&t.dictionary), 16);

    for i in 0..10 {
        put(&t, &serde, &format!("key-{i}"), &Val::from(format!("distinct payload number {i}")));
    }

    assert_eq!(t.dictionary_len(), 10);
    assert_eq!(
        get(&t, &serde, "key-7"),
        Some(Val::from("distinct payload number 7"))
    );
}

#[test]
fn test_small_values_stay_inline() {
    let t = TestEnv::new();
    let serde = VariableValSerde::new(Arc::clone(&t.dictionary), 16);

    put(&t, &serde, "a", &Val::Long(7));
    put(&t, &serde, "b", &Val::from("short"));

    assert_eq!(t.dictionary_len(), 0);
    assert_eq!(get(&t, &serde, "a"), Some(Val::Long(7)));
    assert_eq!(get(&t, &serde, "b"), Some(Val::from("short")));
}

#[test]
fn test_clash_falls_back_to_inline() {
    let t = TestEnv::with_hash_factory(Arc::new(CollidingHashFactory));
    let serde = VariableValSerde::new(Arc::clone(&t.dictionary), 16);
    let first = Val::from("the first payload to claim hash zero");
    let second = Val::from("a different payload with the same hash");

    put(&t, &serde, "first", &first);
    put(&t, &serde, "second", &second);

    assert_eq!(t.dictionary_len(), 1);
    assert_eq!(t.dictionary.clash_count(), 1);
    assert_eq!(get(&t, &serde, "first"), Some(first));
    assert_eq!(get(&t, &serde, "second"), Some(second));

    let inline = t
        .env
        .read(|txn| Ok(serde.uses_lookup(t.primary.get(txn, b"second")?.unwrap_or_default())))
        .unwrap();
    assert!(!inline);
}

#[test]
fn test_missing_entry_is_corruption() {
    let t = TestEnv::new();
    let serde = VariableValSerde::new(Arc::clone(&t.dictionary), 16);
    put(&t, &serde, "k", &Val::from("long enough to live in the dictionary"));

    t.env
        .write(|w| {
            let db = t.dictionary.db();
            let hash = db
                .iter(w.read_txn()?)?
                .next()
                .transpose()?
                .map(|(h, _)| h.to_vec())
                .unwrap_or_default();
            w.delete(db, &hash)
        })
        .unwrap();

    let err = t
        .env
        .read(|txn| {
            let bytes = t.primary.get(txn, b"k")?.unwrap_or_default();
            serde.read(txn, bytes)
        })
        .unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
}
