//! Ranged state shape behaviour.

use planb::KeyRange;

use crate::common::*;

fn range(from: i64, to: i64) -> KeyRange {
    KeyRange::new(from, to).unwrap()
}

#[test]
fn test_point_queries_over_adjacent_ranges() {
    let t = TestStore::new();
    let db = t.store.register_ranged_state("ranges").unwrap();
    for (i, from) in (0..1000).step_by(100).enumerate() {
        db.put(&range(from, from + 99), format!("band {i}")).unwrap();
    }

    for n in [0, 99, 100, 555, 999] {
        let (found, value) = db.get_state(n).unwrap().unwrap();
        assert!(found.contains(n));
        assert_eq!(value, Val::from(format!("band {}", n / 100)));
    }
    assert_eq!(db.get_state(-1).unwrap(), None);
    assert_eq!(db.get_state(1000).unwrap(), None);
}

#[test]
fn test_gap_between_ranges() {
    let t = TestStore::new();
    let db = t.store.register_ranged_state("ranges").unwrap();
    db.put(&range(0, 9), 1i64).unwrap();
    db.put(&range(20, 29), 2i64).unwrap();

    assert_eq!(db.get_state(15).unwrap(), None);
    assert_eq!(db.get_state(20).unwrap().map(|(_, v)| v), Some(Val::Long(2)));
}

#[test]
fn test_enclosing_range_found_past_nested_one() {
    let t = TestStore::new();
    let db = t.store.register_ranged_state("ranges").unwrap();
    db.put(&range(0, 100), "outer").unwrap();
    db.put(&range(10, 20), "inner").unwrap();

    assert_eq!(db.get_state(50).unwrap().map(|(_, v)| v), Some(Val::from("outer")));
    assert_eq!(db.get_state(20).unwrap().map(|(_, v)| v), Some(Val::from("inner")));
    assert_eq!(db.get_state(21).unwrap().map(|(r, _)| r), Some(range(0, 100)));
}

#[test]
fn test_inverted_range_is_rejected() {
    assert!(matches!(
        KeyRange::new(10, 9),
        Err(Error::InvalidRange { from: 10, to: 9 })
    ));
}

#[test]
fn test_large_values_share_dictionary_entries() {
    let t = TestStore::new();
    let db = t.store.register_ranged_state("ranges").unwrap();
    let shared = "a description long enough for the dictionary".to_string();
    for from in (0..50).step_by(10) {
        db.put(&range(from, from + 9), shared.clone()).unwrap();
    }

    let info = t.store.info("ranges").unwrap();
    assert_eq!(info.records, 5);
    assert_eq!(info.dictionary_entries, 1);
}
