//! Age-based deletion followed by dictionary reclamation.

use planb::TemporalPrecision;

use crate::common::*;

fn long(i: usize) -> String {
    format!("state value {i} long enough for the dictionary")
}

#[test]
fn test_state_retention_reclaims_dictionary() {
    let t = TestStore::new();
    let db = t.store.register_state("state").unwrap();
    for i in 0..10 {
        db.put_at(&format!("k{i}"), long(i), at_minute(i as i64)).unwrap();
    }
    assert_eq!(t.store.info("state").unwrap().dictionary_entries, 10);

    let stats = db.delete_old_data(at_minute(6), &Cancellation::new()).unwrap();

    assert_eq!(stats.deleted, 6);
    assert_eq!(stats.sweep.deleted, 6);
    let info = t.store.info("state").unwrap();
    assert_eq!(info.records, 4);
    assert_eq!(info.dictionary_entries, 4);
    assert_eq!(db.get("k5").unwrap(), None);
    assert_eq!(db.get("k6").unwrap(), Some(Val::from(long(6))));
}

#[test]
fn test_retention_keeps_entries_shared_with_survivors() {
    let t = TestStore::new();
    let db = t.store.register_state("state").unwrap();
    db.put_at("old", long(1), at_minute(0)).unwrap();
    db.put_at("new", long(1), at_minute(10)).unwrap();

    let stats = db.delete_old_data(at_minute(5), &Cancellation::new()).unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.sweep.deleted, 0);
    assert_eq!(db.get("new").unwrap(), Some(Val::from(long(1))));
}

#[test]
fn test_cancelled_retention_changes_nothing() {
    let t = TestStore::new();
    let db = t.store.register_state("state").unwrap();
    db.put_at("old", long(1), at_minute(0)).unwrap();

    let cancel = Cancellation::new();
    cancel.cancel();
    let err = db.delete_old_data(at_minute(5), &cancel).unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(db.get("old").unwrap(), Some(Val::from(long(1))));
    assert_eq!(t.store.info("state").unwrap().dictionary_entries, 1);
}

#[test]
fn test_session_retention_by_end_or_insert_time() {
    let t = TestStore::new();
    let db = t
        .store
        .register_session("sessions", TemporalPrecision::Millisecond)
        .unwrap();
    // Ended early, inserted late
    db.insert_at(&Session::new("a", t0(), at_minute(1)).unwrap(), at_minute(30))
        .unwrap();
    // Ended late, inserted early
    db.insert_at(&Session::new("b", t0(), at_minute(40)).unwrap(), at_minute(2))
        .unwrap();

    let by_end = db
        .delete_old_data(at_minute(10), true, &Cancellation::new())
        .unwrap();
    assert_eq!(by_end.deleted, 1);
    assert!(db.sessions("a").unwrap().is_empty());

    let by_insert = db
        .delete_old_data(at_minute(10), false, &Cancellation::new())
        .unwrap();
    assert_eq!(by_insert.deleted, 1);
    assert_eq!(t.store.count("sessions").unwrap(), 0);
}
