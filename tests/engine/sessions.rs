//! Session shape behaviour.

use chrono::Duration;
use planb::{SessionDb, TemporalPrecision};

use crate::common::*;

fn sessions(t: &TestStore) -> std::sync::Arc<SessionDb> {
    t.store
        .register_session("sessions", TemporalPrecision::Millisecond)
        .unwrap()
}

#[test]
fn test_extend_session_five_minutes() {
    let t = TestStore::new();
    let db = sessions(&t);

    let opened = Session::at("abc", t0());
    db.insert(&opened).unwrap();
    db.extend(&opened, at_minute(5)).unwrap();

    let stored = db.sessions("abc").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].start(), t0());
    assert_eq!(stored[0].end(), at_minute(5));

    let active = db.get_state("abc", at_minute(3)).unwrap().unwrap();
    assert_eq!(active, stored[0]);
    assert_eq!(db.get_state("abc", at_minute(6)).unwrap(), None);
}

#[test]
fn test_start_after_end_is_rejected() {
    let t = TestStore::new();
    let db = sessions(&t);

    assert!(matches!(
        Session::new("abc", at_minute(5), t0()),
        Err(Error::InvalidSession { .. })
    ));

    let opened = Session::at("abc", at_minute(5));
    db.insert(&opened).unwrap();
    assert!(matches!(
        db.extend(&opened, t0()),
        Err(Error::InvalidSession { .. })
    ));
    // The stored session is untouched
    assert_eq!(db.sessions("abc").unwrap(), vec![opened]);
}

#[test]
fn test_keys_do_not_bleed_into_each_other() {
    let t = TestStore::new();
    let db = sessions(&t);
    db.insert(&Session::new("ab", t0(), at_minute(10)).unwrap())
        .unwrap();
    db.insert(&Session::new("abc", at_minute(20), at_minute(30)).unwrap())
        .unwrap();

    assert_eq!(db.sessions("ab").unwrap().len(), 1);
    assert_eq!(db.get_state("ab", at_minute(25)).unwrap(), None);
    assert_eq!(db.get_state("abc", at_minute(5)).unwrap(), None);
}

#[test]
fn test_condense_merges_touching_sessions() {
    let t = TestStore::new();
    let db = sessions(&t);
    for (start, end) in [(0, 5), (4, 8), (8, 9), (20, 25), (60, 65)] {
        db.insert_at(
            &Session::new("k", at_minute(start), at_minute(end)).unwrap(),
            at_minute(end),
        )
        .unwrap();
    }

    // Only sessions starting before minute 50 are condensed
    let removed = db.condense(at_minute(50), &Cancellation::new()).unwrap();
    assert_eq!(removed, 2);

    let spans: Vec<(i64, i64)> = db
        .sessions("k")
        .unwrap()
        .iter()
        .map(|s| {
            (
                (s.start() - t0()).num_minutes(),
                (s.end() - t0()).num_minutes(),
            )
        })
        .collect();
    assert_eq!(spans, vec![(0, 9), (20, 25), (60, 65)]);
}

#[test]
fn test_second_precision_truncates() {
    let t = TestStore::new();
    let db = t
        .store
        .register_session("coarse", TemporalPrecision::Second)
        .unwrap();
    let start = t0() + Duration::milliseconds(750);
    db.insert(&Session::new("k", start, start + Duration::seconds(2)).unwrap())
        .unwrap();

    let stored = db.sessions("k").unwrap();
    assert_eq!(stored[0].start(), t0());
    assert!(db.get_state("k", t0() + Duration::milliseconds(100)).unwrap().is_some());
}

#[test]
fn test_reopened_store_keeps_sessions() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    {
        let store = PlanBStore::open_with_config(dir.path(), test_config()).unwrap();
        let db = store
            .register_session("sessions", TemporalPrecision::Millisecond)
            .unwrap();
        db.insert(&Session::new("abc", t0(), at_minute(5)).unwrap())
            .unwrap();
        store.close().unwrap();
    }

    let store = PlanBStore::open_with_config(dir.path(), test_config()).unwrap();
    let db = store
        .register_session("sessions", TemporalPrecision::Millisecond)
        .unwrap();
    assert_eq!(
        db.get_state("abc", at_minute(1)).unwrap().map(|s| s.end()),
        Some(at_minute(5))
    );
}
