//! Shape registration, catalogues and lifecycle.

use std::sync::Arc;
use std::thread;

use planb::schema::{count_fields, state_fields};
use planb::{
    find_field, FieldType, HourOfDay, RangedStateDb, SessionDb, Shape, StateDb, StateValue,
    TemporalCountDb, TemporalKey, TemporalPrecision, ZoneId,
};

use crate::common::*;

#[test]
fn test_every_kind_registers_side_by_side() {
    let t = TestStore::new();
    t.store.register_state("state").unwrap();
    t.store
        .register_session("sessions", TemporalPrecision::Second)
        .unwrap();
    t.store
        .register_temporal_count("counts", Arc::new(HourOfDay), ZoneId::UTC)
        .unwrap();
    t.store.register_ranged_state("ranges").unwrap();

    assert_eq!(
        t.store.shape_names(),
        vec!["counts", "ranges", "sessions", "state"]
    );
    assert!(t.store.shape::<StateDb>("state").is_ok());
    assert!(t.store.shape::<SessionDb>("sessions").is_ok());
    assert!(t.store.shape::<TemporalCountDb>("counts").is_ok());
    assert!(t.store.shape::<RangedStateDb>("ranges").is_ok());

    // Each shape has its own environment directory
    for name in t.store.shape_names() {
        let info = t.store.info(&name).unwrap();
        assert_eq!(info.path, t.dir.path().join(&name));
    }
}

#[test]
fn test_concurrent_registration_has_one_winner() {
    let t = TestStore::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&t.store);
            thread::spawn(move || store.register_state("contended").is_ok())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(t.store.shape_names(), vec!["contended"]);
}

#[test]
fn test_catalogue_and_field_values() {
    let t = TestStore::new();
    let counts = t
        .store
        .register_temporal_count("counts", Arc::new(HourOfDay), ZoneId::UTC)
        .unwrap();
    counts.increment("x", at_minute(0), 4).unwrap();

    let fields = t.store.fields("counts").unwrap();
    let slot = find_field(fields, "slot").unwrap();
    assert_eq!(slot, count_fields::SLOT);
    assert_eq!(slot.field_type, FieldType::Long);

    let entries = counts.db().entries().unwrap();
    assert_eq!(entries, vec![(TemporalKey::new("x", 9), 4)]);
    let (key, count) = &entries[0];
    assert_eq!(
        TemporalCountDb::field_value(&slot, key, *count),
        Some(Val::Long(9))
    );

    let state = t.store.register_state("state").unwrap();
    state.put_at("k", 12i64, t0()).unwrap();
    let stored: StateValue = state.get_state("k").unwrap().unwrap();
    assert_eq!(
        StateDb::field_value(&state_fields::INSERT_TIME, "k", &stored),
        Some(Val::Date(t0().timestamp_millis()))
    );
    assert_eq!(
        StateDb::field_value(&state_fields::VALUE_TYPE, "k", &stored),
        Some(Val::from("long"))
    );
}

#[test]
fn test_close_closes_every_shape() {
    let t = TestStore::new();
    let state = t.store.register_state("state").unwrap();
    let sessions = t
        .store
        .register_session("sessions", TemporalPrecision::Second)
        .unwrap();
    state.put("k", 1i64).unwrap();

    t.store.close().unwrap();

    assert!(matches!(state.get("k"), Err(Error::Closed)));
    assert!(matches!(
        sessions.insert(&Session::at("k", t0())),
        Err(Error::Closed)
    ));
    assert!(matches!(t.store.count("state"), Err(Error::Closed)));
}
