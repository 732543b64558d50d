//! Merging shards written by another store into a live one.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use planb::{HourOfDay, KeyRange, PlanBConfig, Shape, TemporalPrecision, ZoneId};

use crate::common::*;

/// Close `shard` and return the directory of its shape `name`.
fn shard_dir(shard: &TestStore, name: &str) -> std::path::PathBuf {
    shard.store.close().unwrap();
    shard.dir.path().join(name)
}

#[test]
fn test_merge_state_shards_unions_keys() {
    let target = TestStore::new();
    let shard = TestStore::new();
    let state = target.store.register_state("state").unwrap();
    let other = shard.store.register_state("state").unwrap();
    let shared = "a long value present in both shards".repeat(2);

    for i in 0..20i64 {
        state.put_at(&format!("a{i:02}"), i, t0()).unwrap();
        other.put_at(&format!("b{i:02}"), shared.as_str(), t0()).unwrap();
    }
    state.put_at("common", "target", t0()).unwrap();
    other.put_at("common", "shard", at_minute(1)).unwrap();
    state.put_at("big", shared.as_str(), t0()).unwrap();

    let source = shard_dir(&shard, "state");
    let stats = state.merge(&source).unwrap();
    assert_eq!(stats.total(), 21);
    assert_eq!(stats.rewritten, 20);
    assert!(!source.exists());

    assert_eq!(target.store.count("state").unwrap(), 42);
    assert_eq!(state.get("a07").unwrap(), Some(Val::Long(7)));
    assert_eq!(state.get("b13").unwrap(), Some(Val::from(shared.clone())));
    assert_eq!(state.get("common").unwrap(), Some(Val::from("shard")));
    assert_eq!(state.insert_time("common").unwrap(), Some(at_minute(1)));

    // The shard's copies of `shared` collapse onto the target's entry
    assert_eq!(target.store.info("state").unwrap().dictionary_entries, 1);
    assert_eq!(state.db().sweep(&Cancellation::new()).unwrap().deleted, 0);
}

#[test]
fn test_merge_respects_commit_batches() {
    let config = PlanBConfig {
        max_puts_before_commit: 7,
        ..test_config()
    };
    let target = TestStore::with_config(config.clone());
    let shard = TestStore::with_config(config);
    let state = target.store.register_state("state").unwrap();
    let other = shard.store.register_state("state").unwrap();
    let long = |i: i64| format!("{i:04} and enough text to leave the inline form");
    for i in 0..50 {
        other.put_at(&format!("k{i:02}"), long(i), t0()).unwrap();
    }

    let source = shard_dir(&shard, "state");
    assert_eq!(state.merge(&source).unwrap().total(), 50);

    assert_eq!(target.store.count("state").unwrap(), 50);
    assert_eq!(state.get("k42").unwrap(), Some(Val::from(long(42))));
    assert_eq!(target.store.info("state").unwrap().dictionary_entries, 50);
}

#[test]
fn test_merge_sessions_keeps_both_sides() {
    let target = TestStore::new();
    let shard = TestStore::new();
    let sessions = target
        .store
        .register_session("sessions", TemporalPrecision::Millisecond)
        .unwrap();
    let other = shard
        .store
        .register_session("sessions", TemporalPrecision::Millisecond)
        .unwrap();
    let first = Session::new("user", t0(), at_minute(10)).unwrap();
    let second = Session::new("user", at_minute(30), at_minute(40)).unwrap();
    sessions.insert(&first).unwrap();
    other.insert(&second).unwrap();
    other.insert(&first).unwrap();

    sessions.merge(&shard_dir(&shard, "sessions")).unwrap();

    assert_eq!(sessions.sessions("user").unwrap(), vec![first, second.clone()]);
    assert_eq!(sessions.get_state("user", at_minute(35)).unwrap(), Some(second));
}

#[test]
fn test_merge_counts_adds_counters() {
    let target = TestStore::new();
    let shard = TestStore::new();
    let counts = target
        .store
        .register_temporal_count("counts", Arc::new(HourOfDay), ZoneId::UTC)
        .unwrap();
    let other = shard
        .store
        .register_temporal_count("counts", Arc::new(HourOfDay), ZoneId::UTC)
        .unwrap();
    let nine = Utc.with_ymd_and_hms(2024, 2, 1, 9, 15, 0).unwrap();

    counts.increment("x", nine, 3).unwrap();
    other.increment("x", nine + Duration::days(3), 4).unwrap();
    other.increment("x", nine + Duration::hours(1), 1).unwrap();
    other.increment("y", nine, i64::MAX).unwrap();
    counts.increment("y", nine, 1).unwrap();

    counts.merge(&shard_dir(&shard, "counts")).unwrap();

    assert_eq!(counts.counts("x").unwrap(), vec![(9, 7), (10, 1)]);
    assert_eq!(counts.get("y", 9).unwrap(), Some(i64::MAX));
}

#[test]
fn test_merge_ranges() {
    let target = TestStore::new();
    let shard = TestStore::new();
    let ranges = target.store.register_ranged_state("ranges").unwrap();
    let other = shard.store.register_ranged_state("ranges").unwrap();
    ranges.put(&KeyRange::new(0, 9).unwrap(), "low").unwrap();
    other.put(&KeyRange::new(10, 19).unwrap(), "high").unwrap();

    ranges.merge(&shard_dir(&shard, "ranges")).unwrap();

    assert_eq!(ranges.get_state(5).unwrap().map(|(_, v)| v), Some(Val::from("low")));
    assert_eq!(ranges.get_state(15).unwrap().map(|(_, v)| v), Some(Val::from("high")));
}

#[test]
fn test_failed_merge_keeps_the_shard() {
    let target = TestStore::new();
    let state = target.store.register_state("state").unwrap();
    let missing = target.dir.path().join("no_such_shard");

    assert!(matches!(state.merge(&missing), Err(Error::Io(_))));
    assert!(!missing.exists());

    // A closed target cannot take a merge; the shard stays for a retry
    let shard = TestStore::new();
    shard.store.register_state("state").unwrap().put("k", 1i64).unwrap();
    let source = shard_dir(&shard, "state");
    target.store.close().unwrap();
    assert!(matches!(state.merge(&source), Err(Error::Closed)));
    assert!(source.join("data.mdb").exists());
}
