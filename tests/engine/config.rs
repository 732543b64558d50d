//! Loading `planb.toml`.

use std::fs;

use planb::{HashLength, MaintenanceTask, Shape};

use crate::common::*;

#[test]
fn test_edited_config_is_used_on_reopen() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    PlanBStore::open(dir.path()).unwrap();

    fs::write(
        dir.path().join("planb.toml"),
        r#"
max_store_size = 8388608
hash_length = "integer"
inline_threshold = 8

[maintenance]
enabled = true
interval_ms = 250
"#,
    )
    .unwrap();

    let store = std::sync::Arc::new(PlanBStore::open(dir.path()).unwrap());
    assert_eq!(store.config().max_store_size, 8 << 20);
    assert_eq!(store.config().hash_length, HashLength::Integer);
    assert_eq!(store.config().max_readers, 126);

    let task = MaintenanceTask::from_config(std::sync::Arc::clone(&store)).unwrap();
    assert_eq!(task.interval(), std::time::Duration::from_millis(250));

    // Integer hashes are four bytes wide
    let state = store.register_state("s").unwrap();
    state.put("k", "a value longer than eight bytes").unwrap();
    assert_eq!(state.db().dictionary().hash_length(), 4);
}

#[test]
fn test_malformed_config_is_rejected() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("planb.toml"), "max_store_size = \"big\"").unwrap();

    assert!(matches!(
        PlanBStore::open(dir.path()),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_out_of_range_config_is_rejected() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("planb.toml"), "max_store_size = 1024").unwrap();
    assert!(matches!(
        PlanBStore::open(dir.path()),
        Err(Error::InvalidConfig(msg)) if msg.contains("max_store_size")
    ));

    let config = PlanBConfig {
        max_readers: 0,
        ..test_config()
    };
    assert!(matches!(
        PlanBStore::open_with_config(dir.path(), config),
        Err(Error::InvalidConfig(_))
    ));
}
