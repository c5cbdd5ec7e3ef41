//! Migration Tests
//!
//! Ledger-driven migration across simulated process restarts.

use pks_core::prelude::*;
use pks_core::MigrationError;
use pks_test_utils::{guest_defaults, store_for, user_schema, RecordingBackend};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn seeded_v1() -> Arc<RecordingBackend> {
    Arc::new(RecordingBackend::with_entries([
        ("user", r#"{"name":"guest"}"#),
        ("track", r#"{"user":{"v":1}}"#),
    ]))
}

fn counting_schema(calls: Arc<AtomicUsize>) -> KeySchema {
    user_schema().with_version(2).with_migration(move |current, defaults| {
        calls.fetch_add(1, Ordering::SeqCst);
        let mut next = current.clone();
        next["name"] = json!("Tony Stark");
        next["previous"] = defaults.cloned().unwrap_or(Value::Null);
        Some(next)
    })
}

#[test]
fn test_version_bump_runs_migration_once() {
    let backend = seeded_v1();
    let calls = Arc::new(AtomicUsize::new(0));
    let (store, binder) = store_for(backend.clone(), counting_schema(calls.clone()));

    let first = store.activate("user").unwrap();
    let second = store.activate("user").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.report().migration,
        MigrationOutcome::Migrated { from: 1, to: 2 }
    );
    assert_eq!(second.report().migration, MigrationOutcome::NotChecked);

    let expected = json!({"name": "Tony Stark", "previous": {"name": "guest"}});
    assert_eq!(first.value(), &expected);
    assert_eq!(backend.json("user"), Some(expected.clone()));
    assert_eq!(backend.raw("track").as_deref(), Some(r#"{"user":{"v":2}}"#));
    assert_eq!(binder.get("user"), Some(expected));
}

#[test]
fn test_restart_after_migration_is_up_to_date() {
    let backend = seeded_v1();
    let calls = Arc::new(AtomicUsize::new(0));

    let (store, _) = store_for(backend.clone(), counting_schema(calls.clone()));
    store.activate("user").unwrap();

    let (restarted, _) = store_for(backend.clone(), counting_schema(calls.clone()));
    let activation = restarted.activate("user").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        activation.report().migration,
        MigrationOutcome::UpToDate { version: 2 }
    );
}

#[test]
fn test_undefined_migration_changes_nothing() {
    let backend = seeded_v1();
    let (store, _) = store_for(backend.clone(), user_schema().with_version(2));
    backend.clear_ops();

    let activation = store.activate("user").unwrap();

    let err = activation.report().migration.error().cloned().unwrap();
    assert_eq!(
        err,
        MigrationError::Undefined {
            key: "user".to_string(),
            from: 1,
            to: 2
        }
    );
    assert!(!err.ledger_advanced());
    assert_eq!(activation.value(), &guest_defaults());
    assert_eq!(backend.set_count("user"), 0);
    assert_eq!(backend.set_count("track"), 0);
    assert_eq!(store.ledger_version("user").unwrap(), Some(1));
}

#[test]
fn test_undefined_migration_retried_after_restart() {
    let backend = seeded_v1();
    let (store, _) = store_for(backend.clone(), user_schema().with_version(2));
    store.activate("user").unwrap();

    let (restarted, _) = store_for(backend.clone(), user_schema().with_version(2));
    let activation = restarted.activate("user").unwrap();

    assert!(matches!(
        activation.report().migration,
        MigrationOutcome::Failed(MigrationError::Undefined { .. })
    ));
}

#[test]
fn test_falsy_migration_result_advances_ledger_only() {
    for result in [None, Some(Value::Null), Some(json!(false)), Some(json!(0)), Some(json!(""))] {
        let backend = seeded_v1();
        let schema = user_schema()
            .with_version(2)
            .with_migration(move |_, _| result.clone());
        let (store, _) = store_for(backend.clone(), schema);

        let activation = store.activate("user").unwrap();

        let err = activation.report().migration.error().unwrap();
        assert!(matches!(err, MigrationError::InvalidResult { from: 1, to: 2, .. }));
        assert!(err.ledger_advanced());
        assert_eq!(activation.value(), &guest_defaults());
        assert_eq!(backend.json("user"), Some(guest_defaults()));
        assert_eq!(backend.raw("track").as_deref(), Some(r#"{"user":{"v":2}}"#));
    }
}

#[test]
fn test_downgrade_also_migrates() {
    let backend = Arc::new(RecordingBackend::with_entries([
        ("user", r#"{"name":"guest"}"#),
        ("track", r#"{"user":{"v":5}}"#),
    ]));
    let schema = user_schema()
        .with_version(3)
        .with_migration(|_, _| Some(json!({"name": "downgraded"})));
    let (store, _) = store_for(backend.clone(), schema);

    let activation = store.activate("user").unwrap();

    assert_eq!(
        activation.report().migration,
        MigrationOutcome::Migrated { from: 5, to: 3 }
    );
    assert_eq!(store.ledger_version("user").unwrap(), Some(3));
}

#[test]
fn test_missing_ledger_entry_is_recorded_without_migrating() {
    let backend = Arc::new(RecordingBackend::with_entries([("user", r#"{"name":"guest"}"#)]));
    let calls = Arc::new(AtomicUsize::new(0));
    let (store, _) = store_for(backend.clone(), counting_schema(calls.clone()));

    let activation = store.activate("user").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        activation.report().migration,
        MigrationOutcome::Recorded { version: 2 }
    );
    assert_eq!(backend.raw("track").as_deref(), Some(r#"{"user":{"v":2}}"#));
}

#[test]
fn test_ledger_read_once_per_namespace() {
    let backend = seeded_v1();
    let (store, _) = store_for(backend.clone(), user_schema());
    store.configure(
        ConfigPatch::new()
            .storage("user", user_schema())
            .storage("cart", KeySchema::new(json!([]))),
    );

    store.activate("user").unwrap();
    store.activate("cart").unwrap();
    store.ledger().unwrap();

    assert_eq!(backend.get_count("track"), 1);
}

#[test]
fn test_migration_survives_file_backend_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    {
        let backend = Arc::new(FileBackend::open(&path).unwrap());
        let (store, _) = store_for(backend, user_schema());
        store.configure(ConfigPatch::new().namespace("app"));
        store.activate("user").unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(FileBackend::open(&path).unwrap());
    let (store, _) = store_for(backend.clone(), counting_schema(calls.clone()));
    store.configure(ConfigPatch::new().namespace("app"));

    let activation = store.activate("user").unwrap();

    assert!(activation.report().migration.is_migrated());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let reopened = FileBackend::open(&path).unwrap();
    assert_eq!(
        reopened.get("app/track").unwrap().as_deref(),
        Some(r#"{"user":{"v":2}}"#)
    );
    let stored: Value = serde_json::from_str(&reopened.get("app/user").unwrap().unwrap()).unwrap();
    assert_eq!(stored["name"], json!("Tony Stark"));
}

proptest! {
    #[test]
    fn prop_ledger_converges_to_effective_version(
        stored in proptest::option::of(1u32..6),
        declared in proptest::option::of(0u32..6),
        has_value in any::<bool>(),
    ) {
        let mut entries = Vec::new();
        if has_value {
            entries.push(("user".to_string(), r#"{"name":"guest"}"#.to_string()));
        }
        if let Some(v) = stored {
            entries.push(("track".to_string(), format!(r#"{{"user":{{"v":{v}}}}}"#)));
        }
        let backend = Arc::new(RecordingBackend::with_entries(entries));

        let mut schema = user_schema().with_migration(|current, _| Some(current.clone()));
        if let Some(version) = declared {
            schema = schema.with_version(version);
        }
        let expected = schema.effective_version();
        let (store, _) = store_for(backend, schema);

        store.activate("user").unwrap();

        prop_assert_eq!(store.ledger_version("user").unwrap(), Some(expected));
    }
}
