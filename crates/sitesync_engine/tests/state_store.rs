use std::fs;

use pretty_assertions::assert_eq;
use sitesync_core::SyncState;
use sitesync_engine::{StateStore, WriteOutcome};
use tempfile::TempDir;

#[test]
fn missing_file_loads_empty_state() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path().join(".sync-state.json"));
    assert!(store.load().is_empty());
}

#[test]
fn corrupt_file_loads_empty_state() {
    site_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".sync-state.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(StateStore::new(path).load().is_empty());
}

#[test]
fn save_then_load_round_trips_and_skips_identical_writes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".sync-state.json");
    let store = StateStore::new(path.clone());

    let mut state = SyncState::new();
    state.set_marker("doc1", "2024-03-01T10:00:00Z");
    state.set_summary("doc1", "Hello");

    assert_eq!(store.save(&state).unwrap(), WriteOutcome::Written);
    assert_eq!(store.load(), state);
    assert_eq!(store.save(&state).unwrap(), WriteOutcome::Unchanged);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"doc1\": \"2024-03-01T10:00:00Z\""));
    assert!(text.contains("\"summary_doc1\": \"Hello\""));
    assert!(text.ends_with('\n'));
}

#[cfg(unix)]
#[test]
fn failed_save_keeps_previous_state_file() {
    use std::os::unix::fs::PermissionsExt;

    site_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");
    fs::create_dir(&dir).unwrap();
    let path = dir.join(".sync-state.json");
    let store = StateStore::new(path.clone());

    let mut state = SyncState::new();
    state.set_marker("doc1", "2024-03-01T10:00:00Z");
    store.save(&state).unwrap();
    let before = fs::read(&path).unwrap();

    fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
    // Privileged users ignore directory permissions; nothing to observe then.
    let writable = fs::File::create(dir.join("canary")).is_ok();
    if !writable {
        state.set_marker("doc2", "2024-03-02T10:00:00Z");
        assert!(store.save(&state).is_err());
    }
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    if writable {
        return;
    }

    assert_eq!(fs::read(&path).unwrap(), before);
    let names: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![".sync-state.json".to_string()]);
    assert_eq!(store.load().marker("doc2"), None);
}
