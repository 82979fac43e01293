use super::*;
use crate::slot::{SlotKey, Timestamp};
use serde_json::json;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SnapshotStore {
    SnapshotStore::new(dir.path().join("boss_state.json"))
}

fn kill(snapshot: &mut Snapshot, channel: &str, boss: &str, raw: &str) {
    snapshot.set(
        &SlotKey::new(channel, boss),
        SlotState::KilledAt(Timestamp::parse(raw).unwrap()),
    );
}

#[test]
fn test_initialized_covers_every_slot() {
    let roster = Roster::default();
    let snapshot = Snapshot::initialized(&roster);

    assert_eq!(snapshot.len(), roster.slot_count());
    assert!(snapshot.iter().all(|(_, state)| state.is_unset()));
    assert!(snapshot.contains_key("CH1_Szeptotruj #1"));
    assert!(snapshot.contains_key("CH6_Serpentor #2"));
    assert_eq!(snapshot.killed_count(), 0);
}

#[test]
fn test_load_missing_file_initializes() {
    let dir = TempDir::new().unwrap();
    let roster = Roster::default();

    let loaded = store_in(&dir).load(&roster);
    assert_eq!(loaded.origin, LoadOrigin::Initialized);
    assert!(loaded.origin.needs_persist());
    assert_eq!(loaded.snapshot, Snapshot::initialized(&roster));
}

#[test]
fn test_load_empty_or_corrupt_file_initializes() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    for contents in ["", "not json", "[1, 2, 3]", "{}"] {
        fs::write(store.path(), contents).unwrap();
        let loaded = store.load(&roster);
        assert_eq!(loaded.origin, LoadOrigin::Initialized, "contents: {:?}", contents);
        assert_eq!(loaded.snapshot, Snapshot::initialized(&roster));
    }
}

#[test]
fn test_save_then_load_restores() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    let mut snapshot = Snapshot::initialized(&roster);
    kill(&mut snapshot, "CH2", "Skorpion #1", "2026-04-01T18:00:00.123456");

    store.save(&snapshot).unwrap();
    assert!(!store.tmp_path().exists());

    let loaded = store.load(&roster);
    assert_eq!(loaded.origin, LoadOrigin::Restored);
    assert!(!loaded.origin.needs_persist());
    assert_eq!(loaded.snapshot, snapshot);
    assert_eq!(
        loaded.snapshot.get("CH2_Skorpion #1").unwrap().killed_at().unwrap().as_str(),
        "2026-04-01T18:00:00.123456"
    );
}

#[test]
fn test_repeated_save_load_is_stable() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    let mut snapshot = Snapshot::initialized(&roster);
    kill(&mut snapshot, "CH5", "Serpentor #2", "2026-04-01T18:00:00Z");
    store.save(&snapshot).unwrap();

    let first = store.load(&roster).snapshot;
    store.save(&first).unwrap();
    let bytes_first = fs::read(store.path()).unwrap();

    let second = store.load(&roster).snapshot;
    store.save(&second).unwrap();
    let bytes_second = fs::read(store.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(bytes_first, bytes_second);
}

#[test]
fn test_persisted_layout_is_flat_map() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    let mut snapshot = Snapshot::initialized(&roster);
    kill(&mut snapshot, "CH1", "Skorpion #2", "2026-04-01T18:00:00");
    store.save(&snapshot).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 36);
    assert_eq!(object["CH1_Skorpion #2"], json!("2026-04-01T18:00:00"));
    assert_eq!(object["CH1_Skorpion #1"], serde_json::Value::Null);
}

#[test]
fn test_load_drops_invalid_entries_and_keeps_valid_ones() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    let mut file = serde_json::Map::new();
    for (key, state) in Snapshot::initialized(&roster).iter() {
        file.insert(key.clone(), serde_json::to_value(state).unwrap());
    }
    file.insert("CH1_Skorpion #1".to_string(), json!("2026-04-01T18:00:00"));
    file.insert("CH2_Skorpion #1".to_string(), json!("not a timestamp"));
    file.insert("UNKNOWN_Boss".to_string(), json!("2026-04-01T18:00:00"));
    file.insert("CH3_Skorpion #1".to_string(), json!(12345));
    fs::write(store.path(), serde_json::to_string(&file).unwrap()).unwrap();

    let loaded = store.load(&roster);

    // The two bad existing keys are refilled as unset
    assert_eq!(
        loaded.origin,
        LoadOrigin::Repaired {
            dropped: 3,
            filled: 2
        }
    );
    assert_eq!(loaded.snapshot.len(), roster.slot_count());
    assert!(!loaded.snapshot.contains_key("UNKNOWN_Boss"));
    assert!(loaded.snapshot.get("CH2_Skorpion #1").unwrap().is_unset());
    assert!(loaded.snapshot.get("CH3_Skorpion #1").unwrap().is_unset());
    assert_eq!(
        loaded.snapshot.get("CH1_Skorpion #1").unwrap().killed_at().unwrap().as_str(),
        "2026-04-01T18:00:00"
    );
}

#[test]
fn test_load_fills_missing_slots() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    fs::write(
        store.path(),
        r#"{"CH4_Szeptotruj #1": "2026-04-01T18:00:00", "CH4_Skorpion #1": null}"#,
    )
    .unwrap();

    let loaded = store.load(&roster);
    assert_eq!(
        loaded.origin,
        LoadOrigin::Repaired {
            dropped: 0,
            filled: roster.slot_count() - 2
        }
    );
    assert_eq!(loaded.snapshot.len(), roster.slot_count());
    assert_eq!(loaded.snapshot.killed_count(), 1);
}

#[test]
fn test_load_fully_invalid_file_initializes() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let roster = Roster::default();

    fs::write(
        store.path(),
        r#"{"CH9_Szeptotruj #1": "2026-04-01T18:00:00", "CH1_Nobody": null}"#,
    )
    .unwrap();

    let loaded = store.load(&roster);
    assert_eq!(loaded.origin, LoadOrigin::Initialized);
    assert_eq!(loaded.snapshot, Snapshot::initialized(&roster));
}

#[test]
fn test_save_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("nested/state/boss_state.json"));
    let roster = Roster::default();

    store.save(&Snapshot::initialized(&roster)).unwrap();
    assert!(store.path().exists());
}

#[test]
fn test_save_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be makes the final rename fail
    let path = dir.path().join("occupied");
    fs::create_dir_all(path.join("child")).unwrap();
    let store = SnapshotStore::new(&path);

    let result = store.save(&Snapshot::initialized(&Roster::default()));
    assert!(result.is_err());
}

#[test]
fn test_temp_file_is_derived_from_full_file_name() {
    let dir = TempDir::new().unwrap();
    let roster = Roster::default();
    let mut snapshot = Snapshot::initialized(&roster);
    kill(&mut snapshot, "CH2", "Skorpion #2", "2026-05-10T20:00:00Z");

    // A state path already ending in .tmp must not be its own temp file
    let store = SnapshotStore::new(dir.path().join("boss_state.tmp"));
    assert_eq!(store.tmp_path(), dir.path().join("boss_state.tmp.tmp"));
    store.save(&snapshot).unwrap();
    assert_eq!(store.load(&roster).snapshot, snapshot);
    assert!(!store.tmp_path().exists());

    // Paths differing only by extension get distinct temp files
    let json = SnapshotStore::new(dir.path().join("state.json"));
    let bak = SnapshotStore::new(dir.path().join("state.bak"));
    assert_ne!(json.tmp_path(), bak.tmp_path());
    json.save(&snapshot).unwrap();
    bak.save(&Snapshot::initialized(&roster)).unwrap();
    assert_eq!(json.load(&roster).snapshot, snapshot);
    assert_eq!(bak.load(&roster).snapshot.killed_count(), 0);
}
