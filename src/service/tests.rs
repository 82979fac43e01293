use super::*;
use chrono::{Duration, TimeZone};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const TS: &str = "2026-06-01T21:15:00";

fn open_service(dir: &TempDir, durability: Durability) -> RespawnService {
    let store = SnapshotStore::new(dir.path().join("boss_state.json"));
    RespawnService::open(Roster::default(), store, durability)
}

/// Store whose target path is a non-empty directory, so every save fails
fn broken_store(dir: &TempDir) -> SnapshotStore {
    let path = dir.path().join("occupied");
    fs::create_dir_all(path.join("child")).unwrap();
    SnapshotStore::new(path)
}

#[tokio::test]
async fn test_open_persists_initialized_state() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);

    let state = service.get_state().await;
    assert_eq!(state, Snapshot::initialized(service.roster()));

    let on_disk = SnapshotStore::new(dir.path().join("boss_state.json")).load(service.roster());
    assert_eq!(on_disk.snapshot, state);
}

#[tokio::test]
async fn test_update_sets_only_target_slot() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);
    let before = service.get_state().await;

    let returned = service.update_slot("CH2_Skorpion #1", Some(TS)).await.unwrap();
    let after = service.get_state().await;
    assert_eq!(returned, after);

    for (key, state) in after.iter() {
        if key == "CH2_Skorpion #1" {
            assert_eq!(state.killed_at().unwrap().as_str(), TS);
        } else {
            assert_eq!(Some(state), before.get(key));
        }
    }
}

#[tokio::test]
async fn test_update_persists_to_store() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);

    service.update_slot("CH6_Serpentor #2", Some(TS)).await.unwrap();

    // A fresh service over the same file sees the write
    let reopened = open_service(&dir, Durability::BestEffort);
    let state = reopened.get_state().await;
    assert_eq!(
        state.get("CH6_Serpentor #2").unwrap().killed_at().unwrap().as_str(),
        TS
    );
}

#[tokio::test]
async fn test_update_with_none_unsets_regardless_of_prior_state() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);

    service.update_slot("CH1_Szeptotruj #1", Some(TS)).await.unwrap();
    let state = service.update_slot("CH1_Szeptotruj #1", None).await.unwrap();
    assert!(state.get("CH1_Szeptotruj #1").unwrap().is_unset());

    let state = service.update_slot("CH1_Szeptotruj #1", None).await.unwrap();
    assert!(state.get("CH1_Szeptotruj #1").unwrap().is_unset());
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);

    let first = service.update_slot("CH3_Skorpion #2", Some(TS)).await.unwrap();
    let second = service.update_slot("CH3_Skorpion #2", Some(TS)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_update_unknown_key_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);
    let before = service.get_state().await;

    let err = service.update_slot("UNKNOWN_Boss", Some(TS)).await.unwrap_err();
    assert!(matches!(err, UpdateError::UnknownKey(_)));
    assert_eq!(service.get_state().await, before);
}

#[tokio::test]
async fn test_update_invalid_timestamp_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);
    let before = service.get_state().await;

    let err = service
        .update_slot("CH1_Skorpion #1", Some("last tuesday"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        UpdateError::InvalidTimestamp(InvalidTimestamp("last tuesday".to_string()))
    );
    assert_eq!(service.get_state().await, before);
}

#[tokio::test]
async fn test_reset_channel_only_touches_that_channel() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);

    for boss in ["Szeptotruj #1", "Skorpion #1", "Serpentor #2"] {
        service.update_slot(&format!("CH1_{}", boss), Some(TS)).await.unwrap();
    }
    service.update_slot("CH2_Skorpion #1", Some(TS)).await.unwrap();

    let (count, state) = service.reset_channel("CH1").await.unwrap();
    assert_eq!(count, service.roster().bosses.len());

    for (key, slot) in state.iter() {
        if key.starts_with("CH1_") {
            assert!(slot.is_unset(), "{} should be unset", key);
        }
    }
    assert_eq!(
        state.get("CH2_Skorpion #1").unwrap().killed_at().unwrap().as_str(),
        TS
    );
    assert_eq!(state.killed_count(), 1);
}

#[tokio::test]
async fn test_reset_unknown_channel() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);
    let before = service.get_state().await;

    let err = service.reset_channel("CH7").await.unwrap_err();
    assert_eq!(err, ResetError::UnknownChannel("CH7".to_string()));
    assert_eq!(service.get_state().await, before);
}

#[tokio::test]
async fn test_best_effort_keeps_update_when_persistence_fails() {
    let dir = TempDir::new().unwrap();
    let roster = Roster::default();
    let service = RespawnService::with_snapshot(
        roster.clone(),
        broken_store(&dir),
        Durability::BestEffort,
        Snapshot::initialized(&roster),
    );

    let state = service.update_slot("CH4_Skorpion #2", Some(TS)).await.unwrap();
    assert!(!state.get("CH4_Skorpion #2").unwrap().is_unset());
    assert_eq!(service.get_state().await, state);
}

#[tokio::test]
async fn test_strict_rolls_back_when_persistence_fails() {
    let dir = TempDir::new().unwrap();
    let roster = Roster::default();
    let mut initial = Snapshot::initialized(&roster);
    initial.set(
        &SlotKey::new("CH4", "Skorpion #2"),
        SlotState::KilledAt(crate::slot::Timestamp::parse("2026-06-01T20:00:00").unwrap()),
    );
    let service = RespawnService::with_snapshot(
        roster,
        broken_store(&dir),
        Durability::Strict,
        initial.clone(),
    );

    let err = service.update_slot("CH4_Skorpion #2", Some(TS)).await.unwrap_err();
    assert!(matches!(err, UpdateError::Persistence(_)));
    assert_eq!(service.get_state().await, initial);

    let err = service.reset_channel("CH4").await.unwrap_err();
    assert!(matches!(err, ResetError::Persistence(_)));
    assert_eq!(service.get_state().await, initial);
}

#[tokio::test]
async fn test_statuses_cover_every_slot() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir, Durability::BestEffort);

    let killed_at = Utc.with_ymd_and_hms(2026, 6, 1, 21, 0, 0).unwrap();
    service
        .update_slot("CH1_Serpentor #1", Some("2026-06-01T21:00:00Z"))
        .await
        .unwrap();
    service
        .update_slot("CH1_Skorpion #1", Some("2026-06-01T20:00:00Z"))
        .await
        .unwrap();

    let now = killed_at + Duration::minutes(30);
    let statuses = service.statuses(now).await;

    assert_eq!(statuses.len(), service.roster().slot_count());
    assert_eq!(
        statuses["CH1_Serpentor #1"],
        Status::RespawningLater {
            remaining_seconds: 11 * 60
        }
    );
    assert_eq!(statuses["CH1_Skorpion #1"], Status::Active);
    assert_eq!(statuses["CH2_Skorpion #1"], Status::Unknown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_to_distinct_keys_are_all_kept() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(open_service(&dir, Durability::BestEffort));
    let roster = service.roster().clone();

    let mut handles = Vec::new();
    for channel in &roster.channels {
        for boss in &roster.bosses {
            let service = Arc::clone(&service);
            let key = format!("{}_{}", channel, boss.name);
            handles.push(tokio::spawn(async move {
                service.update_slot(&key, Some(TS)).await
            }));
        }
    }

    for result in futures::future::join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    let state = service.get_state().await;
    assert_eq!(state.killed_count(), roster.slot_count());

    // Every write also reached disk
    let on_disk = SnapshotStore::new(dir.path().join("boss_state.json")).load(&roster);
    assert_eq!(on_disk.snapshot, state);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_reset() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(open_service(&dir, Durability::BestEffort));
    let bosses: Vec<String> = service
        .roster()
        .bosses
        .iter()
        .map(|b| b.name.clone())
        .collect();

    for boss in &bosses {
        service.update_slot(&format!("CH1_{}", boss), Some(TS)).await.unwrap();
    }

    let reader = {
        let service = Arc::clone(&service);
        let bosses = bosses.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let state = service.get_state().await;
                let unset = bosses
                    .iter()
                    .filter(|b| state.get(&format!("CH1_{}", b)).unwrap().is_unset())
                    .count();
                assert!(unset == 0 || unset == bosses.len(), "saw partial reset");
                tokio::task::yield_now().await;
            }
        })
    };

    service.reset_channel("CH1").await.unwrap();
    reader.await.unwrap();
}
