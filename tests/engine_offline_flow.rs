mod common;

use common::{MockHttpResponse, join_with_timeout, spawn_json_sequence_server, unreachable_url};
use guestlist_sync::application::services::{MutationOutcome, StartupOutcome, SyncOutcome};
use guestlist_sync::domain::value_objects::{ConnectivityState, EngineState, GuestId};
use guestlist_sync::shared::config::{AppConfig, BackendKind};
use guestlist_sync::AppState;
use serde_json::json;
use std::time::Duration as StdDuration;
use tempfile::TempDir;
use tokio::sync::watch;

fn config_for(api_root: &str, dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.kind = BackendKind::TableApi;
    config.backend.api_root = api_root.to_string();
    config.backend.base_id = "appEvent".to_string();
    config.backend.api_token = Some("secret-token".to_string());
    config.backend.request_timeout_secs = 2;
    config.storage.database_url = format!(
        "sqlite:{}",
        dir.path().join("guestlist.db").display()
    );
    config.storage.max_connections = 1;
    config
}

fn id(value: &str) -> GuestId {
    GuestId::parse(value).unwrap()
}

async fn wait_until_state(state: &AppState, expected: EngineState) {
    for _ in 0..100 {
        if state.engine.state().await == expected {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    panic!(
        "engine never reached {expected:?}, stuck at {:?}",
        state.engine.state().await
    );
}

#[tokio::test]
async fn restart_restores_roster_and_pending_queue() {
    let dir = TempDir::new().unwrap();
    let (base_url, _rx, handle) = spawn_json_sequence_server(vec![MockHttpResponse::ok(json!({
        "records": [
            { "id": "rec1", "fields": { "nom": "Alice", "table": 1 } },
            { "id": "rec2", "fields": { "nom": "Bruno", "table": 1 } },
            { "id": "rec3", "fields": { "nom": "Chloé", "table": 2, "present": true } }
        ]
    }))]);

    let first = AppState::initialize(config_for(&base_url, &dir)).await.unwrap();
    assert_eq!(
        first.start(true).await,
        StartupOutcome::Loaded {
            guests: 3,
            replay: None
        }
    );
    join_with_timeout(handle, StdDuration::from_secs(2));

    first.engine.on_connectivity_changed(false).await;
    for guest in ["rec1", "rec2"] {
        assert!(matches!(
            first.engine.apply_toggle(&id(guest)).await,
            MutationOutcome::QueuedOffline(_)
        ));
    }
    first.db_pool.close().await;
    drop(first);

    let second = AppState::initialize(config_for(&unreachable_url(), &dir))
        .await
        .unwrap();
    let outcome = second.start(true).await;

    assert!(
        matches!(
            outcome,
            StartupOutcome::RestoredFromSnapshot {
                guests: 3,
                pending: 2,
                ..
            }
        ),
        "{outcome:?}"
    );
    let roster = second.engine.roster_snapshot().await;
    assert_eq!(roster.len(), 3);
    assert!(roster.iter().all(|guest| guest.present));

    let pending: Vec<String> = second
        .engine
        .pending_changes()
        .await
        .iter()
        .map(|change| change.guest.id.to_string())
        .collect();
    assert_eq!(pending, vec!["rec1", "rec2"]);
    assert_eq!(
        second.engine.state().await,
        EngineState::Ready(ConnectivityState::Offline)
    );
}

#[tokio::test]
async fn offline_toggle_is_pushed_when_the_network_returns() {
    let dir = TempDir::new().unwrap();
    let alice = json!({
        "records": [ { "id": "1", "fields": { "nom": "Alice", "table": 3, "present": false } } ]
    });
    let (base_url, rx, handle) = spawn_json_sequence_server(vec![
        MockHttpResponse::ok(alice.clone()),
        MockHttpResponse::ok(alice),
        MockHttpResponse::ok(json!({
            "id": "1",
            "fields": { "nom": "Alice", "table": 3, "present": true }
        })),
    ]);

    let state = AppState::initialize(config_for(&base_url, &dir)).await.unwrap();
    assert!(matches!(
        state.start(true).await,
        StartupOutcome::Loaded { guests: 1, .. }
    ));

    let (signal, receiver) = watch::channel(true);
    let watcher = state.attach_connectivity(receiver);

    signal.send(false).unwrap();
    wait_until_state(&state, EngineState::Ready(ConnectivityState::Offline)).await;

    let outcome = state.engine.apply_toggle(&id("1")).await;
    assert!(matches!(outcome, MutationOutcome::QueuedOffline(ref guest) if guest.present));
    assert_eq!(state.engine.pending_count().await, 1);
    assert_eq!(state.engine.force_sync().await, SyncOutcome::Offline);

    signal.send(true).unwrap();
    for _ in 0..100 {
        if state.engine.pending_count().await == 0 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    wait_until_state(&state, EngineState::Ready(ConnectivityState::Online)).await;
    assert_eq!(state.engine.pending_count().await, 0);
    assert!(state.engine.guest(&id("1")).await.unwrap().present);

    join_with_timeout(handle, StdDuration::from_secs(2));
    let requests: Vec<(String, String)> = rx
        .try_iter()
        .map(|request| (request.method, request.path))
        .collect();
    assert_eq!(
        requests,
        vec![
            ("GET".to_string(), "/appEvent/Invites".to_string()),
            ("GET".to_string(), "/appEvent/Invites".to_string()),
            ("PATCH".to_string(), "/appEvent/Invites/1".to_string()),
        ]
    );

    drop(signal);
    tokio::time::timeout(StdDuration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
}
