//! Connection manager tests - switching, superseded connects, session restore

mod common;

use std::sync::Arc;

use antelopex::app::{Explorer, Navigation};
use antelopex::connection::{ConnectionManager, ConnectionStatus};
use antelopex::error::{ConnectError, SourceError};
use antelopex::storage::{MemoryStorage, SessionStorage, CHAIN_NAME_KEY, ENDPOINT_KEY};

use common::{account_json, MockSource, EOS, WAX};

fn manager(source: &Arc<MockSource>) -> (ConnectionManager, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (ConnectionManager::new(source.clone(), storage.clone()), storage)
}

#[tokio::test]
async fn connect_publishes_state_and_persists_session() {
    let source = MockSource::new();
    source.chain(EOS, "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906", 350_000_000);
    let (mgr, storage) = manager(&source);

    let conn = mgr.connect(EOS, Some("EOS Mainnet"), None).await.unwrap();
    assert_eq!(conn.name, "EOS Mainnet");
    assert_eq!(conn.head_block_num, 350_000_000);

    let state = mgr.snapshot();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.error.is_none());
    assert_eq!(storage.get(ENDPOINT_KEY).as_deref(), Some(EOS));
    assert_eq!(storage.get(CHAIN_NAME_KEY).as_deref(), Some("EOS Mainnet"));

    let status = mgr.status().unwrap();
    assert_eq!(status.chain_id_short, "aca376f206b8...");
    assert_eq!(status.head_producer, "producer1");
}

#[tokio::test]
async fn later_connect_wins_over_slow_earlier_one() {
    let source = MockSource::new();
    source.chain(EOS, "eos-chain", 1);
    source.chain(WAX, "wax-chain", 2);
    let release_eos = source.gate(format!("{EOS}|get_info|"));
    let (mgr, _) = manager(&source);
    let mgr = Arc::new(mgr);

    let slow = {
        let mgr = mgr.clone();
        tokio::spawn(async move { mgr.connect(EOS, Some("EOS Mainnet"), None).await })
    };
    // Let the first attempt reach its gate.
    while !source.called(&format!("{EOS}|get_info|")) {
        tokio::task::yield_now().await;
    }

    let wax = mgr.connect(WAX, Some("WAX Mainnet"), None).await.unwrap();
    assert_eq!(wax.chain_id, "wax-chain");

    release_eos.notify_one();
    let slow = slow.await.unwrap();
    assert_eq!(slow.unwrap_err(), ConnectError::Superseded);

    let active = mgr.active().unwrap();
    assert_eq!(active.name, "WAX Mainnet");
    assert_eq!(mgr.snapshot().status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn lookup_after_rapid_connects_uses_only_the_later_chain() {
    let source = MockSource::new();
    source.chain(EOS, "eos-chain", 1);
    source.chain(WAX, "wax-chain", 2);
    source.ok(format!("{EOS}|get_account|alice"), account_json("alice"));
    source.ok(format!("{WAX}|get_account|alice"), account_json("alice"));
    let release_eos = source.gate(format!("{EOS}|get_info|"));
    let app = Explorer::new(source.clone(), Arc::new(MemoryStorage::new()), 10);

    let slow = app.connections().connect(EOS, Some("EOS Mainnet"), None);
    let rest = async {
        while !source.called(&format!("{EOS}|get_info|")) {
            tokio::task::yield_now().await;
        }
        app.connections()
            .connect(WAX, Some("WAX Mainnet"), None)
            .await
            .unwrap();
        let nav = app.lookup("alice").await;
        release_eos.notify_one();
        nav
    };
    let (slow, nav) = tokio::join!(slow, rest);

    assert_eq!(slow.unwrap_err(), ConnectError::Superseded);
    assert_eq!(nav.unwrap(), Navigation::Applied);
    assert_eq!(app.connections().active().unwrap().name, "WAX Mainnet");
    assert_eq!(app.context().active_account().unwrap().account_name, "alice");
    assert!(source.called(&format!("{WAX}|get_account|alice")));
    assert!(!source.called(&format!("{EOS}|get_account|alice")));
}

#[tokio::test]
async fn failed_connect_leaves_disconnected_with_error() {
    let source = MockSource::new();
    source.route(
        format!("{EOS}|get_info|"),
        Err(SourceError::Transport("connection refused".into())),
    );
    let (mgr, storage) = manager(&source);

    let err = mgr.connect(EOS, None, None).await.unwrap_err();
    assert!(matches!(err, ConnectError::Source(SourceError::Transport(_))));
    let state = mgr.snapshot();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert!(state.error.unwrap().contains("connection refused"));
    assert!(storage.get(ENDPOINT_KEY).is_none());
}

#[tokio::test]
async fn invalid_endpoint_is_rejected_before_any_request() {
    let source = MockSource::new();
    let (mgr, _) = manager(&source);
    let before = mgr.generation();

    let err = mgr.connect("eos.greymass.com", None, None).await.unwrap_err();
    assert!(matches!(err, ConnectError::InvalidEndpoint(_)));
    assert_eq!(mgr.generation(), before);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn restore_session_reconnects_to_remembered_endpoint() {
    let source = MockSource::new();
    source.chain(WAX, "wax-chain", 7);
    let (mgr, storage) = manager(&source);
    storage.set(ENDPOINT_KEY, WAX);
    storage.set(CHAIN_NAME_KEY, "WAX Mainnet");

    let conn = mgr.restore_session(None).await.unwrap().unwrap();
    assert_eq!(conn.name, "WAX Mainnet");
    assert_eq!(conn.endpoint, WAX);
}

#[tokio::test]
async fn restore_without_session_is_a_noop() {
    let source = MockSource::new();
    let (mgr, _) = manager(&source);
    assert!(mgr.restore_session(None).await.unwrap().is_none());
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn disconnect_clears_state_and_storage() {
    let source = MockSource::new();
    source.chain(EOS, "eos-chain", 1);
    let (mgr, storage) = manager(&source);
    mgr.connect_preset("eosmainnet", None).await.unwrap();
    let generation = mgr.generation();

    mgr.disconnect();
    assert!(mgr.active().is_none());
    assert!(!mgr.is_current(generation));
    assert_eq!(mgr.snapshot().status, ConnectionStatus::Disconnected);
    assert!(storage.get(ENDPOINT_KEY).is_none());
    assert!(storage.get(CHAIN_NAME_KEY).is_none());
}

#[tokio::test]
async fn unknown_preset_is_reported() {
    let source = MockSource::new();
    let (mgr, _) = manager(&source);
    let err = mgr.connect_preset("notachain", None).await.unwrap_err();
    assert_eq!(err, ConnectError::UnknownPreset("notachain".into()));
}
