use std::sync::atomic::Ordering;
use std::sync::Arc;

use metasync::Bucket;
use metasync::EntityKind;
use metasync::KvStore;
use metasync::MemStore;
use metasync::MetadataClient;
use metasync::StoreError;
use metasync::WatcherStatus;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing_test::traced_test;

use crate::common::fast_config;
use crate::common::wait_until;
use crate::common::FlakyStore;
use crate::common::WAIT;

async fn next_for(
    rx: &mut mpsc::Receiver<WatcherStatus>,
    watcher: EntityKind,
) -> WatcherStatus {
    loop {
        let status = timeout(WAIT, rx.recv())
            .await
            .expect("status within deadline")
            .expect("status channel open");
        if status.watcher == watcher {
            return status;
        }
    }
}

#[tokio::test]
#[traced_test]
async fn test_failed_subscription_reports_unhealthy_then_healthy() {
    let inner = Arc::new(MemStore::named("flaky"));
    let flaky = Arc::new(FlakyStore::new(Arc::clone(&inner), 1));

    let client = MetadataClient::builder(fast_config())
        .with_store(Arc::clone(&flaky) as Arc<dyn KvStore>)
        .build()
        .await
        .unwrap();
    let mut rx = client.take_status_receiver().unwrap();

    let first = next_for(&mut rx, EntityKind::Server).await;
    assert!(!first.healthy);
    assert!(matches!(
        first.error.as_deref(),
        Some(StoreError::WatchUnavailable(_))
    ));

    let second = next_for(&mut rx, EntityKind::Server).await;
    assert!(second.healthy);
    assert!(second.error.is_none());

    // The feed works after recovering
    inner
        .bucket("servers")
        .unwrap()
        .put("srv-1", b"{}".to_vec())
        .await
        .unwrap();
    assert!(wait_until(WAIT, || client.get_server("srv-1").is_some()).await);
    assert!(flaky.watch_attempts.load(Ordering::SeqCst) >= 4);

    client.shutdown().await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_lost_feed_recovers_changes_made_while_disconnected() {
    let store = Arc::new(MemStore::named("lossy"));
    let client = MetadataClient::builder(fast_config())
        .with_store(Arc::clone(&store) as Arc<dyn KvStore>)
        .build()
        .await
        .unwrap();
    let mut rx = client.take_status_receiver().unwrap();
    assert!(next_for(&mut rx, EntityKind::Player).await.healthy);

    let players = store.bucket("players").unwrap();
    players.drop_watchers();
    // Written while the loop is between feeds
    players.put("p1", br#"{"labels":{"tier":"gold"}}"#.to_vec()).await.unwrap();

    let lost = next_for(&mut rx, EntityKind::Player).await;
    assert!(!lost.healthy);
    assert!(next_for(&mut rx, EntityKind::Player).await.healthy);

    assert!(
        wait_until(WAIT, || client
            .get_player("p1")
            .is_some_and(|m| m.has_label("tier", "gold")))
        .await
    );

    client.shutdown().await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_lost_feed_removes_keys_deleted_while_disconnected() {
    let store = Arc::new(MemStore::named("lossy-delete"));
    let client = MetadataClient::builder(fast_config())
        .with_store(Arc::clone(&store) as Arc<dyn KvStore>)
        .build()
        .await
        .unwrap();
    let mut rx = client.take_status_receiver().unwrap();
    assert!(next_for(&mut rx, EntityKind::Player).await.healthy);

    let players = store.bucket("players").unwrap();
    players
        .put("p1", br#"{"annotations":{"player/username":"alice"}}"#.to_vec())
        .await
        .unwrap();
    assert!(wait_until(WAIT, || client.get_player("p1").is_some()).await);

    players.drop_watchers();
    // Deleted while the loop is between feeds
    players.delete("p1").await.unwrap();
    assert!(matches!(players.get("p1").await, Err(StoreError::KeyNotFound(_))));

    let lost = next_for(&mut rx, EntityKind::Player).await;
    assert!(!lost.healthy);
    assert!(next_for(&mut rx, EntityKind::Player).await.healthy);

    assert!(wait_until(WAIT, || client.get_player("p1").is_none()).await);
    assert!(client.get_player_by_name("alice").is_none());
    assert!(client.all_players().is_empty());

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_watch_loops_survive_unread_status_channel() {
    let inner = Arc::new(MemStore::named("flaky"));
    let flaky = Arc::new(FlakyStore::new(Arc::clone(&inner), 10));

    let mut config = fast_config();
    config.watch.retry_delay_ms = 1;
    config.watch.status_buffer_size = 1;

    let client = MetadataClient::builder(config)
        .with_store(Arc::clone(&flaky) as Arc<dyn KvStore>)
        .build()
        .await
        .unwrap();

    // Nobody drains statuses; both loops still get through their failures
    inner
        .bucket("players")
        .unwrap()
        .put("p1", b"{}".to_vec())
        .await
        .unwrap();
    assert!(wait_until(WAIT, || client.get_player("p1").is_some()).await);

    client.shutdown().await.unwrap();
}
