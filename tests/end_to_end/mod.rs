use std::collections::HashMap;
use std::sync::Arc;

use metasync::player_online;
use metasync::server_status;
use metasync::Bucket;
use metasync::ChangeEvent;
use metasync::ChangeType;
use metasync::Error;
use metasync::KvStore;
use metasync::MemStore;
use metasync::Metadata;
use metasync::MetadataClient;
use metasync::ServerStatus;
use metasync::PLAYER_USERNAME;
use parking_lot::Mutex;
use tracing_test::traced_test;

use crate::common::fast_config;
use crate::common::seed;
use crate::common::wait_until;
use crate::common::WAIT;

async fn client_over(store: &Arc<MemStore>) -> MetadataClient {
    MetadataClient::builder(fast_config())
        .with_store(Arc::clone(store) as Arc<dyn KvStore>)
        .build()
        .await
        .expect("client builds")
}

fn recorder() -> (Arc<Mutex<Vec<ChangeEvent>>>, impl Fn(&ChangeEvent) + Send + Sync + 'static) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event: &ChangeEvent| sink.lock().push(event.clone()))
}

#[tokio::test]
#[traced_test]
async fn test_seeded_server_is_observed_and_published() {
    let store = Arc::new(MemStore::named("e2e"));
    let client = client_over(&store).await;

    let (events, callback) = recorder();
    let _sub = client.subscribe_server_changes(callback);

    // Written behind the client's back
    let servers = store.bucket("servers").unwrap();
    servers
        .put("srv-1", br#"{"labels":{"region":"eu"}}"#.to_vec())
        .await
        .unwrap();

    assert!(wait_until(WAIT, || client.get_server("srv-1").is_some()).await);
    assert!(client.get_server("srv-1").unwrap().has_label("region", "eu"));

    assert!(wait_until(WAIT, || !events.lock().is_empty()).await);
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "srv-1");
    assert_eq!(events[0].change, ChangeType::Put);
    assert!(events[0].old.is_none());
    assert_eq!(events[0].new.as_deref(), client.get_server("srv-1").as_deref());
    drop(events);

    client.shutdown().await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_update_staleness_window_closes() {
    let store = Arc::new(MemStore::named("e2e"));
    let client = client_over(&store).await;
    let players = store.bucket("players").unwrap();

    client
        .update_player("p1", |m| m.set_label("tier", "silver"))
        .await
        .unwrap();
    assert!(wait_until(WAIT, || client.get_player("p1").is_some()).await);

    client
        .update_player("p1", |m| m.set_label("tier", "gold"))
        .await
        .unwrap();

    // Store is current the moment the call returns
    let raw = players.get("p1").await.unwrap();
    assert!(Metadata::from_slice(&raw).unwrap().has_label("tier", "gold"));

    // The cache converges once the echo arrives
    assert!(
        wait_until(WAIT, || client
            .get_player("p1")
            .is_some_and(|m| m.has_label("tier", "gold")))
        .await
    );

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_typed_annotations_round_trip_through_store() {
    let store = Arc::new(MemStore::named("e2e"));
    let client = client_over(&store).await;

    client
        .update_server("srv-1", |m| {
            server_status()
                .set(m, &ServerStatus::Online)
                .expect("status formats");
        })
        .await
        .unwrap();
    client
        .update_player("p1", |m| {
            m.set_annotation(PLAYER_USERNAME, "alice");
            player_online().set(m, &true).expect("bool formats");
        })
        .await
        .unwrap();

    assert!(wait_until(WAIT, || client.get_server("srv-1").is_some()).await);
    assert!(wait_until(WAIT, || client.get_player_by_name("alice").is_some()).await);

    let srv = client.get_server("srv-1").unwrap();
    assert_eq!(server_status().get(&srv).unwrap(), Some(ServerStatus::Online));
    let alice = client.get_player_by_name("alice").unwrap();
    assert_eq!(player_online().get(&alice).unwrap(), Some(true));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_update_by_unknown_name_fails() {
    let store = Arc::new(MemStore::named("e2e"));
    let client = client_over(&store).await;

    let result = client
        .update_player_by_name("nobody", |m| m.set_label("x", "y"))
        .await;
    assert!(matches!(result, Err(Error::PlayerNameNotFound { .. })));
    assert!(matches!(
        store.bucket("players").unwrap().keys().await,
        Err(metasync::StoreError::NoKeysFound)
    ));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_updates_to_distinct_keys_all_land() {
    let store = Arc::new(MemStore::named("e2e"));
    let client = Arc::new(client_over(&store).await);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            client
                .update_server(&format!("srv-{i}"), |m| m.set_label("pool", "a"))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let required = HashMap::from([("pool".to_string(), "a".to_string())]);
    assert!(wait_until(WAIT, || client.servers_by_labels(&required).len() == 16).await);
    assert_eq!(client.all_servers().len(), 16);

    let client = Arc::try_unwrap(client).ok().expect("sole owner");
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_clients_sharing_a_store_do_not_share_subscribers() {
    let store = Arc::new(MemStore::named("shared"));
    let first = client_over(&store).await;
    let second = client_over(&store).await;

    let (first_events, first_cb) = recorder();
    let (second_events, second_cb) = recorder();
    let _a = first.subscribe_player_changes(first_cb);
    let _b = second.subscribe_player_changes(second_cb);

    first
        .update_player("p1", |m| m.set_annotation(PLAYER_USERNAME, "carol"))
        .await
        .unwrap();

    // Both caches follow the store, each dispatcher delivers exactly once
    assert!(wait_until(WAIT, || second.get_player_by_name("carol").is_some()).await);
    assert!(wait_until(WAIT, || first.get_player_by_name("carol").is_some()).await);
    assert!(wait_until(WAIT, || first_events.lock().len() == 1 && second_events.lock().len() == 1).await);
    assert_eq!(first.dispatcher().subscriber_count(metasync::Topic::PlayerChanges), 1);

    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropped_subscription_stops_delivery() {
    let store = Arc::new(MemStore::named("e2e"));
    let client = client_over(&store).await;

    let (events, callback) = recorder();
    let sub = client.subscribe_server_changes(callback);

    client
        .update_server("srv-1", |m| m.set_label("a", "1"))
        .await
        .unwrap();
    assert!(wait_until(WAIT, || events.lock().len() == 1).await);

    sub.unsubscribe();
    client
        .update_server("srv-1", |m| m.set_label("a", "2"))
        .await
        .unwrap();
    assert!(
        wait_until(WAIT, || client
            .get_server("srv-1")
            .is_some_and(|m| m.has_label("a", "2")))
        .await
    );
    assert_eq!(events.lock().len(), 1);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_seed_helper_and_label_queries() {
    let store = Arc::new(MemStore::named("e2e"));
    let players = store.create_bucket("players").await.unwrap();
    for (id, tier) in [("p1", "gold"), ("p2", "gold"), ("p3", "free")] {
        let mut m = Metadata::new();
        m.set_label("tier", tier);
        seed(players.as_ref(), id, &m).await;
    }

    let client = client_over(&store).await;
    assert_eq!(client.players_by_label("tier", "gold").len(), 2);
    assert_eq!(client.players_by_labels(&HashMap::new()).len(), 3);

    client.shutdown().await.unwrap();
}
