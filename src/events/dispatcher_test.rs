use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::Metadata;

fn put_event(key: &str) -> ChangeEvent {
    ChangeEvent {
        key: key.to_string(),
        old: None,
        new: Some(Arc::new(Metadata::new())),
        change: ChangeType::Put,
    }
}

fn counter(dispatcher: &EventDispatcher, topic: Topic) -> (Arc<AtomicUsize>, Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let sub = dispatcher.subscribe(topic, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (count, sub)
}

#[test]
fn test_topic_names() {
    assert_eq!(Topic::PlayerChanges.to_string(), "player.change");
    assert_eq!(Topic::ServerChanges.as_str(), "server.change");
}

#[test]
fn test_publish_reaches_every_subscriber_of_topic_only() {
    let dispatcher = EventDispatcher::new();
    let (players_a, _a) = counter(&dispatcher, Topic::PlayerChanges);
    let (players_b, _b) = counter(&dispatcher, Topic::PlayerChanges);
    let (servers, _s) = counter(&dispatcher, Topic::ServerChanges);

    dispatcher.publish(Topic::PlayerChanges, &put_event("p1"));

    assert_eq!(players_a.load(Ordering::SeqCst), 1);
    assert_eq!(players_b.load(Ordering::SeqCst), 1);
    assert_eq!(servers.load(Ordering::SeqCst), 0);
}

#[test]
fn test_publish_without_subscribers() {
    let dispatcher = EventDispatcher::new();
    dispatcher.publish(Topic::ServerChanges, &put_event("srv-1"));
    assert_eq!(dispatcher.subscriber_count(Topic::ServerChanges), 0);
}

#[test]
fn test_callback_receives_event() {
    let dispatcher = EventDispatcher::new();
    let keys = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&keys);
    let _sub = dispatcher.subscribe(Topic::ServerChanges, move |event| {
        sink.lock().push((event.key.clone(), event.change));
    });

    dispatcher.publish(Topic::ServerChanges, &put_event("srv-1"));
    dispatcher.publish(
        Topic::ServerChanges,
        &ChangeEvent {
            key: "srv-1".into(),
            old: Some(Arc::new(Metadata::new())),
            new: None,
            change: ChangeType::Delete,
        },
    );

    assert_eq!(
        *keys.lock(),
        vec![
            ("srv-1".to_string(), ChangeType::Put),
            ("srv-1".to_string(), ChangeType::Delete),
        ]
    );
}

#[test]
fn test_unsubscribe_and_drop_stop_delivery() {
    let dispatcher = EventDispatcher::new();
    let (explicit, sub) = counter(&dispatcher, Topic::PlayerChanges);
    let (dropped, guard) = counter(&dispatcher, Topic::PlayerChanges);
    assert_eq!(dispatcher.subscriber_count(Topic::PlayerChanges), 2);

    sub.unsubscribe();
    drop(guard);
    assert_eq!(dispatcher.subscriber_count(Topic::PlayerChanges), 0);

    dispatcher.publish(Topic::PlayerChanges, &put_event("p1"));
    assert_eq!(explicit.load(Ordering::SeqCst), 0);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unsubscribe_during_publish() {
    let dispatcher = Arc::new(EventDispatcher::new());
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let (other, _other) = counter(&dispatcher, Topic::PlayerChanges);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let own = Arc::clone(&slot);
    let sub = dispatcher.subscribe(Topic::PlayerChanges, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        // Unsubscribe itself mid-delivery
        if let Some(sub) = own.lock().take() {
            sub.unsubscribe();
        }
    });
    *slot.lock() = Some(sub);

    dispatcher.publish(Topic::PlayerChanges, &put_event("p1"));
    dispatcher.publish(Topic::PlayerChanges, &put_event("p2"));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(other.load(Ordering::SeqCst), 2);
}

#[test]
fn test_subscription_outliving_dispatcher() {
    let dispatcher = EventDispatcher::new();
    let (_, sub) = counter(&dispatcher, Topic::ServerChanges);
    drop(dispatcher);
    sub.unsubscribe();
}

#[test]
fn test_dispatchers_are_isolated() {
    let first = EventDispatcher::new();
    let second = EventDispatcher::new();
    let (count, _sub) = counter(&first, Topic::PlayerChanges);

    second.publish(Topic::PlayerChanges, &put_event("p1"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
