//! In-process change fan-out.
//!
//! Each client owns its own [`EventDispatcher`]; independent clients never
//! see each other's events. Callbacks run synchronously on the publishing
//! (watch loop) task and must not block.

#[cfg(test)]
mod dispatcher_test;

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use tracing::trace;

use crate::Metadata;

/// Fixed event topics, one per entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PlayerChanges,
    ServerChanges,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::PlayerChanges => "player.change",
            Topic::ServerChanges => "server.change",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Put,
    Delete,
}

/// Emitted once per observed store mutation, after the cache is updated
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub key: String,
    pub old: Option<Arc<Metadata>>,
    /// Absent for deletes
    pub new: Option<Arc<Metadata>>,
    pub change: ChangeType,
}

pub type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

type Registry = DashMap<Topic, Vec<(u64, Callback)>>;

#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Arc<Registry>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("players", &self.subscriber_count(Topic::PlayerChanges))
            .field("servers", &self.subscriber_count(Topic::ServerChanges))
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `topic` until the returned guard is dropped
    /// or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(
        &self,
        topic: Topic,
        callback: F,
    ) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(topic)
            .or_default()
            .push((id, Arc::new(callback)));
        trace!(%topic, id, "subscribed");

        Subscription {
            id,
            topic,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Delivers `event` to every callback registered for `topic` at the
    /// time of the call.
    pub fn publish(
        &self,
        topic: Topic,
        event: &ChangeEvent,
    ) {
        // Snapshot so callbacks run without the map shard locked
        let callbacks: Vec<Callback> = match self.subscribers.get(&topic) {
            Some(entry) => entry.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };

        trace!(%topic, key = %event.key, subscribers = callbacks.len(), "publish");
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(
        &self,
        topic: Topic,
    ) -> usize {
        self.subscribers.get(&topic).map_or(0, |entry| entry.len())
    }
}

/// Registration handle returned by [`EventDispatcher::subscribe`].
///
/// Dropping it unsubscribes. Deliveries already in flight still complete.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    topic: Topic,
    registry: Weak<Registry>,
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn unsubscribe(self) {
        drop(self)
    }

    fn remove(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Some(mut entry) = registry.get_mut(&self.topic) {
            entry.retain(|(id, _)| *id != self.id);
        }
        trace!(topic = %self.topic, id = self.id, "unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
