//! Change-feed watch loop, one per entity type.
//!
//! ```text
//! Connecting --ok--> Healthy --feed lost--> Reconnecting --delay--> Connecting
//!     |                                          ^
//!     +--------------error (unhealthy)-----------+
//! any state --cancel--> Stopped
//! ```
//!
//! Every record goes through [`EntityCache::apply_put`] /
//! [`EntityCache::apply_delete`] before its [`ChangeEvent`] is published.
//! When the replay marker arrives, cached keys absent from the replay are
//! removed and published as deletes.


use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::Bucket;
use crate::ChangeEvent;
use crate::ChangeRecord;
use crate::ChangeType;
use crate::EntityCache;
use crate::EventDispatcher;
use crate::Metadata;
use crate::Operation;
use crate::StoreError;
use crate::Topic;
use crate::WatchStream;

/// Entity type served by a watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Server,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "players",
            EntityKind::Server => "servers",
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            EntityKind::Player => Topic::PlayerChanges,
            EntityKind::Server => Topic::ServerChanges,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time connectivity of a watch loop
#[derive(Debug, Clone)]
pub struct WatcherStatus {
    pub watcher: EntityKind,
    pub healthy: bool,
    pub error: Option<Arc<StoreError>>,
}

enum FeedEnd {
    Cancelled,
    Lost,
}

pub struct WatchLoop {
    kind: EntityKind,
    bucket: Arc<dyn Bucket>,
    cache: Arc<EntityCache>,
    dispatcher: Arc<EventDispatcher>,
    status_tx: mpsc::Sender<WatcherStatus>,
    retry_delay: Duration,
}

impl WatchLoop {
    pub fn new(
        kind: EntityKind,
        bucket: Arc<dyn Bucket>,
        cache: Arc<EntityCache>,
        dispatcher: Arc<EventDispatcher>,
        status_tx: mpsc::Sender<WatcherStatus>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            kind,
            bucket,
            cache,
            dispatcher,
            status_tx,
            retry_delay,
        }
    }

    /// Runs until `token` is cancelled. Subscription failures are retried
    /// forever.
    pub async fn run(
        self,
        token: CancellationToken,
    ) {
        debug!(watcher = %self.kind, "watch loop started");

        loop {
            let opened = tokio::select! {
                _ = token.cancelled() => break,
                opened = self.bucket.watch_all() => opened,
            };

            match opened {
                Ok(mut feed) => {
                    self.report(true, None);
                    info!(watcher = %self.kind, "change feed established");

                    match self.consume(&mut feed, &token).await {
                        FeedEnd::Cancelled => break,
                        FeedEnd::Lost => {
                            warn!(watcher = %self.kind, "change feed closed, reconnecting");
                            let lost = StoreError::WatchUnavailable(format!("{} change feed closed", self.kind));
                            self.report(false, Some(Arc::new(lost)));
                        }
                    }
                }
                Err(e) => {
                    error!(watcher = %self.kind, error = ?e, "failed to open change feed");
                    self.report(false, Some(Arc::new(e)));
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(self.retry_delay) => {}
            }
        }

        info!(watcher = %self.kind, "watch loop stopped");
    }

    async fn consume(
        &self,
        feed: &mut WatchStream,
        token: &CancellationToken,
    ) -> FeedEnd {
        // Keys replayed before the marker; `None` once live
        let mut replayed = Some(HashSet::new());

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return FeedEnd::Cancelled,
                next = feed.next() => next,
            };

            match next {
                Some(Some(record)) => {
                    if let Some(seen) = replayed.as_mut() {
                        seen.insert(record.key.clone());
                    }
                    self.apply(record);
                }
                Some(None) => {
                    if let Some(seen) = replayed.take() {
                        let pruned = self.prune_missing(&seen);
                        trace!(watcher = %self.kind, pruned, "initial replay complete");
                    }
                }
                None => return FeedEnd::Lost,
            }
        }
    }

    /// Drops cached keys the replay did not mention; they were deleted while
    /// no feed was open.
    fn prune_missing(
        &self,
        replayed: &HashSet<String>,
    ) -> usize {
        let mut pruned = 0;
        for key in self.cache.keys() {
            if replayed.contains(&key) {
                continue;
            }
            debug!(watcher = %self.kind, %key, "key missing from replay, removing");
            let old = self.cache.apply_delete(&key);
            let event = ChangeEvent {
                key,
                old,
                new: None,
                change: ChangeType::Delete,
            };
            self.dispatcher.publish(self.kind.topic(), &event);
            pruned += 1;
        }
        pruned
    }

    /// Applies one change record to the cache and publishes the event
    pub fn apply(
        &self,
        record: ChangeRecord,
    ) {
        let ChangeRecord {
            key,
            value,
            operation,
            revision,
        } = record;

        let event = match operation {
            Operation::Delete => {
                let old = self.cache.apply_delete(&key);
                trace!(watcher = %self.kind, %key, revision, "applied delete");
                ChangeEvent {
                    key,
                    old,
                    new: None,
                    change: ChangeType::Delete,
                }
            }
            Operation::Put => {
                let new = match Metadata::from_slice(&value) {
                    Ok(metadata) => Arc::new(metadata),
                    Err(e) => {
                        warn!(watcher = %self.kind, %key, revision, error = %e, "dropping malformed payload");
                        return;
                    }
                };
                let old = self.cache.apply_put(&key, Arc::clone(&new));
                trace!(watcher = %self.kind, %key, revision, "applied put");
                ChangeEvent {
                    key,
                    old,
                    new: Some(new),
                    change: ChangeType::Put,
                }
            }
        };

        self.dispatcher.publish(self.kind.topic(), &event);
    }

    fn report(
        &self,
        healthy: bool,
        error: Option<Arc<StoreError>>,
    ) {
        let status = WatcherStatus {
            watcher: self.kind,
            healthy,
            error,
        };
        match self.status_tx.try_send(status) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                trace!(watcher = %self.kind, healthy, "status channel full, dropping status")
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Loads every key currently in `bucket` into `cache`.
///
/// Uses the same idempotent apply path as the watch loop, so records replayed
/// again by the change feed are harmless. Returns the number of entries loaded.
pub async fn warm_up(
    kind: EntityKind,
    bucket: &dyn Bucket,
    cache: &EntityCache,
) -> std::result::Result<usize, StoreError> {
    let keys = match bucket.keys().await {
        Ok(keys) => keys,
        Err(StoreError::NoKeysFound) => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut loaded = 0;
    for key in keys {
        let raw = match bucket.get(&key).await {
            Ok(raw) => raw,
            Err(StoreError::KeyNotFound(_)) => {
                trace!(watcher = %kind, %key, "key vanished during warm-up");
                continue;
            }
            Err(e) => return Err(e),
        };

        match Metadata::from_slice(&raw) {
            Ok(metadata) => {
                cache.apply_put(&key, Arc::new(metadata));
                loaded += 1;
            }
            Err(e) => warn!(watcher = %kind, %key, error = %e, "skipping malformed payload during warm-up"),
        }
    }

    debug!(watcher = %kind, loaded, "warm-up complete");
    Ok(loaded)
}
