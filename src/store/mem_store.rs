use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Bucket;
use super::ChangeRecord;
use super::KvStore;
use super::StoreResult;
use super::WatchStream;
use crate::ConnectError;
use crate::Credentials;
use crate::StoreError;

/// Live change records buffered per bucket before a slow feed is dropped
const CHANGE_FEED_CAPACITY: usize = 1024;

/// In-process store session.
///
/// Every bucket is a sorted map plus a broadcast channel carrying live
/// mutations. A feed that falls more than [`CHANGE_FEED_CAPACITY`] records
/// behind is terminated; the consumer re-watches and gets a full replay.
pub struct MemStore {
    name: String,
    required: Option<Credentials>,
    buckets: RwLock<HashMap<String, Arc<MemBucket>>>,
    state: Arc<SharedState>,
}

#[derive(Default)]
struct SharedState {
    revision: AtomicU64,
    closed: AtomicBool,
}

impl SharedState {
    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("name", &self.name)
            .field("buckets", &self.buckets.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::named("default")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: None,
            buckets: RwLock::new(HashMap::new()),
            state: Arc::new(SharedState::default()),
        }
    }

    /// Sessions presenting anything other than `credentials` are rejected
    pub fn with_credentials(
        mut self,
        credentials: Credentials,
    ) -> Self {
        self.required = Some(credentials);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete handle to an existing bucket
    pub fn bucket(
        &self,
        name: &str,
    ) -> Option<Arc<MemBucket>> {
        self.buckets.read().get(name).cloned()
    }
}

#[async_trait]
impl KvStore for MemStore {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<(), ConnectError> {
        self.state.ensure_open().map_err(ConnectError::Backend)?;
        match &self.required {
            Some(required) if required != credentials => Err(ConnectError::Unauthorized),
            _ => Ok(()),
        }
    }

    async fn create_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        self.state.ensure_open()?;

        let mut buckets = self.buckets.write();
        if buckets.contains_key(name) {
            return Err(StoreError::BucketExists(name.to_string()));
        }

        debug!(store = %self.name, bucket = %name, "creating in-memory bucket");
        let bucket = Arc::new(MemBucket::new(name, Arc::clone(&self.state)));
        buckets.insert(name.to_string(), Arc::clone(&bucket));
        Ok(bucket)
    }

    async fn open_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        self.state.ensure_open()?;

        match self.bucket(name) {
            Some(bucket) => Ok(bucket),
            None => Err(StoreError::BucketNotFound(name.to_string())),
        }
    }

    async fn close(&self) -> StoreResult<()> {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!(store = %self.name, "closing in-memory store");
        for bucket in self.buckets.read().values() {
            bucket.drop_watchers();
        }
        Ok(())
    }
}

/// Bucket of a [`MemStore`]
pub struct MemBucket {
    name: String,
    /// key -> (payload, revision)
    entries: RwLock<BTreeMap<String, (Vec<u8>, u64)>>,
    changes: Mutex<broadcast::Sender<ChangeRecord>>,
    state: Arc<SharedState>,
}

impl MemBucket {
    fn new(
        name: &str,
        state: Arc<SharedState>,
    ) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            name: name.to_string(),
            entries: RwLock::new(BTreeMap::new()),
            changes: Mutex::new(tx),
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Terminates every open change feed on this bucket.
    ///
    /// Consumers observe the end of their stream and must re-watch.
    pub fn drop_watchers(&self) {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let old = std::mem::replace(&mut *self.changes.lock(), tx);
        debug!(
            bucket = %self.name,
            watchers = old.receiver_count(),
            "dropping change feeds"
        );
    }

    /// Number of open change feeds
    pub fn watcher_count(&self) -> usize {
        self.changes.lock().receiver_count()
    }

    // Callers hold the entries write lock so feed order matches apply order.
    fn emit(
        &self,
        record: ChangeRecord,
    ) {
        trace!(bucket = %self.name, key = %record.key, op = ?record.operation, "emit change");
        // No receivers is fine
        let _ = self.changes.lock().send(record);
    }
}

#[async_trait]
impl Bucket for MemBucket {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.state.ensure_open()?;

        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        if keys.is_empty() {
            return Err(StoreError::NoKeysFound);
        }
        Ok(keys)
    }

    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Vec<u8>> {
        self.state.ensure_open()?;

        self.entries
            .read()
            .get(key)
            .map(|(value, _)| value.clone())
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<u64> {
        self.state.ensure_open()?;

        let mut entries = self.entries.write();
        let revision = self.state.next_revision();
        entries.insert(key.to_string(), (value.clone(), revision));
        self.emit(ChangeRecord::put(key, value, revision));
        Ok(revision)
    }

    async fn delete(
        &self,
        key: &str,
    ) -> StoreResult<()> {
        self.state.ensure_open()?;

        let mut entries = self.entries.write();
        let revision = self.state.next_revision();
        entries.remove(key);
        self.emit(ChangeRecord::delete(key, revision));
        Ok(())
    }

    async fn watch_all(&self) -> StoreResult<WatchStream> {
        self.state.ensure_open()?;

        // Subscribe before the snapshot so nothing falls between the two;
        // records seen twice are harmless to an idempotent consumer.
        let live = BroadcastStream::new(self.changes.lock().subscribe());
        let replay: Vec<Option<ChangeRecord>> = self
            .entries
            .read()
            .iter()
            .map(|(key, (value, revision))| Some(ChangeRecord::put(key.as_str(), value.clone(), *revision)))
            .collect();

        let bucket = self.name.clone();
        let live = live
            .take_while(move |item| {
                if let Err(e) = item {
                    warn!(bucket = %bucket, error = ?e, "change feed lagged, closing");
                }
                future::ready(item.is_ok())
            })
            .filter_map(|item| future::ready(item.ok().map(Some)));

        let feed = stream::iter(replay)
            .chain(stream::once(future::ready(None)))
            .chain(live);

        Ok(Box::pin(feed))
    }
}
