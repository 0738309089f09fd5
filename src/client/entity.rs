use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::Bucket;
use crate::EntityCache;
use crate::EntityKind;
use crate::Metadata;
use crate::Result;

/// Cache, bucket and write gate of one entity type.
///
/// Writes are copy-on-write: the cached value is cloned, mutated and
/// persisted. The cache itself only changes when the watch loop observes the
/// write coming back from the store.
pub(crate) struct EntityStore {
    kind: EntityKind,
    bucket: Arc<dyn Bucket>,
    cache: Arc<EntityCache>,
    /// Serializes writes across every key of this entity type
    write_gate: Mutex<()>,
}

impl EntityStore {
    pub(crate) fn new(
        kind: EntityKind,
        bucket: Arc<dyn Bucket>,
        cache: Arc<EntityCache>,
    ) -> Self {
        Self {
            kind,
            bucket,
            cache,
            write_gate: Mutex::new(()),
        }
    }

    pub(crate) fn kind(&self) -> EntityKind {
        self.kind
    }

    pub(crate) fn bucket(&self) -> &Arc<dyn Bucket> {
        &self.bucket
    }

    pub(crate) fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub(crate) fn get(
        &self,
        key: &str,
    ) -> Option<Arc<Metadata>> {
        self.cache.get(key)
    }

    pub(crate) fn by_labels(
        &self,
        required: &HashMap<String, String>,
    ) -> HashMap<String, Arc<Metadata>> {
        self.cache.list_by_labels(required)
    }

    pub(crate) fn by_label(
        &self,
        label: &str,
        value: &str,
    ) -> HashMap<String, Arc<Metadata>> {
        self.cache.list_by_label(label, value)
    }

    pub(crate) fn all(&self) -> HashMap<String, Arc<Metadata>> {
        self.cache.all()
    }

    /// Clones the cached value (or an empty one), applies `mutate` to the
    /// clone and writes it under `key`.
    pub(crate) async fn update<F>(
        &self,
        key: &str,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Metadata) + Send,
    {
        let _gate = self.write_gate.lock().await;

        let mut draft = self
            .cache
            .get(key)
            .map(|current| Metadata::clone(&current))
            .unwrap_or_default();
        mutate(&mut draft);

        let payload = draft.to_vec()?;
        let revision = self.bucket.put(key, payload).await?;
        trace!(entity = %self.kind, %key, revision, "update written");
        Ok(())
    }

    pub(crate) async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        self.bucket.delete(key).await?;
        trace!(entity = %self.kind, %key, "delete written");
        Ok(())
    }
}
