//! In-memory entity cache with an optional name → key secondary index.
//!
//! The index is derived state: it is only ever touched by [`EntityCache::apply_put`]
//! and [`EntityCache::apply_delete`], the same path warm-up and the watch loop use.


use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::AnnotationKey;
use crate::Metadata;

/// Cached entities of one type, keyed by primary key.
///
/// Values are immutable [`Arc`] snapshots: readers keep whatever they were
/// handed even after the cache moves on.
#[derive(Debug)]
pub struct EntityCache {
    inner: RwLock<CacheState>,
    /// Annotation whose value feeds the name index
    name_key: Option<AnnotationKey>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Arc<Metadata>>,
    names: HashMap<String, String>,
}

impl EntityCache {
    /// Cache without a secondary index
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheState::default()),
            name_key: None,
        }
    }

    /// Cache that indexes entries by the value of annotation `name_key`
    pub fn with_name_index(name_key: AnnotationKey) -> Self {
        Self {
            inner: RwLock::new(CacheState::default()),
            name_key: Some(name_key),
        }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<Arc<Metadata>> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Resolves name → key → value; absent if either hop misses
    pub fn get_by_name(
        &self,
        name: &str,
    ) -> Option<Arc<Metadata>> {
        let state = self.inner.read();
        let key = state.names.get(name)?;
        state.entries.get(key).cloned()
    }

    /// Primary key currently indexed under `name`
    pub fn key_for_name(
        &self,
        name: &str,
    ) -> Option<String> {
        self.inner.read().names.get(name).cloned()
    }

    /// Entries carrying every `required` label; an empty set matches all
    pub fn list_by_labels(
        &self,
        required: &HashMap<String, String>,
    ) -> HashMap<String, Arc<Metadata>> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, value)| value.has_labels(required))
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect()
    }

    pub fn list_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> HashMap<String, Arc<Metadata>> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, metadata)| metadata.has_label(label, value))
            .map(|(key, metadata)| (key.clone(), Arc::clone(metadata)))
            .collect()
    }

    pub fn all(&self) -> HashMap<String, Arc<Metadata>> {
        self.inner.read().entries.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or replaces `key`, keeping the name index in step.
    ///
    /// Returns the previous value. Applying the same value twice is a no-op
    /// the second time.
    pub fn apply_put(
        &self,
        key: &str,
        value: Arc<Metadata>,
    ) -> Option<Arc<Metadata>> {
        let mut state = self.inner.write();

        if let Some(name_key) = self.name_key {
            let old_name = state
                .entries
                .get(key)
                .and_then(|old| old.annotation(name_key))
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            let new_name = value
                .annotation(name_key)
                .filter(|name| !name.is_empty())
                .map(str::to_string);

            if let Some(old_name) = old_name {
                if new_name.as_deref() != Some(old_name.as_str())
                    && state.names.get(&old_name).map(String::as_str) == Some(key)
                {
                    trace!(%key, name = %old_name, "dropping stale name index entry");
                    state.names.remove(&old_name);
                }
            }

            if let Some(new_name) = new_name {
                state.names.insert(new_name, key.to_string());
            }
        }

        state.entries.insert(key.to_string(), value)
    }

    /// Removes `key` and any name index entry still pointing at it.
    ///
    /// Returns the removed value.
    pub fn apply_delete(
        &self,
        key: &str,
    ) -> Option<Arc<Metadata>> {
        let mut state = self.inner.write();
        let old = state.entries.remove(key)?;

        if let Some(name) = self.name_key.and_then(|name_key| old.annotation(name_key)) {
            if state.names.get(name).map(String::as_str) == Some(key) {
                state.names.remove(name);
            }
        }

        Some(old)
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}
