//! Bucketed key-value store contract consumed by the sync layer.
//!
//! A [`KvStore`] is a session against a backing store; each entity type lives
//! in its own [`Bucket`]. Buckets expose point reads and writes plus a change
//! feed ([`Bucket::watch_all`]) that first replays every current key as a
//! [`Operation::Put`], then yields a single `None` marker, then delivers every
//! subsequent mutation. A feed that ends means the subscription was lost.
//!
//! Two backends ship with the crate:
//! - [`MemStore`] (`mem://<name>`): in-process, used by tests and embedders
//! - [`SledStore`] (`sled://<path>` or a bare path): embedded sled database

mod connection;
mod mem_store;
mod sled_store;


pub use connection::*;
pub use mem_store::*;
pub use sled_store::*;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
#[cfg(test)]
use mockall::automock;

use crate::ConnectError;
use crate::Credentials;
use crate::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Kind of mutation carried by a [`ChangeRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    Delete,
}

/// Single observed mutation on a bucket key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub key: String,
    /// Raw payload; empty for deletes
    pub value: Vec<u8>,
    pub operation: Operation,
    pub revision: u64,
}

impl ChangeRecord {
    pub fn put(
        key: impl Into<String>,
        value: Vec<u8>,
        revision: u64,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            operation: Operation::Put,
            revision,
        }
    }

    pub fn delete(
        key: impl Into<String>,
        revision: u64,
    ) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            operation: Operation::Delete,
            revision,
        }
    }
}

/// Change feed returned by [`Bucket::watch_all`].
///
/// `None` marks the end of the initial replay.
pub type WatchStream = Pin<Box<dyn Stream<Item = Option<ChangeRecord>> + Send>>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Checks the session credentials against the store
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<(), ConnectError>;

    /// Fails with [`StoreError::BucketExists`] if `name` is already present
    async fn create_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>>;

    /// Fails with [`StoreError::BucketNotFound`] if `name` is absent
    async fn open_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>>;

    /// Releases the session. Open change feeds terminate.
    async fn close(&self) -> StoreResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Bucket: Send + Sync + 'static {
    /// Every live key; [`StoreError::NoKeysFound`] if the bucket is empty
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// [`StoreError::KeyNotFound`] if `key` is absent
    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Vec<u8>>;

    /// Stores `value` and returns the new revision
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<u64>;

    async fn delete(
        &self,
        key: &str,
    ) -> StoreResult<()>;

    async fn watch_all(&self) -> StoreResult<WatchStream>;
}
