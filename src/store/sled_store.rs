use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use futures::stream;
use futures::StreamExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Bucket;
use super::ChangeRecord;
use super::KvStore;
use super::StoreResult;
use super::WatchStream;
use crate::ConnectError;
use crate::Credentials;
use crate::StoreConfig;
use crate::StoreError;

/// Embedded store session backed by a sled database.
///
/// Each bucket is a sled tree. Stored values carry an 8-byte big-endian
/// revision prefix ahead of the payload.
#[derive(Debug, Clone)]
pub struct SledStore {
    path: PathBuf,
    db: sled::Db,
}

impl SledStore {
    /// Opens (or creates) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("open sled store at: {:?}", &path);

        let db = sled::Config::default()
            .path(&path)
            .cache_capacity(64 * 1024 * 1024) //64MB
            .flush_every_ms(Some(100))
            .use_compression(true)
            .compression_factor(1)
            .open()
            .map_err(|e| {
                warn!("Try to open DB at this location: {:?} and failed: {:?}", &path, e);
                e
            })?;

        Ok(Self { path, db })
    }

    /// Opens the database, retrying per the reconnect policy in `config`.
    ///
    /// A negative `max_reconnects` retries forever.
    pub async fn connect(
        path: impl AsRef<Path>,
        config: &StoreConfig,
    ) -> std::result::Result<Self, ConnectError> {
        let budget = config.reconnect_budget();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            match Self::open(path.as_ref()) {
                Ok(store) => {
                    info!(path = ?store.path, attempts, "sled store opened");
                    return Ok(store);
                }
                Err(source) => {
                    if budget.is_some_and(|max| attempts > max) {
                        return Err(ConnectError::RetriesExhausted { attempts, source });
                    }
                    warn!(
                        attempts,
                        delay = ?config.reconnect_delay(),
                        error = ?source,
                        "failed to open sled store, retrying"
                    );
                    tokio::time::sleep(config.reconnect_delay()).await;
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tree_exists(
        &self,
        name: &str,
    ) -> bool {
        self.db
            .tree_names()
            .iter()
            .any(|tree| &tree[..] == name.as_bytes())
    }

    fn bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        let tree = self.db.open_tree(name)?;
        Ok(Arc::new(SledBucket {
            name: name.to_string(),
            db: self.db.clone(),
            tree,
        }))
    }
}

#[async_trait]
impl KvStore for SledStore {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<(), ConnectError> {
        if *credentials != Credentials::Anonymous {
            debug!("sled store ignores session credentials");
        }
        Ok(())
    }

    async fn create_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        if self.tree_exists(name) {
            return Err(StoreError::BucketExists(name.to_string()));
        }
        self.bucket(name)
    }

    async fn open_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        if !self.tree_exists(name) {
            return Err(StoreError::BucketNotFound(name.to_string()));
        }
        self.bucket(name)
    }

    async fn close(&self) -> StoreResult<()> {
        let bytes = self.db.flush_async().await?;
        debug!(path = ?self.path, bytes, "sled store flushed");
        Ok(())
    }
}

struct SledBucket {
    name: String,
    db: sled::Db,
    tree: sled::Tree,
}

fn encode_entry(
    revision: u64,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&revision.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn decode_entry(raw: &[u8]) -> StoreResult<(u64, Vec<u8>)> {
    if raw.len() < 8 {
        return Err(StoreError::Backend(format!(
            "stored entry too short: {} bytes",
            raw.len()
        )));
    }
    let (revision, payload) = raw.split_at(8);
    let mut be = [0u8; 8];
    be.copy_from_slice(revision);
    Ok((u64::from_be_bytes(be), payload.to_vec()))
}

fn decode_key(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

impl SledBucket {
    fn to_record(
        &self,
        event: sled::Event,
    ) -> Option<ChangeRecord> {
        match event {
            sled::Event::Insert { key, value } => match decode_entry(&value) {
                Ok((revision, payload)) => Some(ChangeRecord::put(decode_key(&key), payload, revision)),
                Err(e) => {
                    warn!(bucket = %self.name, error = ?e, "skipping undecodable sled entry");
                    None
                }
            },
            sled::Event::Remove { key } => {
                let revision = self.db.generate_id().unwrap_or_default();
                Some(ChangeRecord::delete(decode_key(&key), revision))
            }
        }
    }
}

#[async_trait]
impl Bucket for SledBucket {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        let keys = self
            .tree
            .iter()
            .keys()
            .map(|key| key.map(|k| decode_key(&k)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(StoreError::NoKeysFound);
        }
        Ok(keys)
    }

    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Vec<u8>> {
        match self.tree.get(key)? {
            Some(raw) => decode_entry(&raw).map(|(_, payload)| payload),
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<u64> {
        let revision = self.db.generate_id()?;
        self.tree.insert(key, encode_entry(revision, &value))?;
        Ok(revision)
    }

    async fn delete(
        &self,
        key: &str,
    ) -> StoreResult<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    async fn watch_all(&self) -> StoreResult<WatchStream> {
        // Subscribe before the snapshot; duplicates are harmless.
        let subscriber = self.tree.watch_prefix(vec![]);

        let mut replay = Vec::new();
        for item in self.tree.iter() {
            let (key, raw) = item?;
            match decode_entry(&raw) {
                Ok((revision, payload)) => {
                    replay.push(Some(ChangeRecord::put(decode_key(&key), payload, revision)))
                }
                Err(e) => warn!(bucket = %self.name, error = ?e, "skipping undecodable sled entry"),
            }
        }

        let bucket = SledBucket {
            name: self.name.clone(),
            db: self.db.clone(),
            tree: self.tree.clone(),
        };
        let live = stream::unfold(subscriber, |mut subscriber| async move {
            let event = (&mut subscriber).await?;
            Some((event, subscriber))
        })
        .filter_map(move |event| future::ready(bucket.to_record(event).map(Some)));

        let feed = stream::iter(replay)
            .chain(stream::once(future::ready(None)))
            .chain(live);

        Ok(Box::pin(feed))
    }
}
