use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::Bucket;
use super::KvStore;
use super::MemStore;
use super::SledStore;
use crate::ConnectError;
use crate::StoreConfig;
use crate::StoreError;

const MEM_SCHEME: &str = "mem://";
const SLED_SCHEME: &str = "sled://";

/// Parsed form of [`StoreConfig::address`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAddress {
    /// `mem://<name>`
    Memory(String),
    /// `sled://<path>` or a bare path
    Sled(PathBuf),
}

impl StoreAddress {
    pub fn parse(address: &str) -> std::result::Result<Self, ConnectError> {
        let address = address.trim();

        if let Some(name) = address.strip_prefix(MEM_SCHEME) {
            let name = if name.is_empty() { "default" } else { name };
            return Ok(Self::Memory(name.to_string()));
        }

        if let Some(path) = address.strip_prefix(SLED_SCHEME) {
            if path.is_empty() {
                return Err(ConnectError::InvalidAddress(address.to_string()));
            }
            return Ok(Self::Sled(PathBuf::from(path)));
        }

        if address.is_empty() || address.contains("://") {
            return Err(ConnectError::InvalidAddress(address.to_string()));
        }

        Ok(Self::Sled(PathBuf::from(address)))
    }
}

/// Opens a session against the store named by `config.address` and checks
/// the configured credentials.
///
/// A session that fails authentication is closed before returning.
pub async fn connect(config: &StoreConfig) -> std::result::Result<Arc<dyn KvStore>, ConnectError> {
    let store: Arc<dyn KvStore> = match StoreAddress::parse(&config.address)? {
        StoreAddress::Memory(name) => {
            debug!(%name, "connecting to in-memory store");
            Arc::new(MemStore::named(name))
        }
        StoreAddress::Sled(path) => {
            debug!(?path, "connecting to sled store");
            Arc::new(SledStore::connect(path, config).await?)
        }
    };

    if let Err(e) = store.authenticate(&config.credentials()).await {
        if let Err(close_err) = store.close().await {
            warn!(error = ?close_err, "failed to release rejected session");
        }
        return Err(e);
    }

    Ok(store)
}

/// Returns a handle to bucket `name`, creating it if needed.
///
/// Creating a bucket that already exists (for instance because another client
/// won the race) resolves to the existing bucket.
pub async fn provision(
    store: &dyn KvStore,
    name: &str,
) -> std::result::Result<Arc<dyn Bucket>, ConnectError> {
    let provision_error = |source: StoreError| ConnectError::Provision {
        bucket: name.to_string(),
        source,
    };

    match store.create_bucket(name).await {
        Ok(bucket) => {
            debug!(bucket = %name, "bucket created");
            Ok(bucket)
        }
        Err(StoreError::BucketExists(_)) => {
            debug!(bucket = %name, "bucket exists, opening");
            store.open_bucket(name).await.map_err(provision_error)
        }
        Err(e) => Err(provision_error(e)),
    }
}
