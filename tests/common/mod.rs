use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metasync::Bucket;
use metasync::ConnectError;
use metasync::Credentials;
use metasync::KvStore;
use metasync::MemStore;
use metasync::Metadata;
use metasync::MetadataConfig;
use metasync::StoreError;
use metasync::StoreResult;
use metasync::WatchStream;
use tokio::time::sleep;
use tokio::time::Instant;

pub const WAIT: Duration = Duration::from_secs(3);

pub async fn wait_until<F>(
    timeout: Duration,
    condition: F,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn fast_config() -> MetadataConfig {
    let mut config = MetadataConfig::default();
    config.watch.retry_delay_ms = 20;
    config.store.reconnect_delay_ms = 20;
    config
}

pub async fn seed(
    bucket: &dyn Bucket,
    key: &str,
    metadata: &Metadata,
) {
    bucket
        .put(key, metadata.to_vec().expect("encode"))
        .await
        .expect("seed write");
}

/// Store wrapper whose buckets each refuse their first `failures` watch attempts
pub struct FlakyStore {
    inner: Arc<MemStore>,
    failures: usize,
    pub watch_attempts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(
        inner: Arc<MemStore>,
        failures: usize,
    ) -> Self {
        Self {
            inner,
            failures,
            watch_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn wrap(
        &self,
        bucket: Arc<dyn Bucket>,
    ) -> Arc<dyn Bucket> {
        Arc::new(FlakyBucket {
            inner: bucket,
            failures: AtomicUsize::new(self.failures),
            attempts: Arc::clone(&self.watch_attempts),
        })
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<(), ConnectError> {
        self.inner.authenticate(credentials).await
    }

    async fn create_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        let bucket = self.inner.create_bucket(name).await?;
        Ok(self.wrap(bucket))
    }

    async fn open_bucket(
        &self,
        name: &str,
    ) -> StoreResult<Arc<dyn Bucket>> {
        let bucket = self.inner.open_bucket(name).await?;
        Ok(self.wrap(bucket))
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }
}

struct FlakyBucket {
    inner: Arc<dyn Bucket>,
    failures: AtomicUsize,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Bucket for FlakyBucket {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<u64> {
        self.inner.put(key, value).await
    }

    async fn delete(
        &self,
        key: &str,
    ) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn watch_all(&self) -> StoreResult<WatchStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::WatchUnavailable("connection refused".into()));
        }
        self.inner.watch_all().await
    }
}
