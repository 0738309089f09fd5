use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;

use crate::Bucket;
use crate::MemStore;
use crate::Metadata;
use crate::MetadataConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Polls `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(
    timeout: Duration,
    condition: F,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Config with short retry delays for tests
pub fn test_config() -> MetadataConfig {
    let mut config = MetadataConfig::default();
    config.watch.retry_delay_ms = 10;
    config.store.reconnect_delay_ms = 10;
    config
}

/// Writes `metadata` straight into `bucket`, bypassing any client
pub async fn seed(
    bucket: &dyn Bucket,
    key: &str,
    metadata: &Metadata,
) {
    let payload = metadata.to_vec().expect("metadata encodes");
    bucket.put(key, payload).await.expect("seed write");
}

pub fn shared_mem_store() -> Arc<MemStore> {
    Arc::new(MemStore::named("unit"))
}
