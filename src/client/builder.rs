use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use super::EntityStore;
use super::MetadataClient;
use crate::connect;
use crate::provision;
use crate::warm_up;
use crate::EntityCache;
use crate::EntityKind;
use crate::EventDispatcher;
use crate::KvStore;
use crate::MetadataConfig;
use crate::Result;
use crate::WatchLoop;
use crate::PLAYER_USERNAME;

pub struct MetadataClientBuilder {
    config: MetadataConfig,
    store: Option<Arc<dyn KvStore>>,
}

impl MetadataClientBuilder {
    pub fn new(config: MetadataConfig) -> Self {
        Self { config, store: None }
    }

    /// Uses an already opened store session instead of connecting to
    /// `store.address`. Configured credentials are still checked.
    ///
    /// The caller keeps ownership of the session: neither a failed build nor
    /// [`MetadataClient::shutdown`] closes it, so other clients sharing the
    /// store keep working.
    pub fn with_store(
        mut self,
        store: Arc<dyn KvStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    /// Connects, provisions both buckets, loads the caches and starts the
    /// watch loops.
    ///
    /// Any failure before the watch loops start releases the session and
    /// returns the error; no partial client is produced.
    pub async fn build(self) -> Result<MetadataClient> {
        let config = self.config.validate()?;

        let (store, owns_store) = match self.store {
            Some(store) => {
                store.authenticate(&config.store.credentials()).await?;
                (store, false)
            }
            None => (connect(&config.store).await?, true),
        };

        let (players, servers) = match open_entities(store.as_ref(), &config).await {
            Ok(entities) => entities,
            Err(e) => {
                if owns_store {
                    release(store.as_ref()).await;
                }
                return Err(e);
            }
        };

        for entity in [&players, &servers] {
            let kind = entity.kind();
            if let Err(e) = warm_up(kind, entity.bucket().as_ref(), entity.cache()).await {
                // The change feed replays every key, so the cache still converges
                warn!(watcher = %kind, error = ?e, "warm-up failed");
            }
        }

        let dispatcher = Arc::new(EventDispatcher::new());
        let (status_tx, status_rx) = mpsc::channel(config.watch.status_buffer_size);
        let token = CancellationToken::new();

        let watchers = [&players, &servers]
            .into_iter()
            .map(|entity| {
                let watch = WatchLoop::new(
                    entity.kind(),
                    Arc::clone(entity.bucket()),
                    Arc::clone(entity.cache()),
                    Arc::clone(&dispatcher),
                    status_tx.clone(),
                    config.watch.retry_delay(),
                );
                tokio::spawn(watch.run(token.clone()))
            })
            .collect();

        debug!(
            players = players.cache().len(),
            servers = servers.cache().len(),
            "metadata client ready"
        );

        Ok(MetadataClient {
            players,
            servers,
            dispatcher,
            status_rx: parking_lot::Mutex::new(Some(status_rx)),
            store,
            owns_store,
            token,
            watchers,
        })
    }
}

async fn open_entities(
    store: &dyn KvStore,
    config: &MetadataConfig,
) -> Result<(EntityStore, EntityStore)> {
    let players = provision(store, &config.buckets.players).await?;
    let servers = provision(store, &config.buckets.servers).await?;

    Ok((
        EntityStore::new(
            EntityKind::Player,
            players,
            Arc::new(EntityCache::with_name_index(PLAYER_USERNAME)),
        ),
        EntityStore::new(EntityKind::Server, servers, Arc::new(EntityCache::new())),
    ))
}

async fn release(store: &dyn KvStore) {
    if let Err(e) = store.close().await {
        warn!(error = ?e, "failed to release store session");
    }
}
