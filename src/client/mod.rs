//! Client-side metadata synchronization.
//!
//! [`MetadataClient`] keeps player and server caches in step with the backing
//! store through two watch loops and exposes:
//! - cached reads by key, by player username and by labels
//! - copy-on-write updates persisted to the store
//! - change subscriptions per entity type
//! - watch loop health via [`MetadataClient::take_status_receiver`]
//!
//! Reads never hit the store. A write becomes visible to reads only after
//! the watch loop observes it coming back from the store.
//!
//! # Basic Usage
//! ```no_run
//! use metasync::{MetadataClient, MetadataConfig};
//!
//! # async fn run() -> metasync::Result<()> {
//! let client = MetadataClient::builder(MetadataConfig::new()?).build().await?;
//!
//! client
//!     .update_player("9b2f0f6e-1c1e-4a53-9e7e-1d2c3b4a5f60", |m| m.set_label("tier", "gold"))
//!     .await?;
//!
//! let _sub = client.subscribe_player_changes(|event| {
//!     println!("{} changed", event.key);
//! });
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod entity;
mod players;
mod servers;

pub use builder::*;
pub(crate) use entity::*;


use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::EventDispatcher;
use crate::KvStore;
use crate::MetadataConfig;
use crate::Result;
use crate::WatcherStatus;

/// Synchronized view over the player and server buckets.
///
/// Created through [`MetadataClient::builder`]. Dropping the client stops
/// its watch loops; [`MetadataClient::shutdown`] also waits for them and
/// releases the store session.
pub struct MetadataClient {
    pub(super) players: EntityStore,
    pub(super) servers: EntityStore,
    pub(super) dispatcher: Arc<EventDispatcher>,
    pub(super) status_rx: Mutex<Option<mpsc::Receiver<WatcherStatus>>>,
    pub(super) store: Arc<dyn KvStore>,
    /// False when the session came from [`MetadataClientBuilder::with_store`]
    pub(super) owns_store: bool,
    pub(super) token: CancellationToken,
    pub(super) watchers: Vec<JoinHandle<()>>,
}

impl MetadataClient {
    pub fn builder(config: MetadataConfig) -> MetadataClientBuilder {
        MetadataClientBuilder::new(config)
    }

    /// Loads configuration from defaults, file and environment and connects
    pub async fn from_env() -> Result<Self> {
        Self::builder(MetadataConfig::new()?).build().await
    }

    /// Hands out the watcher status channel. Only the first call gets it.
    pub fn take_status_receiver(&self) -> Option<mpsc::Receiver<WatcherStatus>> {
        self.status_rx.lock().take()
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Stops both watch loops, waits for them to exit, then closes the
    /// store session if this client opened it.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down metadata client");
        self.token.cancel();

        for handle in std::mem::take(&mut self.watchers) {
            if let Err(e) = handle.await {
                warn!(error = ?e, "watch loop task failed");
            }
        }

        if self.owns_store {
            self.store.close().await?;
        } else {
            debug!("leaving caller-provided store session open");
        }
        info!("metadata client stopped");
        Ok(())
    }
}

impl Drop for MetadataClient {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
