//! Client-side metadata synchronization for players and servers.
//!
//! The crate keeps two in-memory caches consistent with a bucketed key-value
//! store by following the store's change feed:
//!
//! - [`store`](crate::KvStore): backing store contract plus the in-memory and
//!   sled backends
//! - [`EntityCache`]: per-entity-type cache with the player username index
//! - [`WatchLoop`]: change-feed consumer with reconnect and health reporting
//! - [`EventDispatcher`]: in-process change fan-out
//! - [`AnnotationDescriptor`]: typed access to the untyped annotation map
//! - [`MetadataClient`]: everything wired together

mod annotations;
mod cache;
mod client;
mod config;
mod errors;
mod events;
mod metadata;
mod store;
mod watch;

pub use annotations::*;
pub use cache::*;
pub use client::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use metadata::*;
pub use store::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
