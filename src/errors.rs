//! Metadata Synchronization Error Hierarchy
//!
//! Errors are grouped by the layer that produces them: session setup against
//! the backing store, store operations, annotation decoding and configuration.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session or bucket provisioning failures (fatal at client construction)
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Backing store operation failures, returned verbatim to callers
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Typed annotation parse/format failures
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Metadata could not be serialized for the wire
    #[error("Failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),

    /// `update_player_by_name` was asked for a name with no indexed key
    #[error("Player with name '{name}' not found")]
    PlayerNameNotFound { name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Address scheme is not served by any known backend
    #[error("Invalid store address: {0}")]
    InvalidAddress(String),

    /// Session credentials were rejected by the store
    #[error("Store rejected the supplied credentials")]
    Unauthorized,

    /// Backend refused to open a session
    #[error("Failed to open store session: {0}")]
    Backend(#[source] StoreError),

    /// Bucket could neither be created nor opened
    #[error("Failed to create/get bucket '{bucket}': {source}")]
    Provision {
        bucket: String,
        #[source]
        source: StoreError,
    },

    /// Reconnect policy gave up
    #[error("Gave up connecting after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u64,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Bucket '{0}' not found")]
    BucketNotFound(String),

    #[error("Bucket '{0}' already exists")]
    BucketExists(String),

    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    /// Bucket is empty; warm-up treats this as an empty key set
    #[error("No keys found")]
    NoKeysFound,

    /// Change feed subscription could not be opened
    #[error("Watch unavailable: {0}")]
    WatchUnavailable(String),

    /// Session has been closed
    #[error("Store session closed")]
    Closed,

    /// Embedded database errors
    #[error(transparent)]
    Sled(#[from] sled::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("Invalid bool: {0:?}")]
    InvalidBool(String),

    #[error("Invalid uuid: {0:?}")]
    InvalidUuid(String),

    #[error("Invalid enum value: {0:?}")]
    InvalidEnum(String),

    #[error("Invalid integer: {0:?}")]
    InvalidInteger(String),

    #[error("Invalid time {value:?}: {source}")]
    InvalidTime {
        value: String,
        #[source]
        source: time::error::Parse,
    },

    #[error("Failed to format time: {0}")]
    TimeFormat(#[from] time::error::Format),

    /// Structured (JSON) annotation could not be encoded or decoded
    #[error("Failed to (un)marshal structured data for annotation '{key}': {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
