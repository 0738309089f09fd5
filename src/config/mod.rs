//! Configuration management for the metadata synchronization client.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`METADATA_CONFIG_PATH`)
//! - Environment variable overrides (`METADATA__` prefix)
//! - Component-wise validation
mod buckets;
mod store;
mod watch;
pub use buckets::*;
pub use store::*;
pub use watch::*;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "METADATA_CONFIG_PATH";

/// Prefix for environment variable overrides, e.g. `METADATA__STORE__ADDRESS`
pub const ENV_PREFIX: &str = "METADATA";

/// Main configuration container for the metadata client
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `METADATA_CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct MetadataConfig {
    /// Backing store address, credentials and reconnect policy
    #[serde(default)]
    pub store: StoreConfig,
    /// Names of the per-entity-type buckets
    #[serde(default)]
    pub buckets: BucketsConfig,
    /// Watch loop retry and health reporting parameters
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Debug for MetadataConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MetadataConfig")
            .field("store", &self.store)
            .field("buckets", &self.buckets)
            .field("watch", &self.watch)
            .finish()
    }
}

impl MetadataConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `METADATA_CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `METADATA__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so that further overrides can be applied via
    /// [`with_override_config`](Self::with_override_config). Callers MUST call
    /// [`validate`](Self::validate) before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("METADATA__STORE__ADDRESS", "sled:///var/lib/metadata");
    /// let cfg = MetadataConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.store.validate()?;
        self.buckets.validate()?;
        self.watch.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
