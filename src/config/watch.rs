use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Watch loop parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Fixed delay before retrying a failed subscription (milliseconds)
    ///
    /// **Default**: 2000
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Capacity of the watcher status channel.
    ///
    /// Sends are non-blocking; statuses are dropped when the channel is full
    /// so a slow or absent consumer never stalls a watch loop.
    ///
    /// **Default**: 4
    #[serde(default = "default_status_buffer_size")]
    pub status_buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            status_buffer_size: default_status_buffer_size(),
        }
    }
}

impl WatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.status_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.status_buffer_size must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_status_buffer_size() -> usize {
    4
}
