use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Bucket names, one per entity type
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BucketsConfig {
    /// Default: "players"
    #[serde(default = "default_players_bucket")]
    pub players: String,

    /// Default: "servers"
    #[serde(default = "default_servers_bucket")]
    pub servers: String,
}

impl Default for BucketsConfig {
    fn default() -> Self {
        Self {
            players: default_players_bucket(),
            servers: default_servers_bucket(),
        }
    }
}

impl BucketsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.players.is_empty() || self.servers.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "bucket names must not be empty".into(),
            )));
        }

        if self.players == self.servers {
            return Err(Error::Config(ConfigError::Message(format!(
                "players and servers must use distinct buckets (both are '{}')",
                self.players
            ))));
        }

        Ok(())
    }
}

fn default_players_bucket() -> String {
    "players".into()
}
fn default_servers_bucket() -> String {
    "servers".into()
}
