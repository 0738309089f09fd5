use std::fmt::Debug;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Backing store session parameters
#[derive(Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Store address. Supported schemes:
    /// - `mem://<name>`: in-process store
    /// - `sled://<path>` or a bare path: embedded sled database
    ///
    /// Default: "mem://default"
    #[serde(default = "default_address")]
    pub address: String,

    /// Optional user name; only used together with `password`
    #[serde(default)]
    pub user: Option<String>,

    /// Optional password; only used together with `user`
    #[serde(default)]
    pub password: Option<String>,

    /// Optional token credential. Takes precedence over user/password.
    #[serde(default)]
    pub token: Option<String>,

    /// Delay between session (re)connection attempts (milliseconds)
    /// Default: 5000
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum reconnection attempts after the first failure.
    /// Negative means unlimited.
    /// Default: -1
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: i64,
}

/// Credential resolved from [`StoreConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    UserPassword { user: String, password: String },
    Token(String),
}

impl Debug for StoreConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("max_reconnects", &self.max_reconnects)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            user: None,
            password: None,
            token: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnects: default_max_reconnects(),
        }
    }
}

impl StoreConfig {
    /// Resolves the effective credential: a non-empty token wins, then a
    /// complete user/password pair, otherwise anonymous.
    pub fn credentials(&self) -> Credentials {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Credentials::Token(token.clone());
        }

        match (&self.user, &self.password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Credentials::UserPassword {
                    user: user.clone(),
                    password: password.clone(),
                }
            }
            _ => Credentials::Anonymous,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Reconnection budget after the first failed attempt; `None` = unlimited
    pub fn reconnect_budget(&self) -> Option<u64> {
        u64::try_from(self.max_reconnects).ok()
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "store.address must not be empty".into(),
            )));
        }

        Ok(())
    }
}

fn default_address() -> String {
    "mem://default".into()
}
fn default_reconnect_delay_ms() -> u64 {
    5000
}
fn default_max_reconnects() -> i64 {
    -1
}
