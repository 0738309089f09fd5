//! Descriptors for the canonical annotation keys.
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use super::*;

/// Lifecycle state published under [`SERVER_STATUS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
    Starting,
    Stopping,
}

impl ServerStatus {
    pub const ALL: [ServerStatus; 4] = [
        ServerStatus::Online,
        ServerStatus::Offline,
        ServerStatus::Starting,
        ServerStatus::Stopping,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
            ServerStatus::Starting => "starting",
            ServerStatus::Stopping => "stopping",
        }
    }
}

impl AsRef<str> for ServerStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn player_name() -> AnnotationDescriptor<String> {
    AnnotationDescriptor::string(PLAYER_NAME)
}

pub fn player_username() -> AnnotationDescriptor<String> {
    AnnotationDescriptor::string(PLAYER_USERNAME)
}

pub fn player_online() -> AnnotationDescriptor<bool> {
    AnnotationDescriptor::boolean(PLAYER_ONLINE)
}

pub fn player_current_server() -> AnnotationDescriptor<String> {
    AnnotationDescriptor::string(PLAYER_CURRENT_SERVER)
}

pub fn player_last_login() -> AnnotationDescriptor<OffsetDateTime> {
    AnnotationDescriptor::timestamp(PLAYER_LAST_LOGIN, TimeLayout::Rfc3339)
}

pub fn player_id() -> AnnotationDescriptor<String> {
    AnnotationDescriptor::uuid(PLAYER_ID)
}

pub fn server_status() -> AnnotationDescriptor<ServerStatus> {
    AnnotationDescriptor::enumeration(SERVER_STATUS, ServerStatus::ALL)
}

pub fn server_current_players() -> AnnotationDescriptor<i64> {
    AnnotationDescriptor::integer(SERVER_CURRENT_PLAYERS)
}

pub fn server_max_players() -> AnnotationDescriptor<i64> {
    AnnotationDescriptor::integer(SERVER_MAX_PLAYERS)
}

pub fn server_player_list() -> AnnotationDescriptor<Vec<String>> {
    AnnotationDescriptor::string_list(SERVER_PLAYER_LIST)
}

pub fn server_last_restart() -> AnnotationDescriptor<OffsetDateTime> {
    AnnotationDescriptor::timestamp(SERVER_LAST_RESTART, TimeLayout::Rfc3339)
}
