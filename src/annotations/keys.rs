use std::fmt;

/// Canonical annotation key.
///
/// Keys are namespaced as `"<entity>/<field>"` and are stable across every
/// component that reads or writes metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationKey(&'static str);

impl AnnotationKey {
    pub const fn new(key: &'static str) -> Self {
        Self(key)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Entity namespace, e.g. `"player"` for `"player/name"`
    pub fn namespace(&self) -> Option<&'static str> {
        self.0.split_once('/').map(|(ns, _)| ns)
    }
}

impl AsRef<str> for AnnotationKey {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.0)
    }
}

// Player annotations
pub const PLAYER_NAME: AnnotationKey = AnnotationKey::new("player/name");
/// Login handle; drives the player name index
pub const PLAYER_USERNAME: AnnotationKey = AnnotationKey::new("player/username");
pub const PLAYER_ONLINE: AnnotationKey = AnnotationKey::new("player/online");
pub const PLAYER_CURRENT_SERVER: AnnotationKey = AnnotationKey::new("player/current_server");
pub const PLAYER_LAST_LOGIN: AnnotationKey = AnnotationKey::new("player/last_login");
pub const PLAYER_ID: AnnotationKey = AnnotationKey::new("player/id");

// Server annotations
pub const SERVER_STATUS: AnnotationKey = AnnotationKey::new("server/status");
pub const SERVER_CURRENT_PLAYERS: AnnotationKey = AnnotationKey::new("server/current_players");
pub const SERVER_MAX_PLAYERS: AnnotationKey = AnnotationKey::new("server/max_players");
pub const SERVER_PLAYER_LIST: AnnotationKey = AnnotationKey::new("server/player.list");
pub const SERVER_LAST_RESTART: AnnotationKey = AnnotationKey::new("server/last_restart");

pub const ALL_ANNOTATION_KEYS: &[AnnotationKey] = &[
    PLAYER_NAME,
    PLAYER_USERNAME,
    PLAYER_ONLINE,
    PLAYER_CURRENT_SERVER,
    PLAYER_LAST_LOGIN,
    PLAYER_ID,
    SERVER_STATUS,
    SERVER_CURRENT_PLAYERS,
    SERVER_MAX_PLAYERS,
    SERVER_PLAYER_LIST,
    SERVER_LAST_RESTART,
];
