//! Static key → decoder mapping for the canonical annotation keys.
//!
//! Unregistered keys are plain strings and have no entry here.
use time::OffsetDateTime;

use super::*;
use crate::AnnotationError;

/// Expected decoded shape of a registered key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Text,
    Bool,
    Time,
    Uuid,
    Integer,
    ServerStatus,
    StringList,
}

/// Decoded annotation tagged by its kind
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Text(String),
    Bool(bool),
    Time(OffsetDateTime),
    Uuid(String),
    Integer(i64),
    ServerStatus(ServerStatus),
    StringList(Vec<String>),
}

const REGISTRY: &[(AnnotationKey, AnnotationKind)] = &[
    (PLAYER_NAME, AnnotationKind::Text),
    (PLAYER_USERNAME, AnnotationKind::Text),
    (PLAYER_ONLINE, AnnotationKind::Bool),
    (PLAYER_CURRENT_SERVER, AnnotationKind::Text),
    (PLAYER_LAST_LOGIN, AnnotationKind::Time),
    (PLAYER_ID, AnnotationKind::Uuid),
    (SERVER_STATUS, AnnotationKind::ServerStatus),
    (SERVER_CURRENT_PLAYERS, AnnotationKind::Integer),
    (SERVER_MAX_PLAYERS, AnnotationKind::Integer),
    (SERVER_PLAYER_LIST, AnnotationKind::StringList),
    (SERVER_LAST_RESTART, AnnotationKind::Time),
];

fn lookup(key: &str) -> Option<(AnnotationKey, AnnotationKind)> {
    REGISTRY
        .iter()
        .find(|(registered, _)| registered.as_str() == key)
        .copied()
}

pub fn registered_kind(key: &str) -> Option<AnnotationKind> {
    lookup(key).map(|(_, kind)| kind)
}

/// Decodes `raw` according to the registered kind of `key`.
///
/// Returns `None` for unregistered keys.
pub fn decode_registered(
    key: &str,
    raw: &str,
) -> Option<Result<AnnotationValue, AnnotationError>> {
    let (key, kind) = lookup(key)?;
    let decoded = match kind {
        AnnotationKind::Text => Ok(AnnotationValue::Text(raw.to_string())),
        AnnotationKind::Bool => super::descriptor::parse_bool(raw).map(AnnotationValue::Bool),
        AnnotationKind::Time => TimeLayout::Rfc3339.parse(raw).map(AnnotationValue::Time),
        AnnotationKind::Uuid => super::descriptor::parse_uuid(raw).map(AnnotationValue::Uuid),
        AnnotationKind::Integer => super::descriptor::parse_integer(raw).map(AnnotationValue::Integer),
        AnnotationKind::ServerStatus => server_status().parse(raw).map(AnnotationValue::ServerStatus),
        AnnotationKind::StringList => AnnotationDescriptor::string_list(key)
            .parse(raw)
            .map(AnnotationValue::StringList),
    };
    Some(decoded)
}
