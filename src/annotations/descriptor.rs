use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::format_description::well_known::Rfc2822;
use time::format_description::well_known::Rfc3339;
use time::format_description::OwnedFormatItem;
use time::OffsetDateTime;

use super::AnnotationKey;
use crate::AnnotationError;
use crate::Metadata;

lazy_static! {
    static ref UUID_RE: Result<Regex, regex::Error> =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$");
}

type ParseFn<T> = dyn Fn(&str) -> Result<T, AnnotationError> + Send + Sync;
type FormatFn<T> = dyn Fn(&T) -> Result<String, AnnotationError> + Send + Sync;

/// Typed view over a single raw annotation.
///
/// A descriptor pairs a canonical key with a parse/format pair. It holds no
/// state of its own; the raw annotation map stays untyped, so two descriptors
/// of different `T` bound to the same key are not prevented.
pub struct AnnotationDescriptor<T> {
    key: AnnotationKey,
    parse: Arc<ParseFn<T>>,
    format: Arc<FormatFn<T>>,
}

impl<T> Clone for AnnotationDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            parse: Arc::clone(&self.parse),
            format: Arc::clone(&self.format),
        }
    }
}

impl<T> fmt::Debug for AnnotationDescriptor<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("AnnotationDescriptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T> AnnotationDescriptor<T> {
    pub fn new(
        key: AnnotationKey,
        parse: impl Fn(&str) -> Result<T, AnnotationError> + Send + Sync + 'static,
        format: impl Fn(&T) -> Result<String, AnnotationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            parse: Arc::new(parse),
            format: Arc::new(format),
        }
    }

    pub fn key(&self) -> AnnotationKey {
        self.key
    }

    pub fn parse(
        &self,
        raw: &str,
    ) -> Result<T, AnnotationError> {
        (self.parse)(raw)
    }

    pub fn format(
        &self,
        value: &T,
    ) -> Result<String, AnnotationError> {
        (self.format)(value)
    }

    /// Reads and decodes the annotation from `metadata`.
    ///
    /// # Returns
    /// - `Ok(None)` if the annotation is absent
    /// - `Err(_)` if it is present but cannot be decoded
    /// - `Ok(Some(value))` if it is present and valid
    pub fn get(
        &self,
        metadata: &Metadata,
    ) -> Result<Option<T>, AnnotationError> {
        match metadata.annotation(self.key) {
            None => Ok(None),
            Some(raw) => self.parse(raw).map(Some),
        }
    }

    /// Formats `value` and stores it, allocating the annotation map if needed.
    pub fn set(
        &self,
        metadata: &mut Metadata,
        value: &T,
    ) -> Result<(), AnnotationError> {
        let raw = self.format(value)?;
        metadata.set_annotation(self.key, raw);
        Ok(())
    }
}

impl AnnotationDescriptor<String> {
    /// Passthrough descriptor; every string is valid
    pub fn string(key: AnnotationKey) -> Self {
        Self::new(key, |raw| Ok(raw.to_string()), |value| Ok(value.clone()))
    }

    /// Canonical 36-character hyphenated UUID, case-insensitive
    pub fn uuid(key: AnnotationKey) -> Self {
        Self::new(key, parse_uuid, |value| Ok(value.clone()))
    }
}

impl AnnotationDescriptor<bool> {
    /// Exactly `"true"` or `"false"`
    pub fn boolean(key: AnnotationKey) -> Self {
        Self::new(key, parse_bool, |value| Ok(value.to_string()))
    }
}

impl AnnotationDescriptor<i64> {
    pub fn integer(key: AnnotationKey) -> Self {
        Self::new(key, parse_integer, |value| Ok(value.to_string()))
    }
}

impl AnnotationDescriptor<OffsetDateTime> {
    pub fn timestamp(
        key: AnnotationKey,
        layout: TimeLayout,
    ) -> Self {
        let layout = Arc::new(layout);
        let format_layout = Arc::clone(&layout);
        Self::new(
            key,
            move |raw| layout.parse(raw),
            move |value| format_layout.format(value),
        )
    }
}

impl AnnotationDescriptor<Vec<String>> {
    /// JSON array of strings stored in a single annotation
    pub fn string_list(key: AnnotationKey) -> Self {
        Self::structured(key)
    }
}

impl<T> AnnotationDescriptor<T>
where
    T: Clone + AsRef<str> + Send + Sync + 'static,
{
    /// Closed-set descriptor: parsing fails for values outside `allowed`.
    pub fn enumeration(
        key: AnnotationKey,
        allowed: impl IntoIterator<Item = T>,
    ) -> Self {
        let allowed: Vec<T> = allowed.into_iter().collect();
        let names: HashSet<String> = allowed.iter().map(|v| v.as_ref().to_string()).collect();
        Self::new(
            key,
            move |raw| {
                allowed
                    .iter()
                    .find(|v| v.as_ref() == raw)
                    .cloned()
                    .ok_or_else(|| AnnotationError::InvalidEnum(raw.to_string()))
            },
            move |value| {
                if names.contains(value.as_ref()) {
                    Ok(value.as_ref().to_string())
                } else {
                    Err(AnnotationError::InvalidEnum(value.as_ref().to_string()))
                }
            },
        )
    }
}

impl<T> AnnotationDescriptor<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Arbitrary JSON-compatible payload stored in a single annotation
    pub fn structured(key: AnnotationKey) -> Self {
        Self::new(
            key,
            move |raw| {
                serde_json::from_str(raw).map_err(|source| AnnotationError::Json {
                    key: key.to_string(),
                    source,
                })
            },
            move |value| {
                serde_json::to_string(value).map_err(|source| AnnotationError::Json {
                    key: key.to_string(),
                    source,
                })
            },
        )
    }
}

/// Timestamp encoding used by [`AnnotationDescriptor::timestamp`]
#[derive(Debug, Clone)]
pub enum TimeLayout {
    Rfc3339,
    Rfc2822,
    /// `time` format description, e.g.
    /// `"[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"`
    Custom(OwnedFormatItem),
}

impl TimeLayout {
    pub fn custom(description: &str) -> Result<Self, time::error::InvalidFormatDescription> {
        time::format_description::parse_owned::<1>(description).map(Self::Custom)
    }

    pub fn parse(
        &self,
        raw: &str,
    ) -> Result<OffsetDateTime, AnnotationError> {
        let parsed = match self {
            Self::Rfc3339 => OffsetDateTime::parse(raw, &Rfc3339),
            Self::Rfc2822 => OffsetDateTime::parse(raw, &Rfc2822),
            Self::Custom(items) => OffsetDateTime::parse(raw, items),
        };
        parsed.map_err(|source| AnnotationError::InvalidTime {
            value: raw.to_string(),
            source,
        })
    }

    pub fn format(
        &self,
        value: &OffsetDateTime,
    ) -> Result<String, AnnotationError> {
        let formatted = match self {
            Self::Rfc3339 => value.format(&Rfc3339),
            Self::Rfc2822 => value.format(&Rfc2822),
            Self::Custom(items) => value.format(items),
        };
        Ok(formatted?)
    }
}

pub(crate) fn parse_bool(raw: &str) -> Result<bool, AnnotationError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AnnotationError::InvalidBool(raw.to_string())),
    }
}

pub(crate) fn parse_uuid(raw: &str) -> Result<String, AnnotationError> {
    match UUID_RE.as_ref() {
        Ok(re) if re.is_match(raw) => Ok(raw.to_string()),
        _ => Err(AnnotationError::InvalidUuid(raw.to_string())),
    }
}

pub(crate) fn parse_integer(raw: &str) -> Result<i64, AnnotationError> {
    raw.parse()
        .map_err(|_| AnnotationError::InvalidInteger(raw.to_string()))
}
