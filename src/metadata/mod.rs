//! The single entity shape shared by players and servers.
//!
//! Labels are user-organizational and schema-less; annotations are
//! system/tool-owned and keyed by canonical [`AnnotationKey`](crate::AnnotationKey)s.
//! Both maps are lazily allocated on first write and omitted from the JSON
//! encoding when empty.


use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::AnnotationDescriptor;
use crate::AnnotationError;
use crate::AnnotationValue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// User-defined labels for organization/filtering
    #[serde(default, skip_serializing_if = "map_is_empty", deserialize_with = "empty_as_none")]
    pub labels: Option<HashMap<String, String>>,

    /// System/tool-defined metadata
    #[serde(default, skip_serializing_if = "map_is_empty", deserialize_with = "empty_as_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the wire payload
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Encodes the wire payload
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    // Labels

    pub fn set_label(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.labels
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
    }

    pub fn label(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.labels.as_ref()?.get(key).map(String::as_str)
    }

    pub fn delete_label(
        &mut self,
        key: &str,
    ) {
        if let Some(labels) = self.labels.as_mut() {
            labels.remove(key);
        }
    }

    /// Returns true only if `key` is present with exactly `value`
    pub fn has_label(
        &self,
        key: &str,
        value: &str,
    ) -> bool {
        self.label(key) == Some(value)
    }

    /// Every required label must be present with the required value; an
    /// empty requirement set matches everything.
    pub fn has_labels(
        &self,
        required: &HashMap<String, String>,
    ) -> bool {
        required.iter().all(|(key, value)| self.has_label(key, value))
    }

    // Annotations

    pub fn set_annotation(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<String>,
    ) {
        self.annotations
            .get_or_insert_with(HashMap::new)
            .insert(key.as_ref().to_string(), value.into());
    }

    pub fn annotation(
        &self,
        key: impl AsRef<str>,
    ) -> Option<&str> {
        self.annotations.as_ref()?.get(key.as_ref()).map(String::as_str)
    }

    pub fn delete_annotation(
        &mut self,
        key: impl AsRef<str>,
    ) {
        if let Some(annotations) = self.annotations.as_mut() {
            annotations.remove(key.as_ref());
        }
    }

    pub fn has_annotation(
        &self,
        key: impl AsRef<str>,
        value: &str,
    ) -> bool {
        self.annotation(key) == Some(value)
    }

    /// Typed read through a descriptor; see [`AnnotationDescriptor::get`]
    pub fn typed<T>(
        &self,
        descriptor: &AnnotationDescriptor<T>,
    ) -> Result<Option<T>, AnnotationError> {
        descriptor.get(self)
    }

    /// Typed write through a descriptor; see [`AnnotationDescriptor::set`]
    pub fn set_typed<T>(
        &mut self,
        descriptor: &AnnotationDescriptor<T>,
        value: &T,
    ) -> Result<(), AnnotationError> {
        descriptor.set(self, value)
    }

    /// Decodes a registered canonical annotation into its tagged value.
    ///
    /// Returns `None` when the annotation is absent or the key is not registered.
    pub fn decoded(
        &self,
        key: impl AsRef<str>,
    ) -> Option<Result<AnnotationValue, AnnotationError>> {
        let raw = self.annotation(key.as_ref())?;
        crate::decode_registered(key.as_ref(), raw)
    }

    pub fn set_bool_annotation(
        &mut self,
        key: impl AsRef<str>,
        value: bool,
    ) {
        self.set_annotation(key, value.to_string());
    }

    /// `Ok(None)` if absent, `Err` if present but not exactly `"true"`/`"false"`
    pub fn bool_annotation(
        &self,
        key: impl AsRef<str>,
    ) -> Result<Option<bool>, AnnotationError> {
        match self.annotation(key) {
            None => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(other) => Err(AnnotationError::InvalidBool(other.to_string())),
        }
    }

    /// Marshals any value into a JSON string annotation
    pub fn set_structured_annotation<T: Serialize + ?Sized>(
        &mut self,
        key: impl AsRef<str>,
        value: &T,
    ) -> Result<(), AnnotationError> {
        let data = serde_json::to_string(value).map_err(|source| AnnotationError::Json {
            key: key.as_ref().to_string(),
            source,
        })?;
        self.set_annotation(key, data);
        Ok(())
    }

    pub fn structured_annotation<T: DeserializeOwned>(
        &self,
        key: impl AsRef<str>,
    ) -> Result<Option<T>, AnnotationError> {
        let Some(raw) = self.annotation(key.as_ref()) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|source| AnnotationError::Json {
                key: key.as_ref().to_string(),
                source,
            })
    }

    pub fn set_string_list_annotation(
        &mut self,
        key: impl AsRef<str>,
        list: &[String],
    ) -> Result<(), AnnotationError> {
        self.set_structured_annotation(key, list)
    }

    pub fn string_list_annotation(
        &self,
        key: impl AsRef<str>,
    ) -> Result<Option<Vec<String>>, AnnotationError> {
        self.structured_annotation(key)
    }
}

fn map_is_empty(map: &Option<HashMap<String, String>>) -> bool {
    map.as_ref().map_or(true, HashMap::is_empty)
}

/// An explicit `null` or `{}` decodes the same as a missing field
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<HashMap<String, String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = Option::<HashMap<String, String>>::deserialize(deserializer)?;
    Ok(map.filter(|m| !m.is_empty()))
}
