// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Metadata record representation.
//!
//! A __metadata record__ is a read-only snapshot of the metadata of one
//! repository object. Metadata is keyed by __field key__ of the form
//! `schema.element[.qualifier]`, e.g., `dc.contributor.author`. Each field may
//! hold multiple values in a fixed order. A value can optionally carry an
//! __authority__, i.e., the id of another record that the value links to.
//!
//! # Placeholder Values
//!
//! Fields that repeat together as a metadata group must keep the same number
//! of values. When a grouped field has nothing to say for one repetition, it
//! stores [`PLACEHOLDER_VALUE`] instead. The placeholder always renders as an
//! empty string, but still counts toward the cardinality of its field.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Value stored by grouped fields that have nothing to say for a repetition.
pub const PLACEHOLDER_VALUE: &str = "#PLACEHOLDER_PARENT_METADATA_VALUE#";

/// Metadata field key.
///
/// Composed of a schema, an element, and an optional qualifier. Each segment
/// may only contain ASCII alphanumerics or underscores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldKey {
    schema: String,
    element: String,
    qualifier: Option<String>,
}

impl FieldKey {
    /// Construct new field key from already split segments.
    ///
    /// # Errors
    ///
    /// - Return [`FieldKeyError::InvalidSegment`] if any segment is empty or
    ///   contains characters other than ASCII alphanumerics or underscores.
    pub fn new(
        schema: impl Into<String>,
        element: impl Into<String>,
        qualifier: Option<impl Into<String>>,
    ) -> Result<Self> {
        let key = Self {
            schema: schema.into(),
            element: element.into(),
            qualifier: qualifier.map(Into::into),
        };

        for segment in key.segments() {
            if !is_valid_segment(segment) {
                return Err(FieldKeyError::InvalidSegment {
                    key: key.to_string(),
                    segment: segment.to_string(),
                });
            }
        }

        Ok(key)
    }

    /// Construct well-known field key without validation.
    pub(crate) fn known(
        schema: &'static str,
        element: &'static str,
        qualifier: Option<&'static str>,
    ) -> Self {
        Self {
            schema: schema.into(),
            element: element.into(),
            qualifier: qualifier.map(Into::into),
        }
    }

    /// Parse field key written with dashes instead of dots.
    ///
    /// Field keys passed as arguments to virtual fields and conditions use
    /// `-` as their separator, because `.` already separates the arguments
    /// themselves, e.g., `dc-date-issued`.
    ///
    /// # Errors
    ///
    /// - Return [`FieldKeyError`] if the key is malformed.
    pub fn from_dashed(data: &str) -> Result<Self> {
        split_segments(data, '-')
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        [Some(self.schema.as_str()), Some(self.element.as_str()), self.qualifier.as_deref()]
            .into_iter()
            .flatten()
    }
}

impl FromStr for FieldKey {
    type Err = FieldKeyError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        split_segments(data, '.')
    }
}

impl TryFrom<String> for FieldKey {
    type Error = FieldKeyError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        data.parse()
    }
}

impl From<FieldKey> for String {
    fn from(key: FieldKey) -> Self {
        key.to_string()
    }
}

impl Display for FieldKey {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.qualifier {
            Some(qualifier) => write!(fmt, "{}.{}.{}", self.schema, self.element, qualifier),
            None => write!(fmt, "{}.{}", self.schema, self.element),
        }
    }
}

fn split_segments(data: &str, separator: char) -> Result<FieldKey> {
    let segments = data.split(separator).collect::<Vec<_>>();
    match segments.as_slice() {
        [schema, element] => FieldKey::new(*schema, *element, None::<String>),
        [schema, element, qualifier] => FieldKey::new(*schema, *element, Some(*qualifier)),
        _ => Err(FieldKeyError::SegmentCount {
            key: data.to_string(),
            count: segments.len(),
        }),
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Single metadata value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "RawValue")]
pub struct MetadataValue {
    /// Textual value.
    pub value: String,

    /// Id of linked record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
}

impl MetadataValue {
    /// Construct new metadata value without authority.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            authority: None,
        }
    }

    /// Construct new metadata value linked to another record.
    pub fn with_authority(value: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            authority: Some(authority.into()),
        }
    }

    /// Value is a group placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.value == PLACEHOLDER_VALUE
    }

    /// Text to render for this value.
    ///
    /// Placeholders render as an empty string.
    pub fn display(&self) -> &str {
        if self.is_placeholder() {
            ""
        } else {
            self.value.as_str()
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Record files may write a value as a plain string, or as a table when an
/// authority is attached.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Plain(String),
    Detailed {
        value: String,
        authority: Option<String>,
    },
}

impl From<RawValue> for MetadataValue {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Plain(value) => Self::new(value),
            RawValue::Detailed { value, authority } => Self { value, authority },
        }
    }
}

/// Read-only metadata snapshot of a repository object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetadataRecord {
    /// Unique id of the object.
    pub id: String,

    /// Entity type of the object, e.g., "Person" or "Publication".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Persistent identifier of the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// Metadata values by field key.
    #[serde(default)]
    pub metadata: BTreeMap<FieldKey, Vec<MetadataValue>>,
}

impl MetadataRecord {
    /// Construct new record without any metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set entity type of record.
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set handle of record.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Append value to field.
    ///
    /// # Errors
    ///
    /// - Return [`FieldKeyError`] if field key is malformed.
    pub fn with_value(
        mut self,
        field: impl AsRef<str>,
        value: impl Into<MetadataValue>,
    ) -> Result<Self> {
        self.push(field.as_ref().parse()?, value);
        Ok(self)
    }

    /// Append value to field.
    pub fn push(&mut self, field: FieldKey, value: impl Into<MetadataValue>) {
        self.metadata.entry(field).or_default().push(value.into());
    }

    /// All values of a field in stored order.
    ///
    /// Returns an empty slice for fields the record does not have.
    pub fn values(&self, field: &FieldKey) -> &[MetadataValue] {
        self.metadata
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First value of a field that is not a placeholder.
    pub fn first_value(&self, field: &FieldKey) -> Option<&str> {
        self.values(field)
            .iter()
            .find(|value| !value.is_placeholder())
            .map(|value| value.value.as_str())
    }
}

/// Field key parsing error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FieldKeyError {
    /// Key does not have two or three segments.
    #[error("field {key:?} must have a schema, an element and an optional qualifier, found {count} segments")]
    SegmentCount { key: String, count: usize },

    /// Segment is empty or contains invalid characters.
    #[error("field {key:?} has invalid segment {segment:?}")]
    InvalidSegment { key: String, segment: String },
}

/// Friendly result alias :3
pub type Result<T, E = FieldKeyError> = std::result::Result<T, E>;
