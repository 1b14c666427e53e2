// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that the exporter uses to
//! simplify the process of serialization and deserialization. File I/O is left
//! to the caller to figure out.

use crate::{interpret::Escape, record::FieldKey};

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Crosswalk configuration layout.
///
/// # General Layout
///
/// The configuration is composed of shared settings and a listing of export
/// __profiles__. Shared settings hold separators, DOI settings, named date
/// formats, value converters, and relation definitions. Each profile names a
/// template file and the serializer that consumes its rendered output.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CrosswalkConfig {
    /// Base directory that relative template paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,

    /// Default separators of tabular exports.
    #[serde(default)]
    pub separators: Separators,

    /// DOI settings used by the "doi" virtual field.
    #[serde(default)]
    pub doi: DoiSettings,

    /// Named date patterns used by the "date" virtual field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub date_formats: BTreeMap<String, String>,

    /// Value converters used by the "mapConverter" virtual field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub converters: BTreeMap<String, ConverterDefinition>,

    /// Relations available to relation groups.
    #[serde(default, rename = "relation", skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, RelationDefinition>,

    /// Export profiles.
    #[serde(default, rename = "profile")]
    pub profiles: Vec<ProfileDefinition>,
}

impl CrosswalkConfig {
    /// Find profile by name.
    pub fn profile(&self, name: &str) -> Option<&ProfileDefinition> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    fn validate(&self) -> Result<()> {
        self.separators.validate("separators")?;

        let mut names = HashSet::new();
        for profile in &self.profiles {
            if !names.insert(profile.name.as_str()) {
                return Err(ConfigError::DuplicateProfile(profile.name.clone()));
            }

            profile
                .separators(&self.separators)
                .validate(&format!("profile {:?}", profile.name))?;
        }

        Ok(())
    }
}

impl FromStr for CrosswalkConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: CrosswalkConfig =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every configured path.
        if let Some(template_dir) = &config.template_dir {
            config.template_dir = Some(expand_path(template_dir)?);
        }
        for profile in &mut config.profiles {
            profile.template = expand_path(&profile.template)?;
        }

        config.validate()?;

        Ok(config)
    }
}

impl Display for CrosswalkConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &std::path::Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Separators of tabular exports.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Separators {
    /// Separator between columns. Must be a single ASCII character.
    pub field: String,

    /// Separator between repeated values of one column.
    pub value: String,

    /// Separator between nested values of one metadata group repetition.
    pub nested: String,
}

impl Separators {
    /// Column separator as a single byte.
    ///
    /// Falls back to a comma for separators that were never validated.
    pub fn field_byte(&self) -> u8 {
        match self.field.as_bytes() {
            [byte] => *byte,
            _ => b',',
        }
    }

    fn validate(&self, scope: &str) -> Result<()> {
        if self.field.len() != 1 || !self.field.is_ascii() {
            return Err(ConfigError::InvalidSeparator {
                scope: scope.to_string(),
                separator: self.field.clone(),
            });
        }

        Ok(())
    }
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            field: ",".into(),
            value: "||".into(),
            nested: "/".into(),
        }
    }
}

/// Per-profile separator overrides.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SeparatorOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<String>,
}

/// Settings for DOI synthesis.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DoiSettings {
    /// DOI prefix, e.g., "10.5072".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Namespace placed in front of the record id in synthesized suffixes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Value conversion table.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ConverterDefinition {
    /// Value used when no mapping matches. Unmapped values pass through
    /// unchanged if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Mapping from stored value to exported value.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

/// How related records are found.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Follow authorities of a subject field to the linked records.
    #[default]
    Authority,

    /// Search for records whose field carries the subject id as authority.
    Search,
}

/// Relation definition.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RelationDefinition {
    /// Lookup strategy.
    #[serde(default)]
    pub kind: RelationKind,

    /// Field carrying the authority link.
    pub field: FieldKey,

    /// Only keep related records of this entity type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Maximum number of related records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Serializer selected by a profile.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Line template producing text, XML, or JSON.
    #[default]
    Refer,

    /// Delimited text table.
    Csv,

    /// Spreadsheet workbook.
    Xls,

    /// Fixed-layout document.
    Pdf,
}

impl ProfileKind {
    fn default_mime_type(self, escape: Escape) -> &'static str {
        match (self, escape) {
            (Self::Refer, Escape::Xml) => "application/xml",
            (Self::Refer, Escape::Json) => "application/json",
            (Self::Refer, Escape::None) => "text/plain",
            (Self::Csv, _) => "text/csv",
            (Self::Xls, _) => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            (Self::Pdf, _) => "application/pdf",
        }
    }

    fn default_extension(self, escape: Escape) -> &'static str {
        match (self, escape) {
            (Self::Refer, Escape::Xml) => "xml",
            (Self::Refer, Escape::Json) => "json",
            (Self::Refer, Escape::None) => "txt",
            (Self::Csv, _) => "csv",
            (Self::Xls, _) => "xlsx",
            (Self::Pdf, _) => "pdf",
        }
    }
}

/// Export profile definition.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProfileDefinition {
    /// Unique name of profile.
    pub name: String,

    /// Serializer to use.
    #[serde(default)]
    pub kind: ProfileKind,

    /// Path to template file.
    pub template: PathBuf,

    /// MIME type of exported content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// File name of exported content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Only records of this entity type can be exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Escaping applied to substituted values.
    #[serde(default)]
    pub escape: Escape,

    /// Separator overrides of tabular exports.
    #[serde(default)]
    pub separators: SeparatorOverrides,

    /// Line written before a multi-record export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Line written after a multi-record export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,

    /// Text appended to each record but the last of a multi-record export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

impl ProfileDefinition {
    /// MIME type of exported content.
    pub fn mime_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .unwrap_or_else(|| self.kind.default_mime_type(self.escape))
    }

    /// File name of exported content.
    pub fn file_name(&self) -> String {
        match &self.file_name {
            Some(file_name) => file_name.clone(),
            None => format!(
                "{}.{}",
                self.name,
                self.kind.default_extension(self.escape)
            ),
        }
    }

    /// Separators after applying profile overrides to shared separators.
    pub fn separators(&self, shared: &Separators) -> Separators {
        Separators {
            field: self.separators.field.clone().unwrap_or_else(|| shared.field.clone()),
            value: self.separators.value.clone().unwrap_or_else(|| shared.value.clone()),
            nested: self.separators.nested.clone().unwrap_or_else(|| shared.nested.clone()),
        }
    }

    /// Header, footer, and separator of multi-record exports.
    ///
    /// JSON profiles default to a JSON array.
    pub fn layout(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        let (header, footer, separator) = match self.escape {
            Escape::Json => (Some("["), Some("]"), Some(",")),
            _ => (None, None, None),
        };

        (
            self.header.as_deref().or(header),
            self.footer.as_deref().or(footer),
            self.separator.as_deref().or(separator),
        )
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Column separator is not a single ASCII character.
    #[error("{scope}: field separator {separator:?} must be a single ASCII character")]
    InvalidSeparator { scope: String, separator: String },

    /// Two profiles share the same name.
    #[error("profile {0:?} is defined more than once")]
    DuplicateProfile(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
