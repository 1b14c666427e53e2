// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record store management and lookup.
//!
//! The export engine never owns the records it walks. Related records are
//! obtained through a [`RecordSource`], the collaborator standing in for the
//! hosting repository's object lookup and discovery search index.
//!
//! # Record Store Layout
//!
//! [`RecordStore`] is an in-memory record source loaded from record files.
//! A record file is either TOML or JSON. TOML files list each record as a
//! `[[record]]` table, and JSON files hold an object with a `record` array.
//! Record ids must be unique across every file loaded into the same store.

use crate::record::{FieldKey, MetadataRecord};

use serde::Deserialize;
use std::{
    collections::HashMap,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Lookup of records outside of the subject being exported.
pub trait RecordSource {
    /// Find record by id.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError`] if the lookup itself fails. A record that
    ///   does not exist is `Ok(None)`.
    fn find(&self, id: &str) -> std::result::Result<Option<MetadataRecord>, SourceError>;

    /// Find records matching a discovery query, in source order.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError`] if the search fails.
    fn search(&self, query: &DiscoveryQuery) -> std::result::Result<Vec<MetadataRecord>, SourceError>;
}

/// Query for records linked to a subject through a field authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    /// Only match records of this entity type.
    pub entity_type: Option<String>,

    /// Field whose authority must point at the subject.
    pub field: FieldKey,

    /// Authority the field must carry.
    pub authority: String,

    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl DiscoveryQuery {
    /// Check if a record satisfies this query.
    pub fn matches(&self, record: &MetadataRecord) -> bool {
        let type_matches = match &self.entity_type {
            Some(entity_type) => record.entity_type.as_deref() == Some(entity_type.as_str()),
            None => true,
        };

        type_matches
            && record
                .values(&self.field)
                .iter()
                .any(|value| value.authority.as_deref() == Some(self.authority.as_str()))
    }
}

/// Record source failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("record source lookup failed: {0}")]
pub struct SourceError(pub String);

/// In-memory record source.
///
/// # Invariant
///
/// - No duplicate record ids.
/// - Records keep the order they were added in.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    records: Vec<MetadataRecord>,
    index: HashMap<String, usize>,
}

impl RecordStore {
    /// Construct new empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load record file into new store.
    ///
    /// Files ending with ".json" are read as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadRecordFile`] if the file cannot be read.
    /// - Return [`StoreError::Deserialize`] or [`StoreError::DeserializeJson`]
    ///   if the file is malformed.
    /// - Return [`StoreError::DuplicateRecord`] if the file repeats an id.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_to_string(path).map_err(|err| StoreError::ReadRecordFile {
            source: err,
            path: path.to_path_buf(),
        })?;

        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let store = if is_json {
            Self::from_json(&content)?
        } else {
            content.parse()?
        };
        debug!("loaded {} records from {:?}", store.len(), path.display());

        Ok(store)
    }

    /// Load every record file into one store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if any file fails to load, or two files share
    ///   a record id.
    pub fn load_all(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Self> {
        let mut store = Self::new();
        for path in paths {
            store.extend(Self::load(path)?.records)?;
        }

        Ok(store)
    }

    /// Parse JSON record file content.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::DeserializeJson`] if content is malformed.
    /// - Return [`StoreError::DuplicateRecord`] if content repeats an id.
    pub fn from_json(data: &str) -> Result<Self> {
        let file: RecordFile = serde_json::from_str(data)?;
        let mut store = Self::new();
        store.extend(file.records)?;
        Ok(store)
    }

    /// Add record to store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::DuplicateRecord`] if id is already taken.
    pub fn insert(&mut self, record: MetadataRecord) -> Result<()> {
        if self.index.contains_key(&record.id) {
            return Err(StoreError::DuplicateRecord(record.id));
        }

        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Add many records to store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::DuplicateRecord`] if an id is already taken.
    pub fn extend(&mut self, records: impl IntoIterator<Item = MetadataRecord>) -> Result<()> {
        for record in records {
            self.insert(record)?;
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&MetadataRecord> {
        self.index.get(id).map(|position| &self.records[*position])
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromStr for RecordStore {
    type Err = StoreError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let file: RecordFile = toml::de::from_str(data)?;
        let mut store = Self::new();
        store.extend(file.records)?;
        Ok(store)
    }
}

impl RecordSource for RecordStore {
    fn find(&self, id: &str) -> std::result::Result<Option<MetadataRecord>, SourceError> {
        Ok(self.get(id).cloned())
    }

    fn search(&self, query: &DiscoveryQuery) -> std::result::Result<Vec<MetadataRecord>, SourceError> {
        let matches = self.records.iter().filter(|record| query.matches(record));
        let records = match query.limit {
            Some(limit) => matches.take(limit).cloned().collect(),
            None => matches.cloned().collect(),
        };

        Ok(records)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecordFile {
    #[serde(default, rename = "record")]
    records: Vec<MetadataRecord>,
}

/// All possible error types for record store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record file cannot be read.
    #[error("failed to read record file at {:?}", path.display())]
    ReadRecordFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// TOML record file is malformed.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// JSON record file is malformed.
    #[error(transparent)]
    DeserializeJson(#[from] serde_json::Error),

    /// Two records share the same id.
    #[error("record {0:?} already exists in store")]
    DuplicateRecord(String),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MetadataValue;
    use pretty_assertions::assert_eq;

    const RECORDS: &str = r#"
        [[record]]
        id = "person-1"
        entity_type = "Person"
        [record.metadata]
        "dc.title" = ["Smith, John"]

        [[record]]
        id = "pub-1"
        entity_type = "Publication"
        [record.metadata]
        "dc.title" = ["First Publication"]
        "dc.contributor.author" = [{ value = "Smith, John", authority = "person-1" }, "White, Walter"]

        [[record]]
        id = "pub-2"
        entity_type = "Publication"
        [record.metadata]
        "dc.title" = ["Second Publication"]
        "dc.contributor.author" = [{ value = "Smith, John", authority = "person-1" }]

        [[record]]
        id = "pub-3"
        entity_type = "Publication"
        [record.metadata]
        "dc.title" = ["Unrelated Publication"]
        "dc.contributor.author" = ["Smith, John"]
    "#;

    #[test]
    fn find_record_by_id() -> anyhow::Result<()> {
        let store: RecordStore = RECORDS.parse()?;
        assert_eq!(store.len(), 4);

        let person = store.find("person-1")?.map(|record| record.id);
        assert_eq!(person, Some("person-1".to_string()));
        assert_eq!(store.find("missing")?, None);

        Ok(())
    }

    #[test]
    fn search_by_authority() -> anyhow::Result<()> {
        let store: RecordStore = RECORDS.parse()?;
        let mut query = DiscoveryQuery {
            entity_type: Some("Publication".into()),
            field: "dc.contributor.author".parse()?,
            authority: "person-1".into(),
            limit: None,
        };

        let result = store
            .search(&query)?
            .into_iter()
            .map(|record| record.id)
            .collect::<Vec<_>>();
        assert_eq!(result, vec!["pub-1", "pub-2"]);

        query.limit = Some(1);
        assert_eq!(store.search(&query)?.len(), 1);

        Ok(())
    }

    #[test]
    fn reject_duplicate_record() -> anyhow::Result<()> {
        let mut store = RecordStore::new();
        store.insert(MetadataRecord::new("1"))?;
        let result = store.insert(MetadataRecord::new("1"));
        assert!(matches!(result, Err(StoreError::DuplicateRecord(id)) if id == "1"));

        Ok(())
    }

    #[test]
    fn parse_json_records() -> anyhow::Result<()> {
        let store = RecordStore::from_json(
            r#"{
                "record": [
                    {
                        "id": "pub-1",
                        "metadata": {
                            "dc.title": ["Json Publication"],
                            "dc.subject": ["test", { "value": "export", "authority": "subj-1" }]
                        }
                    }
                ]
            }"#,
        )?;

        let record = store.get("pub-1").map(|record| record.values(&"dc.subject".parse().unwrap()).to_vec());
        assert_eq!(
            record,
            Some(vec![
                MetadataValue::new("test"),
                MetadataValue::with_authority("export", "subj-1"),
            ])
        );

        Ok(())
    }
}
