// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Serialization strategies.
//!
//! A __crosswalk__ turns records into the bytes of one export format. Every
//! crosswalk is bound to a single profile and its template, both loaded once
//! when the exporter is built. Four strategies exist:
//!
//! - [`ReferCrosswalk`] renders line templates into text, XML, or JSON.
//! - [`CsvCrosswalk`] and [`XlsCrosswalk`] render column templates into a
//!   table.
//! - [`DocumentCrosswalk`] renders line templates into a paginated document.

pub mod document;
pub mod refer;
pub mod tabular;

pub use document::DocumentCrosswalk;
pub use refer::ReferCrosswalk;
pub use tabular::{CsvCrosswalk, TabularTemplate, XlsCrosswalk};

use crate::{config::ProfileDefinition, interpret::Environment, record::MetadataRecord};

/// Serialize records through a profile.
pub trait Crosswalk {
    /// Profile that this crosswalk serves.
    fn profile(&self) -> &ProfileDefinition;

    /// Serialize a single record.
    ///
    /// # Errors
    ///
    /// - Return [`CrosswalkError::UnsupportedObject`] if the profile cannot
    ///   export the record.
    /// - Return [`CrosswalkError`] if serialization fails.
    fn disseminate_one(&self, env: Environment<'_>, record: &MetadataRecord) -> Result<Vec<u8>>;

    /// Serialize many records into one output.
    ///
    /// # Errors
    ///
    /// - Return [`CrosswalkError::UnsupportedObject`] for the first record
    ///   the profile cannot export.
    /// - Return [`CrosswalkError`] if serialization fails.
    fn disseminate_all(&self, env: Environment<'_>, records: &[MetadataRecord]) -> Result<Vec<u8>>;

    /// Check if the profile can export record.
    fn can_disseminate(&self, record: &MetadataRecord) -> bool {
        match &self.profile().entity_type {
            Some(entity_type) => record.entity_type.as_deref() == Some(entity_type.as_str()),
            None => true,
        }
    }

    /// Require that the profile can export record.
    ///
    /// # Errors
    ///
    /// - Return [`CrosswalkError::UnsupportedObject`] if it cannot.
    fn ensure_supported(&self, record: &MetadataRecord) -> Result<()> {
        if self.can_disseminate(record) {
            return Ok(());
        }

        Err(CrosswalkError::UnsupportedObject {
            profile: self.profile().name.clone(),
            record: record.id.clone(),
            entity_type: record.entity_type.clone(),
        })
    }
}

/// Crosswalk error types.
#[derive(Debug, thiserror::Error)]
pub enum CrosswalkError {
    /// Profile cannot export record.
    #[error("profile {profile:?} cannot export record {record:?} of entity type {entity_type:?}")]
    UnsupportedObject {
        profile: String,
        record: String,
        entity_type: Option<String>,
    },

    /// Output could not be written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Delimited text could not be written.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Spreadsheet could not be written.
    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Document could not be written.
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CrosswalkError> = std::result::Result<T, E>;

/// Join lines into output bytes, each line terminated by a newline.
pub(crate) fn join_lines(lines: &[String]) -> Vec<u8> {
    let mut output = String::new();
    for line in lines {
        output.push_str(line);
        output.push('\n');
    }
    output.into_bytes()
}

#[cfg(test)]
pub(crate) mod fixture {
    use crate::{
        condition::ConditionRegistry,
        config::{CrosswalkConfig, RelationDefinition},
        interpret::Environment,
        relation::RelationResolver,
        virtual_field::VirtualFieldRegistry,
    };

    use std::collections::BTreeMap;

    /// Registries without relations or record source.
    pub(crate) struct Registries {
        pub(crate) virtuals: VirtualFieldRegistry,
        pub(crate) conditions: ConditionRegistry,
        relations: BTreeMap<String, RelationDefinition>,
    }

    impl Registries {
        pub(crate) fn new() -> Self {
            Self {
                virtuals: VirtualFieldRegistry::with_defaults(&CrosswalkConfig::default()),
                conditions: ConditionRegistry::with_defaults(),
                relations: BTreeMap::new(),
            }
        }

        pub(crate) fn env(&self) -> Environment<'_> {
            Environment {
                virtuals: &self.virtuals,
                conditions: &self.conditions,
                relations: RelationResolver::new(&self.relations, None),
            }
        }
    }
}
