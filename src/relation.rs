// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Relation group resolution.
//!
//! A `@relation.<name>.start@` block renders its body once for every record
//! related to the subject through the named relation. Relations come from the
//! configuration, and are resolved through a [`RecordSource`].

use crate::{
    config::{RelationDefinition, RelationKind},
    record::MetadataRecord,
    store::{DiscoveryQuery, RecordSource, SourceError},
};

use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolve named relations of a subject record.
#[derive(Clone, Copy)]
pub struct RelationResolver<'a> {
    definitions: &'a BTreeMap<String, RelationDefinition>,
    source: Option<&'a dyn RecordSource>,
}

impl<'a> RelationResolver<'a> {
    pub fn new(
        definitions: &'a BTreeMap<String, RelationDefinition>,
        source: Option<&'a dyn RecordSource>,
    ) -> Self {
        Self {
            definitions,
            source,
        }
    }

    /// Find records related to subject through relation, in source order.
    ///
    /// Authority links pointing at records that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`RelationError::Unconfigured`] if relation is not defined.
    /// - Return [`RelationError::NoSource`] if there is no record source.
    /// - Return [`RelationError::Source`] if the record source fails.
    pub fn resolve(&self, name: &str, subject: &MetadataRecord) -> Result<Vec<MetadataRecord>> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| RelationError::Unconfigured(name.to_string()))?;
        let source = self.source.ok_or_else(|| RelationError::NoSource(name.to_string()))?;

        let records = match definition.kind {
            RelationKind::Authority => {
                let mut records = Vec::new();
                for value in subject.values(&definition.field) {
                    if definition.limit.is_some_and(|limit| records.len() >= limit) {
                        break;
                    }

                    let Some(authority) = value.authority.as_deref() else {
                        continue;
                    };

                    match source.find(authority)? {
                        Some(record) if type_matches(definition, &record) => records.push(record),
                        Some(_) => debug!("skip {authority:?}, wrong entity type for relation {name:?}"),
                        None => warn!("relation {name:?}: record {authority:?} does not exist"),
                    }
                }
                records
            }
            RelationKind::Search => source.search(&DiscoveryQuery {
                entity_type: definition.entity_type.clone(),
                field: definition.field.clone(),
                authority: subject.id.clone(),
                limit: definition.limit,
            })?,
        };
        debug!("relation {name:?} of {:?} found {} records", subject.id, records.len());

        Ok(records)
    }
}

fn type_matches(definition: &RelationDefinition, record: &MetadataRecord) -> bool {
    match &definition.entity_type {
        Some(entity_type) => record.entity_type.as_deref() == Some(entity_type.as_str()),
        None => true,
    }
}

/// Relation resolution error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelationError {
    /// Relation name is not configured.
    #[error("relation {0:?} is not configured")]
    Unconfigured(String),

    /// No record source available to follow relation.
    #[error("no record source available to resolve relation {0:?}")]
    NoSource(String),

    /// Record source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Friendly result alias :3
pub type Result<T, E = RelationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;
    use pretty_assertions::assert_eq;

    const RECORDS: &str = r#"
        [[record]]
        id = "pub-1"
        entity_type = "Publication"
        [record.metadata]
        "dc.title" = ["First Publication"]
        "dc.contributor.author" = [
            { value = "Smith, John", authority = "person-1" },
            "White, Walter",
            { value = "Missing, Person", authority = "person-404" },
            { value = "Doe, Jane", authority = "person-2" },
        ]

        [[record]]
        id = "person-1"
        entity_type = "Person"

        [[record]]
        id = "person-2"
        entity_type = "Person"

        [[record]]
        id = "pub-2"
        entity_type = "Publication"
        [record.metadata]
        "dc.contributor.author" = [{ value = "Smith, John", authority = "person-1" }]
    "#;

    fn definitions() -> BTreeMap<String, RelationDefinition> {
        BTreeMap::from([
            (
                "authors".into(),
                RelationDefinition {
                    kind: RelationKind::Authority,
                    field: "dc.contributor.author".parse().unwrap(),
                    entity_type: Some("Person".into()),
                    limit: None,
                },
            ),
            (
                "publications".into(),
                RelationDefinition {
                    kind: RelationKind::Search,
                    field: "dc.contributor.author".parse().unwrap(),
                    entity_type: Some("Publication".into()),
                    limit: None,
                },
            ),
        ])
    }

    fn ids(records: Vec<MetadataRecord>) -> Vec<String> {
        records.into_iter().map(|record| record.id).collect()
    }

    #[test]
    fn follow_authority_links() -> anyhow::Result<()> {
        let store: RecordStore = RECORDS.parse()?;
        let definitions = definitions();
        let resolver = RelationResolver::new(&definitions, Some(&store));
        let subject = store.get("pub-1").cloned().unwrap_or_default();

        assert_eq!(ids(resolver.resolve("authors", &subject)?), vec!["person-1", "person-2"]);

        Ok(())
    }

    #[test]
    fn search_back_links() -> anyhow::Result<()> {
        let store: RecordStore = RECORDS.parse()?;
        let definitions = definitions();
        let resolver = RelationResolver::new(&definitions, Some(&store));
        let subject = store.get("person-1").cloned().unwrap_or_default();

        assert_eq!(ids(resolver.resolve("publications", &subject)?), vec!["pub-1", "pub-2"]);

        Ok(())
    }

    #[test]
    fn reject_unconfigured_relation() -> anyhow::Result<()> {
        let store: RecordStore = RECORDS.parse()?;
        let definitions = definitions();
        let resolver = RelationResolver::new(&definitions, Some(&store));
        let result = resolver.resolve("projects", &MetadataRecord::new("person-1"));
        assert_eq!(result, Err(RelationError::Unconfigured("projects".into())));

        let sourceless = RelationResolver::new(&definitions, None);
        let result = sourceless.resolve("authors", &MetadataRecord::new("pub-1"));
        assert_eq!(result, Err(RelationError::NoSource("authors".into())));

        Ok(())
    }
}
