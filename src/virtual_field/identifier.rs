// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Identifier virtual fields.

use crate::{
    config::DoiSettings,
    record::{FieldKey, MetadataRecord},
    template::token::VirtualFieldRef,
    virtual_field::{expect_arguments, Result, VirtualField},
};

const DOI_SCHEME: &str = "doi:";
const DOI_RESOLVERS: [&str; 4] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
];

/// Id of record, e.g., `@virtual.id@`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdField;

impl VirtualField for IdField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        expect_arguments(field, 0)
    }

    fn resolve(&self, record: &MetadataRecord, _: &VirtualFieldRef) -> Result<Vec<String>> {
        Ok(vec![record.id.clone()])
    }
}

/// Handle of record, e.g., `@virtual.handle@`.
///
/// Yields no value for records without a handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandleField;

impl VirtualField for HandleField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        expect_arguments(field, 0)
    }

    fn resolve(&self, record: &MetadataRecord, _: &VirtualFieldRef) -> Result<Vec<String>> {
        Ok(record.handle.iter().cloned().collect())
    }
}

/// DOI of record, e.g., `@virtual.doi@`.
///
/// Uses the stored `dc.identifier.doi` value stripped of any `doi:` scheme
/// or resolver URL. Records without one get a DOI synthesized from the
/// configured prefix and namespace, `<prefix>/<namespace>-<id>`. No value is
/// produced when neither is available.
#[derive(Debug, Default, Clone)]
pub struct DoiField {
    settings: DoiSettings,
}

impl DoiField {
    pub fn new(settings: DoiSettings) -> Self {
        Self { settings }
    }

    fn synthesize(&self, record: &MetadataRecord) -> Option<String> {
        let prefix = self.settings.prefix.as_deref()?;
        let suffix = match self.settings.namespace.as_deref() {
            Some(namespace) => format!("{namespace}-{}", record.id),
            None => record.id.clone(),
        };

        Some(format!("{prefix}/{suffix}"))
    }
}

impl VirtualField for DoiField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        expect_arguments(field, 0)
    }

    fn resolve(&self, record: &MetadataRecord, _: &VirtualFieldRef) -> Result<Vec<String>> {
        let stored = FieldKey::known("dc", "identifier", Some("doi"));
        let doi = match record.first_value(&stored) {
            Some(doi) => Some(normalize_doi(doi)),
            None => self.synthesize(record),
        };

        Ok(doi.into_iter().collect())
    }
}

fn normalize_doi(doi: &str) -> String {
    let doi = doi.trim();
    if let Some(scheme) = doi.get(..DOI_SCHEME.len()) {
        if scheme.eq_ignore_ascii_case(DOI_SCHEME) {
            return doi[DOI_SCHEME.len()..].to_string();
        }
    }

    DOI_RESOLVERS
        .iter()
        .find_map(|resolver| doi.strip_prefix(resolver))
        .unwrap_or(doi)
        .to_string()
}
