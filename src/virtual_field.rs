// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Virtual field registry.
//!
//! A __virtual field__ is a template field whose values are computed from the
//! metadata of a record instead of being read from it directly, e.g., a
//! reformatted date, a formatted citation, or a synthesized DOI. Templates
//! refer to them through `@virtual.<name>[.<args>]@` directives.
//!
//! Virtual fields are registered by name into a [`VirtualFieldRegistry`] once,
//! when the exporter is built. Templates are validated against the registry
//! at load time, so an unknown name never reaches rendering. Resolvers are
//! read-only on the record they are given.
//!
//! # Field Cache
//!
//! The same virtual field is often referenced several times by one template.
//! Each render call owns a fresh [`FieldCache`] that memoizes resolved values
//! by record and directive. The cache is never shared between calls.

pub mod citation;
pub mod converter;
pub mod date;
pub mod identifier;
pub mod vocabulary;

use crate::{
    config::CrosswalkConfig,
    record::MetadataRecord,
    template::token::VirtualFieldRef,
    virtual_field::{
        citation::CitationField,
        converter::MapConverterField,
        date::DateField,
        identifier::{DoiField, HandleField, IdField},
        vocabulary::VocabularyField,
    },
};

use std::{
    collections::{BTreeMap, HashMap},
    fmt::{Debug, Formatter, Result as FmtResult},
};
use tracing::debug;

/// Compute derived values for a record.
pub trait VirtualField: Send + Sync {
    /// Check directive arguments when a template is loaded.
    ///
    /// # Errors
    ///
    /// - Return [`VirtualFieldError::InvalidArguments`] if arguments cannot
    ///   be used by this virtual field.
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        let _ = field;
        Ok(())
    }

    /// Compute zero or more values for record.
    ///
    /// # Errors
    ///
    /// - Return [`VirtualFieldError::Resolve`] if values cannot be computed.
    fn resolve(&self, record: &MetadataRecord, field: &VirtualFieldRef) -> Result<Vec<String>>;
}

/// Name to virtual field mapping.
#[derive(Default)]
pub struct VirtualFieldRegistry {
    fields: BTreeMap<String, Box<dyn VirtualField>>,
}

impl VirtualFieldRegistry {
    /// Construct new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct registry holding every built-in virtual field.
    ///
    /// Built-in fields that need settings (date formats, converters, DOI
    /// prefix) take them from the configuration here, once.
    pub fn with_defaults(config: &CrosswalkConfig) -> Self {
        let mut registry = Self::new();
        registry.register("id", IdField);
        registry.register("handle", HandleField);
        registry.register("date", DateField::new(config.date_formats.clone()));
        registry.register("vocabulary", VocabularyField);
        registry.register(
            "mapConverter",
            MapConverterField::new(config.converters.clone()),
        );
        registry.register("citation", CitationField);
        registry.register("doi", DoiField::new(config.doi.clone()));
        registry
    }

    /// Register virtual field under name.
    ///
    /// Replaces any virtual field already registered under the same name.
    pub fn register(&mut self, name: impl Into<String>, field: impl VirtualField + 'static) {
        let name = name.into();
        debug!("register virtual field {name:?}");
        self.fields.insert(name, Box::new(field));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Check that directive names a registered virtual field with usable
    /// arguments.
    ///
    /// # Errors
    ///
    /// - Return [`VirtualFieldError::Unknown`] if name is not registered.
    /// - Return [`VirtualFieldError::InvalidArguments`] if arguments are
    ///   rejected by the virtual field.
    pub fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        self.lookup(field)?.validate(field)
    }

    /// Resolve directive for record through cache.
    ///
    /// # Errors
    ///
    /// - Return [`VirtualFieldError::Unknown`] if name is not registered.
    /// - Return [`VirtualFieldError::Resolve`] if resolution fails.
    pub fn resolve(
        &self,
        field: &VirtualFieldRef,
        record: &MetadataRecord,
        cache: &mut FieldCache,
    ) -> Result<Vec<String>> {
        let key = CacheKey {
            record: record.id.clone(),
            field: field.clone(),
        };
        if let Some(values) = cache.values.get(&key) {
            return Ok(values.clone());
        }

        let values = self.lookup(field)?.resolve(record, field)?;
        cache.values.insert(key, values.clone());
        Ok(values)
    }

    fn lookup(&self, field: &VirtualFieldRef) -> Result<&dyn VirtualField> {
        self.fields
            .get(&field.name)
            .map(|resolver| &**resolver)
            .ok_or_else(|| VirtualFieldError::Unknown(field.name.clone()))
    }
}

impl Debug for VirtualFieldRegistry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_set().entries(self.fields.keys()).finish()
    }
}

/// Per-call memo of resolved virtual field values.
#[derive(Debug, Default)]
pub struct FieldCache {
    values: HashMap<CacheKey, Vec<String>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    record: String,
    field: VirtualFieldRef,
}

/// Virtual field error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VirtualFieldError {
    /// No virtual field registered under name.
    #[error("virtual field {0:?} is not registered")]
    Unknown(String),

    /// Directive arguments are unusable.
    #[error("invalid arguments for virtual field {name:?}: {reason}")]
    InvalidArguments { name: String, reason: String },

    /// Values cannot be computed.
    #[error("virtual field {name:?} failed to resolve: {reason}")]
    Resolve { name: String, reason: String },
}

impl VirtualFieldError {
    pub(crate) fn invalid(field: &VirtualFieldRef, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            name: field.name.clone(),
            reason: reason.into(),
        }
    }

    /// Report that field cannot compute values for a record.
    ///
    /// Meant for virtual fields registered by the host, e.g., ones backed by
    /// an external service that may be unavailable.
    pub fn resolve(field: &VirtualFieldRef, reason: impl Into<String>) -> Self {
        Self::Resolve {
            name: field.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = VirtualFieldError> = std::result::Result<T, E>;

/// Require exact number of directive arguments.
pub(crate) fn expect_arguments(field: &VirtualFieldRef, count: usize) -> Result<()> {
    if field.args.len() != count {
        return Err(VirtualFieldError::invalid(
            field,
            format!("expected {count} arguments, found {}", field.args.len()),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct CountingField(Arc<AtomicUsize>);

    impl VirtualField for CountingField {
        fn resolve(&self, record: &MetadataRecord, _: &VirtualFieldRef) -> Result<Vec<String>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("computed-{}", record.id)])
        }
    }

    fn directive(name: &str) -> VirtualFieldRef {
        VirtualFieldRef {
            name: name.into(),
            args: vec![],
        }
    }

    #[test]
    fn resolve_memoizes_per_record() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = VirtualFieldRegistry::new();
        registry.register("counting", CountingField(calls.clone()));

        let first = MetadataRecord::new("1");
        let second = MetadataRecord::new("2");
        let mut cache = FieldCache::new();
        let field = directive("counting");

        assert_eq!(registry.resolve(&field, &first, &mut cache)?, vec!["computed-1"]);
        assert_eq!(registry.resolve(&field, &first, &mut cache)?, vec!["computed-1"]);
        assert_eq!(registry.resolve(&field, &second, &mut cache)?, vec!["computed-2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);

        Ok(())
    }

    #[test]
    fn reject_unregistered_field() {
        let registry = VirtualFieldRegistry::new();
        let result = registry.validate(&directive("missing"));
        assert_eq!(result, Err(VirtualFieldError::Unknown("missing".into())));
    }

    #[test]
    fn defaults_register_builtin_fields() {
        let registry = VirtualFieldRegistry::with_defaults(&CrosswalkConfig::default());
        let result = registry.names().collect::<Vec<_>>();
        assert_eq!(
            result,
            vec!["citation", "date", "doi", "handle", "id", "mapConverter", "vocabulary"]
        );
    }
}
