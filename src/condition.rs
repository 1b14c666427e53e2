// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Conditional block predicates.
//!
//! Templates render `@if.[not.]<condition>[.<args>].start@` blocks only when
//! the named condition holds for the record being rendered. Conditions are
//! registered by name into a [`ConditionRegistry`], and directives are checked
//! against it when a template is loaded.

use crate::{
    record::{FieldKey, MetadataRecord},
    template::token::ConditionRef,
};

use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
};
use tracing::debug;

/// Predicate over a record.
pub trait Condition: Send + Sync {
    /// Check directive arguments when a template is loaded.
    ///
    /// # Errors
    ///
    /// - Return [`ConditionError::InvalidArguments`] if arguments cannot be
    ///   used by this condition.
    fn validate(&self, condition: &ConditionRef) -> Result<()>;

    /// Test record against condition, ignoring negation.
    fn test(&self, record: &MetadataRecord, condition: &ConditionRef) -> bool;
}

/// Name to condition mapping.
#[derive(Default)]
pub struct ConditionRegistry {
    conditions: BTreeMap<String, Box<dyn Condition>>,
}

impl ConditionRegistry {
    /// Construct new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct registry holding every built-in condition.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("exists", ExistsCondition);
        registry.register("authority", AuthorityCondition);
        registry.register("entityType", EntityTypeCondition);
        registry
    }

    /// Register condition under name.
    pub fn register(&mut self, name: impl Into<String>, condition: impl Condition + 'static) {
        let name = name.into();
        debug!("register condition {name:?}");
        self.conditions.insert(name, Box::new(condition));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Check that directive names a registered condition with usable
    /// arguments.
    ///
    /// # Errors
    ///
    /// - Return [`ConditionError::Unknown`] if name is not registered.
    /// - Return [`ConditionError::InvalidArguments`] if arguments are
    ///   rejected by the condition.
    pub fn validate(&self, condition: &ConditionRef) -> Result<()> {
        self.lookup(condition)?.validate(condition)
    }

    /// Evaluate directive against record, applying negation.
    ///
    /// # Errors
    ///
    /// - Return [`ConditionError::Unknown`] if name is not registered.
    pub fn evaluate(&self, record: &MetadataRecord, condition: &ConditionRef) -> Result<bool> {
        let holds = self.lookup(condition)?.test(record, condition);
        Ok(holds != condition.negated)
    }

    fn lookup(&self, condition: &ConditionRef) -> Result<&dyn Condition> {
        self.conditions
            .get(&condition.name)
            .map(|found| &**found)
            .ok_or_else(|| ConditionError::Unknown(condition.name.clone()))
    }
}

impl Debug for ConditionRegistry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_set().entries(self.conditions.keys()).finish()
    }
}

/// Field has at least one value, e.g., `@if.exists.dc-title.start@`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExistsCondition;

impl Condition for ExistsCondition {
    fn validate(&self, condition: &ConditionRef) -> Result<()> {
        field_argument(condition).map(|_| ())
    }

    fn test(&self, record: &MetadataRecord, condition: &ConditionRef) -> bool {
        field_argument(condition)
            .map(|key| !record.values(&key).is_empty())
            .unwrap_or(false)
    }
}

/// Some value of field links to another record, e.g.,
/// `@if.authority.dc-contributor-author.start@`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorityCondition;

impl Condition for AuthorityCondition {
    fn validate(&self, condition: &ConditionRef) -> Result<()> {
        field_argument(condition).map(|_| ())
    }

    fn test(&self, record: &MetadataRecord, condition: &ConditionRef) -> bool {
        field_argument(condition)
            .map(|key| record.values(&key).iter().any(|value| value.authority.is_some()))
            .unwrap_or(false)
    }
}

/// Record is of entity type, e.g., `@if.entityType.Person.start@`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityTypeCondition;

impl Condition for EntityTypeCondition {
    fn validate(&self, condition: &ConditionRef) -> Result<()> {
        match condition.args.as_slice() {
            [_] => Ok(()),
            _ => Err(ConditionError::invalid(condition, "expected one entity type")),
        }
    }

    fn test(&self, record: &MetadataRecord, condition: &ConditionRef) -> bool {
        match condition.args.as_slice() {
            [entity_type] => record.entity_type.as_deref() == Some(entity_type.as_str()),
            _ => false,
        }
    }
}

fn field_argument(condition: &ConditionRef) -> Result<FieldKey> {
    match condition.args.as_slice() {
        [field] => FieldKey::from_dashed(field).map_err(|err| ConditionError::invalid(condition, err.to_string())),
        _ => Err(ConditionError::invalid(condition, "expected one field")),
    }
}

/// Condition error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// No condition registered under name.
    #[error("condition {0:?} is not registered")]
    Unknown(String),

    /// Directive arguments are unusable.
    #[error("invalid arguments for condition {name:?}: {reason}")]
    InvalidArguments { name: String, reason: String },
}

impl ConditionError {
    pub(crate) fn invalid(condition: &ConditionRef, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            name: condition.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConditionError> = std::result::Result<T, E>;
