// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hierarchical vocabulary virtual field.

use crate::{
    record::{FieldKey, MetadataRecord},
    template::token::VirtualFieldRef,
    virtual_field::{expect_arguments, Result, VirtualField, VirtualFieldError},
};

/// Separator between levels of a hierarchical vocabulary term.
pub const VOCABULARY_SEPARATOR: &str = "::";

/// Pick one level of hierarchical vocabulary terms.
///
/// Form is `@virtual.vocabulary.<field>.<index>@`. Every value of field is
/// split on [`VOCABULARY_SEPARATOR`], and the level at index is emitted.
/// Indexes past the deepest level pick the leaf. Negative indexes count from
/// the deepest level, so `-1` also picks the leaf, and values without enough
/// levels for a negative index are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct VocabularyField;

impl VocabularyField {
    fn arguments(field: &VirtualFieldRef) -> Result<(FieldKey, i64)> {
        expect_arguments(field, 2)?;
        let key = FieldKey::from_dashed(&field.args[0])
            .map_err(|err| VirtualFieldError::invalid(field, err.to_string()))?;
        let index = field.args[1].parse::<i64>().map_err(|_| {
            VirtualFieldError::invalid(field, format!("{:?} is not an index", field.args[1]))
        })?;

        Ok((key, index))
    }
}

impl VirtualField for VocabularyField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        Self::arguments(field).map(|_| ())
    }

    fn resolve(&self, record: &MetadataRecord, field: &VirtualFieldRef) -> Result<Vec<String>> {
        let (key, index) = Self::arguments(field)?;
        let values = record
            .values(&key)
            .iter()
            .filter(|value| !value.is_placeholder())
            .filter_map(|value| {
                let levels = value.value.split(VOCABULARY_SEPARATOR).collect::<Vec<_>>();
                let position = if index < 0 {
                    levels.len().checked_sub(index.unsigned_abs() as usize)?
                } else {
                    (index as usize).min(levels.len().saturating_sub(1))
                };
                levels.get(position).map(|level| level.to_string())
            })
            .collect();

        Ok(values)
    }
}
