// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Value mapping virtual field.

use crate::{
    config::ConverterDefinition,
    record::{FieldKey, MetadataRecord},
    template::token::VirtualFieldRef,
    virtual_field::{expect_arguments, Result, VirtualField, VirtualFieldError},
};

use std::collections::BTreeMap;

/// Translate stored values through a configured converter.
///
/// Form is `@virtual.mapConverter.<converter>.<field>@`. Each value is looked
/// up in the mapping of the converter. Unmapped values fall back to the
/// converter default, or pass through unchanged without one.
#[derive(Debug, Default, Clone)]
pub struct MapConverterField {
    converters: BTreeMap<String, ConverterDefinition>,
}

impl MapConverterField {
    pub fn new(converters: BTreeMap<String, ConverterDefinition>) -> Self {
        Self { converters }
    }

    fn arguments(&self, field: &VirtualFieldRef) -> Result<(&ConverterDefinition, FieldKey)> {
        expect_arguments(field, 2)?;
        let converter = self.converters.get(&field.args[0]).ok_or_else(|| {
            VirtualFieldError::invalid(field, format!("converter {:?} is not configured", field.args[0]))
        })?;
        let key = FieldKey::from_dashed(&field.args[1])
            .map_err(|err| VirtualFieldError::invalid(field, err.to_string()))?;

        Ok((converter, key))
    }
}

impl VirtualField for MapConverterField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        self.arguments(field).map(|_| ())
    }

    fn resolve(&self, record: &MetadataRecord, field: &VirtualFieldRef) -> Result<Vec<String>> {
        let (converter, key) = self.arguments(field)?;
        let values = record
            .values(&key)
            .iter()
            .filter(|value| !value.is_placeholder())
            .map(|value| {
                converter
                    .mapping
                    .get(&value.value)
                    .or(converter.default.as_ref())
                    .unwrap_or(&value.value)
                    .clone()
            })
            .collect();

        Ok(values)
    }
}
