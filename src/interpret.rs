// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Template interpretation.
//!
//! Walk a parsed [`Template`] against a record, substituting metadata values
//! for directives and expanding blocks:
//!
//! - Literal lines are emitted unchanged.
//! - Field and virtual field lines are emitted once per value, and dropped
//!   when there is no value.
//! - Metadata groups repeat their body once per value of the driving field,
//!   and each field line takes the value at the index of the repetition.
//! - Relation groups render their body against every related record.
//! - Conditional blocks render their whole body or nothing at all.
//!
//! Problems with a single record never abort rendering. A grouped field with
//! no value at some repetition skips its line for that repetition only.
//! Relations that cannot be followed and virtual fields that fail to resolve
//! render nothing. Each of these is logged as a warning.

use crate::{
    condition::ConditionRegistry,
    record::{FieldKey, MetadataRecord, MetadataValue},
    relation::RelationResolver,
    template::{block_end, token::FieldToken, Template, TemplateLine},
    virtual_field::{FieldCache, VirtualFieldRegistry},
};

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Escaping applied to values substituted into template lines.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Escape {
    /// Values are substituted verbatim.
    #[default]
    None,

    /// Values are escaped as XML character data.
    Xml,

    /// Values are escaped as the inside of a JSON string.
    Json,
}

impl Escape {
    /// Escape value.
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::None => value.to_string(),
            Self::Xml => quick_xml::escape::escape(value).into_owned(),
            Self::Json => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted
                    .strip_prefix('"')
                    .and_then(|quoted| quoted.strip_suffix('"'))
                    .unwrap_or(&quoted)
                    .to_string()
            }
        }
    }
}

/// Everything a template needs to resolve directives.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub virtuals: &'a VirtualFieldRegistry,
    pub conditions: &'a ConditionRegistry,
    pub relations: RelationResolver<'a>,
}

/// Render templates into lines.
#[derive(Clone, Copy)]
pub struct Interpreter<'a> {
    env: Environment<'a>,
    escape: Escape,
}

impl<'a> Interpreter<'a> {
    pub fn new(env: Environment<'a>, escape: Escape) -> Self {
        Self { env, escape }
    }

    /// Render template against record.
    ///
    /// Virtual field values are memoized for the duration of this call only.
    #[instrument(skip_all, fields(record = %record.id), level = "debug")]
    pub fn render(&self, template: &Template, record: &MetadataRecord) -> Vec<String> {
        let mut cache = FieldCache::new();
        let mut output = Vec::new();
        self.walk(template.lines(), record, &mut cache, &mut output);
        output
    }

    fn walk(
        &self,
        lines: &[TemplateLine],
        record: &MetadataRecord,
        cache: &mut FieldCache,
        output: &mut Vec<String>,
    ) {
        let mut cursor = 0;
        while cursor < lines.len() {
            let line = &lines[cursor];
            let Some(token) = &line.token else {
                output.push(line.before.clone());
                cursor += 1;
                continue;
            };

            if !token.is_block_start() {
                // INVARIANT: Stray end markers were rejected at load time.
                if !token.is_block_end() {
                    for value in self.line_values(line, record, cache) {
                        output.push(line.render(&value));
                    }
                }
                cursor += 1;
                continue;
            }

            let Some(end) = block_end(lines, cursor) else {
                warn!("line {}: block {token} is never closed", line.number);
                cursor += 1;
                continue;
            };
            let body = &lines[cursor + 1..end];

            match token {
                FieldToken::GroupStart(field) => self.walk_group(field, body, record, cache, output),
                FieldToken::RelationStart(name) => match self.env.relations.resolve(name, record) {
                    Ok(related) => {
                        for related in &related {
                            self.walk(body, related, cache, output);
                        }
                    }
                    Err(error) => warn!("record {:?}: {error}", record.id),
                },
                FieldToken::IfStart(condition) => match self.env.conditions.evaluate(record, condition) {
                    Ok(true) => self.walk(body, record, cache, output),
                    Ok(false) => {}
                    Err(error) => warn!("record {:?}: {error}", record.id),
                },
                _ => {}
            }

            cursor = end + 1;
        }
    }

    fn walk_group(
        &self,
        driving: &FieldKey,
        body: &[TemplateLine],
        record: &MetadataRecord,
        cache: &mut FieldCache,
        output: &mut Vec<String>,
    ) {
        let count = record.values(driving).len();
        let columns = body
            .iter()
            .map(|line| {
                line.token.as_ref()?;
                let values = self.line_values(line, record, cache);
                if values.len() > count {
                    warn!(
                        "record {:?}: line {} has {} values, but group {driving} has {count}, ignoring the rest",
                        record.id,
                        line.number,
                        values.len()
                    );
                }
                Some(values)
            })
            .collect::<Vec<_>>();

        for index in 0..count {
            for (line, column) in body.iter().zip(&columns) {
                match column {
                    None => output.push(line.before.clone()),
                    Some(values) => match values.get(index) {
                        Some(value) => output.push(line.render(value)),
                        None => warn!(
                            "record {:?}: line {} has no value at index {index} of group {driving}, skipping",
                            record.id, line.number
                        ),
                    },
                }
            }
        }
    }

    fn line_values(&self, line: &TemplateLine, record: &MetadataRecord, cache: &mut FieldCache) -> Vec<String> {
        match &line.token {
            Some(token) => self.values(token, record, cache),
            None => Vec::new(),
        }
    }

    /// Escaped values substituted for field or virtual field directive.
    ///
    /// Placeholders are kept as empty strings. Any other directive has no
    /// values.
    pub fn values(&self, token: &FieldToken, record: &MetadataRecord, cache: &mut FieldCache) -> Vec<String> {
        let values: Vec<String> = match token {
            FieldToken::Field(field) => record
                .values(field)
                .iter()
                .map(MetadataValue::display)
                .map(str::to_string)
                .collect(),
            FieldToken::Virtual(field) => match self.env.virtuals.resolve(field, record, cache) {
                Ok(values) => values,
                Err(error) => {
                    warn!("record {:?}: {error}", record.id);
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        values.iter().map(|value| self.escape.apply(value)).collect()
    }
}
