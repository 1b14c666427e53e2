// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Date reformatting virtual field.
//!
//! Form is `@virtual.date.<field|TIMESTAMP>.<pattern|format-name>@`. Dates are
//! written with day-month-year letter patterns, e.g., `dd-MM-yyyy`, and
//! converted once into [`chrono`] format strings. Patterns containing a dot
//! are split into several directive arguments, and joined back together.
//!
//! | letters | meaning                          |
//! |---------|----------------------------------|
//! | `yyyy`  | four digit year (`y`, `Y` alike) |
//! | `yy`    | two digit year                   |
//! | `M`     | month without padding            |
//! | `MM`    | zero padded month                |
//! | `MMM`   | abbreviated month name           |
//! | `MMMM`  | full month name                  |
//! | `d` `dd`| day of month                     |
//! | `H` `HH`| hour of day                      |
//! | `m` `mm`| minute                           |
//! | `s` `ss`| second                           |
//!
//! Text inside single quotes is copied literally. Any other letter is
//! rejected when the template is loaded.

use crate::{
    record::{FieldKey, MetadataRecord},
    template::token::VirtualFieldRef,
    virtual_field::{Result, VirtualField, VirtualFieldError},
};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::warn;

/// Argument standing in for the current local time.
pub const TIMESTAMP: &str = "TIMESTAMP";

/// Reformat stored dates.
#[derive(Debug, Default, Clone)]
pub struct DateField {
    formats: BTreeMap<String, String>,
}

impl DateField {
    /// Construct new date field with named formats, i.e., name to pattern.
    pub fn new(formats: BTreeMap<String, String>) -> Self {
        Self { formats }
    }

    fn arguments(&self, field: &VirtualFieldRef) -> Result<(DateSource, String)> {
        let [source, pattern @ ..] = field.args.as_slice() else {
            return Err(VirtualFieldError::invalid(field, "missing date field"));
        };
        if pattern.is_empty() {
            return Err(VirtualFieldError::invalid(field, "missing date pattern"));
        }

        let source = if source == TIMESTAMP {
            DateSource::Now
        } else {
            DateSource::Field(
                FieldKey::from_dashed(source)
                    .map_err(|err| VirtualFieldError::invalid(field, err.to_string()))?,
            )
        };

        let pattern = pattern.join(".");
        let pattern = self.formats.get(&pattern).unwrap_or(&pattern);
        let format = convert_pattern(pattern).map_err(|reason| VirtualFieldError::invalid(field, reason))?;

        Ok((source, format))
    }
}

impl VirtualField for DateField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        self.arguments(field).map(|_| ())
    }

    fn resolve(&self, record: &MetadataRecord, field: &VirtualFieldRef) -> Result<Vec<String>> {
        let (source, format) = self.arguments(field)?;
        let key = match source {
            DateSource::Now => return Ok(vec![Local::now().naive_local().format(&format).to_string()]),
            DateSource::Field(key) => key,
        };

        let values = record
            .values(&key)
            .iter()
            .filter(|value| !value.is_placeholder())
            .filter_map(|value| match parse_date(&value.value) {
                Some(date) => Some(date.format(&format).to_string()),
                None => {
                    warn!("record {:?}: cannot parse {key} value {:?} as date", record.id, value.value);
                    None
                }
            })
            .collect();

        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DateSource {
    Now,
    Field(FieldKey),
}

/// Parse stored date value.
///
/// Accepts RFC 3339 timestamps, local timestamps, and partial dates down to
/// a bare year. Missing parts default to the first month or day.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.naive_local());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(date);
    }

    let padded = match value.len() {
        4 => format!("{value}-01-01"),
        7 => format!("{value}-01"),
        _ => value.to_string(),
    };

    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Convert day-month-year letter pattern into [`chrono`] format string.
///
/// # Errors
///
/// - Return reason if pattern uses an unsupported letter or leaves a quote
///   open.
pub fn convert_pattern(pattern: &str) -> std::result::Result<String, String> {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut format = String::new();
    let mut cursor = 0;

    while cursor < chars.len() {
        let current = chars[cursor];

        if current == '\'' {
            // '' is an escaped quote.
            if chars.get(cursor + 1) == Some(&'\'') {
                format.push('\'');
                cursor += 2;
                continue;
            }

            let Some(close) = chars[cursor + 1..].iter().position(|ch| *ch == '\'') else {
                return Err(format!("unterminated quote in pattern {pattern:?}"));
            };
            for ch in &chars[cursor + 1..cursor + 1 + close] {
                push_literal(&mut format, *ch);
            }
            cursor += close + 2;
            continue;
        }

        if !current.is_ascii_alphabetic() {
            push_literal(&mut format, current);
            cursor += 1;
            continue;
        }

        let run = chars[cursor..].iter().take_while(|ch| **ch == current).count();
        let specifier = match (current, run) {
            ('y' | 'Y', 2) => "%y",
            ('y' | 'Y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            _ => return Err(format!("unsupported letter {current:?} in pattern {pattern:?}")),
        };
        format.push_str(specifier);
        cursor += run;
    }

    Ok(format)
}

fn push_literal(format: &mut String, ch: char) {
    if ch == '%' {
        format.push_str("%%");
    } else {
        format.push(ch);
    }
}
