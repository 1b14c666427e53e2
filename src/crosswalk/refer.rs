// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Line template serialization.
//!
//! Renders plain text, XML, or JSON through a line template. A multi-record
//! export wraps the rendered records with the header and footer lines of the
//! profile, and appends the profile separator to the last line of every
//! record but the last.

use crate::{
    config::ProfileDefinition,
    crosswalk::{join_lines, Crosswalk, Result},
    interpret::{Environment, Escape, Interpreter},
    record::MetadataRecord,
    template::Template,
};

use tracing::{debug, instrument};

/// Line template crosswalk.
#[derive(Debug, Clone)]
pub struct ReferCrosswalk {
    profile: ProfileDefinition,
    template: Template,
}

impl ReferCrosswalk {
    pub fn new(profile: ProfileDefinition, template: Template) -> Self {
        Self { profile, template }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    fn render(&self, env: Environment<'_>, record: &MetadataRecord) -> Result<Vec<String>> {
        self.ensure_supported(record)?;
        let mut lines = Interpreter::new(env, self.profile.escape).render(&self.template, record);
        if self.profile.escape == Escape::Json {
            strip_trailing_commas(&mut lines);
        }

        Ok(lines)
    }
}

impl Crosswalk for ReferCrosswalk {
    fn profile(&self) -> &ProfileDefinition {
        &self.profile
    }

    #[instrument(skip_all, fields(profile = %self.profile.name, record = %record.id))]
    fn disseminate_one(&self, env: Environment<'_>, record: &MetadataRecord) -> Result<Vec<u8>> {
        let lines = self.render(env, record)?;
        Ok(join_lines(&lines))
    }

    #[instrument(skip_all, fields(profile = %self.profile.name, records = records.len()))]
    fn disseminate_all(&self, env: Environment<'_>, records: &[MetadataRecord]) -> Result<Vec<u8>> {
        let (header, footer, separator) = self.profile.layout();
        let mut output = Vec::new();
        output.extend(header.map(str::to_string));

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let lines = self.render(env, record)?;
            if lines.is_empty() {
                debug!("record {:?} rendered nothing", record.id);
                continue;
            }
            items.push(lines);
        }

        let count = items.len();
        for (index, mut lines) in items.into_iter().enumerate() {
            if let (Some(separator), Some(last)) = (separator, lines.last_mut()) {
                if index + 1 < count {
                    last.push_str(separator);
                }
            }
            output.extend(lines);
        }

        output.extend(footer.map(str::to_string));
        Ok(join_lines(&output))
    }
}

/// Remove trailing comma of lines followed by a closing bracket.
///
/// Templates list JSON members one per line with a comma behind each of
/// them. Members that render nothing would otherwise leave a dangling comma
/// in front of the closing `}` or `]`.
pub fn strip_trailing_commas(lines: &mut [String]) {
    for index in 0..lines.len() {
        if !lines[index].trim_end().ends_with(',') {
            continue;
        }

        let closes = lines[index + 1..]
            .iter()
            .map(|line| line.trim_start())
            .find(|line| !line.is_empty())
            .is_some_and(|line| line.starts_with(['}', ']']));
        if !closes {
            continue;
        }

        let line = &mut lines[index];
        let trimmed = line.trim_end().len();
        line.truncate(trimmed - 1);
    }
}
