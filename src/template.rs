// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Line template parsing.
//!
//! A __template__ is a plain text file read line by line. Each line may hold
//! at most one __directive__, a token wrapped in `@` delimiters, e.g.,
//! `<title>@dc.title@</title>`. The text in front of and behind the directive
//! is kept verbatim. Lines without a directive are literal output.
//!
//! Only the first directive of a line is recognized. Anything after it,
//! including further `@` pairs, is literal suffix text.
//!
//! # Validation
//!
//! Templates are checked once, at load time, against the virtual field and
//! condition registries of the exporter:
//!
//! - Every virtual field and condition must be registered, and accept the
//!   arguments it is given.
//! - Every block start must be followed by its end marker, and every end
//!   marker must close an open block. The first matching end marker closes
//!   a block.
//! - Metadata groups may only hold field and literal lines.

pub mod token;

use crate::{
    condition::{ConditionError, ConditionRegistry},
    template::token::{FieldToken, TokenError},
    virtual_field::{VirtualFieldError, VirtualFieldRegistry},
};

use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, instrument};

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_\-.*()]+)@").unwrap(/* known good */));

/// Single parsed template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLine {
    /// Literal text in front of directive, or whole line without one.
    pub before: String,

    /// Directive of line.
    pub token: Option<FieldToken>,

    /// Literal text behind directive.
    pub after: String,

    /// One-based line number in template source.
    pub number: usize,
}

impl TemplateLine {
    /// Parse raw template line.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::Token`] if the directive is malformed.
    pub fn parse(raw: &str, number: usize) -> Result<Self> {
        let Some(captures) = DIRECTIVE.captures(raw) else {
            return Ok(Self::literal(raw, number));
        };

        // INVARIANT: Group 0 and 1 always exist on a successful match.
        let (Some(whole), Some(token)) = (captures.get(0), captures.get(1)) else {
            return Ok(Self::literal(raw, number));
        };
        let token = token
            .as_str()
            .parse::<FieldToken>()
            .map_err(|err| TemplateError::Token {
                line: number,
                source: err,
            })?;

        Ok(Self {
            before: raw[..whole.start()].to_string(),
            token: Some(token),
            after: raw[whole.end()..].to_string(),
            number,
        })
    }

    /// Construct line without directive.
    pub fn literal(text: impl Into<String>, number: usize) -> Self {
        Self {
            before: text.into(),
            token: None,
            after: String::new(),
            number,
        }
    }

    /// Substitute value for directive.
    pub fn render(&self, value: &str) -> String {
        format!("{}{value}{}", self.before, self.after)
    }

    pub fn is_literal(&self) -> bool {
        self.token.is_none()
    }
}

impl Display for TemplateLine {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.token {
            Some(token) => write!(fmt, "{}@{token}@{}", self.before, self.after),
            None => fmt.write_str(&self.before),
        }
    }
}

/// Parsed and validated line template.
///
/// # Invariant
///
/// - Every virtual field and condition is registered.
/// - Every block start has a matching end marker.
/// - Metadata groups hold no block markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    lines: Vec<TemplateLine>,
}

impl Template {
    /// Parse and validate template source.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError`] if any line is malformed, names an
    ///   unregistered virtual field or condition, or blocks are unbalanced.
    pub fn parse(
        source: &str,
        virtuals: &VirtualFieldRegistry,
        conditions: &ConditionRegistry,
    ) -> Result<Self> {
        let template = Self::parse_lines(source)?;
        template.validate(virtuals, conditions)?;
        Ok(template)
    }

    /// Parse template source without registry validation.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::Token`] if any directive is malformed.
    pub fn parse_lines(source: &str) -> Result<Self> {
        let lines = source
            .lines()
            .enumerate()
            .map(|(index, raw)| TemplateLine::parse(raw, index + 1))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { lines })
    }

    /// Read, parse, and validate template file.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::Read`] if file cannot be read.
    /// - Return [`TemplateError`] if template is invalid.
    #[instrument(skip(virtuals, conditions), level = "debug")]
    pub fn load(
        path: &Path,
        virtuals: &VirtualFieldRegistry,
        conditions: &ConditionRegistry,
    ) -> Result<Self> {
        let source = read_to_string(path).map_err(|err| TemplateError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;
        let template = Self::parse(&source, virtuals, conditions)?;
        debug!("loaded {} template lines", template.lines.len());

        Ok(template)
    }

    pub fn lines(&self) -> &[TemplateLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn validate(&self, virtuals: &VirtualFieldRegistry, conditions: &ConditionRegistry) -> Result<()> {
        for line in &self.lines {
            match &line.token {
                Some(FieldToken::Virtual(field)) => {
                    virtuals
                        .validate(field)
                        .map_err(|err| TemplateError::VirtualField {
                            line: line.number,
                            source: err,
                        })?
                }
                Some(FieldToken::IfStart(condition)) => {
                    conditions
                        .validate(condition)
                        .map_err(|err| TemplateError::Condition {
                            line: line.number,
                            source: err,
                        })?
                }
                _ => {}
            }
        }

        check_blocks(&self.lines)
    }
}

impl Display for Template {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for line in &self.lines {
            writeln!(fmt, "{line}")?;
        }
        Ok(())
    }
}

/// Find index of line that closes block opened at start.
///
/// Returns `None` if start is not a block start, or the block is never
/// closed.
pub(crate) fn block_end(lines: &[TemplateLine], start: usize) -> Option<usize> {
    let open = lines.get(start)?.token.as_ref().filter(|token| token.is_block_start())?;
    lines[start + 1..]
        .iter()
        .position(|line| line.token.as_ref().is_some_and(|token| token.closes(open)))
        .map(|offset| start + 1 + offset)
}

fn check_blocks(lines: &[TemplateLine]) -> Result<()> {
    let mut cursor = 0;
    while cursor < lines.len() {
        let line = &lines[cursor];
        let Some(token) = &line.token else {
            cursor += 1;
            continue;
        };

        if token.is_block_end() {
            return Err(TemplateError::Unopened {
                line: line.number,
                token: token.to_string(),
            });
        }

        if !token.is_block_start() {
            cursor += 1;
            continue;
        }

        let end = block_end(lines, cursor).ok_or_else(|| TemplateError::Unclosed {
            line: line.number,
            token: token.to_string(),
        })?;
        let body = &lines[cursor + 1..end];

        if matches!(token, FieldToken::GroupStart(_)) {
            let nested = body
                .iter()
                .find(|inner| inner.token.as_ref().is_some_and(|inner| inner.is_block_start() || inner.is_block_end()));
            if let Some(nested) = nested {
                return Err(TemplateError::NestedInGroup {
                    line: nested.number,
                    group: token.to_string(),
                });
            }
        } else {
            check_blocks(body)?;
        }

        cursor = end + 1;
    }

    Ok(())
}

/// Template error types.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template file cannot be read.
    #[error("failed to read template at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directive is malformed.
    #[error("line {line}: invalid directive")]
    Token {
        line: usize,
        #[source]
        source: TokenError,
    },

    /// Virtual field is unknown or given bad arguments.
    #[error("line {line}: invalid virtual field")]
    VirtualField {
        line: usize,
        #[source]
        source: VirtualFieldError,
    },

    /// Condition is unknown or given bad arguments.
    #[error("line {line}: invalid condition")]
    Condition {
        line: usize,
        #[source]
        source: ConditionError,
    },

    /// Block start without end marker.
    #[error("line {line}: block {token:?} is never closed")]
    Unclosed { line: usize, token: String },

    /// End marker without open block.
    #[error("line {line}: {token:?} does not close an open block")]
    Unopened { line: usize, token: String },

    /// Block marker inside metadata group.
    #[error("line {line}: metadata group {group:?} cannot hold nested blocks")]
    NestedInGroup { line: usize, group: String },

    /// Tabular column definition is malformed.
    #[error("line {line}: invalid column, {reason}")]
    InvalidColumn { line: usize, reason: String },
}

/// Friendly result alias :3
pub type Result<T, E = TemplateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrosswalkConfig;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn parse(source: &str) -> Result<Template> {
        let virtuals = VirtualFieldRegistry::with_defaults(&CrosswalkConfig::default());
        let conditions = ConditionRegistry::with_defaults();
        Template::parse(source, &virtuals, &conditions)
    }

    #[test]
    fn split_line_around_first_directive() -> anyhow::Result<()> {
        let result = TemplateLine::parse("  <title>@dc.title@</title> @dc.date.issued@", 3)?;
        let expect = TemplateLine {
            before: "  <title>".into(),
            token: Some(FieldToken::Field("dc.title".parse()?)),
            after: "</title> @dc.date.issued@".into(),
            number: 3,
        };
        assert_eq!(result, expect);
        assert_eq!(result.render("Test"), "  <title>Test</title> @dc.date.issued@");

        Ok(())
    }

    #[test_case("plain text"; "no delimiters")]
    #[test_case("mail me at user@example"; "single delimiter")]
    #[test_case("@ spaced token @"; "token with spaces")]
    #[test_case(""; "empty line")]
    #[test]
    fn keep_literal_lines(raw: &str) {
        let result = TemplateLine::parse(raw, 1).unwrap();
        assert!(result.is_literal());
        pretty_assertions::assert_eq!(result.to_string(), raw);
    }

    #[test]
    fn parse_is_deterministic() -> anyhow::Result<()> {
        let source = indoc! {"
            <person>
              @if.exists.dc-title.start@
              <name>@dc.title@</name>
              @if.exists.dc-title.end@
              @group.oairecerif.person.affiliation.start@
              <affiliation>@oairecerif.person.affiliation@</affiliation>
              <role>@oairecerif.affiliation.role@</role>
              @group.oairecerif.person.affiliation.end@
              @relation.publications.start@
              <publication>@virtual.citation@</publication>
              @relation.publications.end@
            </person>
        "};

        let first = parse(source)?;
        let second = parse(source)?;
        assert_eq!(first, second);
        assert_eq!(first.to_string(), source);

        Ok(())
    }

    #[test]
    fn locate_block_end() -> anyhow::Result<()> {
        let template = parse(indoc! {"
            @if.exists.dc-title.start@
            @dc.title@
            @if.exists.dc-title.end@
        "})?;
        assert_eq!(block_end(template.lines(), 0), Some(2));
        assert_eq!(block_end(template.lines(), 1), None);

        Ok(())
    }

    #[test]
    fn reject_unknown_virtual_field() {
        let result = parse("@virtual.missing@");
        assert!(matches!(
            result,
            Err(TemplateError::VirtualField {
                line: 1,
                source: VirtualFieldError::Unknown(_),
            })
        ));
    }

    #[test]
    fn reject_unknown_condition() {
        let result = parse("\n@if.missing.start@\n@if.missing.end@");
        assert!(matches!(
            result,
            Err(TemplateError::Condition {
                line: 2,
                source: ConditionError::Unknown(_),
            })
        ));
    }

    #[test]
    fn reject_unclosed_block() {
        let result = parse("@relation.authors.start@\n@dc.title@");
        assert!(matches!(result, Err(TemplateError::Unclosed { line: 1, .. })));
    }

    #[test]
    fn reject_unopened_block() {
        let result = parse("@dc.title@\n@group.dc.title.end@");
        assert!(matches!(result, Err(TemplateError::Unopened { line: 2, .. })));
    }

    #[test]
    fn reject_crossed_blocks() {
        let result = parse(indoc! {"
            @if.exists.dc-title.start@
            @relation.authors.start@
            @if.exists.dc-title.end@
            @relation.authors.end@
        "});
        assert!(matches!(result, Err(TemplateError::Unclosed { line: 2, .. })));
    }

    #[test]
    fn reject_block_inside_group() {
        let result = parse(indoc! {"
            @group.dc.contributor.author.start@
            @if.exists.dc-title.start@
            @dc.title@
            @if.exists.dc-title.end@
            @group.dc.contributor.author.end@
        "});
        assert!(matches!(result, Err(TemplateError::NestedInGroup { line: 2, .. })));
    }

    #[test]
    fn allow_blocks_inside_relation_and_condition() -> anyhow::Result<()> {
        parse(indoc! {"
            @relation.authors.start@
            @if.entityType.Person.start@
            @group.oairecerif.person.affiliation.start@
            @oairecerif.person.affiliation@
            @group.oairecerif.person.affiliation.end@
            @if.entityType.Person.end@
            @relation.authors.end@
        "})?;

        Ok(())
    }
}
