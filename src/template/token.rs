// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Field directive classification.
//!
//! Every directive found between `@` delimiters in a template line is a
//! __field token__. A token is classified purely by reserved prefix:
//!
//! - `group.<field>.start` and `group.<field>.end` delimit a metadata group.
//! - `relation.<name>.start` and `relation.<name>.end` delimit a relation group.
//! - `if.[not.]<condition>[.<args>].start` and `.end` delimit a conditional.
//! - `virtual.<name>[.<args>]` names a virtual field.
//! - Anything else must be a plain metadata field path.
//!
//! A token carrying a reserved prefix but not matching its form is rejected,
//! so every token falls into exactly one category.

use crate::record::{FieldKey, FieldKeyError};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

const GROUP_PREFIX: &str = "group.";
const RELATION_PREFIX: &str = "relation.";
const IF_PREFIX: &str = "if.";
const VIRTUAL_PREFIX: &str = "virtual.";
const NOT_PREFIX: &str = "not.";
const START_SUFFIX: &str = ".start";
const END_SUFFIX: &str = ".end";

/// Classified field directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldToken {
    /// Start of metadata group driven by field.
    GroupStart(FieldKey),

    /// End of metadata group driven by field.
    GroupEnd(FieldKey),

    /// Start of relation group.
    RelationStart(String),

    /// End of relation group.
    RelationEnd(String),

    /// Start of conditional block.
    IfStart(ConditionRef),

    /// End of conditional block.
    IfEnd(ConditionRef),

    /// Computed field.
    Virtual(VirtualFieldRef),

    /// Stored metadata field.
    Field(FieldKey),
}

impl FieldToken {
    /// Token opens a block.
    pub fn is_block_start(&self) -> bool {
        matches!(
            self,
            Self::GroupStart(_) | Self::RelationStart(_) | Self::IfStart(_)
        )
    }

    /// Token closes a block.
    pub fn is_block_end(&self) -> bool {
        matches!(
            self,
            Self::GroupEnd(_) | Self::RelationEnd(_) | Self::IfEnd(_)
        )
    }

    /// Check if this token is the end marker for a start marker.
    pub fn closes(&self, start: &FieldToken) -> bool {
        match (start, self) {
            (Self::GroupStart(open), Self::GroupEnd(close)) => open == close,
            (Self::RelationStart(open), Self::RelationEnd(close)) => open == close,
            (Self::IfStart(open), Self::IfEnd(close)) => open == close,
            _ => false,
        }
    }
}

impl FromStr for FieldToken {
    type Err = TokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = token.strip_prefix(GROUP_PREFIX) {
            let (body, is_start) = split_marker(token, rest)?;
            let field: FieldKey = body.parse().map_err(|err| TokenError::Field {
                token: token.to_string(),
                source: err,
            })?;
            return Ok(if is_start {
                Self::GroupStart(field)
            } else {
                Self::GroupEnd(field)
            });
        }

        if let Some(rest) = token.strip_prefix(RELATION_PREFIX) {
            let (name, is_start) = split_marker(token, rest)?;
            return Ok(if is_start {
                Self::RelationStart(name.to_string())
            } else {
                Self::RelationEnd(name.to_string())
            });
        }

        if let Some(rest) = token.strip_prefix(IF_PREFIX) {
            let (body, is_start) = split_marker(token, rest)?;
            let (negated, body) = match body.strip_prefix(NOT_PREFIX) {
                Some(body) => (true, body),
                None => (false, body),
            };
            let (name, args) = split_arguments(token, body)?;
            let condition = ConditionRef {
                negated,
                name,
                args,
            };
            return Ok(if is_start {
                Self::IfStart(condition)
            } else {
                Self::IfEnd(condition)
            });
        }

        if let Some(rest) = token.strip_prefix(VIRTUAL_PREFIX) {
            let (name, args) = split_arguments(token, rest)?;
            return Ok(Self::Virtual(VirtualFieldRef { name, args }));
        }

        token
            .parse()
            .map(Self::Field)
            .map_err(|err| TokenError::Field {
                token: token.to_string(),
                source: err,
            })
    }
}

impl Display for FieldToken {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::GroupStart(field) => write!(fmt, "{GROUP_PREFIX}{field}{START_SUFFIX}"),
            Self::GroupEnd(field) => write!(fmt, "{GROUP_PREFIX}{field}{END_SUFFIX}"),
            Self::RelationStart(name) => write!(fmt, "{RELATION_PREFIX}{name}{START_SUFFIX}"),
            Self::RelationEnd(name) => write!(fmt, "{RELATION_PREFIX}{name}{END_SUFFIX}"),
            Self::IfStart(condition) => write!(fmt, "{IF_PREFIX}{condition}{START_SUFFIX}"),
            Self::IfEnd(condition) => write!(fmt, "{IF_PREFIX}{condition}{END_SUFFIX}"),
            Self::Virtual(field) => write!(fmt, "{VIRTUAL_PREFIX}{field}"),
            Self::Field(field) => write!(fmt, "{field}"),
        }
    }
}

/// Reference to a registered condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionRef {
    /// Invert result of condition.
    pub negated: bool,

    /// Registered condition name.
    pub name: String,

    /// Arguments passed to condition.
    pub args: Vec<String>,
}

impl Display for ConditionRef {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.negated {
            fmt.write_str(NOT_PREFIX)?;
        }
        write_arguments(fmt, &self.name, &self.args)
    }
}

/// Reference to a registered virtual field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualFieldRef {
    /// Registered virtual field name.
    pub name: String,

    /// Arguments passed to virtual field.
    pub args: Vec<String>,
}

impl Display for VirtualFieldRef {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write_arguments(fmt, &self.name, &self.args)
    }
}

fn write_arguments(fmt: &mut Formatter<'_>, name: &str, args: &[String]) -> FmtResult {
    fmt.write_str(name)?;
    for arg in args {
        write!(fmt, ".{arg}")?;
    }
    Ok(())
}

fn split_marker<'a>(token: &str, rest: &'a str) -> Result<(&'a str, bool), TokenError> {
    let (body, is_start) = if let Some(body) = rest.strip_suffix(START_SUFFIX) {
        (body, true)
    } else if let Some(body) = rest.strip_suffix(END_SUFFIX) {
        (body, false)
    } else {
        return Err(TokenError::Malformed {
            token: token.to_string(),
            reason: "block marker must end with \".start\" or \".end\"".into(),
        });
    };

    if body.is_empty() {
        return Err(TokenError::Malformed {
            token: token.to_string(),
            reason: "block marker is missing its name".into(),
        });
    }

    Ok((body, is_start))
}

fn split_arguments(token: &str, body: &str) -> Result<(String, Vec<String>), TokenError> {
    let mut parts = body.split('.');
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(TokenError::Malformed {
            token: token.to_string(),
            reason: "missing name".into(),
        });
    }

    Ok((name.to_string(), parts.map(str::to_string).collect()))
}

/// Field token classification error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Token uses a reserved prefix incorrectly.
    #[error("malformed directive {token:?}: {reason}")]
    Malformed { token: String, reason: String },

    /// Token names an invalid metadata field.
    #[error("directive {token:?} does not name a valid metadata field")]
    Field {
        token: String,
        #[source]
        source: FieldKeyError,
    },
}
