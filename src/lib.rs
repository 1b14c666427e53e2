// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Template driven metadata export.
//!
//! Records are exported through __profiles__. Each profile pairs a template
//! file with a serializer: line templates render plain text, XML, JSON, or a
//! paginated document, and column templates render CSV or spreadsheet tables.
//! Templates are loaded and validated once, when the [`Exporter`] is built.
//!
//! ```text
//! <person>
//!   <name>@dc.title@</name>
//!   @group.oairecerif.person.affiliation.start@
//!   <affiliation>@oairecerif.person.affiliation@</affiliation>
//!   <role>@oairecerif.affiliation.role@</role>
//!   @group.oairecerif.person.affiliation.end@
//!   @relation.publications.start@
//!   <publication>@virtual.citation@</publication>
//!   @relation.publications.end@
//! </person>
//! ```

pub mod condition;
pub mod config;
pub mod crosswalk;
pub mod exporter;
pub mod interpret;
pub mod path;
pub mod record;
pub mod relation;
pub mod store;
pub mod template;
pub mod virtual_field;

pub use config::CrosswalkConfig;
pub use crosswalk::{Crosswalk, CrosswalkError};
pub use exporter::{Export, ExportError, Exporter};
pub use record::{FieldKey, MetadataRecord, MetadataValue, PLACEHOLDER_VALUE};
pub use store::{DiscoveryQuery, RecordSource, RecordStore};
