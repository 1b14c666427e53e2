// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tabular serialization.
//!
//! # Column Templates
//!
//! Tabular exports use their own template form, one column per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! Title=dc.title
//! Issued=virtual.date.dc-date-issued.yyyy
//! Authors=dc.contributor.author,oairecerif.author.affiliation
//! ```
//!
//! Text in front of the first `=` is the column header. Behind it is a comma
//! separated list of plain or virtual fields. A column naming one field
//! joins all values of that field with the value separator. A column naming
//! several fields is a metadata group driven by its first field. Each
//! repetition joins the values at its index with the nested separator, and
//! repetitions are joined with the value separator.
//!
//! Every record becomes one row below a single header row.

use crate::{
    config::{ProfileDefinition, Separators},
    crosswalk::{Crosswalk, Result},
    interpret::{Environment, Escape, Interpreter},
    record::MetadataRecord,
    template::{token::FieldToken, TemplateError},
    virtual_field::{FieldCache, VirtualFieldRegistry},
};

use csv::WriterBuilder;
use rust_xlsxwriter::{Format, Workbook};
use std::{fs::read_to_string, path::Path};
use tracing::{debug, instrument, warn};

/// Single output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header text of column.
    pub header: String,

    /// Plain or virtual fields feeding column.
    pub fields: Vec<FieldToken>,
}

/// Parsed column template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularTemplate {
    columns: Vec<Column>,
}

impl TabularTemplate {
    /// Parse and validate column template source.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::InvalidColumn`] if a line is not of the form
    ///   `Header=field[,field...]`, or names a block directive.
    /// - Return [`TemplateError::Token`] if a field is malformed.
    /// - Return [`TemplateError::VirtualField`] if a virtual field is unknown
    ///   or given bad arguments.
    pub fn parse(source: &str, virtuals: &VirtualFieldRegistry) -> std::result::Result<Self, TemplateError> {
        let mut columns = Vec::new();
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }

            let Some((header, fields)) = raw.split_once('=') else {
                return Err(TemplateError::InvalidColumn {
                    line,
                    reason: format!("expected \"Header=field\", found {raw:?}"),
                });
            };

            let fields = fields
                .split(',')
                .map(str::trim)
                .map(|field| parse_field(field, line, virtuals))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            columns.push(Column {
                header: header.trim().to_string(),
                fields,
            });
        }

        Ok(Self { columns })
    }

    /// Read, parse, and validate column template file.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::Read`] if file cannot be read.
    /// - Return [`TemplateError`] if template is invalid.
    pub fn load(path: &Path, virtuals: &VirtualFieldRegistry) -> std::result::Result<Self, TemplateError> {
        let source = read_to_string(path).map_err(|err| TemplateError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;
        let template = Self::parse(&source, virtuals)?;
        debug!("loaded {} columns from {:?}", template.columns.len(), path.display());

        Ok(template)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.header.as_str()).collect()
    }

    /// Render one row of cells for record.
    pub fn row(&self, env: Environment<'_>, record: &MetadataRecord, separators: &Separators) -> Vec<String> {
        let interpreter = Interpreter::new(env, Escape::None);
        let mut cache = FieldCache::new();

        self.columns
            .iter()
            .map(|column| match column.fields.as_slice() {
                [field] => interpreter
                    .values(field, record, &mut cache)
                    .into_iter()
                    .filter(|value| !value.is_empty())
                    .collect::<Vec<_>>()
                    .join(&separators.value),
                fields => group_cell(&interpreter, column, fields, record, &mut cache, separators),
            })
            .collect()
    }
}

fn parse_field(field: &str, line: usize, virtuals: &VirtualFieldRegistry) -> std::result::Result<FieldToken, TemplateError> {
    let token = field
        .parse::<FieldToken>()
        .map_err(|err| TemplateError::Token { line, source: err })?;

    match &token {
        FieldToken::Field(_) => Ok(token),
        FieldToken::Virtual(virtual_field) => {
            virtuals
                .validate(virtual_field)
                .map_err(|err| TemplateError::VirtualField { line, source: err })?;
            Ok(token)
        }
        _ => Err(TemplateError::InvalidColumn {
            line,
            reason: format!("{field:?} is not a field"),
        }),
    }
}

fn group_cell(
    interpreter: &Interpreter<'_>,
    column: &Column,
    fields: &[FieldToken],
    record: &MetadataRecord,
    cache: &mut FieldCache,
    separators: &Separators,
) -> String {
    let values = fields
        .iter()
        .map(|field| interpreter.values(field, record, cache))
        .collect::<Vec<_>>();
    let count = values.first().map(Vec::len).unwrap_or_default();

    for (field, field_values) in fields.iter().zip(&values).skip(1) {
        if field_values.len() != count {
            warn!(
                "record {:?}: column {:?} field {field} has {} values, expected {count}",
                record.id,
                column.header,
                field_values.len()
            );
        }
    }

    (0..count)
        .map(|index| {
            values
                .iter()
                .map(|field_values| field_values.get(index).map(String::as_str).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(&separators.nested)
        })
        .collect::<Vec<_>>()
        .join(&separators.value)
}

/// Delimited text crosswalk.
///
/// Cells holding the field separator, quotes, or line breaks are quoted,
/// and quote characters inside them are doubled.
#[derive(Debug, Clone)]
pub struct CsvCrosswalk {
    profile: ProfileDefinition,
    template: TabularTemplate,
    separators: Separators,
}

impl CsvCrosswalk {
    pub fn new(profile: ProfileDefinition, template: TabularTemplate, separators: Separators) -> Self {
        Self {
            profile,
            template,
            separators,
        }
    }
}

impl Crosswalk for CsvCrosswalk {
    fn profile(&self) -> &ProfileDefinition {
        &self.profile
    }

    fn disseminate_one(&self, env: Environment<'_>, record: &MetadataRecord) -> Result<Vec<u8>> {
        self.disseminate_all(env, std::slice::from_ref(record))
    }

    #[instrument(skip_all, fields(profile = %self.profile.name, records = records.len()))]
    fn disseminate_all(&self, env: Environment<'_>, records: &[MetadataRecord]) -> Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.separators.field_byte())
            .from_writer(Vec::new());

        writer.write_record(self.template.headers())?;
        for record in records {
            self.ensure_supported(record)?;
            writer.write_record(self.template.row(env, record, &self.separators))?;
        }

        writer.into_inner().map_err(|err| err.into_error().into())
    }
}

/// Spreadsheet crosswalk.
///
/// Writes one worksheet with a bold header row.
#[derive(Debug, Clone)]
pub struct XlsCrosswalk {
    profile: ProfileDefinition,
    template: TabularTemplate,
    separators: Separators,
}

impl XlsCrosswalk {
    pub fn new(profile: ProfileDefinition, template: TabularTemplate, separators: Separators) -> Self {
        Self {
            profile,
            template,
            separators,
        }
    }
}

impl Crosswalk for XlsCrosswalk {
    fn profile(&self) -> &ProfileDefinition {
        &self.profile
    }

    fn disseminate_one(&self, env: Environment<'_>, record: &MetadataRecord) -> Result<Vec<u8>> {
        self.disseminate_all(env, std::slice::from_ref(record))
    }

    #[instrument(skip_all, fields(profile = %self.profile.name, records = records.len()))]
    fn disseminate_all(&self, env: Environment<'_>, records: &[MetadataRecord]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let bold = Format::new().set_bold();

        for (column, header) in (0u16..).zip(self.template.headers()) {
            worksheet.write_string_with_format(0, column, header, &bold)?;
        }

        for (row, record) in (1u32..).zip(records) {
            self.ensure_supported(record)?;
            for (column, cell) in (0u16..).zip(self.template.row(env, record, &self.separators)) {
                worksheet.write_string(row, column, cell)?;
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crosswalk::fixture::Registries, crosswalk::CrosswalkError, record::PLACEHOLDER_VALUE};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    const PUBLICATION_CSV: &str = indoc! {"
        # publication export
        Id=virtual.id
        Title=dc.title

        Subjects=dc.subject
        Authors=dc.contributor.author,oairecerif.author.affiliation
    "};

    fn publication() -> MetadataRecord {
        MetadataRecord::new("pub-1")
            .with_entity_type("Publication")
            .with_value("dc.title", "Say \"Hello\", World")
            .unwrap()
            .with_value("dc.subject", "export")
            .unwrap()
            .with_value("dc.subject", "test")
            .unwrap()
            .with_value("dc.contributor.author", "Smith, John")
            .unwrap()
            .with_value("dc.contributor.author", "White, Walter")
            .unwrap()
            .with_value("oairecerif.author.affiliation", "4Science")
            .unwrap()
            .with_value("oairecerif.author.affiliation", PLACEHOLDER_VALUE)
            .unwrap()
    }

    fn separators() -> Separators {
        Separators::default()
    }

    #[test]
    fn parse_column_template() -> anyhow::Result<()> {
        let registries = Registries::new();
        let template = TabularTemplate::parse(PUBLICATION_CSV, &registries.virtuals)?;
        assert_eq!(template.headers(), vec!["Id", "Title", "Subjects", "Authors"]);
        assert_eq!(template.columns()[3].fields.len(), 2);

        Ok(())
    }

    #[test_case("Title"; "missing equals sign")]
    #[test_case("Title=dc"; "malformed field")]
    #[test_case("Year=virtual.missing"; "unknown virtual field")]
    #[test_case("Authors=group.dc.contributor.author.start"; "block directive")]
    #[test]
    fn reject_malformed_column(source: &str) {
        let registries = Registries::new();
        assert!(TabularTemplate::parse(source, &registries.virtuals).is_err());
    }

    #[test]
    fn render_group_and_repeated_cells() -> anyhow::Result<()> {
        let registries = Registries::new();
        let template = TabularTemplate::parse(PUBLICATION_CSV, &registries.virtuals)?;
        let result = template.row(registries.env(), &publication(), &separators());
        assert_eq!(
            result,
            vec![
                "pub-1",
                "Say \"Hello\", World",
                "export||test",
                "Smith, John/4Science||White, Walter/",
            ]
        );

        Ok(())
    }

    #[test]
    fn fill_missing_group_values_per_repetition() -> anyhow::Result<()> {
        let registries = Registries::new();
        let template = TabularTemplate::parse(
            "Affiliations=oairecerif.person.affiliation,oairecerif.affiliation.role",
            &registries.virtuals,
        )?;
        let record = MetadataRecord::new("person-1")
            .with_value("oairecerif.person.affiliation", "A")?
            .with_value("oairecerif.person.affiliation", "B")?
            .with_value("oairecerif.affiliation.role", "Dev")?;
        let result = template.row(registries.env(), &record, &separators());
        assert_eq!(result, vec!["A/Dev||B/"]);

        Ok(())
    }

    #[test]
    fn write_csv_with_doubled_quotes() -> anyhow::Result<()> {
        let registries = Registries::new();
        let template = TabularTemplate::parse("Id=virtual.id\nTitle=dc.title", &registries.virtuals)?;
        let crosswalk = CsvCrosswalk::new(ProfileDefinition::default(), template, separators());
        let result = String::from_utf8(crosswalk.disseminate_one(registries.env(), &publication())?)?;
        let expect = indoc! {r#"
            Id,Title
            pub-1,"Say ""Hello"", World"
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn write_csv_with_custom_delimiter() -> anyhow::Result<()> {
        let registries = Registries::new();
        let template = TabularTemplate::parse("Id=virtual.id\nSubjects=dc.subject", &registries.virtuals)?;
        let separators = Separators {
            field: ";".into(),
            value: "|".into(),
            nested: "/".into(),
        };
        let crosswalk = CsvCrosswalk::new(ProfileDefinition::default(), template, separators);
        let result = String::from_utf8(crosswalk.disseminate_one(registries.env(), &publication())?)?;
        assert_eq!(result, "Id;Subjects\npub-1;export|test\n");

        Ok(())
    }

    #[test]
    fn write_xlsx_workbook() -> anyhow::Result<()> {
        let registries = Registries::new();
        let template = TabularTemplate::parse(PUBLICATION_CSV, &registries.virtuals)?;
        let crosswalk = XlsCrosswalk::new(ProfileDefinition::default(), template, separators());
        let result = crosswalk.disseminate_all(registries.env(), &[publication(), MetadataRecord::new("pub-2")])?;

        // XLSX files are zip archives.
        assert!(result.starts_with(b"PK"));

        Ok(())
    }

    #[test]
    fn reject_unsupported_row() {
        let registries = Registries::new();
        let template = TabularTemplate::parse("Id=virtual.id", &registries.virtuals).unwrap();
        let profile = ProfileDefinition {
            name: "persons".into(),
            entity_type: Some("Person".into()),
            ..Default::default()
        };
        let crosswalk = CsvCrosswalk::new(profile, template, separators());
        let result = crosswalk.disseminate_all(registries.env(), &[publication()]);
        assert!(matches!(result, Err(CrosswalkError::UnsupportedObject { .. })));
    }
}
