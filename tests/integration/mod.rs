// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::ExportFixture;

use anyhow::Result;
use crosswalk::{
    condition::ConditionRegistry, template::Template, virtual_field::VirtualFieldRegistry,
    CrosswalkConfig, CrosswalkError, ExportError, MetadataRecord,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::fs::read_to_string;

const RECORDS: &str = r##"
    [[record]]
    id = "person-1"
    entity_type = "Person"
    handle = "123456789/1"
    [record.metadata]
    "dc.title" = ["Smith, John"]
    "oairecerif.person.affiliation" = [{ value = "4Science", authority = "orgunit-1" }, "University"]
    "oairecerif.affiliation.role" = ["Developer", "#PLACEHOLDER_PARENT_METADATA_VALUE#"]

    [[record]]
    id = "pub-1"
    entity_type = "Publication"
    [record.metadata]
    "dc.title" = ["Say \"Hello\", World"]
    "dc.date.issued" = ["2020-05-17"]
    "dc.contributor.author" = [{ value = "Smith, John", authority = "person-1" }, "White, Walter"]

    [[record]]
    id = "pub-2"
    entity_type = "Publication"
    [record.metadata]
    "dc.title" = ["Second Publication"]
    "dc.date.issued" = ["2021"]
    "dc.contributor.author" = [{ value = "Smith, John", authority = "person-1" }]
"##;

const CONFIG: &str = indoc! {r#"
    [relation.publications]
    kind = "search"
    field = "dc.contributor.author"
    entity_type = "Publication"

    [[profile]]
    name = "person-xml"
    template = "person.xml.template"
    entity_type = "Person"
    escape = "xml"
    header = "<persons>"
    footer = "</persons>"

    [[profile]]
    name = "person-json"
    template = "person.json.template"
    entity_type = "Person"
    escape = "json"

    [[profile]]
    name = "publication-csv"
    kind = "csv"
    template = "publication.csv.template"
    entity_type = "Publication"
"#};

const PERSON_XML: &str = indoc! {"
    <person id=\"@virtual.id@\">
      <name>@dc.title@</name>
      @group.oairecerif.person.affiliation.start@
      <affiliation>@oairecerif.person.affiliation@</affiliation>
      <role>@oairecerif.affiliation.role@</role>
      @group.oairecerif.person.affiliation.end@
      @relation.publications.start@
      <publication>@dc.title@</publication>
      <year>@virtual.date.dc-date-issued.yyyy@</year>
      @relation.publications.end@
      @relation.projects.start@
      <project>@dc.title@</project>
      @relation.projects.end@
      @if.not.exists.dc-description.start@
      <description>none</description>
      @if.not.exists.dc-description.end@
    </person>
"};

const PERSON_JSON: &str = indoc! {r#"
    {
      "id": "@virtual.id@",
      "handle": "@virtual.handle@",
      "name": "@dc.title@",
      "email": "@person.email@",
    }
"#};

const PUBLICATION_CSV: &str = indoc! {"
    Id=virtual.id
    Title=dc.title
    Authors=dc.contributor.author
"};

fn fixture() -> Result<ExportFixture> {
    ExportFixture::new(CONFIG)?
        .with_file("person.xml.template", PERSON_XML)?
        .with_file("person.json.template", PERSON_JSON)?
        .with_file("publication.csv.template", PUBLICATION_CSV)
}

#[sealed_test]
fn export_person_with_relations() -> Result<()> {
    let fixture = fixture()?;
    let exporter = fixture.exporter()?;
    let store = fixture.store(RECORDS)?;
    let person = store.get("person-1").cloned().unwrap_or_default();

    let result = exporter.export("person-xml", &[person], Some(&store))?;
    let expect = indoc! {r#"
        <person id="person-1">
          <name>Smith, John</name>
          <affiliation>4Science</affiliation>
          <role>Developer</role>
          <affiliation>University</affiliation>
          <role></role>
          <publication>Say &quot;Hello&quot;, World</publication>
          <year>2020</year>
          <publication>Second Publication</publication>
          <year>2021</year>
          <description>none</description>
        </person>
    "#};
    assert_eq!(String::from_utf8(result.content)?, expect);
    assert_eq!(result.mime_type, "application/xml");

    Ok(())
}

#[sealed_test]
fn export_many_people_as_json_array() -> Result<()> {
    let fixture = fixture()?;
    let exporter = fixture.exporter()?;
    let store = fixture.store(RECORDS)?;
    let people = [
        store.get("person-1").cloned().unwrap_or_default(),
        MetadataRecord::new("person-2").with_entity_type("Person"),
    ];

    let result = exporter.export("person-json", &people, Some(&store))?;
    let expect = indoc! {r#"
        [
        {
          "id": "person-1",
          "handle": "123456789/1",
          "name": "Smith, John"
        },
        {
          "id": "person-2"
        }
        ]
    "#};
    let content = String::from_utf8(result.content)?;
    assert_eq!(content, expect);
    serde_json::from_str::<serde_json::Value>(&content)?;

    Ok(())
}

#[sealed_test]
fn csv_quotes_read_back_unchanged() -> Result<()> {
    let fixture = fixture()?;
    let exporter = fixture.exporter()?;
    let store = fixture.store(RECORDS)?;
    let publications = [
        store.get("pub-1").cloned().unwrap_or_default(),
        store.get("pub-2").cloned().unwrap_or_default(),
    ];

    let result = exporter.export("publication-csv", &publications, Some(&store))?;
    assert!(String::from_utf8(result.content.clone())?.contains(r#""Say ""Hello"", World""#));

    let mut reader = csv::Reader::from_reader(result.content.as_slice());
    let headers = reader.headers()?.iter().map(str::to_string).collect::<Vec<_>>();
    assert_eq!(headers, vec!["Id", "Title", "Authors"]);

    let rows = reader
        .records()
        .map(|row| row.map(|row| row.iter().map(str::to_string).collect::<Vec<_>>()))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(
        rows,
        vec![
            vec!["pub-1", "Say \"Hello\", World", "Smith, John||White, Walter"],
            vec!["pub-2", "Second Publication", "Smith, John"],
        ]
    );

    Ok(())
}

#[sealed_test]
fn reject_unsupported_subject() -> Result<()> {
    let fixture = fixture()?;
    let exporter = fixture.exporter()?;
    let store = fixture.store(RECORDS)?;
    let publication = store.get("pub-1").cloned().unwrap_or_default();

    assert!(!exporter.crosswalk("person-xml")?.can_disseminate(&publication));
    let result = exporter.export("person-xml", &[publication], Some(&store));
    assert!(matches!(
        result,
        Err(ExportError::Crosswalk(CrosswalkError::UnsupportedObject { .. }))
    ));

    Ok(())
}

#[sealed_test]
fn unconfigured_relation_renders_empty() -> Result<()> {
    let fixture = ExportFixture::new(indoc! {r#"
        [[profile]]
        name = "person-text"
        template = "person.template"
    "#})?
    .with_file(
        "person.template",
        indoc! {"
            Name: @dc.title@
            @relation.publications.start@
            Publication: @dc.title@
            @relation.publications.end@
            End
        "},
    )?;
    let exporter = fixture.exporter()?;
    let store = fixture.store(RECORDS)?;
    let person = store.get("person-1").cloned().unwrap_or_default();

    let result = exporter.export("person-text", &[person], Some(&store))?;
    assert_eq!(String::from_utf8(result.content)?, "Name: Smith, John\nEnd\n");

    Ok(())
}

#[test]
fn group_repeats_author_line() -> Result<()> {
    let registries = Registries::new();
    let template = registries.parse(indoc! {"
        @group.dc.contributor.author.start@
        Author: @dc.contributor.author@
        @group.dc.contributor.author.end@
    "})?;
    let record = MetadataRecord::new("pub-1")
        .with_value("dc.contributor.author", "Doe, J.")?
        .with_value("dc.contributor.author", "Smith, A.")?;

    assert_eq!(registries.render(&template, &record), vec!["Author: Doe, J.", "Author: Smith, A."]);

    Ok(())
}

#[test]
fn group_repeats_once_per_driving_value() -> Result<()> {
    let registries = Registries::new();
    let template = registries.parse(indoc! {"
        @group.dc.subject.start@
        <subject>
        @dc.subject@
        </subject>
        @group.dc.subject.end@
    "})?;

    for count in 0..5 {
        let mut record = MetadataRecord::new("pub-1");
        for index in 0..count {
            record.push("dc.subject".parse()?, format!("subject {index}"));
        }
        let result = registries.render(&template, &record);
        assert_eq!(result.len(), count * 3);
        assert_eq!(result.iter().filter(|line| *line == "<subject>").count(), count);
    }

    Ok(())
}

#[test]
fn conditional_renders_all_or_nothing() -> Result<()> {
    let registries = Registries::new();
    let template = registries.parse(indoc! {"
        @if.exists.dc-title.start@
        <title>@dc.title@</title>
        <subject>@dc.subject@</subject>
        static
        @if.exists.dc-title.end@
    "})?;

    let titled = MetadataRecord::new("pub-1").with_value("dc.title", "Title")?;
    let untitled = MetadataRecord::new("pub-2").with_value("dc.subject", "Subject")?;
    assert_eq!(registries.render(&template, &titled), vec!["<title>Title</title>", "static"]);
    assert!(registries.render(&template, &untitled).is_empty());

    Ok(())
}

#[test]
fn blank_record_renders_literal_text() -> Result<()> {
    let registries = Registries::new();
    let source = indoc! {"
        <record>
          <title>@dc.title@</title>
          <note>plain text with a single @ sign</note>
          <author>@dc.contributor.author@</author>
        </record>
    "};
    let template = registries.parse(source)?;
    let result = registries.render(&template, &MetadataRecord::new("blank"));
    let expect = vec![
        "<record>",
        "  <note>plain text with a single @ sign</note>",
        "</record>",
    ];
    assert_eq!(result, expect);

    let literal = "line one\n  line two\n\nline four";
    let template = registries.parse(literal)?;
    assert_eq!(registries.render(&template, &MetadataRecord::new("blank")).join("\n"), literal);

    Ok(())
}

#[sealed_test]
fn parse_template_file_deterministically() -> Result<()> {
    fixture()?;
    let registries = Registries::new();
    let source = read_to_string("person.xml.template")?;
    let first = registries.parse(&source)?;
    let second = registries.parse(&source)?;
    assert_eq!(first.lines(), second.lines());

    Ok(())
}

/// Default registries for rendering templates without an exporter.
struct Registries {
    virtuals: VirtualFieldRegistry,
    conditions: ConditionRegistry,
    relations: std::collections::BTreeMap<String, crosswalk::config::RelationDefinition>,
}

impl Registries {
    fn new() -> Self {
        Self {
            virtuals: VirtualFieldRegistry::with_defaults(&CrosswalkConfig::default()),
            conditions: ConditionRegistry::with_defaults(),
            relations: Default::default(),
        }
    }

    fn parse(&self, source: &str) -> Result<Template> {
        Ok(Template::parse(source, &self.virtuals, &self.conditions)?)
    }

    fn render(&self, template: &Template, record: &MetadataRecord) -> Vec<String> {
        let env = crosswalk::interpret::Environment {
            virtuals: &self.virtuals,
            conditions: &self.conditions,
            relations: crosswalk::relation::RelationResolver::new(&self.relations, None),
        };
        crosswalk::interpret::Interpreter::new(env, Default::default()).render(template, record)
    }
}
