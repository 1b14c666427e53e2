// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Formatted citation virtual field.

use crate::{
    record::{FieldKey, MetadataRecord, MetadataValue},
    template::token::VirtualFieldRef,
    virtual_field::{expect_arguments, Result, VirtualField},
};

/// Plain text citation of record, e.g., `@virtual.citation@`.
///
/// Produces `Authors (Year). Title. Container. Publisher.` where missing
/// parts are left out. Authors are joined by "; ". Records without a title
/// have no citation.
#[derive(Debug, Default, Clone, Copy)]
pub struct CitationField;

impl VirtualField for CitationField {
    fn validate(&self, field: &VirtualFieldRef) -> Result<()> {
        expect_arguments(field, 0)
    }

    fn resolve(&self, record: &MetadataRecord, _: &VirtualFieldRef) -> Result<Vec<String>> {
        let Some(title) = record.first_value(&FieldKey::known("dc", "title", None)) else {
            return Ok(Vec::new());
        };

        let authors = record
            .values(&FieldKey::known("dc", "contributor", Some("author")))
            .iter()
            .filter(|value| !value.is_placeholder())
            .map(MetadataValue::display)
            .collect::<Vec<_>>()
            .join("; ");
        let year = record
            .first_value(&FieldKey::known("dc", "date", Some("issued")))
            .map(|date| date.chars().take(4).collect::<String>());

        let mut citation = String::new();
        match (authors.is_empty(), year) {
            (false, Some(year)) => citation.push_str(&format!("{authors} ({year}). ")),
            (false, None) => citation.push_str(&format!("{authors}. ")),
            (true, Some(year)) => citation.push_str(&format!("({year}). ")),
            (true, None) => {}
        }
        push_sentence(&mut citation, title);

        let container = FieldKey::known("dc", "relation", Some("ispartof"));
        let publisher = FieldKey::known("dc", "publisher", None);
        for key in [container, publisher] {
            if let Some(part) = record.first_value(&key) {
                citation.push(' ');
                push_sentence(&mut citation, part);
            }
        }

        Ok(vec![citation])
    }
}

fn push_sentence(citation: &mut String, part: &str) {
    let part = part.trim();
    citation.push_str(part);
    if !part.ends_with(['.', '?', '!']) {
        citation.push('.');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn directive() -> VirtualFieldRef {
        VirtualFieldRef {
            name: "citation".into(),
            args: vec![],
        }
    }

    #[test]
    fn format_full_citation() -> anyhow::Result<()> {
        let record = MetadataRecord::new("pub-1")
            .with_value("dc.contributor.author", "Doe, John")?
            .with_value("dc.contributor.author", "Smith, Anna")?
            .with_value("dc.date.issued", "2020-05-17")?
            .with_value("dc.title", "Sample Title")?
            .with_value("dc.relation.ispartof", "Journal of Examples")?
            .with_value("dc.publisher", "Example Press")?;
        let result = CitationField.resolve(&record, &directive())?;
        assert_eq!(
            result,
            vec!["Doe, John; Smith, Anna (2020). Sample Title. Journal of Examples. Example Press."]
        );

        Ok(())
    }

    #[test]
    fn leave_out_missing_parts() -> anyhow::Result<()> {
        let record = MetadataRecord::new("pub-1").with_value("dc.title", "Does It Work?")?;
        let result = CitationField.resolve(&record, &directive())?;
        assert_eq!(result, vec!["Does It Work?"]);

        Ok(())
    }

    #[test]
    fn no_citation_without_title() -> anyhow::Result<()> {
        let record = MetadataRecord::new("pub-1").with_value("dc.contributor.author", "Doe, John")?;
        assert!(CitationField.resolve(&record, &directive())?.is_empty());

        Ok(())
    }
}
