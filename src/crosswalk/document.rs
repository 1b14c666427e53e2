// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fixed-layout document serialization.
//!
//! Renders records through a line template, then lays the lines out on A4
//! pages in 10pt Helvetica. Long lines are wrapped, and every record starts
//! on a fresh page. Text is encoded as Latin-1, so characters outside of it
//! are replaced by `?`.

use crate::{
    config::ProfileDefinition,
    crosswalk::{Crosswalk, Result},
    interpret::{Environment, Interpreter},
    record::MetadataRecord,
    template::Template,
};

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, ObjectId, Stream, StringFormat,
};
use tracing::{debug, instrument};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 14;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
const WRAP_WIDTH: usize = 95;

/// Paginated document crosswalk.
#[derive(Debug, Clone)]
pub struct DocumentCrosswalk {
    profile: ProfileDefinition,
    template: Template,
}

impl DocumentCrosswalk {
    pub fn new(profile: ProfileDefinition, template: Template) -> Self {
        Self { profile, template }
    }

    fn pages(&self, env: Environment<'_>, records: &[MetadataRecord]) -> Result<Vec<Vec<String>>> {
        let interpreter = Interpreter::new(env, self.profile.escape);
        let mut pages = Vec::new();
        for record in records {
            self.ensure_supported(record)?;
            let lines = interpreter
                .render(&self.template, record)
                .iter()
                .flat_map(|line| wrap_line(line, WRAP_WIDTH))
                .collect::<Vec<_>>();

            if lines.is_empty() {
                pages.push(Vec::new());
                continue;
            }
            pages.extend(lines.chunks(LINES_PER_PAGE).map(<[String]>::to_vec));
        }

        Ok(pages)
    }
}

impl Crosswalk for DocumentCrosswalk {
    fn profile(&self) -> &ProfileDefinition {
        &self.profile
    }

    fn disseminate_one(&self, env: Environment<'_>, record: &MetadataRecord) -> Result<Vec<u8>> {
        self.disseminate_all(env, std::slice::from_ref(record))
    }

    #[instrument(skip_all, fields(profile = %self.profile.name, records = records.len()))]
    fn disseminate_all(&self, env: Environment<'_>, records: &[MetadataRecord]) -> Result<Vec<u8>> {
        let pages = self.pages(env, records)?;
        debug!("lay out {} pages", pages.len());
        write_document(&pages)
    }
}

/// Split line into pieces of at most width characters.
///
/// Breaks at the last space inside width when there is one.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = line.trim_end().chars().collect::<Vec<_>>();

    while rest.len() > width {
        let split = rest[..=width]
            .iter()
            .rposition(|ch| *ch == ' ')
            .filter(|position| *position > 0)
            .unwrap_or(width);
        pieces.push(rest[..split].iter().collect());

        let skip = usize::from(rest.get(split) == Some(&' '));
        rest = rest[split + skip..].to_vec();
    }
    pieces.push(rest.into_iter().collect());

    pieces
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}

fn page_content(lines: &[String]) -> Result<Vec<u8>> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE)]),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN)],
        ),
    ];
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(latin1(line), StringFormat::Literal)],
        ));
    }
    operations.push(Operation::new("ET", vec![]));

    Ok(Content { operations }.encode()?)
}

fn write_document(pages: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    // A document without any record still gets one blank page.
    let blank = [Vec::new()];
    let pages = if pages.is_empty() { &blank[..] } else { pages };

    let mut kids = Vec::with_capacity(pages.len());
    for lines in pages {
        let content_id = document.add_object(Stream::new(dictionary! {}, page_content(lines)?));
        let page_id: ObjectId = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    document.save_to(&mut output)?;
    Ok(output)
}
