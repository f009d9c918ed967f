//! Fixed-size paginated (PDF) encoder.
//!
//! Every page is A4 with a title header; body lines are set in Courier so
//! label/value pairs and table columns line up. Lines that do not fit on a
//! page continue on the next one. Content streams are left uncompressed.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::ReportError;
use crate::document::ReportDocument;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const TITLE_SIZE: i64 = 16;
const BODY_SIZE: i64 = 10;
const LEADING: i64 = 14;
const TITLE_GAP: i64 = 30;

/// Width of the label column for field lines.
const LABEL_WIDTH: usize = 18;
/// Width of each table column except the last.
const COLUMN_WIDTH: usize = 28;

/// Body lines that fit under the title on one page.
pub const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN - TITLE_GAP) / LEADING) as usize;

/// Monospaced body lines for a document.
pub fn body_lines(doc: &ReportDocument) -> Vec<String> {
    let mut lines: Vec<String> = doc
        .fields
        .iter()
        .map(|(label, value)| format!("{:<LABEL_WIDTH$}{}", format!("{label}:"), value))
        .collect();

    if !doc.table.is_empty() {
        lines.push(String::new());
        lines.push(table_line(&doc.table.columns));
        lines.push("-".repeat(COLUMN_WIDTH * doc.table.columns.len().max(1)));
        lines.extend(doc.table.rows.iter().map(|row| table_line(row)));
    }
    lines
}

fn table_line(cells: &[String]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i + 1 < cells.len() {
            line.push_str(&format!("{cell:<COLUMN_WIDTH$}"));
        } else {
            line.push_str(cell);
        }
    }
    line
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn int(value: i64) -> Object {
    Object::Integer(value)
}

fn page_content(title: &str, lines: &[String], page: usize, pages: usize) -> Content {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![name("F1"), int(TITLE_SIZE)]),
        Operation::new("Td", vec![int(MARGIN), int(PAGE_HEIGHT - MARGIN)]),
        Operation::new("Tj", vec![Object::string_literal(title)]),
        Operation::new("Tf", vec![name("F1"), int(BODY_SIZE)]),
        Operation::new("TL", vec![int(LEADING)]),
        Operation::new("Td", vec![int(0), int(-TITLE_GAP)]),
    ];

    for line in lines {
        ops.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        ops.push(Operation::new("T*", vec![]));
    }
    ops.push(Operation::new("ET", vec![]));

    if pages > 1 {
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![name("F1"), int(BODY_SIZE)]),
            Operation::new("Td", vec![int(PAGE_WIDTH - MARGIN - 80), int(MARGIN / 2)]),
            Operation::new(
                "Tj",
                vec![Object::string_literal(format!("Page {page} of {pages}"))],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    Content { operations: ops }
}

/// Encode a document as a PDF.
pub fn render(doc: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let lines = body_lines(doc);
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&[]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let font_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let content = page_content(&doc.title, chunk, i + 1, chunks.len());
        let encoded = content
            .encode()
            .map_err(|e| ReportError::Pdf(format!("page {}: {e}", i + 1)))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, encoded));
        let page_id: ObjectId = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![int(0), int(0), int(PAGE_WIDTH), int(PAGE_HEIGHT)],
        }),
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(bytes)
}
