//! Single-sheet SpreadsheetML (xlsx) encoder.
//!
//! Layout: one row per label/value field (columns A/B), then the table header
//! row, then one row per table row. Cells are inline strings, so the package
//! needs no shared-string part.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::ReportError;
use crate::document::ReportDocument;

const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Spreadsheet column letters for a zero-based index (0 → A, 26 → AA).
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// Excel limits sheet names to 31 characters and forbids a few symbols.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.is_empty() { "Sheet1".to_string() } else { cleaned }
}

fn workbook_xml(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape(sheet_name(title).as_str())
    )
}

/// Rows of the sheet, in order, as plain strings.
pub fn sheet_rows(doc: &ReportDocument) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = doc
        .fields
        .iter()
        .map(|(label, value)| vec![label.clone(), value.clone()])
        .collect();

    if !doc.table.is_empty() {
        rows.push(doc.table.columns.clone());
        rows.extend(doc.table.rows.iter().cloned());
    }
    rows
}

fn sheet_xml(rows: &[Vec<String>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    for (r, row) in rows.iter().enumerate() {
        let row_number = r + 1;
        xml.push_str(&format!(r#"<row r="{row_number}">"#));
        for (c, value) in row.iter().enumerate() {
            xml.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(c),
                row_number,
                escape(value.as_str())
            ));
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Encode a document as an xlsx package.
pub fn render(doc: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let parts: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml(&doc.title)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        (SHEET_PATH, sheet_xml(&sheet_rows(doc))),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, body) in parts {
        zip.start_file(path, options)
            .map_err(|e| ReportError::Spreadsheet(format!("{path}: {e}")))?;
        zip.write_all(body.as_bytes())
            .map_err(|e| ReportError::Spreadsheet(format!("{path}: {e}")))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| ReportError::Spreadsheet(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use quick_xml::Reader;
    use quick_xml::events::Event;

    use super::*;
    use crate::document::{device_document, tests::device_with};

    fn read_sheet(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = archive.by_name(SHEET_PATH).unwrap();
        let mut xml = String::new();
        sheet.read_to_string(&mut xml).unwrap();
        xml
    }

    fn count_rows(xml: &str) -> usize {
        let mut reader = Reader::from_str(xml);
        let mut rows = 0;
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.name().as_ref() == b"row" => rows += 1,
                Ok(Event::Eof) => break,
                Err(e) => panic!("invalid sheet xml: {e}"),
                _ => {}
            }
        }
        rows
    }

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(1), "B");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
    }

    #[test]
    fn license_block_has_one_row_per_license() {
        for n in [0usize, 1, 3, 12] {
            let licenses: Vec<(&str, &str)> = (0..n).map(|_| ("Office365", "2099-01-01")).collect();
            let doc = device_document(&device_with(&licenses));
            let xml = read_sheet(&render(&doc).unwrap());

            // fields + table header + N license rows
            assert_eq!(count_rows(&xml), doc.fields.len() + 1 + n);
        }
    }

    #[test]
    fn values_are_escaped() {
        let doc = device_document(&device_with(&[("R&D <suite>", "2099-01-01")]));
        let xml = read_sheet(&render(&doc).unwrap());
        assert!(xml.contains("R&amp;D &lt;suite&gt;"));
        assert!(xml.contains("SVC001"));
    }

    #[test]
    fn package_contains_required_parts() {
        let doc = device_document(&device_with(&[]));
        let bytes = render(&doc).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in ["[Content_Types].xml", "_rels/.rels", "xl/workbook.xml", SHEET_PATH] {
            assert!(names.contains(&part), "missing {part}");
        }
    }
}
