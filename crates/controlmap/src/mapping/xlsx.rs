//! Minimal Office Open XML workbook writer.
//!
//! Cells are written as inline strings, which every spreadsheet application
//! reads without a shared string table. Two styles exist besides the
//! default: a filled bold header and a bordered wrapping body cell.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Header,
    Body,
}

impl CellStyle {
    fn index(self) -> u32 {
        match self {
            CellStyle::Header => 1,
            CellStyle::Body => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub text: String,
    pub style: CellStyle,
}

impl Cell {
    pub fn header(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: CellStyle::Header,
        }
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: CellStyle::Body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Worksheet {
    pub name: String,
    pub column_widths: Vec<f64>,
    pub rows: Vec<Vec<Cell>>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_widths: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_column_widths(mut self, widths: &[f64]) -> Self {
        self.column_widths = widths.to_vec();
        self
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }
}

const CONTENT_TYPES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font></fonts><fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FF4472C4"/><bgColor indexed="64"/></patternFill></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf><xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1" applyAlignment="1"><alignment vertical="top" wrapText="1"/></xf></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Column letters for a zero-based index: 0 is `A`, 26 is `AA`.
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
    String::from_utf8_lossy(&name).into_owned()
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = CONTENT_TYPES_HEAD.to_string();
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        );
    }
    xml.push_str("</Types>");
    xml
}

fn workbook(sheets: &[Worksheet]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_text(&sheet.name),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i, i
        );
    }
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    );
    xml.push_str("</Relationships>");
    xml
}

/// Escapes markup and drops the control characters XML 1.0 forbids, which
/// would otherwise leave a workbook spreadsheet applications refuse to open.
fn xml_text(text: &str) -> String {
    let allowed: String = text
        .chars()
        .filter(|&c| c >= '\u{20}' || matches!(c, '\t' | '\n' | '\r'))
        .filter(|&c| !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
        .collect();
    escape(allowed.as_str()).into_owned()
}

fn worksheet(sheet: &Worksheet) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );

    if !sheet.column_widths.is_empty() {
        xml.push_str("<cols>");
        for (i, width) in sheet.column_widths.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<col min="{0}" max="{0}" width="{1}" customWidth="1"/>"#,
                i + 1,
                width
            );
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    for (r, row) in sheet.rows.iter().enumerate() {
        let _ = write!(xml, r#"<row r="{}">"#, r + 1);
        for (c, cell) in row.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<c r="{}{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(c),
                r + 1,
                cell.style.index(),
                xml_text(&cell.text)
            );
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Serializes the worksheets, in order, into `.xlsx` bytes.
pub fn write_workbook(sheets: &[Worksheet]) -> Result<Vec<u8>, StorageError> {
    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".to_string(), content_types(sheets.len())),
        ("_rels/.rels".to_string(), ROOT_RELS.to_string()),
        ("xl/workbook.xml".to_string(), workbook(sheets)),
        ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels(sheets.len())),
        ("xl/styles.xml".to_string(), STYLES.to_string()),
    ];
    for (i, sheet) in sheets.iter().enumerate() {
        parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), worksheet(sheet)));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in &parts {
        zip.start_file(name.as_str(), options)
            .map_err(|e| workbook_error(name, e))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| workbook_error(name, e))?;
    }

    let cursor = zip.finish().map_err(|e| workbook_error("workbook", e))?;
    Ok(cursor.into_inner())
}

fn workbook_error(name: &str, error: impl std::fmt::Display) -> StorageError {
    StorageError::Encode(format!("failed to write workbook part {}: {}", name, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::spreadsheet::extract_workbook_text;

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(6), "G");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_workbook_reads_back() {
        let mut summary = Worksheet::new("Summary").with_column_widths(&[20.0, 60.0]);
        summary.push_row(vec![Cell::header("Framework"), Cell::body("CIS & Co <v8>")]);
        let mut checks = Worksheet::new("Check Mappings");
        checks.push_row(vec![Cell::header("Control ID"), Cell::header("Check ID")]);
        checks.push_row(vec![Cell::body("1.1"), Cell::body("")]);

        let bytes = write_workbook(&[summary, checks]).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let text = extract_workbook_text(&mut archive).unwrap();

        assert_eq!(
            text,
            "=== Sheet: Summary ===\nFramework\tCIS & Co <v8>\n\n\
             === Sheet: Check Mappings ===\nControl ID\tCheck ID\n1.1\t"
        );
    }

    #[test]
    fn test_forbidden_control_characters_are_dropped() {
        assert_eq!(xml_text("\u{0}AC-1\u{b}\u{1b} <x>"), "AC-1 &lt;x&gt;");
        assert_eq!(xml_text("line\ttab\r\nnext"), "line\ttab\r\nnext");

        let mut sheet = Worksheet::new("Controls\u{7}");
        sheet.push_row(vec![Cell::body("\u{c}Account\u{1f} management")]);

        let xml = worksheet(&sheet);
        assert!(xml.contains(">Account management<"));
        assert!(!xml.chars().any(|c| c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')));
        assert!(workbook(&[sheet]).contains(r#"name="Controls""#));
    }

    #[test]
    fn test_workbook_parts_present() {
        let bytes = write_workbook(&[Worksheet::new("Only")]).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();

        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/styles.xml",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(names.contains(&part), "missing {}", part);
        }
    }
}
