use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Reads `.xlsx` workbooks as text, one `=== Sheet: <name> ===` block per
/// worksheet with tab-separated cells. Legacy binary `.xls` is rejected.
pub struct SpreadsheetProcessor;

impl SpreadsheetProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for SpreadsheetProcessor {
    fn process(&self, path: &Path) -> Result<String, ProcessError> {
        if DocumentFormat::from_path(path) == Some(DocumentFormat::Xls) {
            return Err(ProcessError::SpreadsheetProcessing(
                "legacy .xls workbooks are not supported, save the file as .xlsx".to_string(),
            ));
        }

        let file = std::fs::File::open(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            ProcessError::SpreadsheetProcessing(format!("Failed to open workbook: {}", e))
        })?;

        extract_workbook_text(&mut archive)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Xlsx | DocumentFormat::Xls)
    }
}

fn spreadsheet_err(message: impl std::fmt::Display) -> ProcessError {
    ProcessError::SpreadsheetProcessing(message.to_string())
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ProcessError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(spreadsheet_err(format!("Failed to open {}: {}", name, e))),
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| spreadsheet_err(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

pub(crate) fn extract_workbook_text<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ProcessError> {
    let shared = match read_entry(archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let names = match read_entry(archive, "xl/workbook.xml")? {
        Some(xml) => parse_sheet_names(&xml)?,
        None => return Err(spreadsheet_err("workbook.xml is missing")),
    };

    let mut sheet_entries: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let index = name
                .strip_prefix("xl/worksheets/sheet")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((index, name.to_string()))
        })
        .collect();
    sheet_entries.sort();

    let mut parts = Vec::new();
    for (position, (index, entry_name)) in sheet_entries.into_iter().enumerate() {
        let Some(xml) = read_entry(archive, &entry_name)? else {
            continue;
        };
        let rows = parse_sheet_rows(&xml, &shared)?;
        let name = names
            .get(position)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", index));
        let body = rows
            .iter()
            .map(|cells| cells.join("\t"))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("=== Sheet: {} ===\n{}", name, body));
    }

    Ok(parts.join("\n\n"))
}

fn decode_text(raw: &[u8]) -> Result<String, ProcessError> {
    let text = std::str::from_utf8(raw).map_err(spreadsheet_err)?;
    quick_xml::escape::unescape(text)
        .map(|s| s.into_owned())
        .map_err(spreadsheet_err)
}

fn resolve_reference(raw: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(raw).ok()?;
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u32>().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    quick_xml::escape::resolve_predefined_entity(name).map(str::to_string)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| decode_text(&a.value).ok())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ProcessError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => current.push_str(&decode_text(&e)?),
            Ok(Event::GeneralRef(r)) if in_text => {
                if let Some(resolved) = resolve_reference(&r) {
                    current.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(spreadsheet_err(format!("XML parsing error: {}", e))),
            _ => {}
        }
    }

    Ok(strings)
}

fn parse_sheet_names(xml: &str) -> Result<Vec<String>, ProcessError> {
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                if let Some(name) = attribute(e, b"name") {
                    names.push(name);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(spreadsheet_err(format!("XML parsing error: {}", e))),
            _ => {}
        }
    }

    Ok(names)
}

#[derive(Default)]
struct CellState {
    kind: Option<String>,
    value: String,
}

fn parse_sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, ProcessError> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<CellState> = None;
    let mut capture = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell = Some(CellState {
                        kind: attribute(e, b"t"),
                        value: String::new(),
                    })
                }
                b"v" | b"t" => capture = cell.is_some(),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"row" => rows.push(std::mem::take(&mut row)),
                b"c" => {
                    if let Some(state) = cell.take() {
                        row.push(cell_text(state, shared));
                    }
                }
                b"v" | b"t" => capture = false,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"c" => {
                row.push(String::new());
            }
            Ok(Event::Text(e)) if capture => {
                if let Some(state) = cell.as_mut() {
                    state.value.push_str(&decode_text(&e)?);
                }
            }
            Ok(Event::GeneralRef(r)) if capture => {
                if let (Some(state), Some(resolved)) = (cell.as_mut(), resolve_reference(&r)) {
                    state.value.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(spreadsheet_err(format!("XML parsing error: {}", e))),
            _ => {}
        }
    }

    Ok(rows)
}

fn cell_text(state: CellState, shared: &[String]) -> String {
    match state.kind.as_deref() {
        Some("s") => state
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("b") => if state.value.trim() == "1" { "TRUE" } else { "FALSE" }.to_string(),
        _ => state.value,
    }
}
