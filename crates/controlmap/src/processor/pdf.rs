use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Reads the text layer of every page, in page order, each page introduced by
/// a `[Page N]` marker so control ids can be traced back to the document.
///
/// Pages that fail to decode are skipped. A document with no text on any page
/// (a scan) is an error since it would give the agent nothing to map.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for PdfProcessor {
    fn process(&self, path: &Path) -> Result<String, ProcessError> {
        let bytes = std::fs::read(path).map_err(|source| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source,
        })?;
        let document = Document::load_mem(&bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("unreadable PDF: {}", e)))?;

        let text = page_texts(&document)
            .into_iter()
            .map(|(number, text)| format!("[Page {}]\n{}", number, text))
            .collect::<Vec<_>>()
            .join("\n\n");

        if text.is_empty() {
            return Err(ProcessError::PdfProcessing(
                "no text layer found, scanned PDFs are not supported".to_string(),
            ));
        }
        Ok(text)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::Pdf
    }
}

fn page_texts(document: &Document) -> Vec<(u32, String)> {
    document
        .get_pages()
        .into_keys()
        .filter_map(|number| match document.extract_text(&[number]) {
            Ok(text) if !text.trim().is_empty() => Some((number, text.trim().to_string())),
            Ok(_) => None,
            Err(e) => {
                debug!(page = number, "Skipping undecodable page: {}", e);
                None
            }
        })
        .collect()
}
