use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Plain UTF-8 formats: text, markdown, CSV and JSON.
pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for TextProcessor {
    fn process(&self, path: &Path) -> Result<String, ProcessError> {
        let text = std::fs::read_to_string(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        if DocumentFormat::from_path(path) == Some(DocumentFormat::Json) {
            return pretty_json(&text);
        }

        Ok(text)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(
            format,
            DocumentFormat::Text | DocumentFormat::Csv | DocumentFormat::Json
        )
    }
}

fn pretty_json(text: &str) -> Result<String, ProcessError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ProcessError::TextExtraction(format!("Invalid JSON document: {}", e)))?;
    serde_json::to_string_pretty(&value).map_err(|e| ProcessError::TextExtraction(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_process_text_file() {
        let mut temp_file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(temp_file, "1.1 Inventory of assets").unwrap();
        writeln!(temp_file, "1.2 Secure configuration").unwrap();

        let text = TextProcessor::new().process(temp_file.path()).unwrap();

        assert!(text.contains("1.1 Inventory of assets"));
        assert!(text.contains("1.2 Secure configuration"));
    }

    #[test]
    fn test_json_is_pretty_printed() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, r#"{{"controls":[{{"id":"AC-1"}}]}}"#).unwrap();

        let text = TextProcessor::new().process(temp_file.path()).unwrap();
        assert!(text.contains("\n"));
        assert!(text.contains("\"id\": \"AC-1\""));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{{ not json").unwrap();

        let result = TextProcessor::new().process(temp_file.path());
        assert!(matches!(result, Err(ProcessError::TextExtraction(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = TextProcessor::new().process(Path::new("/nonexistent/file.txt"));
        assert!(matches!(result, Err(ProcessError::ReadDocument { .. })));
    }

    #[test]
    fn test_supports_text_formats() {
        let processor = TextProcessor::new();
        assert!(processor.supports(DocumentFormat::Text));
        assert!(processor.supports(DocumentFormat::Csv));
        assert!(processor.supports(DocumentFormat::Json));
        assert!(!processor.supports(DocumentFormat::Pdf));
        assert!(!processor.supports(DocumentFormat::Xlsx));
    }
}
