//! Uploaded documents and mapping configurations.
//!
//! Both are immutable once created and shared read-only by every batch that
//! references them.

pub mod store;
pub mod validate;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::processor::DocumentFormat;

pub use store::IntakeStore;
pub use validate::{validate_configure_request, validate_upload};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub filename: String,
    pub file_type: DocumentFormat,
    pub size_bytes: u64,
    pub content_type: String,
    pub stored_path: PathBuf,
    #[serde(skip_serializing, default)]
    pub extracted_text: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_id: String,
    pub filename: String,
    pub file_type: DocumentFormat,
    pub size_bytes: u64,
    pub preview: String,
}

impl From<&Upload> for UploadResponse {
    fn from(upload: &Upload) -> Self {
        Self {
            upload_id: upload.id.clone(),
            filename: upload.filename.clone(),
            file_type: upload.file_type,
            size_bytes: upload.size_bytes,
            preview: upload.preview.clone(),
        }
    }
}

/// Names of the document fields holding each control attribute, and example
/// values showing the exact output format wanted for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMappings {
    pub id_field: Option<String>,
    pub name_field: Option<String>,
    pub description_field: Option<String>,
    pub section_field: Option<String>,
    pub subsection_field: Option<String>,
    pub subgroup_field: Option<String>,
    pub service_field: Option<String>,

    pub id_format_example: Option<String>,
    pub name_format_example: Option<String>,
    pub section_format_example: Option<String>,
    pub subsection_format_example: Option<String>,
    pub subgroup_format_example: Option<String>,
    pub description_format_example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub version: Option<String>,
    pub full_name: Option<String>,
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub upload_id: String,
    pub framework_name: String,
    #[serde(default)]
    pub framework_version: Option<String>,
    #[serde(default)]
    pub framework_full_name: Option<String>,
    #[serde(default)]
    pub framework_description: Option<String>,
    pub providers: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_subgroup: bool,
    #[serde(default)]
    pub field_mappings: FieldMappings,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub id: String,
    pub upload_id: String,
    pub framework: FrameworkInfo,
    pub providers: Vec<String>,
    pub field_mappings: FieldMappings,
    pub enable_subgroup: bool,
    pub custom_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Configuration {
    pub fn from_request(request: ConfigureRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            upload_id: request.upload_id,
            framework: FrameworkInfo {
                name: request.framework_name.trim().to_string(),
                version: non_blank(request.framework_version),
                full_name: non_blank(request.framework_full_name),
                description: non_blank(request.framework_description),
            },
            providers: request.providers,
            field_mappings: request.field_mappings,
            enable_subgroup: request.enable_subgroup,
            custom_instructions: non_blank(request.custom_instructions),
            created_at: Utc::now(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredProvider {
    pub name: String,
    pub check_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureResponse {
    pub configuration_id: String,
    pub providers: Vec<ConfiguredProvider>,
    pub total_checks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_request_defaults() {
        let request: ConfigureRequest = serde_json::from_str(
            r#"{ "upload_id": "u1", "framework_name": "CIS", "providers": ["aws"] }"#,
        )
        .unwrap();

        assert!(request.enable_subgroup);
        assert_eq!(request.field_mappings, FieldMappings::default());
        assert!(request.custom_instructions.is_none());
    }

    #[test]
    fn test_field_mappings_partial() {
        let mappings: FieldMappings =
            serde_json::from_str(r#"{ "id_field": "Control ID", "id_format_example": "AC-2.1" }"#)
                .unwrap();

        assert_eq!(mappings.id_field.as_deref(), Some("Control ID"));
        assert_eq!(mappings.id_format_example.as_deref(), Some("AC-2.1"));
        assert!(mappings.section_field.is_none());
    }

    #[test]
    fn test_configuration_from_request_trims_blanks() {
        let request = ConfigureRequest {
            upload_id: "u1".to_string(),
            framework_name: "  CIS AWS  ".to_string(),
            framework_version: Some("3.0".to_string()),
            framework_full_name: Some("   ".to_string()),
            framework_description: None,
            providers: vec!["aws".to_string(), "gcp".to_string()],
            enable_subgroup: false,
            field_mappings: FieldMappings::default(),
            custom_instructions: Some(String::new()),
        };

        let configuration = Configuration::from_request(request);
        assert_eq!(configuration.framework.name, "CIS AWS");
        assert_eq!(configuration.framework.version.as_deref(), Some("3.0"));
        assert!(configuration.framework.full_name.is_none());
        assert!(configuration.custom_instructions.is_none());
        assert_eq!(configuration.providers, vec!["aws", "gcp"]);
        assert!(!configuration.enable_subgroup);
    }

    #[test]
    fn test_upload_serialization_omits_text() {
        let upload = Upload {
            id: "u1".to_string(),
            filename: "controls.txt".to_string(),
            file_type: DocumentFormat::Text,
            size_bytes: 5,
            content_type: "text/plain".to_string(),
            stored_path: PathBuf::from("/tmp/u1.txt"),
            extracted_text: "hello".to_string(),
            preview: "hello".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&upload).unwrap();
        assert!(json.get("extracted_text").is_none());
        assert_eq!(json["file_type"], "txt");
    }
}
