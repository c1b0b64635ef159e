//! Builders for request payloads and agent output.

#![allow(dead_code)]

use serde_json::json;

use controlmap::catalog::{CheckDefinition, StaticCatalog};
use controlmap::intake::{ConfigureRequest, FieldMappings};

/// Builder for `ConfigureRequest` values.
pub struct ConfigureRequestBuilder {
    request: ConfigureRequest,
}

impl ConfigureRequestBuilder {
    pub fn new(upload_id: &str) -> Self {
        Self {
            request: ConfigureRequest {
                upload_id: upload_id.to_string(),
                framework_name: "CIS".to_string(),
                framework_version: Some("8.0".to_string()),
                framework_full_name: None,
                framework_description: None,
                providers: vec!["aws".to_string()],
                enable_subgroup: true,
                field_mappings: FieldMappings::default(),
                custom_instructions: None,
            },
        }
    }

    pub fn framework(mut self, name: &str) -> Self {
        self.request.framework_name = name.to_string();
        self
    }

    pub fn full_name(mut self, full_name: &str) -> Self {
        self.request.framework_full_name = Some(full_name.to_string());
        self
    }

    pub fn providers(mut self, providers: &[&str]) -> Self {
        self.request.providers = providers.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn enable_subgroup(mut self, enabled: bool) -> Self {
        self.request.enable_subgroup = enabled;
        self
    }

    pub fn build(self) -> ConfigureRequest {
        self.request
    }
}

/// A mapping in the CLI result wrapper, with one requirement per
/// `(control id, checks)` pair.
pub fn mapping_reply(framework: &str, controls: &[(&str, &[&str])]) -> String {
    let requirements: Vec<serde_json::Value> = controls
        .iter()
        .map(|(id, checks)| {
            json!({
                "Id": id,
                "Name": format!("Control {}", id),
                "Attributes": [{"ItemId": id, "Section": "1 Governance", "SubGroup": "1.x"}],
                "Checks": checks,
            })
        })
        .collect();

    let mapping = json!({
        "Framework": framework,
        "Name": framework,
        "Provider": "whatever the agent wrote",
        "Requirements": requirements,
    });

    json!({
        "type": "result",
        "is_error": false,
        "result": mapping.to_string(),
    })
    .to_string()
}

/// Catalog with a few checks for aws, gcp and azure.
pub fn sample_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_provider(
            "aws",
            vec![
                CheckDefinition::new("s3_bucket_default_encryption", "S3 encryption")
                    .with_service("s3")
                    .with_severity("high"),
                CheckDefinition::new("iam_root_mfa_enabled", "Root MFA").with_service("iam"),
            ],
        )
        .with_provider(
            "gcp",
            vec![CheckDefinition::new("iam_no_service_roles", "No service roles").with_service("iam")],
        )
        .with_provider(
            "azure",
            vec![
                CheckDefinition::new("storage_secure_transfer", "Secure transfer")
                    .with_service("storage"),
            ],
        )
}
