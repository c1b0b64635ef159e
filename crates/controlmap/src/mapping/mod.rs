//! The canonical mapping document produced for one provider.

pub mod export;
pub mod xlsx;

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::provider_display_name;
use crate::error::AgentError;
use crate::intake::FrameworkInfo;

pub use export::{Exporter, WorkbookExporter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attribute {
    pub item_id: String,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Requirement {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Vec<Attribute>,
    pub checks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MappingOutput {
    pub framework: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub requirements: Vec<Requirement>,
}

/// Counters describing one mapping, or the sum over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSummary {
    pub total_controls: usize,
    pub controls_with_checks: usize,
    pub total_check_mappings: usize,
    pub unmapped_controls: usize,
}

impl AddAssign for MappingSummary {
    fn add_assign(&mut self, other: Self) {
        self.total_controls += other.total_controls;
        self.controls_with_checks += other.controls_with_checks;
        self.total_check_mappings += other.total_check_mappings;
        self.unmapped_controls += other.unmapped_controls;
    }
}

impl MappingOutput {
    /// Normalizes the raw agent object and checks it against the schema.
    ///
    /// The provider display name and the configured full name and
    /// description always win over what the agent wrote. SubGroup keys are
    /// dropped everywhere when subgroups are disabled.
    pub fn from_agent_object(
        mut raw: Map<String, Value>,
        provider: &str,
        framework: &FrameworkInfo,
        enable_subgroup: bool,
    ) -> Result<Self, AgentError> {
        raw.insert(
            "Provider".to_string(),
            Value::String(provider_display_name(provider)),
        );
        if let Some(full_name) = &framework.full_name {
            raw.insert("Name".to_string(), Value::String(full_name.clone()));
        }
        if let Some(description) = &framework.description {
            raw.insert("Description".to_string(), Value::String(description.clone()));
        }

        if !enable_subgroup {
            strip_subgroups(&mut raw);
        }

        serde_json::from_value(Value::Object(raw)).map_err(|e| {
            AgentError::Output(format!("output does not match the mapping schema: {}", e))
        })
    }

    pub fn summary(&self) -> MappingSummary {
        let total_controls = self.requirements.len();
        let controls_with_checks = self
            .requirements
            .iter()
            .filter(|r| !r.checks.is_empty())
            .count();
        let total_check_mappings = self.requirements.iter().map(|r| r.checks.len()).sum();

        MappingSummary {
            total_controls,
            controls_with_checks,
            total_check_mappings,
            unmapped_controls: total_controls - controls_with_checks,
        }
    }
}

fn strip_subgroups(raw: &mut Map<String, Value>) {
    let Some(Value::Array(requirements)) = raw.get_mut("Requirements") else {
        return;
    };

    for requirement in requirements.iter_mut().filter_map(Value::as_object_mut) {
        requirement.remove("SubGroup");
        if let Some(Value::Array(attributes)) = requirement.get_mut("Attributes") {
            for attribute in attributes.iter_mut().filter_map(Value::as_object_mut) {
                attribute.remove("SubGroup");
            }
        }
    }
}
