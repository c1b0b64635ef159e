//! Provider security check catalog.
//!
//! The orchestrator only needs to know which providers exist, how many checks
//! each has, and a prompt-ready listing of those checks. [`DirectoryCatalog`]
//! reads check metadata files from disk; [`StaticCatalog`] holds them in
//! memory.

pub mod directory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use directory::DirectoryCatalog;

/// Output display name for a provider key. Unknown keys are returned as-is.
pub fn provider_display_name(provider: &str) -> String {
    match provider.to_lowercase().as_str() {
        "aws" => "AWS".to_string(),
        "azure" => "Azure".to_string(),
        "gcp" => "GCP".to_string(),
        "github" => "GitHub".to_string(),
        "kubernetes" => "Kubernetes".to_string(),
        "m365" => "M365".to_string(),
        "nhn" => "NHN".to_string(),
        "oraclecloud" => "OracleCloud".to_string(),
        "alibabacloud" => "alibabacloud".to_string(),
        _ => provider.to_string(),
    }
}

/// A single check definition as stored in `<check>.metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    #[serde(rename = "CheckID", default)]
    pub check_id: String,
    #[serde(rename = "CheckTitle", default)]
    pub check_title: String,
    #[serde(rename = "ServiceName", default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(rename = "Severity", default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CheckDefinition {
    pub fn new(check_id: impl Into<String>, check_title: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            check_title: check_title.into(),
            service_name: None,
            severity: None,
            description: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service_name = Some(service.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    /// `- <id>: <title> (Service: <svc>, Severity: <sev>)`
    pub fn prompt_line(&self) -> String {
        let id = if self.check_id.is_empty() {
            "unknown"
        } else {
            &self.check_id
        };
        let title = if self.check_title.is_empty() {
            "No title"
        } else {
            &self.check_title
        };
        let mut line = format!("- {}: {}", id, title);

        let mut extra = Vec::new();
        if let Some(service) = self.service_name.as_deref().filter(|s| !s.is_empty()) {
            extra.push(format!("Service: {}", service));
        }
        if let Some(severity) = self.severity.as_deref().filter(|s| !s.is_empty()) {
            extra.push(format!("Severity: {}", severity));
        }
        if !extra.is_empty() {
            line.push_str(&format!(" ({})", extra.join(", ")));
        }

        line
    }

    fn matches(&self, query: &CheckQuery) -> bool {
        if let Some(service) = &query.service {
            let own = self.service_name.as_deref().unwrap_or("");
            if !own.eq_ignore_ascii_case(service) {
                return false;
            }
        }

        if let Some(search) = &query.search {
            let haystack = format!(
                "{} {} {}",
                self.check_id,
                self.check_title,
                self.description.as_deref().unwrap_or("")
            )
            .to_lowercase();
            if !haystack.contains(&search.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub check_count: usize,
}

/// Filter and pagination for check listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for CheckQuery {
    fn default() -> Self {
        Self {
            search: None,
            service: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl CheckQuery {
    pub fn all() -> Self {
        Self {
            limit: usize::MAX,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPage {
    pub provider: String,
    pub total: usize,
    pub checks: Vec<CheckDefinition>,
}

/// Applies a query to an unsorted list of checks: filter, sort by id, paginate.
pub fn paginate(provider: &str, mut checks: Vec<CheckDefinition>, query: &CheckQuery) -> CheckPage {
    checks.retain(|c| c.matches(query));
    checks.sort_by(|a, b| a.check_id.cmp(&b.check_id));
    let total = checks.len();
    let checks = checks
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();

    CheckPage {
        provider: provider.to_string(),
        total,
        checks,
    }
}

pub trait CheckCatalog: Send + Sync {
    /// All known providers sorted by name.
    fn list_providers(&self) -> Vec<ProviderInfo>;

    fn provider_exists(&self, provider: &str) -> bool;

    fn checks(&self, provider: &str, query: &CheckQuery) -> CheckPage;

    /// Check listing embedded into agent prompts, one line per check.
    fn checks_for_prompt(&self, provider: &str) -> String {
        let page = self.checks(provider, &CheckQuery::all());
        if page.checks.is_empty() {
            return format!("No checks found for provider: {}", provider);
        }

        page.checks
            .iter()
            .map(CheckDefinition::prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn provider_names(&self) -> Vec<String> {
        self.list_providers().into_iter().map(|p| p.name).collect()
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    providers: BTreeMap<String, Vec<CheckDefinition>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>, checks: Vec<CheckDefinition>) -> Self {
        self.providers.insert(provider.into(), checks);
        self
    }
}

impl CheckCatalog for StaticCatalog {
    fn list_providers(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|(name, checks)| ProviderInfo {
                name: name.clone(),
                display_name: provider_display_name(name),
                check_count: checks.len(),
            })
            .collect()
    }

    fn provider_exists(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    fn checks(&self, provider: &str, query: &CheckQuery) -> CheckPage {
        let checks = self.providers.get(provider).cloned().unwrap_or_default();
        paginate(provider, checks, query)
    }
}
