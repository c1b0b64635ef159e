use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;
use walkdir::WalkDir;

use super::{paginate, CheckCatalog, CheckDefinition, CheckPage, CheckQuery, ProviderInfo};

const METADATA_SUFFIX: &str = ".metadata.json";

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    display_name: Option<String>,
}

/// Catalog backed by `<root>/<provider>/services/**/<check>.metadata.json`.
///
/// Directories starting with `.` or `_` are not providers. An optional
/// `<provider>/_metadata.json` may carry a `display_name`.
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provider_dirs(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            warn!("Providers directory does not exist: {}", self.root.display());
            return Vec::new();
        }

        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter(|e| {
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && !name.starts_with('_')
            })
            .map(|e| e.into_path())
            .collect()
    }

    fn metadata_files(&self, provider: &str) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(self.root.join(provider).join("services"))
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().ends_with(METADATA_SUFFIX))
            .map(|e| e.into_path())
    }

    fn display_name(provider_dir: &Path, name: &str) -> String {
        let fallback = name.to_uppercase();
        let metadata_path = provider_dir.join("_metadata.json");
        let Ok(content) = std::fs::read_to_string(&metadata_path) else {
            return fallback;
        };

        match serde_json::from_str::<ProviderMetadata>(&content) {
            Ok(meta) => meta.display_name.unwrap_or(fallback),
            Err(e) => {
                debug!("Ignoring malformed {}: {}", metadata_path.display(), e);
                fallback
            }
        }
    }

    fn is_valid_provider_name(provider: &str) -> bool {
        !provider.is_empty()
            && !provider.starts_with('.')
            && !provider.starts_with('_')
            && !provider.contains(['/', '\\'])
    }
}

impl CheckCatalog for DirectoryCatalog {
    fn list_providers(&self) -> Vec<ProviderInfo> {
        let mut providers: Vec<ProviderInfo> = self
            .provider_dirs()
            .into_iter()
            .filter_map(|dir| {
                let name = dir.file_name()?.to_str()?.to_string();
                let check_count = self.metadata_files(&name).count();
                debug!("Provider {}: found {} checks", name, check_count);
                Some(ProviderInfo {
                    display_name: Self::display_name(&dir, &name),
                    name,
                    check_count,
                })
            })
            .collect();

        providers.sort_by(|a, b| a.name.cmp(&b.name));
        providers
    }

    fn provider_exists(&self, provider: &str) -> bool {
        Self::is_valid_provider_name(provider) && self.root.join(provider).is_dir()
    }

    fn checks(&self, provider: &str, query: &CheckQuery) -> CheckPage {
        if !self.provider_exists(provider) {
            return paginate(provider, Vec::new(), query);
        }

        let checks = self
            .metadata_files(provider)
            .filter_map(|path| {
                let content = std::fs::read_to_string(&path).ok()?;
                match serde_json::from_str::<CheckDefinition>(&content) {
                    Ok(check) => Some(check),
                    Err(e) => {
                        debug!("Skipping unreadable check {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();

        paginate(provider, checks, query)
    }
}
