use std::collections::HashSet;
use std::path::Path;

use crate::catalog::CheckCatalog;
use crate::config::LimitSettings;
use crate::error::ValidationError;
use crate::intake::{ConfigureRequest, ConfiguredProvider};

/// Checks an incoming upload against the configured limits and returns its
/// lowercased extension (with the leading dot).
pub fn validate_upload(
    filename: &str,
    size_bytes: u64,
    limits: &LimitSettings,
) -> Result<String, ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::MissingFilename);
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();

    if !limits.allows_extension(&extension) {
        return Err(ValidationError::UnsupportedFileType {
            extension,
            allowed: limits.allowed_extensions.join(", "),
        });
    }

    if size_bytes > limits.max_upload_bytes {
        return Err(ValidationError::FileTooLarge {
            max_bytes: limits.max_upload_bytes,
        });
    }

    if size_bytes == 0 {
        return Err(ValidationError::EmptyFile);
    }

    Ok(extension)
}

/// Validates framework name and provider selection, returning per-provider
/// check counts in request order.
pub fn validate_configure_request(
    request: &ConfigureRequest,
    catalog: &dyn CheckCatalog,
) -> Result<Vec<ConfiguredProvider>, ValidationError> {
    if request.framework_name.trim().is_empty() {
        return Err(ValidationError::EmptyFrameworkName);
    }

    if request.providers.is_empty() {
        return Err(ValidationError::NoProviders);
    }

    let mut seen = HashSet::new();
    let mut configured = Vec::with_capacity(request.providers.len());

    for provider in &request.providers {
        if !seen.insert(provider.as_str()) {
            return Err(ValidationError::DuplicateProvider(provider.clone()));
        }

        if !catalog.provider_exists(provider) {
            return Err(ValidationError::UnknownProvider {
                provider: provider.clone(),
                available: catalog.provider_names().join(", "),
            });
        }

        let page = catalog.checks(provider, &crate::catalog::CheckQuery::all());
        configured.push(ConfiguredProvider {
            name: provider.clone(),
            check_count: page.total,
        });
    }

    Ok(configured)
}
