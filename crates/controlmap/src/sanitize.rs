//! Helpers for sanitizing names before they reach the filesystem or tracing
//! span attributes.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

static RE_UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-]").unwrap());
static RE_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Makes a string safe for use as a file name component.
///
/// Anything other than word characters and `-` becomes `_`, runs of `_`
/// collapse into one, and leading/trailing `_` are stripped. Falls back to
/// `mapping` when nothing is left.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = RE_UNSAFE.replace_all(name, "_");
    let collapsed = RE_UNDERSCORES.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        "mapping".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<framework>_<provider>.<extension>`, both parts sanitized.
pub fn artifact_filename(framework: &str, provider: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_filename(framework),
        sanitize_filename(provider),
        extension
    )
}

/// `<framework>_all_providers.zip`.
pub fn archive_filename(framework: &str) -> String {
    format!("{}_all_providers.zip", sanitize_filename(framework))
}
