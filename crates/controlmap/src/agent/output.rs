use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::AgentError;

const PREVIEW_CHARS: usize = 500;

static RE_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").unwrap());
static RE_ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*([\s\S]*?)\s*```").unwrap());
static RE_MAPPING_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\{[\s\S]*"Framework"[\s\S]*"Requirements"[\s\S]*\})"#).unwrap()
});
static RE_ANY_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\{[\s\S]*\})").unwrap());

/// Pulls the mapping object out of raw agent stdout.
///
/// Accepted shapes, in order:
/// - the CLI result wrapper `{"type": "result", "is_error": .., "result": ..}`
///   where `result` is an object or a string containing one
/// - a bare JSON object
/// - a JSON object embedded in prose, inside a fenced block or not
pub fn extract_json(output: &str) -> Result<Map<String, Value>, AgentError> {
    if output.trim().is_empty() {
        return Err(AgentError::Output("agent returned empty output".to_string()));
    }

    match serde_json::from_str::<Value>(output.trim()) {
        Ok(Value::Object(wrapper)) => unwrap_result(wrapper),
        Ok(other) => Err(AgentError::Output(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(_) => find_json_in_text(output),
    }
}

fn unwrap_result(wrapper: Map<String, Value>) -> Result<Map<String, Value>, AgentError> {
    if wrapper.get("type").and_then(Value::as_str) != Some("result") {
        return Ok(wrapper);
    }

    let result = wrapper.get("result").cloned().unwrap_or(Value::Null);

    if wrapper.get("is_error").and_then(Value::as_bool) == Some(true) {
        let detail = match &result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(AgentError::Execution(format!("agent returned error: {}", detail)));
    }

    match result {
        Value::Object(map) => Ok(map),
        Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Object(map)) => Ok(map),
            _ => find_json_in_text(&text),
        },
        other => Err(AgentError::Output(format!(
            "result field is {}, expected an object or string",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    let cleaned = candidate.trim();
    if !cleaned.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn find_json_in_text(text: &str) -> Result<Map<String, Value>, AgentError> {
    for pattern in [&*RE_JSON_FENCE, &*RE_ANY_FENCE, &*RE_MAPPING_OBJECT, &*RE_ANY_OBJECT] {
        for captures in pattern.captures_iter(text) {
            if let Some(map) = captures.get(1).and_then(|m| parse_object(m.as_str())) {
                return Ok(map);
            }
        }
    }

    if let Some(map) = scan_balanced_objects(text) {
        return Ok(map);
    }

    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    Err(AgentError::Output(format!(
        "could not extract valid JSON from agent output. Output preview: {}...",
        preview
    )))
}

/// Tries each top-level `{...}` span in order, skipping braces inside strings.
fn scan_balanced_objects(text: &str) -> Option<Map<String, Value>> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(map) = start.take().and_then(|s| parse_object(&text[s..=i])) {
                        return Some(map);
                    }
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_output() {
        assert_eq!(
            extract_json("  \n"),
            Err(AgentError::Output("agent returned empty output".to_string()))
        );
    }

    #[test]
    fn test_bare_mapping_object() {
        let map = extract_json(r#"{"Framework": "CIS", "Requirements": []}"#).unwrap();
        assert_eq!(map["Framework"], "CIS");
    }

    #[test]
    fn test_wrapper_with_object_result() {
        let out = r#"{"type": "result", "is_error": false, "result": {"Framework": "CIS"}}"#;
        assert_eq!(extract_json(out).unwrap()["Framework"], "CIS");
    }

    #[test]
    fn test_wrapper_with_string_result() {
        let out = serde_json::json!({
            "type": "result",
            "is_error": false,
            "result": "{\"Framework\": \"NIST\", \"Requirements\": []}",
        })
        .to_string();
        assert_eq!(extract_json(&out).unwrap()["Framework"], "NIST");
    }

    #[test]
    fn test_wrapper_with_fenced_result() {
        let out = serde_json::json!({
            "type": "result",
            "result": "Here is the mapping:\n```json\n{\"Framework\": \"PCI\"}\n```\nDone.",
        })
        .to_string();
        assert_eq!(extract_json(&out).unwrap()["Framework"], "PCI");
    }

    #[test]
    fn test_wrapper_error_is_execution_failure() {
        let out = r#"{"type": "result", "is_error": true, "result": "usage limit reached"}"#;
        assert_eq!(
            extract_json(out),
            Err(AgentError::Execution(
                "agent returned error: usage limit reached".to_string()
            ))
        );
    }

    #[test]
    fn test_plain_fence() {
        let out = "Result:\n```\n{\"Framework\": \"ISO\"}\n```";
        assert_eq!(extract_json(out).unwrap()["Framework"], "ISO");
    }

    #[test]
    fn test_object_in_prose() {
        let out = "Sure! {\"Framework\": \"SOC2\", \"Requirements\": [{\"Id\": \"CC1\"}]} hope it helps";
        let map = extract_json(out).unwrap();
        assert_eq!(map["Framework"], "SOC2");
        assert_eq!(map["Requirements"][0]["Id"], "CC1");
    }

    #[test]
    fn test_balanced_scan_skips_broken_prefix() {
        let out = "first {not json} then {\"Framework\": \"x}y\"} tail }";
        assert_eq!(extract_json(out).unwrap()["Framework"], "x}y");
    }

    #[test]
    fn test_non_json_output_is_parse_error() {
        let err = extract_json("I could not complete the mapping.").unwrap_err();
        match err {
            AgentError::Output(message) => {
                assert!(message.starts_with("could not extract valid JSON"));
                assert!(message.contains("I could not complete the mapping."));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_top_level_array_rejected() {
        assert!(matches!(
            extract_json("[1, 2]"),
            Err(AgentError::Output(message)) if message.contains("an array")
        ));
    }
}
