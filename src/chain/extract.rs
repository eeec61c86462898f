//! Defensive JSON extraction from model output.
//!
//! Agents are instructed to return only JSON, but models still wrap output
//! in prose or fenced code blocks. Extraction failure is a hard error for
//! the calling agent.

use serde_json::{Map, Value};

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Extract and parse the first well-formed JSON object in `text`.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    let json_str = extract_json_object(text);
    let value: Value =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
