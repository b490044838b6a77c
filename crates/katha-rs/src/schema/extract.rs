//! Locating the JSON object inside a free-form model response.
//!
//! Models are asked for a fenced ```json block but routinely answer with a
//! bare object, an object wrapped in prose, or a fence without the language
//! tag. All of these are accepted; anything else is a [`ParseError`].

use crate::error::ParseError;
use serde_json::Value;

const FENCE: &str = "```";

/// Extract and parse the first JSON value carried by `raw`.
///
/// Tried in order: the body of the first fenced block, the whole trimmed
/// text, and finally the span from the first `{` to the last `}`.
pub fn extract_json_value(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();

    if let Some(body) = fenced_body(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(body.trim())
    {
        return Ok(value);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let span = trimmed.get(s..=e).ok_or(ParseError::NoJson(raw.len()))?;
            serde_json::from_str::<Value>(span).map_err(ParseError::from)
        }
        _ => Err(ParseError::NoJson(raw.len())),
    }
}

/// Body of the first ``` fence, skipping an optional language tag.
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = text.get(open + FENCE.len()..)?;
    // The language tag (if any) runs to the end of the fence line.
    let body_start = after_open.find('\n').map_or(0, |i| i + 1);
    let body = after_open.get(body_start..)?;
    let close = body.find(FENCE)?;
    body.get(..close)
}

/// Short name of a JSON value's type, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
