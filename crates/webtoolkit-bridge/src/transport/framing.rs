//! Line framing for coordinator requests and responses.
//!
//! One JSON object per line. A request must be an object carrying a string
//! `action`; the coordinator does the rest of the validation.

use serde_json::Value;

use crate::types::{BridgeError, BridgeResult};

/// Request lines longer than this are refused. Page markup travels inline.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Parse one request line.
pub fn parse_message(line: &str) -> BridgeResult<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidRequest("Empty message".to_string()));
    }
    if trimmed.len() > MAX_MESSAGE_BYTES {
        return Err(BridgeError::InvalidRequest(format!(
            "Message of {} bytes exceeds {MAX_MESSAGE_BYTES}",
            trimmed.len()
        )));
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
    match value.get("action") {
        Some(Value::String(_)) => Ok(value),
        Some(_) => Err(BridgeError::InvalidRequest("action must be a string".to_string())),
        None if value.is_object() => Err(BridgeError::InvalidRequest("missing action".to_string())),
        None => Err(BridgeError::InvalidRequest("message must be a JSON object".to_string())),
    }
}

/// Serialize a response as one line with a trailing newline.
pub fn frame_response(value: &Value) -> BridgeResult<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}
