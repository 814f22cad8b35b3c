//! Request body encoding.

use bytes::Bytes;
use serde_json::Value;

use super::config::{CONTENT_TYPE_FORM, Parameters};
use super::request::HttpMethod;
use crate::encoding::TextEncoding;
use crate::error::{NetworkError, Result};

/// Encode `parameters` as a request body for `content_type`.
///
/// Form bodies are `key=value` pairs joined by `&`. Keys and values are
/// written as-is, without percent-encoding. Every other content type gets a
/// JSON object.
///
/// Fails with [`NetworkError::EmptyParameters`] when there is nothing to send.
pub fn encode(
    method: HttpMethod,
    parameters: &Parameters,
    content_type: &str,
    encoding: TextEncoding,
) -> Result<Bytes> {
    if parameters.is_empty() {
        return Err(NetworkError::EmptyParameters { method });
    }
    if let Some((key, reason)) = parameters.rejected().first() {
        return Err(NetworkError::Serialization(format!(
            "parameter '{key}': {reason}"
        )));
    }

    if is_form(content_type) {
        encoding.encode_bytes(&form_string(parameters))
    } else {
        let body = serde_json::to_vec(parameters.as_map())?;
        Ok(Bytes::from(body))
    }
}

fn is_form(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(CONTENT_TYPE_FORM))
}

fn form_string(parameters: &Parameters) -> String {
    parameters
        .iter()
        .map(|(key, value)| format!("{key}={}", scalar_string(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Default textual form of a parameter value.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
