//! Shared value types used across tool implementations: JSON-schema shape
//! for tool input, and the redaction policy consumed by `redaction.rs`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ToolError;

/// JSON Schema for a tool's input parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolInputSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
        }
    }

    pub fn with_properties(properties: serde_json::Value, required: Vec<String>) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
        }
    }

    /// Structural check run before a tool ever sees `arguments`: every
    /// `required` name must be present, and every property that declares a
    /// `type` must match if the caller supplied it. Not a full JSON Schema
    /// implementation (no nested objects, no enum/format/minimum checks) —
    /// just enough to turn a malformed call into `invalid_input` before it
    /// reaches guardrails or a tool body. `approval_token` is never a
    /// declared property but rides in `arguments` anyway, so it's exempt.
    pub fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let object = match arguments {
            Value::Null => return Ok(()),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::invalid_input(format!(
                    "expected an object, got {other}"
                )))
            }
        };

        if let Some(required) = &self.required {
            for name in required {
                if !object.contains_key(name) {
                    return Err(ToolError::invalid_input(format!(
                        "missing required field: {name}"
                    )));
                }
            }
        }

        if let Some(Value::Object(properties)) = &self.properties {
            for (name, value) in object {
                if name == "approval_token" {
                    continue;
                }
                let Some(expected_type) = properties
                    .get(name)
                    .and_then(|p| p.get("type"))
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                if !json_type_matches(value, expected_type) {
                    return Err(ToolError::invalid_input(format!(
                        "field {name} must be of type {expected_type}"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn json_type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// How `redaction::redact_value` treats a value believed to carry user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    None,
    Truncate,
    Hash,
}

impl Default for RedactionMode {
    fn default() -> Self {
        Self::Hash
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionPolicy {
    pub mode: RedactionMode,
    pub max_sample_count: usize,
    pub max_value_length: usize,
    pub hash_prefix_length: usize,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            mode: RedactionMode::Hash,
            max_sample_count: 5,
            max_value_length: 200,
            hash_prefix_length: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_is_empty_object() {
        let schema = ToolInputSchema::default();
        assert_eq!(schema.schema_type, "object");
        assert!(schema.properties.is_none());
    }

    #[test]
    fn default_redaction_policy_hashes() {
        assert_eq!(RedactionPolicy::default().mode, RedactionMode::Hash);
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let schema = ToolInputSchema::with_properties(
            serde_json::json!({ "job_id": { "type": "integer" } }),
            vec!["job_id".to_string()],
        );
        let err = schema.validate(&serde_json::json!({})).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorKind::InvalidInput);
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let schema = ToolInputSchema::with_properties(
            serde_json::json!({ "job_id": { "type": "integer" } }),
            vec![],
        );
        let err = schema
            .validate(&serde_json::json!({ "job_id": "not-a-number" }))
            .unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorKind::InvalidInput);
    }

    #[test]
    fn validate_ignores_the_out_of_band_approval_token() {
        let schema = ToolInputSchema::with_properties(
            serde_json::json!({ "job_id": { "type": "integer" } }),
            vec![],
        );
        assert!(schema
            .validate(&serde_json::json!({ "job_id": 1, "approval_token": "tok" }))
            .is_ok());
    }

    #[test]
    fn validate_accepts_null_arguments() {
        let schema = ToolInputSchema::new();
        assert!(schema.validate(&Value::Null).is_ok());
    }
}
