//! Synthesizes a typed argument shape from a tool's JSON Schema, and
//! validates caller-supplied arguments against it.

use genflow_types::ToolError;
use serde_json::Value;

/// The JSON type an argument's schema declared. Schema types this workspace
/// does not model explicitly fall back to [`ArgKind::String`], matching how
/// an unrecognized JSON Schema `type` is treated as opaque text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// `"type": "string"`.
    String,
    /// `"type": "integer"`.
    Integer,
    /// `"type": "number"`.
    Number,
    /// `"type": "boolean"`.
    Boolean,
    /// `"type": "array"`.
    Array,
    /// `"type": "object"`.
    Object,
}

impl ArgKind {
    fn from_schema_type(schema_type: &str) -> Self {
        match schema_type {
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => Self::String,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One argument in a tool's synthesized shape.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    /// Argument name, as it appears in the tool's `properties`.
    pub name: String,
    /// Declared or defaulted JSON type.
    pub kind: ArgKind,
    /// Whether the tool's schema lists this argument in `required`.
    pub required: bool,
    /// Schema-provided description, if any.
    pub description: String,
}

/// The argument shape synthesized from a tool's `inputSchema`.
#[derive(Debug, Clone, Default)]
pub struct ArgShape {
    /// One entry per property in the schema, in schema order.
    pub args: Vec<ArgSpec>,
}

impl ArgShape {
    /// Derive an argument shape from a JSON Schema object.
    ///
    /// A schema that is not `{"type": "object", ...}` (no arguments, or an
    /// unsupported shape) yields an empty shape, matching how a tool with
    /// no declared parameters is treated as taking none.
    pub fn from_schema(schema: &Value) -> Self {
        let is_object_schema = schema.get("type").and_then(Value::as_str) == Some("object");
        if !is_object_schema {
            return Self::default();
        }

        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Self::default();
        };

        let args = properties
            .iter()
            .map(|(name, field_schema)| ArgSpec {
                name: name.clone(),
                kind: field_schema
                    .get("type")
                    .and_then(Value::as_str)
                    .map(ArgKind::from_schema_type)
                    .unwrap_or(ArgKind::String),
                required: required.contains(&name.as_str()),
                description: field_schema.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
            })
            .collect();

        Self { args }
    }

    /// Validate that `input` (expected to be a JSON object) supplies every
    /// required argument with a value of the right JSON type. Unknown keys
    /// in `input` pass through untouched; the tool server is responsible for
    /// rejecting fields it doesn't understand.
    pub fn validate(&self, tool_name: &str, input: &Value) -> Result<(), ToolError> {
        let object = input.as_object().ok_or_else(|| ToolError::InvalidArguments {
            tool: tool_name.to_string(),
            message: "arguments must be a JSON object".to_string(),
        })?;

        for spec in &self.args {
            match object.get(&spec.name) {
                Some(value) if !spec.kind.matches(value) => {
                    return Err(ToolError::InvalidArguments {
                        tool: tool_name.to_string(),
                        message: format!("argument '{}' does not match the expected type", spec.name),
                    });
                }
                None if spec.required => {
                    return Err(ToolError::InvalidArguments {
                        tool: tool_name.to_string(),
                        message: format!("missing required argument '{}'", spec.name),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "search text" },
                "limit": { "type": "integer" },
            },
            "required": ["query"],
        })
    }

    #[test]
    fn synthesizes_required_and_optional_args() {
        let shape = ArgShape::from_schema(&sample_schema());
        let query = shape.args.iter().find(|a| a.name == "query").unwrap();
        assert!(query.required);
        assert_eq!(query.kind, ArgKind::String);

        let limit = shape.args.iter().find(|a| a.name == "limit").unwrap();
        assert!(!limit.required);
        assert_eq!(limit.kind, ArgKind::Integer);
    }

    #[test]
    fn unrecognized_type_defaults_to_string() {
        let schema = json!({
            "type": "object",
            "properties": { "odd": { "type": "frobnicate" } },
        });
        let shape = ArgShape::from_schema(&schema);
        assert_eq!(shape.args[0].kind, ArgKind::String);
    }

    #[test]
    fn non_object_schema_yields_empty_shape() {
        let shape = ArgShape::from_schema(&json!({"type": "string"}));
        assert!(shape.args.is_empty());
    }

    #[test]
    fn validate_rejects_missing_required_argument() {
        let shape = ArgShape::from_schema(&sample_schema());
        let result = shape.validate("search", &json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let shape = ArgShape::from_schema(&sample_schema());
        let result = shape.validate("search", &json!({"query": 5}));
        assert!(result.is_err());
    }

    #[test]
    fn validate_accepts_well_typed_input() {
        let shape = ArgShape::from_schema(&sample_schema());
        let result = shape.validate("search", &json!({"query": "rust", "limit": 10}));
        assert!(result.is_ok());
    }
}
