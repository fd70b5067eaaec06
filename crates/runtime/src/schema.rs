//! Translation of tool definitions into the backend's function-calling schema.

use mcp::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// A tool in function-calling form: `{type: "function", function: {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Parameter schema used when a tool declares none.
pub fn default_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

impl From<&ToolDefinition> for FunctionTool {
    fn from(def: &ToolDefinition) -> Self {
        let parameters = match &def.parameter_schema {
            Some(Value::Object(schema)) if !schema.is_empty() => Value::Object(schema.clone()),
            _ => default_parameters(),
        };

        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters,
            },
        }
    }
}

/// Translate tool definitions, preserving order.
pub fn translate(definitions: &[ToolDefinition]) -> Vec<FunctionTool> {
    definitions.iter().map(FunctionTool::from).collect()
}

/// Argument validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required argument '{0}'")]
    MissingRequired(String),

    #[error("argument '{name}' should be {expected}, got {found}")]
    WrongType {
        name: String,
        expected: String,
        found: &'static str,
    },
}

/// Check arguments against a declared parameter schema.
///
/// Only `required` and the `type` of declared properties are enforced;
/// undeclared arguments pass through.
pub fn validate_arguments(
    schema: Option<&Value>,
    arguments: &Map<String, Value>,
) -> Result<(), ValidationError> {
    let Some(schema) = schema else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(name) {
                return Err(ValidationError::MissingRequired(name.to_string()));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, value) in arguments {
        let Some(declared) = properties.get(name).and_then(|p| p.get("type")) else {
            continue;
        };

        let allowed: Vec<&str> = match declared {
            Value::String(kind) => vec![kind.as_str()],
            Value::Array(kinds) => kinds.iter().filter_map(Value::as_str).collect(),
            _ => continue,
        };

        if !allowed.iter().any(|kind| matches_type(kind, value)) {
            return Err(ValidationError::WrongType {
                name: name.clone(),
                expected: allowed.join(" or "),
                found: type_name(value),
            });
        }
    }

    Ok(())
}

fn matches_type(kind: &str, value: &Value) -> bool {
    match kind {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown keywords are not ours to reject.
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> ToolDefinition {
        ToolDefinition::new("calculator", "Evaluate a mathematical expression").with_schema(json!({
            "type": "object",
            "properties": {"expression": {"type": "string"}},
            "required": ["expression"]
        }))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn translates_to_function_shape() {
        let tools = translate(&[calculator()]);
        let value = serde_json::to_value(&tools).unwrap();
        assert_eq!(value[0]["type"], "function");
        assert_eq!(value[0]["function"]["name"], "calculator");
        assert_eq!(
            value[0]["function"]["parameters"]["required"],
            json!(["expression"])
        );
    }

    #[test]
    fn missing_schema_gets_default() {
        let tools = translate(&[ToolDefinition::new("ping", "")]);
        assert_eq!(tools[0].function.parameters, default_parameters());

        let empty = ToolDefinition::new("ping", "").with_schema(json!({}));
        assert_eq!(FunctionTool::from(&empty).function.parameters, default_parameters());
    }

    #[test]
    fn translation_is_deterministic_and_ordered() {
        let defs = vec![calculator(), ToolDefinition::new("web_search", "Search")];
        let first = translate(&defs);
        assert_eq!(first, translate(&defs));
        assert_eq!(first[0].function.name, "calculator");
        assert_eq!(first[1].function.name, "web_search");
        assert!(translate(&[]).is_empty());
    }

    #[test]
    fn valid_arguments_pass() {
        let def = calculator();
        let result = validate_arguments(
            def.parameter_schema.as_ref(),
            &args(json!({"expression": "2 + 2", "extra": true})),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let def = calculator();
        let err = validate_arguments(def.parameter_schema.as_ref(), &Map::new()).unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired("expression".into()));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let def = calculator();
        let err = validate_arguments(
            def.parameter_schema.as_ref(),
            &args(json!({"expression": 42})),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument 'expression' should be string, got number"
        );
    }

    #[test]
    fn integer_and_union_types() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "host": {"type": ["string", "null"]}
            }
        });
        let valid = args(json!({"count": 4, "host": null}));
        assert!(validate_arguments(Some(&schema), &valid).is_ok());
        assert!(validate_arguments(Some(&schema), &args(json!({"count": 4.5}))).is_err());
    }

    #[test]
    fn no_schema_accepts_anything() {
        assert!(validate_arguments(None, &args(json!({"anything": [1, 2]}))).is_ok());
    }
}
