//! Values containing template strings, rendered as expressions or JSON text

use serde_json::Value;

use crate::error::{CixxError, Result};

use super::template::{render, scan, template_to_expression};

fn json_literal(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CixxError::Serialize {
        details: e.to_string(),
    })
}

/// Convert a value containing template strings into one expression.
///
/// Arrays and objects have no literal syntax in the expression language,
/// so they go through `fromJSON` of their JSON template.
pub fn to_expression(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => template_to_expression(s),
        Value::Null | Value::Bool(_) | Value::Number(_) => json_literal(value),
        Value::Array(_) | Value::Object(_) => {
            let json_template = to_json_template(value)?;
            Ok(format!("fromJSON({})", render(&scan(&json_template)?)))
        }
    }
}

/// Render a value as JSON text in which every string is a `toJson` placeholder.
///
/// Once the platform has evaluated the placeholders the text is valid JSON.
pub fn to_json_template(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(format!("${{{{toJson({})}}}}", template_to_expression(s)?)),
        Value::Object(map) => {
            let pairs = map
                .iter()
                .map(|(k, v)| Ok(format!("{}:{}", json_literal(&Value::String(k.clone()))?, to_json_template(v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{{{}}}", pairs.join(",")))
        }
        Value::Array(items) => {
            let elements = items
                .iter()
                .map(to_json_template)
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", elements.join(",")))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => json_literal(value),
    }
}
