//! Document value helpers
//!
//! The pipeline document is a plain `serde_json::Value` (insertion ordered).
//! This module provides the located shape assertions used everywhere a
//! document node is inspected, and a copy-on-write traversal over string
//! leaves that hands back `Cow::Borrowed` when nothing was rewritten.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{CixxError, Result};

/// JSON object with insertion order preserved
pub type Object = Map<String, Value>;

/// Human readable name of a value's variant, used in shape errors
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(location: &str, expected: &'static str, found: &Value) -> CixxError {
    CixxError::ExpectedType {
        location: location.to_string(),
        expected,
        found: type_name(found),
    }
}

pub fn as_object<'a>(value: &'a Value, location: &str) -> Result<&'a Object> {
    value
        .as_object()
        .ok_or_else(|| expected(location, "an object", value))
}

pub fn into_object(value: Value, location: &str) -> Result<Object> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(expected(location, "an object", &other)),
    }
}

pub fn as_array<'a>(value: &'a Value, location: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| expected(location, "an array", value))
}

pub fn as_str<'a>(value: &'a Value, location: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| expected(location, "a string", value))
}

pub fn as_bool(value: &Value, location: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| expected(location, "a bool", value))
}

/// Check for an array of strings, reporting the first offending element
pub fn as_string_list(value: &Value, location: &str) -> Result<Vec<String>> {
    as_array(value, location)?
        .iter()
        .enumerate()
        .map(|(i, element)| as_str(element, &format!("{location}[{i}]")).map(str::to_string))
        .collect()
}

/// Fetch a required property of an object
pub fn required<'a>(object: &'a Object, field: &str, location: &str) -> Result<&'a Value> {
    object.get(field).ok_or_else(|| CixxError::MissingField {
        location: location.to_string(),
        field: field.to_string(),
    })
}

/// Rewrite every string leaf of `value`.
///
/// `replacer` returns `None` to keep a leaf as it is. Subtrees where no leaf
/// changed are returned borrowed, so a no-op rewrite allocates nothing.
pub fn map_strings<'a, F>(value: &'a Value, replacer: &mut F) -> Result<Cow<'a, Value>>
where
    F: FnMut(&str) -> Result<Option<Value>>,
{
    match value {
        Value::String(s) => Ok(match replacer(s)? {
            Some(new) => Cow::Owned(new),
            None => Cow::Borrowed(value),
        }),
        Value::Array(items) => {
            let mapped = items
                .iter()
                .map(|item| map_strings(item, replacer))
                .collect::<Result<Vec<_>>>()?;
            if mapped.iter().all(|c| matches!(c, Cow::Borrowed(_))) {
                return Ok(Cow::Borrowed(value));
            }
            Ok(Cow::Owned(Value::Array(
                mapped.into_iter().map(Cow::into_owned).collect(),
            )))
        }
        Value::Object(map) => {
            let mapped = map
                .iter()
                .map(|(k, v)| Ok((k, map_strings(v, replacer)?)))
                .collect::<Result<Vec<_>>>()?;
            if mapped.iter().all(|(_, c)| matches!(c, Cow::Borrowed(_))) {
                return Ok(Cow::Borrowed(value));
            }
            Ok(Cow::Owned(Value::Object(
                mapped
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v.into_owned()))
                    .collect(),
            )))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(Cow::Borrowed(value)),
    }
}
