use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading schema and UI schema documents.
///
/// These only surface at setup time. Rendering never returns them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// A scope string is not of the form `#`, `#/...` or `/...`.
    #[error("invalid scope `{0}`")]
    InvalidScope(String),

    /// A required field of a UI schema element is missing.
    #[error("{path}: missing field `{field}`")]
    MissingField { path: String, field: String },

    /// A field has the wrong JSON type.
    #[error("{path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

/// JSON type name of a value, as used in JSON Schema `type`.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Derive the set of types a schema admits.
///
/// An explicit `type` wins. Otherwise `properties`/`additionalProperties`
/// imply `object`, `items` implies `array`, and combinators contribute the
/// union of their alternatives.
pub fn derive_types(schema: &Value) -> Vec<String> {
    let Some(obj) = schema.as_object() else {
        return Vec::new();
    };

    match obj.get("type") {
        Some(Value::String(t)) => return vec![t.clone()],
        Some(Value::Array(types)) => {
            return types
                .iter()
                .filter_map(|t| t.as_str().map(String::from))
                .collect();
        }
        _ => {}
    }

    if obj.contains_key("properties") || obj.contains_key("additionalProperties") {
        return vec!["object".to_string()];
    }
    if obj.contains_key("items") {
        return vec!["array".to_string()];
    }

    let mut types: Vec<String> = Vec::new();
    for key in ["allOf", "anyOf", "oneOf"] {
        if let Some(alternatives) = obj.get(key).and_then(|v| v.as_array()) {
            for t in alternatives.iter().flat_map(derive_types) {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
        }
    }
    types
}

/// Whether `schema` admits `expected` according to [`derive_types`].
pub fn has_type(schema: &Value, expected: &str) -> bool {
    derive_types(schema).iter().any(|t| t == expected)
}

/// Start-case a property name: `firstName` → `First Name`, `max_len` → `Max Len`.
pub fn start_case(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
