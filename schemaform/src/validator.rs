//! JSON Schema validation.
//!
//! The engine only relies on the [`Validator`] contract: validate a value
//! against a schema and return the list of errors, where an empty list means
//! the value is accepted. [`BasicValidator`] implements the keyword subset
//! rule conditions and form constraints use in practice.

use std::{collections::HashMap, sync::Mutex};

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::schema::json_type_name;

/// A single validation failure.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{instance_path}: {message} ({keyword})")]
pub struct ValidationError {
    /// Slash-delimited location of the failing value (`""` for the root).
    pub instance_path: String,
    /// The schema keyword that rejected the value.
    pub keyword: String,
    /// Human readable description.
    pub message: String,
}

/// Validation contract consumed by the rule evaluator.
pub trait Validator: Send + Sync {
    /// Validate `data` against `schema`. An empty result means success.
    fn validate(&self, data: &Value, schema: &Value) -> Vec<ValidationError>;

    /// Convenience wrapper around [`Validator::validate`].
    fn is_valid(&self, data: &Value, schema: &Value) -> bool {
        self.validate(data, schema).is_empty()
    }
}

/// Default validator.
///
/// Supports boolean schemas, `type`, `const`, `enum`, numeric bounds,
/// `multipleOf`, string length and `pattern`, `required`, `properties`,
/// `additionalProperties`, `items`, array size and uniqueness, `not`,
/// `allOf`, `anyOf`, `oneOf`, `if`/`then`/`else` and local `$ref`.
/// Unknown keywords are ignored.
#[derive(Debug, Default)]
pub struct BasicValidator {
    patterns: Mutex<HashMap<String, Option<Regex>>>,
}

impl BasicValidator {
    /// Create a validator with an empty pattern cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern_matches(&self, pattern: &str, s: &str) -> bool {
        let mut cache = self.patterns.lock().unwrap_or_else(|e| e.into_inner());
        let re = cache.entry(pattern.to_string()).or_insert_with(|| {
            Regex::new(pattern)
                .inspect_err(|e| debug!("ignoring invalid pattern `{pattern}`: {e}"))
                .ok()
        });
        re.as_ref().is_none_or(|re| re.is_match(s))
    }
}

impl Validator for BasicValidator {
    fn validate(&self, data: &Value, schema: &Value) -> Vec<ValidationError> {
        let mut ctx = Context {
            validator: self,
            root: schema,
            errors: Vec::new(),
            depth: 0,
        };
        ctx.check(data, schema, "");
        ctx.errors
    }
}

const MAX_DEPTH: usize = 64;

struct Context<'a> {
    validator: &'a BasicValidator,
    root: &'a Value,
    errors: Vec<ValidationError>,
    depth: usize,
}

fn is_integer(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn type_matches(value: &Value, ty: &str) -> bool {
    match (ty, value) {
        ("integer", Value::Number(n)) => is_integer(n),
        ("number", Value::Number(_)) => true,
        (_, Value::Number(_)) => false,
        _ => json_type_name(value) == ty,
    }
}

impl Context<'_> {
    fn fail(&mut self, path: &str, keyword: &str, message: String) {
        self.errors.push(ValidationError {
            instance_path: path.to_string(),
            keyword: keyword.to_string(),
            message,
        });
    }

    /// Validate in a scratch context and report whether it succeeded.
    fn passes(&self, data: &Value, schema: &Value, path: &str) -> bool {
        let mut sub = Context {
            validator: self.validator,
            root: self.root,
            errors: Vec::new(),
            depth: self.depth,
        };
        sub.check(data, schema, path);
        sub.errors.is_empty()
    }

    fn check(&mut self, data: &Value, schema: &Value, path: &str) {
        let obj = match schema {
            Value::Bool(true) => return,
            Value::Bool(false) => {
                self.fail(path, "false", "no value is allowed".to_string());
                return;
            }
            Value::Object(obj) => obj,
            _ => return,
        };

        if self.depth > MAX_DEPTH {
            self.fail(path, "$ref", "maximum schema depth exceeded".to_string());
            return;
        }

        if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
            let root = self.root;
            let resolved = target.strip_prefix('#').and_then(|p| root.pointer(p));
            match resolved {
                Some(sub) => {
                    self.depth += 1;
                    self.check(data, sub, path);
                    self.depth -= 1;
                }
                None => self.fail(path, "$ref", format!("cannot resolve reference `{target}`")),
            }
        }

        self.check_generic(data, obj, path);
        match data {
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    self.check_number(f, obj, path);
                }
            }
            Value::String(s) => self.check_string(s, obj, path),
            Value::Array(items) => self.check_array(items, obj, path),
            Value::Object(map) => self.check_object(map, obj, path),
            _ => {}
        }
        self.check_combinators(data, obj, path);
    }

    fn check_generic(&mut self, data: &Value, obj: &Map<String, Value>, path: &str) {
        match obj.get("type") {
            Some(Value::String(ty)) if !type_matches(data, ty) => {
                self.fail(path, "type", format!("must be {ty}"));
            }
            Some(Value::Array(types)) => {
                let ok = types
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|ty| type_matches(data, ty));
                if !ok {
                    self.fail(path, "type", format!("must be one of {}", Value::Array(types.clone())));
                }
            }
            _ => {}
        }

        if let Some(expected) = obj.get("const") {
            if !json_equal(data, expected) {
                self.fail(path, "const", format!("must be equal to {expected}"));
            }
        }

        if let Some(Value::Array(options)) = obj.get("enum") {
            if !options.iter().any(|o| json_equal(data, o)) {
                self.fail(path, "enum", "must be one of the allowed values".to_string());
            }
        }
    }

    fn check_number(&mut self, f: f64, obj: &Map<String, Value>, path: &str) {
        let num = |key: &str| obj.get(key).and_then(Value::as_f64);
        if let Some(min) = num("minimum") {
            if f < min {
                self.fail(path, "minimum", format!("must be >= {min}"));
            }
        }
        if let Some(max) = num("maximum") {
            if f > max {
                self.fail(path, "maximum", format!("must be <= {max}"));
            }
        }
        if let Some(min) = num("exclusiveMinimum") {
            if f <= min {
                self.fail(path, "exclusiveMinimum", format!("must be > {min}"));
            }
        }
        if let Some(max) = num("exclusiveMaximum") {
            if f >= max {
                self.fail(path, "exclusiveMaximum", format!("must be < {max}"));
            }
        }
        if let Some(step) = num("multipleOf") {
            if step > 0.0 {
                let q = f / step;
                if (q - q.round()).abs() > 1e-9 {
                    self.fail(path, "multipleOf", format!("must be a multiple of {step}"));
                }
            }
        }
    }

    fn check_string(&mut self, s: &str, obj: &Map<String, Value>, path: &str) {
        let len = s.chars().count() as u64;
        if let Some(min) = obj.get("minLength").and_then(Value::as_u64) {
            if len < min {
                self.fail(path, "minLength", format!("must not have fewer than {min} characters"));
            }
        }
        if let Some(max) = obj.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                self.fail(path, "maxLength", format!("must not have more than {max} characters"));
            }
        }
        if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
            if !self.validator.pattern_matches(pattern, s) {
                self.fail(path, "pattern", format!("must match pattern \"{pattern}\""));
            }
        }
    }

    fn check_array(&mut self, items: &[Value], obj: &Map<String, Value>, path: &str) {
        let len = items.len() as u64;
        if let Some(min) = obj.get("minItems").and_then(Value::as_u64) {
            if len < min {
                self.fail(path, "minItems", format!("must not have fewer than {min} items"));
            }
        }
        if let Some(max) = obj.get("maxItems").and_then(Value::as_u64) {
            if len > max {
                self.fail(path, "maxItems", format!("must not have more than {max} items"));
            }
        }
        if obj.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            let duplicate = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| json_equal(a, b)));
            if duplicate {
                self.fail(path, "uniqueItems", "must not contain duplicate items".to_string());
            }
        }
        if let Some(item_schema) = obj.get("items").filter(|s| !s.is_array()) {
            for (i, item) in items.iter().enumerate() {
                self.check(item, item_schema, &format!("{path}/{i}"));
            }
        }
    }

    fn check_object(&mut self, map: &Map<String, Value>, obj: &Map<String, Value>, path: &str) {
        if let Some(Value::Array(required)) = obj.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(key) {
                    self.fail(path, "required", format!("must have required property '{key}'"));
                }
            }
        }

        let properties = obj.get("properties").and_then(Value::as_object);
        if let Some(props) = properties {
            for (key, prop_schema) in props {
                if let Some(value) = map.get(key) {
                    self.check(value, prop_schema, &format!("{path}/{key}"));
                }
            }
        }

        if let Some(additional) = obj.get("additionalProperties") {
            let extra = map
                .iter()
                .filter(|(k, _)| properties.is_none_or(|p| !p.contains_key(k.as_str())));
            for (key, value) in extra {
                match additional {
                    Value::Bool(false) => {
                        self.fail(path, "additionalProperties", format!("must not have property '{key}'"));
                    }
                    Value::Object(_) => self.check(value, additional, &format!("{path}/{key}")),
                    _ => {}
                }
            }
        }
    }

    fn check_combinators(&mut self, data: &Value, obj: &Map<String, Value>, path: &str) {
        if let Some(not) = obj.get("not") {
            if self.passes(data, not, path) {
                self.fail(path, "not", "must not be valid".to_string());
            }
        }
        if let Some(Value::Array(all)) = obj.get("allOf") {
            for sub in all {
                self.check(data, sub, path);
            }
        }
        if let Some(Value::Array(any)) = obj.get("anyOf") {
            if !any.iter().any(|sub| self.passes(data, sub, path)) {
                self.fail(path, "anyOf", "must match a schema in anyOf".to_string());
            }
        }
        if let Some(Value::Array(one)) = obj.get("oneOf") {
            let matched = one.iter().filter(|sub| self.passes(data, sub, path)).count();
            if matched != 1 {
                self.fail(path, "oneOf", format!("must match exactly one schema in oneOf, matched {matched}"));
            }
        }
        if let Some(condition) = obj.get("if") {
            let branch = if self.passes(data, condition, path) {
                obj.get("then")
            } else {
                obj.get("else")
            };
            if let Some(branch) = branch {
                self.check(data, branch, path);
            }
        }
    }
}

/// JSON equality where `1` and `1.0` are the same number.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_equal(v, w)))
        }
        _ => a == b,
    }
}
