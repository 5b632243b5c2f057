//! Visibility and enablement rules.
//!
//! A rule pairs an [`Effect`] with a [`Condition`]. The condition scope is
//! resolved against the element's data path, the value found there is
//! checked, and the effect decides what a fulfilled condition means.
//!
//! Evaluation never fails. When a condition cannot be evaluated (bad scope,
//! value missing during an incremental update) the rule simply does not
//! apply and the element stays visible and enabled.

use serde_json::Value;

use crate::{
    data::{
        path::{DataPath, Scope},
        uischema::{Condition, Effect, Rule, UiSchemaElement},
        value::resolve_data,
    },
    validator::{Validator, json_equal},
};

/// Evaluate a condition.
///
/// Returns `None` when the condition cannot be evaluated, otherwise whether
/// it is fulfilled.
pub fn evaluate_condition(
    condition: &Condition,
    data: &Value,
    path: &DataPath,
    validator: &dyn Validator,
) -> Option<bool> {
    match condition {
        Condition::Schema {
            scope,
            schema,
            fail_when_undefined,
        } => {
            let target = scoped_path(scope, path)?;
            match resolve_data(data, &target) {
                Some(value) => Some(validator.is_valid(value, schema)),
                None if *fail_when_undefined => Some(false),
                None => {
                    debug!("rule scope `{scope}` has no value at `{target}`, rule skipped");
                    None
                }
            }
        }
        Condition::Leaf { scope, expected } => {
            let target = scoped_path(scope, path)?;
            resolve_data(data, &target).map(|value| json_equal(value, expected))
        }
        Condition::Or(children) => {
            let results: Vec<_> = children
                .iter()
                .map(|c| evaluate_condition(c, data, path, validator))
                .collect();
            if results.contains(&Some(true)) {
                Some(true)
            } else if results.contains(&Some(false)) || children.is_empty() {
                Some(false)
            } else {
                None
            }
        }
        Condition::And(children) => {
            let results: Vec<_> = children
                .iter()
                .map(|c| evaluate_condition(c, data, path, validator))
                .collect();
            if results.contains(&Some(false)) {
                Some(false)
            } else if results.contains(&Some(true)) || children.is_empty() {
                Some(true)
            } else {
                None
            }
        }
    }
}

fn scoped_path(scope: &str, path: &DataPath) -> Option<DataPath> {
    match Scope::parse(scope) {
        Ok(scope) => Some(scope.to_data_path(path)),
        Err(e) => {
            debug!("rule skipped: {e}");
            None
        }
    }
}

fn apply(rule: &Rule, data: &Value, path: &DataPath, validator: &dyn Validator) -> bool {
    let Some(fulfilled) = evaluate_condition(&rule.condition, data, path, validator) else {
        return true;
    };
    match rule.effect {
        Effect::Show | Effect::Enable => fulfilled,
        Effect::Hide | Effect::Disable => !fulfilled,
    }
}

/// Whether the element is visible according to its rule.
///
/// Elements without a SHOW/HIDE rule are visible.
pub fn eval_visibility(
    uischema: &UiSchemaElement,
    data: &Value,
    path: &DataPath,
    validator: &dyn Validator,
) -> bool {
    match uischema.rule() {
        Some(rule) if has_show_rule(uischema) => apply(rule, data, path, validator),
        _ => true,
    }
}

/// Whether the element is enabled according to its rule.
///
/// Elements without an ENABLE/DISABLE rule are enabled.
pub fn eval_enablement(
    uischema: &UiSchemaElement,
    data: &Value,
    path: &DataPath,
    validator: &dyn Validator,
) -> bool {
    match uischema.rule() {
        Some(rule) if has_enable_rule(uischema) => apply(rule, data, path, validator),
        _ => true,
    }
}

/// Whether the element carries a SHOW or HIDE rule.
pub fn has_show_rule(uischema: &UiSchemaElement) -> bool {
    uischema
        .rule()
        .is_some_and(|r| matches!(r.effect, Effect::Show | Effect::Hide))
}

/// Whether the element carries an ENABLE or DISABLE rule.
pub fn has_enable_rule(uischema: &UiSchemaElement) -> bool {
    uischema
        .rule()
        .is_some_and(|r| matches!(r.effect, Effect::Enable | Effect::Disable))
}

/// Visibility, skipping evaluation entirely when there is no show rule.
pub fn is_visible(
    uischema: &UiSchemaElement,
    data: &Value,
    path: &DataPath,
    validator: &dyn Validator,
) -> bool {
    !has_show_rule(uischema) || eval_visibility(uischema, data, path, validator)
}

/// Enablement, skipping evaluation entirely when there is no enable rule.
pub fn is_enabled(
    uischema: &UiSchemaElement,
    data: &Value,
    path: &DataPath,
    validator: &dyn Validator,
) -> bool {
    !has_enable_rule(uischema) || eval_enablement(uischema, data, path, validator)
}

/// Data paths read by the element's rule condition.
pub fn rule_dependencies(uischema: &UiSchemaElement, path: &DataPath) -> Vec<DataPath> {
    uischema
        .rule()
        .map(|r| {
            r.condition
                .scopes()
                .into_iter()
                .filter_map(|s| scoped_path(s, path))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::BasicValidator;
    use serde_json::json;

    fn element(rule: Value) -> UiSchemaElement {
        UiSchemaElement::try_from(&json!({
            "type": "Control",
            "scope": "#/properties/bar",
            "rule": rule
        }))
        .unwrap()
    }

    #[test]
    fn test_hide_rule() {
        let v = BasicValidator::new();
        let ui = element(json!({
            "effect": "HIDE",
            "condition": { "scope": "#/foo", "schema": { "const": true } }
        }));
        let root = DataPath::root();
        assert!(!eval_visibility(&ui, &json!({ "foo": true }), &root, &v));
        assert!(eval_visibility(&ui, &json!({ "foo": false }), &root, &v));
        assert!(eval_enablement(&ui, &json!({ "foo": true }), &root, &v));
    }

    #[test]
    fn test_show_and_enable_rules() {
        let v = BasicValidator::new();
        let show = element(json!({
            "effect": "SHOW",
            "condition": { "scope": "#/properties/age", "schema": { "minimum": 18 } }
        }));
        let root = DataPath::root();
        assert!(eval_visibility(&show, &json!({ "age": 20 }), &root, &v));
        assert!(!eval_visibility(&show, &json!({ "age": 3 }), &root, &v));

        let disable = element(json!({
            "effect": "DISABLE",
            "condition": { "scope": "#/properties/locked", "schema": { "const": true } }
        }));
        assert!(!eval_enablement(&disable, &json!({ "locked": true }), &root, &v));
        assert!(eval_enablement(&disable, &json!({ "locked": false }), &root, &v));
        assert!(eval_visibility(&disable, &json!({ "locked": true }), &root, &v));
    }

    #[test]
    fn test_no_rule_defaults() {
        let v = BasicValidator::new();
        let ui = UiSchemaElement::try_from(&json!({ "type": "Control", "scope": "#/properties/x" })).unwrap();
        assert!(!has_show_rule(&ui));
        assert!(!has_enable_rule(&ui));
        assert!(is_visible(&ui, &json!(null), &DataPath::root(), &v));
        assert!(is_enabled(&ui, &json!(null), &DataPath::root(), &v));
    }

    #[test]
    fn test_missing_value_keeps_defaults() {
        let v = BasicValidator::new();
        let show = element(json!({
            "effect": "SHOW",
            "condition": { "scope": "#/properties/missing", "schema": { "const": true } }
        }));
        assert!(eval_visibility(&show, &json!({}), &DataPath::root(), &v));

        let strict = element(json!({
            "effect": "SHOW",
            "condition": {
                "scope": "#/properties/missing",
                "schema": { "const": true },
                "failWhenUndefined": true
            }
        }));
        assert!(!eval_visibility(&strict, &json!({}), &DataPath::root(), &v));
    }

    #[test]
    fn test_relative_and_absolute_scopes() {
        let v = BasicValidator::new();
        let data = json!({ "flag": true, "address": { "flag": false } });
        let relative = element(json!({
            "effect": "HIDE",
            "condition": { "scope": "#/properties/flag", "schema": { "const": true } }
        }));
        let absolute = element(json!({
            "effect": "HIDE",
            "condition": { "scope": "/properties/flag", "schema": { "const": true } }
        }));
        let nested = DataPath::parse("address");
        assert!(eval_visibility(&relative, &data, &nested, &v));
        assert!(!eval_visibility(&absolute, &data, &nested, &v));
        assert!(!eval_visibility(&relative, &data, &DataPath::root(), &v));
    }

    #[test]
    fn test_leaf_and_composite() {
        let v = BasicValidator::new();
        let ui = element(json!({
            "effect": "SHOW",
            "condition": {
                "type": "AND",
                "conditions": [
                    { "type": "LEAF", "scope": "#/properties/kind", "expectedValue": "pro" },
                    { "scope": "#/properties/seats", "schema": { "minimum": 2 } }
                ]
            }
        }));
        let root = DataPath::root();
        assert!(eval_visibility(&ui, &json!({ "kind": "pro", "seats": 3 }), &root, &v));
        assert!(!eval_visibility(&ui, &json!({ "kind": "pro", "seats": 1 }), &root, &v));
        assert!(!eval_visibility(&ui, &json!({ "kind": "free", "seats": 3 }), &root, &v));

        let either = element(json!({
            "effect": "HIDE",
            "condition": {
                "type": "OR",
                "conditions": [
                    { "type": "LEAF", "scope": "#/properties/a", "expectedValue": 1 },
                    { "type": "LEAF", "scope": "#/properties/b", "expectedValue": 1 }
                ]
            }
        }));
        assert!(!eval_visibility(&either, &json!({ "a": 0, "b": 1 }), &root, &v));
        assert!(eval_visibility(&either, &json!({ "a": 0, "b": 0 }), &root, &v));
        assert!(eval_visibility(&either, &json!({}), &root, &v));
    }

    #[test]
    fn test_idempotent() {
        let v = BasicValidator::new();
        let ui = element(json!({
            "effect": "HIDE",
            "condition": { "scope": "#/foo", "schema": { "const": true } }
        }));
        let data = json!({ "foo": true });
        let root = DataPath::root();
        let first = (eval_visibility(&ui, &data, &root, &v), eval_enablement(&ui, &data, &root, &v));
        let second = (eval_visibility(&ui, &data, &root, &v), eval_enablement(&ui, &data, &root, &v));
        assert_eq!(first, second);
    }

    #[test]
    fn test_rule_dependencies() {
        let ui = element(json!({
            "effect": "SHOW",
            "condition": {
                "type": "OR",
                "conditions": [
                    { "type": "LEAF", "scope": "#/properties/a", "expectedValue": 1 },
                    { "scope": "/properties/b", "schema": {} }
                ]
            }
        }));
        let deps = rule_dependencies(&ui, &DataPath::parse("group"));
        assert_eq!(deps, [DataPath::parse("group/a"), DataPath::parse("b")]);
    }
}
