use schemaform::{
    DataPath, FormSession, Scope, UiSchemaElement,
    registry::{ControlKind, default_renderers},
    rule::eval_visibility,
    tester::{self, Rank, TesterContext},
    validator::BasicValidator,
};
use serde_json::{Value, json};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": { "foo": { "type": "integer", "minimum": 5 } }
    })
}

fn uischema() -> Value {
    json!({ "type": "Control", "scope": "#/properties/foo" })
}

fn session(data: Value) -> FormSession<ControlKind> {
    init_logger();
    let mut session = FormSession::new(default_renderers());
    session.init(data, schema(), Some(&uischema())).unwrap();
    session
}

fn bound_value(session: &mut FormSession<ControlKind>) -> (Option<Value>, Value) {
    let tree = session.render();
    let control = tree.as_control().expect("control rendered");
    (control.props.value.clone(), control.props.presented.clone())
}

#[test]
fn integer_tester_ranks_integer_scope() {
    let schema = schema();
    let ui = UiSchemaElement::try_from(&uischema()).unwrap();
    let ctx = TesterContext::new(&schema);
    let integer = tester::integer_control_tester().rank(&ui, &schema, &ctx);
    assert_eq!(integer, Rank::Priority(2));
    assert!(integer > tester::object_control_tester().rank(&ui, &schema, &ctx));
    assert!(integer > tester::generic_control_tester().rank(&ui, &schema, &ctx));
}

#[test]
fn integer_tester_skips_control_without_scope() {
    let schema = schema();
    let ctx = TesterContext::new(&schema);
    let ui = UiSchemaElement::try_from(&json!({ "type": "Control" })).unwrap();
    assert_eq!(tester::integer_control_tester().rank(&ui, &schema, &ctx), Rank::NotApplicable);
    assert_eq!(default_renderers().find_most_applicable(&ui, &schema, &ctx), None);
}

#[test]
fn builtin_testers_skip_missing_sub_schema() {
    let schemas = [
        json!({ "type": "object", "properties": {} }),
        json!({ "type": "object", "properties": { "bar": { "type": "integer" } } }),
        json!({ "type": "integer" }),
    ];
    let ui = UiSchemaElement::try_from(&uischema()).unwrap();
    for schema in &schemas {
        let ctx = TesterContext::new(schema);
        assert_eq!(
            default_renderers().find_most_applicable(&ui, schema, &ctx),
            None,
            "schema {schema}"
        );
    }
}

#[test]
fn bound_value_follows_updates() {
    let mut session = session(json!({ "foo": 42 }));
    assert_eq!(session.render().as_control().unwrap().view, ControlKind::Integer);
    assert_eq!(bound_value(&mut session).0, Some(json!(42)));

    session.update(Some("foo"), |_| Some(json!(13)));
    assert_eq!(bound_value(&mut session).0, Some(json!(13)));
}

#[test]
fn update_on_other_path_keeps_value() {
    let mut session = session(json!({ "foo": 42 }));
    session.update(Some("bar"), |_| Some(json!(11)));
    assert_eq!(bound_value(&mut session).0, Some(json!(42)));
}

#[test]
fn update_without_path_is_noop() {
    let mut session = session(json!({ "foo": 42 }));
    let before = session.data().clone();
    assert!(session.update(None, |_| Some(json!(1))).is_empty());
    assert!(session.update(Some(""), |_| Some(json!(1))).is_empty());
    assert_eq!(session.data(), &before);
}

#[test]
fn undefined_value_presents_empty() {
    let mut session = session(json!({ "foo": 42 }));
    session.update(Some("foo"), |_| None);
    let (value, presented) = bound_value(&mut session);
    assert_eq!(value, None);
    assert_eq!(presented, json!(""));
    assert_eq!(session.data(), &json!({}));
}

#[test]
fn null_value_presents_empty() {
    let mut session = session(json!({ "foo": null }));
    assert_eq!(bound_value(&mut session).1, json!(""));
}

#[test]
fn zero_is_presented() {
    let mut session = session(json!({ "foo": 0 }));
    assert_eq!(bound_value(&mut session), (Some(json!(0)), json!(0)));
}

#[test]
fn focus_option_sets_autofocus() {
    init_logger();
    let mut session = FormSession::new(default_renderers());
    let ui = json!({ "type": "Control", "scope": "#/properties/foo", "options": { "focus": true } });
    session.init(json!({ "foo": 42 }), schema(), Some(&ui)).unwrap();
    assert!(session.render().as_control().unwrap().props.autofocus);

    let mut plain = self::session(json!({ "foo": 42 }));
    assert!(!plain.render().as_control().unwrap().props.autofocus);
}

#[test]
fn enabled_by_default() {
    let mut session = session(json!({ "foo": 42 }));
    let tree = session.render();
    let props = &tree.as_control().unwrap().props;
    assert!(props.enabled);
    assert!(props.visible);
}

#[test]
fn minimum_violation_is_reported() {
    let mut session = session(json!({ "foo": 3 }));
    let tree = session.render();
    let errors = &tree.as_control().unwrap().props.errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].keyword, "minimum");
}

#[test]
fn sibling_change_does_not_recompute() {
    init_logger();
    let mut session = FormSession::new(default_renderers());
    let schema = json!({
        "type": "object",
        "properties": { "foo": { "type": "integer" }, "bar": { "type": "integer" } }
    });
    session.init(json!({ "foo": 1, "bar": 2 }), schema, None).unwrap();
    session.render();
    let foo = DataPath::parse("foo");
    assert_eq!(session.binder(&foo).unwrap().recompute_count(), 1);

    session.set_value("bar", Some(json!(3)));
    session.render();
    assert_eq!(session.binder(&foo).unwrap().recompute_count(), 1);

    session.set_value("foo", Some(json!(3)));
    session.render();
    assert_eq!(session.binder(&foo).unwrap().recompute_count(), 2);
}

#[test]
fn scope_round_trips_through_data_path() {
    for raw in ["#/properties/foo", "#/properties/a~1b/properties/c~0d"] {
        let scope = Scope::parse(raw).unwrap();
        let path = scope.to_data_path(&DataPath::root());
        assert_eq!(path.to_scope(), raw);
    }
}

#[test]
fn hide_rule_scenario() {
    let validator = BasicValidator::new();
    let ui = UiSchemaElement::try_from(&json!({
        "type": "Control",
        "scope": "#/properties/bar",
        "rule": { "effect": "HIDE", "condition": { "scope": "#/foo", "schema": { "const": true } } }
    }))
    .unwrap();
    let root = DataPath::root();
    assert!(!eval_visibility(&ui, &json!({ "foo": true }), &root, &validator));
    assert!(eval_visibility(&ui, &json!({ "foo": false }), &root, &validator));
    // repeated evaluation is stable
    assert!(!eval_visibility(&ui, &json!({ "foo": true }), &root, &validator));
}
