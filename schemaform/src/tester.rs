//! Testers score how well a view fits a UI element.
//!
//! A [`Tester`] maps `(uischema, schema, context)` to a [`Rank`]. Testers are
//! usually built with [`rank_with`] from composable [`Predicate`]s:
//!
//! ```rust
//! use schemaform::tester::{and, is_control, rank_with, schema_type_is, Rank, TesterContext};
//! use schemaform::UiSchemaElement;
//! use serde_json::json;
//!
//! let tester = rank_with(2, and([is_control(), schema_type_is("integer")]));
//! let schema = json!({ "properties": { "foo": { "type": "integer" } } });
//! let ui = UiSchemaElement::try_from(&json!({ "type": "Control", "scope": "#/properties/foo" })).unwrap();
//! assert_eq!(tester.rank(&ui, &schema, &TesterContext::new(&schema)), Rank::Priority(2));
//! ```
//!
//! Testers must be pure: the same inputs always give the same rank.

use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{
    data::{
        path::Scope,
        schema::has_type,
        uischema::{LayoutKind, UiSchemaElement},
    },
    resolver::{SchemaIndex, resolve_schema},
};

/// Result of a tester.
///
/// `NotApplicable` orders below every priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    NotApplicable,
    Priority(u32),
}

/// Sentinel for "this view does not apply".
pub const NOT_APPLICABLE: Rank = Rank::NotApplicable;

impl Rank {
    /// Whether the tester accepted the element.
    pub fn is_applicable(&self) -> bool {
        matches!(self, Rank::Priority(_))
    }
}

/// Schema context passed to every tester.
///
/// Holds the root schema for `$ref` lookups and, when available, the
/// memoizing [`SchemaIndex`] of that root.
#[derive(Clone, Copy)]
pub struct TesterContext<'a> {
    root: &'a Value,
    index: Option<&'a SchemaIndex>,
}

impl<'a> TesterContext<'a> {
    /// Context without memoization.
    pub fn new(root: &'a Value) -> Self {
        Self { root, index: None }
    }

    /// Context backed by an index; lookups against the indexed root are cached.
    pub fn with_index(index: &'a SchemaIndex) -> Self {
        Self {
            root: index.root(),
            index: Some(index),
        }
    }

    /// The root schema.
    pub fn root(&self) -> &'a Value {
        self.root
    }

    /// Resolve `scope` starting at `schema`.
    pub fn resolve(&self, schema: &'a Value, scope: &str) -> Option<&'a Value> {
        match self.index {
            Some(index) if std::ptr::eq(schema, index.root()) => index.resolve(scope),
            _ => resolve_schema(schema, scope, self.root),
        }
    }
}

type PredicateFn = dyn Fn(&UiSchemaElement, &Value, &TesterContext<'_>) -> bool + Send + Sync;
type TesterFn = dyn Fn(&UiSchemaElement, &Value, &TesterContext<'_>) -> Rank + Send + Sync;

/// A boolean test over `(uischema, schema, context)`.
#[derive(Clone)]
pub struct Predicate {
    eval: Arc<PredicateFn>,
}

impl Predicate {
    /// Wrap a closure.
    pub fn new(
        f: impl Fn(&UiSchemaElement, &Value, &TesterContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { eval: Arc::new(f) }
    }

    /// Evaluate the predicate.
    pub fn test(&self, uischema: &UiSchemaElement, schema: &Value, ctx: &TesterContext<'_>) -> bool {
        (self.eval)(uischema, schema, ctx)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// A scoring function.
#[derive(Clone)]
pub struct Tester {
    eval: Arc<TesterFn>,
}

impl Tester {
    /// Wrap a closure.
    pub fn new(
        f: impl Fn(&UiSchemaElement, &Value, &TesterContext<'_>) -> Rank + Send + Sync + 'static,
    ) -> Self {
        Self { eval: Arc::new(f) }
    }

    /// Score an element.
    pub fn rank(&self, uischema: &UiSchemaElement, schema: &Value, ctx: &TesterContext<'_>) -> Rank {
        (self.eval)(uischema, schema, ctx)
    }
}

impl fmt::Debug for Tester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tester")
    }
}

/// Tester yielding `priority` when `predicate` holds.
pub fn rank_with(priority: u32, predicate: Predicate) -> Tester {
    Tester::new(move |ui, schema, ctx| {
        if predicate.test(ui, schema, ctx) {
            Rank::Priority(priority)
        } else {
            Rank::NotApplicable
        }
    })
}

/// All predicates hold. Stops at the first failure.
pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    let predicates: Vec<Predicate> = predicates.into_iter().collect();
    Predicate::new(move |ui, schema, ctx| predicates.iter().all(|p| p.test(ui, schema, ctx)))
}

/// Any predicate holds. Stops at the first success.
pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    let predicates: Vec<Predicate> = predicates.into_iter().collect();
    Predicate::new(move |ui, schema, ctx| predicates.iter().any(|p| p.test(ui, schema, ctx)))
}

/// Negation.
pub fn not(predicate: Predicate) -> Predicate {
    Predicate::new(move |ui, schema, ctx| !predicate.test(ui, schema, ctx))
}

/// The element's `type` tag equals `type_name`.
pub fn ui_type_is(type_name: &'static str) -> Predicate {
    Predicate::new(move |ui, _, _| ui.type_name() == type_name)
}

/// The element is a control.
pub fn is_control() -> Predicate {
    Predicate::new(|ui, _, _| matches!(ui, UiSchemaElement::Control(_)))
}

/// The element is a layout of the given kind.
pub fn is_layout(kind: LayoutKind) -> Predicate {
    Predicate::new(move |ui, _, _| matches!(ui, UiSchemaElement::Layout(l) if l.kind == kind))
}

/// The element is a label.
pub fn is_label() -> Predicate {
    Predicate::new(|ui, _, _| matches!(ui, UiSchemaElement::Label(_)))
}

/// The element is a control with a well-formed scope.
pub fn scope_present() -> Predicate {
    Predicate::new(|ui, _, _| ui.scope().is_some_and(|s| Scope::parse(s).is_ok()))
}

/// The control's scope ends with `suffix`.
pub fn scope_ends_with(suffix: &'static str) -> Predicate {
    Predicate::new(move |ui, _, _| ui.scope().is_some_and(|s| s.ends_with(suffix)))
}

/// `options[key] == value`.
pub fn option_is(key: &'static str, value: Value) -> Predicate {
    Predicate::new(move |ui, _, _| {
        ui.options()
            .and_then(|o| o.get(key))
            .is_some_and(|v| *v == value)
    })
}

/// The sub-schema the control's scope resolves to satisfies `f`.
///
/// Fails when the element is not a control or the scope does not resolve.
pub fn schema_matches(f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Predicate {
    Predicate::new(move |ui, schema, ctx| {
        let Some(scope) = ui.scope() else {
            return false;
        };
        let root = ctx.root();
        let resolved = if std::ptr::eq(schema, root) {
            ctx.resolve(root, scope)
        } else {
            resolve_schema(schema, scope, root)
        };
        resolved.is_some_and(|sub| f(sub, root))
    })
}

/// The resolved sub-schema admits `expected` (see [`has_type`]).
pub fn schema_type_is(expected: &'static str) -> Predicate {
    schema_matches(move |sub, _| has_type(sub, expected))
}

/// The resolved sub-schema is a string with the given `format`.
pub fn format_is(format: &'static str) -> Predicate {
    schema_matches(move |sub, _| {
        sub.get("format").and_then(Value::as_str) == Some(format) && has_type(sub, "string")
    })
}

/// The resolved sub-schema has an `enum`.
pub fn is_enum() -> Predicate {
    schema_matches(|sub, _| sub.get("enum").is_some_and(Value::is_array))
}

/// The resolved sub-schema is a `oneOf` of `const` alternatives.
pub fn is_one_of_enum() -> Predicate {
    schema_matches(|sub, _| {
        sub.get("oneOf")
            .and_then(Value::as_array)
            .is_some_and(|alts| !alts.is_empty() && alts.iter().all(|a| a.get("const").is_some()))
    })
}

fn control_of(predicate: Predicate) -> Predicate {
    and([is_control(), scope_present(), predicate])
}

/// Integer controls, priority 2.
pub fn integer_control_tester() -> Tester {
    rank_with(2, control_of(schema_type_is("integer")))
}

/// Number controls, priority 2.
pub fn number_control_tester() -> Tester {
    rank_with(2, control_of(schema_type_is("number")))
}

/// Boolean controls, priority 2.
pub fn boolean_control_tester() -> Tester {
    rank_with(2, control_of(schema_type_is("boolean")))
}

/// Plain string controls, priority 1.
pub fn text_control_tester() -> Tester {
    rank_with(1, control_of(schema_type_is("string")))
}

/// `enum` controls, priority 2.
pub fn enum_control_tester() -> Tester {
    rank_with(2, control_of(is_enum()))
}

/// `oneOf` of `const` controls, priority 2.
pub fn one_of_enum_control_tester() -> Tester {
    rank_with(2, control_of(is_one_of_enum()))
}

/// `format: date` controls, priority 2.
pub fn date_control_tester() -> Tester {
    rank_with(2, control_of(format_is("date")))
}

/// `format: time` controls, priority 2.
pub fn time_control_tester() -> Tester {
    rank_with(2, control_of(format_is("time")))
}

/// `format: date-time` controls, priority 2.
pub fn date_time_control_tester() -> Tester {
    rank_with(2, control_of(format_is("date-time")))
}

/// Object controls, priority 2.
pub fn object_control_tester() -> Tester {
    rank_with(2, control_of(schema_type_is("object")))
}

/// Array controls, priority 3.
pub fn array_control_tester() -> Tester {
    rank_with(3, control_of(schema_type_is("array")))
}

/// Any control whose scope resolves, priority 1.
pub fn generic_control_tester() -> Tester {
    rank_with(1, control_of(schema_matches(|_, _| true)))
}

/// Layouts of `kind`, priority 1.
pub fn layout_tester(kind: LayoutKind) -> Tester {
    rank_with(1, is_layout(kind))
}

/// Labels, priority 1.
pub fn label_tester() -> Tester {
    rank_with(1, is_label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn control(scope: &str) -> UiSchemaElement {
        UiSchemaElement::try_from(&json!({ "type": "Control", "scope": scope })).unwrap()
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::NotApplicable < Rank::Priority(0));
        assert!(Rank::Priority(1) < Rank::Priority(2));
        assert!(!NOT_APPLICABLE.is_applicable());
    }

    #[test]
    fn test_integer_tester() {
        let tester = integer_control_tester();
        let ui = control("#/properties/foo");

        let string_foo = json!({ "type": "object", "properties": { "foo": { "type": "string" } } });
        assert_eq!(tester.rank(&ui, &string_foo, &TesterContext::new(&string_foo)), NOT_APPLICABLE);

        let mixed = json!({
            "type": "object",
            "properties": { "foo": { "type": "string" }, "bar": { "type": "integer" } }
        });
        assert_eq!(tester.rank(&ui, &mixed, &TesterContext::new(&mixed)), NOT_APPLICABLE);

        let int_foo = json!({ "type": "object", "properties": { "foo": { "type": "integer" } } });
        assert_eq!(tester.rank(&ui, &int_foo, &TesterContext::new(&int_foo)), Rank::Priority(2));
    }

    #[test]
    fn test_non_controls_are_not_applicable() {
        let schema = json!({ "type": "object", "properties": { "foo": { "type": "integer" } } });
        let ctx = TesterContext::new(&schema);
        let layout = UiSchemaElement::try_from(&json!({ "type": "VerticalLayout", "elements": [] })).unwrap();
        assert_eq!(integer_control_tester().rank(&layout, &schema, &ctx), NOT_APPLICABLE);
        assert_eq!(layout_tester(LayoutKind::Vertical).rank(&layout, &schema, &ctx), Rank::Priority(1));
        assert_eq!(layout_tester(LayoutKind::Group).rank(&layout, &schema, &ctx), NOT_APPLICABLE);
    }

    #[test]
    fn test_unresolvable_scope_is_not_applicable_everywhere() {
        let schema = json!({ "type": "object", "properties": { "foo": { "type": "integer" } } });
        let ctx = TesterContext::new(&schema);
        let ui = control("#/properties/missing");
        for tester in [
            integer_control_tester(),
            number_control_tester(),
            boolean_control_tester(),
            text_control_tester(),
            enum_control_tester(),
            one_of_enum_control_tester(),
            date_control_tester(),
            time_control_tester(),
            date_time_control_tester(),
            object_control_tester(),
            array_control_tester(),
            generic_control_tester(),
        ] {
            assert_eq!(tester.rank(&ui, &schema, &ctx), NOT_APPLICABLE);
        }
    }

    #[test]
    fn test_integer_beats_generic() {
        let schema = json!({ "type": "object", "properties": { "foo": { "type": "integer" } } });
        let ctx = TesterContext::new(&schema);
        let ui = control("#/properties/foo");
        assert!(integer_control_tester().rank(&ui, &schema, &ctx) > generic_control_tester().rank(&ui, &schema, &ctx));
    }

    #[test]
    fn test_formats_and_enums() {
        let schema = json!({
            "properties": {
                "day": { "type": "string", "format": "date" },
                "color": { "type": "string", "enum": ["red", "green"] },
                "size": { "oneOf": [{ "const": "s" }, { "const": "m" }] }
            }
        });
        let ctx = TesterContext::new(&schema);
        assert_eq!(date_control_tester().rank(&control("#/properties/day"), &schema, &ctx), Rank::Priority(2));
        assert_eq!(time_control_tester().rank(&control("#/properties/day"), &schema, &ctx), NOT_APPLICABLE);
        assert_eq!(enum_control_tester().rank(&control("#/properties/color"), &schema, &ctx), Rank::Priority(2));
        assert_eq!(
            one_of_enum_control_tester().rank(&control("#/properties/size"), &schema, &ctx),
            Rank::Priority(2)
        );
    }

    #[test]
    fn test_type_arrays_and_refs() {
        let schema = json!({
            "properties": { "n": { "$ref": "#/definitions/N" } },
            "definitions": { "N": { "type": ["integer", "null"] } }
        });
        let index = SchemaIndex::new(schema.clone());
        let ctx = TesterContext::with_index(&index);
        let ui = control("#/properties/n");
        assert_eq!(integer_control_tester().rank(&ui, index.root(), &ctx), Rank::Priority(2));
        assert_eq!(index.cached_len(), 1);
        // deterministic across calls
        assert_eq!(integer_control_tester().rank(&ui, index.root(), &ctx), Rank::Priority(2));
        assert_eq!(index.cached_len(), 1);
    }

    #[test]
    fn test_combinators_short_circuit() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            Predicate::new(move |_, _, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
        };
        let schema = json!({});
        let ctx = TesterContext::new(&schema);
        let label = UiSchemaElement::try_from(&json!({ "type": "Label", "text": "x" })).unwrap();

        let p = and([is_control(), counted.clone()]);
        assert!(!p.test(&label, &schema, &ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let p = or([is_label(), counted.clone()]);
        assert!(p.test(&label, &schema, &ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(not(is_control()).test(&label, &schema, &ctx));
        assert!(ui_type_is("Label").test(&label, &schema, &ctx));
    }

    #[test]
    fn test_option_and_scope_suffix() {
        let schema = json!({ "properties": { "notes": { "type": "string" } } });
        let ctx = TesterContext::new(&schema);
        let ui = UiSchemaElement::try_from(&json!({
            "type": "Control",
            "scope": "#/properties/notes",
            "options": { "multi": true }
        }))
        .unwrap();
        let multiline = rank_with(3, and([option_is("multi", json!(true)), scope_ends_with("notes")]));
        assert_eq!(multiline.rank(&ui, &schema, &ctx), Rank::Priority(3));
        assert_eq!(multiline.rank(&control("#/properties/notes"), &schema, &ctx), NOT_APPLICABLE);
    }
}
