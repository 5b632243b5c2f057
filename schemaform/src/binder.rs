//! Binding of one control to the data store.
//!
//! A [`ControlBinder`] is created once per mounted control. It fixes the
//! control's data path and dependency list up front, derives
//! [`ControlProps`] from the current state on demand, and turns user edits
//! into [`Action::Update`] intents.

use serde_json::{Map, Value};

use crate::{
    data::{
        path::{DataPath, Scope},
        schema::{SchemaError, start_case},
        uischema::{ControlElement, LabelSpec, UiSchemaElement},
        value::resolve_data,
    },
    resolver::{SchemaIndex, is_required},
    rule::{is_enabled, is_visible, rule_dependencies},
    store::{Action, Change},
    validator::{ValidationError, Validator},
};

/// Everything a view needs to draw a control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlProps {
    pub path: DataPath,
    pub scope: String,
    /// The resolved sub-schema.
    pub schema: Value,
    /// Current value; `None` when undefined.
    pub value: Option<Value>,
    /// Value shown to the user: undefined and `null` become `""`.
    pub presented: Value,
    pub label: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub required: bool,
    pub autofocus: bool,
    pub options: Map<String, Value>,
    pub errors: Vec<ValidationError>,
}

/// State a binder reads when computing props.
pub struct BindContext<'a> {
    pub data: &'a Value,
    pub index: &'a SchemaIndex,
    pub validator: &'a dyn Validator,
    /// Enablement inherited from the enclosing layouts.
    pub parent_enabled: bool,
    /// Session-wide read-only flag.
    pub readonly: bool,
}

/// Present a stored value: undefined and `null` become `""`, everything
/// else (including `0` and `false`) is shown as-is.
pub fn presented_value(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}

#[derive(Debug)]
pub struct ControlBinder {
    element: UiSchemaElement,
    base: DataPath,
    path: DataPath,
    dependencies: Vec<DataPath>,
    recomputes: usize,
}

impl ControlBinder {
    /// Bind `control` below `base`.
    ///
    /// `inherited` are the rule dependencies of the enclosing layouts, which
    /// decide inherited enablement and visibility.
    pub fn new(
        control: ControlElement,
        base: &DataPath,
        inherited: &[DataPath],
    ) -> Result<Self, SchemaError> {
        let path = Scope::parse(&control.scope)?.to_data_path(base);
        let element = UiSchemaElement::Control(control);

        let mut dependencies = vec![path.clone()];
        for dep in rule_dependencies(&element, base)
            .into_iter()
            .chain(inherited.iter().cloned())
        {
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        Ok(Self {
            element,
            base: base.clone(),
            path,
            dependencies,
            recomputes: 0,
        })
    }

    pub fn path(&self) -> &DataPath {
        &self.path
    }

    pub fn element(&self) -> &UiSchemaElement {
        &self.element
    }

    fn control(&self) -> Option<&ControlElement> {
        match &self.element {
            UiSchemaElement::Control(c) => Some(c),
            _ => None,
        }
    }

    /// Data paths this binder reads. Fixed at construction.
    pub fn dependencies(&self) -> &[DataPath] {
        &self.dependencies
    }

    /// Whether `change` requires recomputing the props.
    pub fn is_affected_by(&self, change: &Change) -> bool {
        change.affects(&self.dependencies)
    }

    /// How many times [`compute`](Self::compute) ran.
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }

    /// Current value of the bound field.
    pub fn value<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        resolve_data(data, &self.path)
    }

    /// Update intent for the bound field.
    pub fn set_value(&self, value: Option<Value>) -> Action {
        Action::set(self.path.to_string(), value)
    }

    /// Update intent for an arbitrary path, as issued by a view.
    ///
    /// A `None` or empty path produces a no-op intent.
    pub fn handle_change(
        &self,
        path: Option<&str>,
        updater: impl FnOnce(Option<&Value>) -> Option<Value> + Send + 'static,
    ) -> Action {
        Action::Update {
            path: path.map(String::from),
            updater: Box::new(updater),
        }
    }

    /// Derive the props. Returns `None` when the scope does not resolve.
    pub fn compute(&mut self, ctx: &BindContext<'_>) -> Option<ControlProps> {
        self.recomputes += 1;
        let control = self.control()?;
        let Some(schema) = ctx.index.resolve(&control.scope) else {
            debug!("control `{}` does not resolve, nothing to bind", control.scope);
            return None;
        };

        let base = &self.base;
        let value = self.value(ctx.data).cloned();
        let visible = is_visible(&self.element, ctx.data, base, ctx.validator);
        let enabled = ctx.parent_enabled
            && !ctx.readonly
            && is_enabled(&self.element, ctx.data, base, ctx.validator)
            && control.options.get("readonly").and_then(Value::as_bool) != Some(true)
            && schema.get("readOnly").and_then(Value::as_bool) != Some(true);

        let pointer = self.path.to_pointer();
        let errors = match &value {
            Some(v) => ctx
                .validator
                .validate(v, schema)
                .into_iter()
                .map(|mut e| {
                    e.instance_path = format!("{pointer}{}", e.instance_path);
                    e
                })
                .collect(),
            None => Vec::new(),
        };

        Some(ControlProps {
            path: self.path.clone(),
            scope: control.scope.clone(),
            schema: schema.clone(),
            presented: presented_value(value.as_ref()),
            value,
            label: self.label(control, schema),
            visible,
            enabled,
            required: is_required(ctx.index.root(), &control.scope),
            autofocus: control.options.get("focus").and_then(Value::as_bool) == Some(true),
            options: control.options.clone(),
            errors,
        })
    }

    fn label(&self, control: &ControlElement, schema: &Value) -> Option<String> {
        match &control.label {
            Some(LabelSpec::Hidden) => None,
            Some(LabelSpec::Text(text)) => Some(text.clone()),
            None => schema
                .get("title")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| self.path.last().map(start_case)),
        }
    }
}
