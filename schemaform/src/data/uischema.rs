use serde_json::{Map, Value, json};

use crate::data::{path::Scope, schema::SchemaError};

/// Effect applied when a rule condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Show,
    Hide,
    Enable,
    Disable,
}

impl Effect {
    /// Parse the upper-case effect name used in UI schema documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SHOW" => Some(Effect::Show),
            "HIDE" => Some(Effect::Hide),
            "ENABLE" => Some(Effect::Enable),
            "DISABLE" => Some(Effect::Disable),
            _ => None,
        }
    }

    /// The effect name as written in UI schema documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Show => "SHOW",
            Effect::Hide => "HIDE",
            Effect::Enable => "ENABLE",
            Effect::Disable => "DISABLE",
        }
    }
}

/// A rule condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Validate the value at `scope` against `schema`.
    Schema {
        scope: String,
        schema: Value,
        /// Treat a missing value as a failed condition instead of skipping the rule.
        fail_when_undefined: bool,
    },
    /// Compare the value at `scope` with `expected`.
    Leaf { scope: String, expected: Value },
    /// Any child condition holds.
    Or(Vec<Condition>),
    /// All child conditions hold.
    And(Vec<Condition>),
}

impl Condition {
    /// Every scope this condition reads, in document order.
    pub fn scopes(&self) -> Vec<&str> {
        match self {
            Condition::Schema { scope, .. } | Condition::Leaf { scope, .. } => vec![scope.as_str()],
            Condition::Or(children) | Condition::And(children) => {
                children.iter().flat_map(Condition::scopes).collect()
            }
        }
    }

    fn from_value(value: &Value, path: &str) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or_else(|| SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: "object".to_string(),
            actual: value.to_string(),
        })?;

        let scope = || -> Result<String, SchemaError> {
            match obj.get("scope") {
                None => Ok("#".to_string()),
                Some(Value::String(s)) => {
                    Scope::parse(s)?;
                    Ok(s.clone())
                }
                Some(other) => Err(SchemaError::TypeMismatch {
                    path: format!("{path}.scope"),
                    expected: "string".to_string(),
                    actual: other.to_string(),
                }),
            }
        };

        match obj.get("type").and_then(|t| t.as_str()) {
            Some(kind @ ("OR" | "AND")) => {
                let children = obj
                    .get("conditions")
                    .and_then(|c| c.as_array())
                    .ok_or_else(|| SchemaError::MissingField {
                        path: path.to_string(),
                        field: "conditions".to_string(),
                    })?
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Condition::from_value(c, &format!("{path}.conditions[{i}]")))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if kind == "OR" {
                    Condition::Or(children)
                } else {
                    Condition::And(children)
                })
            }
            Some("LEAF") => Ok(Condition::Leaf {
                scope: scope()?,
                expected: obj
                    .get("expectedValue")
                    .cloned()
                    .ok_or_else(|| SchemaError::MissingField {
                        path: path.to_string(),
                        field: "expectedValue".to_string(),
                    })?,
            }),
            _ => Ok(Condition::Schema {
                scope: scope()?,
                schema: obj
                    .get("schema")
                    .cloned()
                    .ok_or_else(|| SchemaError::MissingField {
                        path: path.to_string(),
                        field: "schema".to_string(),
                    })?,
                fail_when_undefined: obj
                    .get("failWhenUndefined")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            }),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Condition::Schema {
                scope,
                schema,
                fail_when_undefined,
            } => {
                let mut obj = json!({ "scope": scope, "schema": schema });
                if *fail_when_undefined {
                    obj["failWhenUndefined"] = Value::Bool(true);
                }
                obj
            }
            Condition::Leaf { scope, expected } => {
                json!({ "type": "LEAF", "scope": scope, "expectedValue": expected })
            }
            Condition::Or(children) => json!({
                "type": "OR",
                "conditions": children.iter().map(Condition::to_json).collect::<Vec<_>>(),
            }),
            Condition::And(children) => json!({
                "type": "AND",
                "conditions": children.iter().map(Condition::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

/// A declarative rule attached to a UI element.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub effect: Effect,
    pub condition: Condition,
}

impl Rule {
    /// Parse a rule. Unknown effects and malformed conditions yield `None`:
    /// the element then behaves as if it had no rule.
    fn from_value(value: &Value, path: &str) -> Option<Self> {
        let Some(effect) = value
            .get("effect")
            .and_then(|e| e.as_str())
            .and_then(Effect::parse)
        else {
            debug!("{path}: ignoring rule with unknown effect: {value}");
            return None;
        };
        let condition = match value.get("condition") {
            Some(c) => match Condition::from_value(c, &format!("{path}.condition")) {
                Ok(c) => c,
                Err(e) => {
                    debug!("ignoring rule: {e}");
                    return None;
                }
            },
            None => {
                debug!("{path}: ignoring rule without condition");
                return None;
            }
        };
        Some(Rule { effect, condition })
    }

    fn to_json(&self) -> Value {
        json!({ "effect": self.effect.as_str(), "condition": self.condition.to_json() })
    }
}

/// Layout flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Vertical,
    Horizontal,
    Group,
}

impl LayoutKind {
    /// The `type` tag used in UI schema documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            LayoutKind::Vertical => "VerticalLayout",
            LayoutKind::Horizontal => "HorizontalLayout",
            LayoutKind::Group => "Group",
        }
    }
}

/// How a control label is specified.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSpec {
    /// Explicit label text.
    Text(String),
    /// `label: false`.
    Hidden,
}

/// A control bound to one data field.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlElement {
    pub scope: String,
    pub label: Option<LabelSpec>,
    pub rule: Option<Rule>,
    pub options: Map<String, Value>,
}

impl ControlElement {
    /// A control with just a scope.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            label: None,
            rule: None,
            options: Map::new(),
        }
    }
}

/// A container of child elements.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutElement {
    pub kind: LayoutKind,
    pub label: Option<String>,
    pub elements: Vec<UiSchemaElement>,
    pub rule: Option<Rule>,
    pub options: Map<String, Value>,
}

/// Static text.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelElement {
    pub text: String,
    pub rule: Option<Rule>,
}

/// An element whose `type` is outside the built-in set, such as
/// `Categorization`. Kept verbatim so custom testers can still match it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownElement {
    pub type_name: String,
    pub rule: Option<Rule>,
    pub options: Map<String, Value>,
    pub document: Value,
}

/// A UI schema element.
#[derive(Debug, Clone, PartialEq)]
pub enum UiSchemaElement {
    Control(ControlElement),
    Layout(LayoutElement),
    Label(LabelElement),
    Unknown(UnknownElement),
}

impl UiSchemaElement {
    /// The `type` tag of the element.
    pub fn type_name(&self) -> &str {
        match self {
            UiSchemaElement::Control(_) => "Control",
            UiSchemaElement::Layout(l) => l.kind.type_name(),
            UiSchemaElement::Label(_) => "Label",
            UiSchemaElement::Unknown(u) => &u.type_name,
        }
    }

    /// The rule attached to the element, if any.
    pub fn rule(&self) -> Option<&Rule> {
        match self {
            UiSchemaElement::Control(c) => c.rule.as_ref(),
            UiSchemaElement::Layout(l) => l.rule.as_ref(),
            UiSchemaElement::Label(l) => l.rule.as_ref(),
            UiSchemaElement::Unknown(u) => u.rule.as_ref(),
        }
    }

    /// Element options (labels have none).
    pub fn options(&self) -> Option<&Map<String, Value>> {
        match self {
            UiSchemaElement::Control(c) => Some(&c.options),
            UiSchemaElement::Layout(l) => Some(&l.options),
            UiSchemaElement::Unknown(u) => Some(&u.options),
            UiSchemaElement::Label(_) => None,
        }
    }

    /// The scope of a control.
    pub fn scope(&self) -> Option<&str> {
        match self {
            UiSchemaElement::Control(c) => Some(&c.scope),
            _ => None,
        }
    }

    /// Serialize back to the UI schema document form.
    pub fn to_json(&self) -> Value {
        if let UiSchemaElement::Unknown(u) = self {
            return u.document.clone();
        }
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.type_name().into()));
        match self {
            UiSchemaElement::Control(c) => {
                if !c.scope.is_empty() {
                    obj.insert("scope".into(), Value::String(c.scope.clone()));
                }
                match &c.label {
                    Some(LabelSpec::Text(t)) => {
                        obj.insert("label".into(), Value::String(t.clone()));
                    }
                    Some(LabelSpec::Hidden) => {
                        obj.insert("label".into(), Value::Bool(false));
                    }
                    None => {}
                }
                if !c.options.is_empty() {
                    obj.insert("options".into(), Value::Object(c.options.clone()));
                }
            }
            UiSchemaElement::Layout(l) => {
                if let Some(label) = &l.label {
                    obj.insert("label".into(), Value::String(label.clone()));
                }
                obj.insert(
                    "elements".into(),
                    Value::Array(l.elements.iter().map(UiSchemaElement::to_json).collect()),
                );
                if !l.options.is_empty() {
                    obj.insert("options".into(), Value::Object(l.options.clone()));
                }
            }
            UiSchemaElement::Label(l) => {
                obj.insert("text".into(), Value::String(l.text.clone()));
            }
            UiSchemaElement::Unknown(_) => {}
        }
        if let Some(rule) = self.rule() {
            obj.insert("rule".into(), rule.to_json());
        }
        Value::Object(obj)
    }

    fn from_value_at(value: &Value, path: &str) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or_else(|| SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: "object".to_string(),
            actual: value.to_string(),
        })?;
        let type_name = obj
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| SchemaError::MissingField {
                path: path.to_string(),
                field: "type".to_string(),
            })?;

        let rule = obj
            .get("rule")
            .and_then(|r| Rule::from_value(r, &format!("{path}.rule")));
        let options = obj
            .get("options")
            .and_then(|o| o.as_object())
            .cloned()
            .unwrap_or_default();

        let kind = match type_name {
            "Control" => {
                let scope = obj.get("scope").and_then(|s| s.as_str()).unwrap_or_else(|| {
                    debug!("{path}: control without scope");
                    ""
                });
                let label = match obj.get("label") {
                    Some(Value::String(s)) => Some(LabelSpec::Text(s.clone())),
                    Some(Value::Bool(false)) => Some(LabelSpec::Hidden),
                    _ => None,
                };
                return Ok(UiSchemaElement::Control(ControlElement {
                    scope: scope.to_string(),
                    label,
                    rule,
                    options,
                }));
            }
            "Label" => {
                return Ok(UiSchemaElement::Label(LabelElement {
                    text: obj
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    rule,
                }));
            }
            "VerticalLayout" => LayoutKind::Vertical,
            "HorizontalLayout" => LayoutKind::Horizontal,
            "Group" => LayoutKind::Group,
            other => {
                debug!("{path}: unknown element type `{other}`");
                return Ok(UiSchemaElement::Unknown(UnknownElement {
                    type_name: other.to_string(),
                    rule,
                    options,
                    document: value.clone(),
                }));
            }
        };

        let elements = match obj.get("elements") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, e)| Self::from_value_at(e, &format!("{path}.elements[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(SchemaError::TypeMismatch {
                    path: format!("{path}.elements"),
                    expected: "array".to_string(),
                    actual: other.to_string(),
                });
            }
        };

        Ok(UiSchemaElement::Layout(LayoutElement {
            kind,
            label: obj.get("label").and_then(|l| l.as_str()).map(String::from),
            elements,
            rule,
            options,
        }))
    }
}

impl TryFrom<&Value> for UiSchemaElement {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_value_at(value, "$")
    }
}
