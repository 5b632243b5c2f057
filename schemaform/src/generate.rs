use serde_json::Value;

use crate::data::{
    path::escape_segment,
    schema::has_type,
    uischema::{ControlElement, LayoutElement, LayoutKind, UiSchemaElement},
};

/// Build a UI schema for `schema` when the caller supplies none.
///
/// An object root becomes a vertical layout with one control per property
/// in schema order; nested objects become groups labelled with the property
/// name. Any other root becomes a single control bound to `#`.
pub fn default_uischema(schema: &Value) -> UiSchemaElement {
    if has_type(schema, "object") {
        UiSchemaElement::Layout(LayoutElement {
            kind: LayoutKind::Vertical,
            label: None,
            elements: object_elements(schema, "#"),
            rule: None,
            options: Default::default(),
        })
    } else {
        UiSchemaElement::Control(ControlElement::new("#"))
    }
}

fn object_elements(schema: &Value, prefix: &str) -> Vec<UiSchemaElement> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    properties
        .iter()
        .map(|(name, sub)| {
            let scope = format!("{prefix}/properties/{}", escape_segment(name));
            if sub.get("properties").is_some_and(Value::is_object) {
                UiSchemaElement::Layout(LayoutElement {
                    kind: LayoutKind::Group,
                    label: Some(name.clone()),
                    elements: object_elements(sub, &scope),
                    rule: None,
                    options: Default::default(),
                })
            } else {
                UiSchemaElement::Control(ControlElement::new(scope))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_root() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "a/b": { "type": "integer" },
                "address": {
                    "type": "object",
                    "properties": { "street": { "type": "string" } }
                }
            }
        });
        let ui = default_uischema(&schema);
        assert_eq!(
            ui.to_json(),
            json!({
                "type": "VerticalLayout",
                "elements": [
                    { "type": "Control", "scope": "#/properties/name" },
                    { "type": "Control", "scope": "#/properties/a~1b" },
                    {
                        "type": "Group",
                        "label": "address",
                        "elements": [
                            { "type": "Control", "scope": "#/properties/address/properties/street" }
                        ]
                    }
                ]
            })
        );
    }

    #[test]
    fn test_scalar_root() {
        let ui = default_uischema(&json!({ "type": "integer" }));
        assert_eq!(ui.scope(), Some("#"));
    }
}
