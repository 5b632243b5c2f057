//! Text rendering of a form tree.

use colored::{ColoredString, Colorize};
use schemaform::{
    registry::ControlKind,
    session::{RenderNode, RenderedControl},
};
use serde_json::Value;

/// Render `node` as an indented outline, one element per line.
pub fn render_tree(node: &RenderNode<ControlKind>) -> String {
    let mut out = String::new();
    write_node(node, 0, &mut out);
    out
}

fn write_node(node: &RenderNode<ControlKind>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        RenderNode::Control(control) => {
            out.push_str(&indent);
            out.push_str(&control_line(control));
            out.push('\n');
            for error in &control.props.errors {
                out.push_str(&format!("{indent}  {} {}\n", "!".red().bold(), error.message.red()));
            }
        }
        RenderNode::Layout(layout) => {
            let mut line = format!("{indent}{}", view_name(layout.view));
            if let Some(label) = &layout.label {
                line.push_str(&format!(" {}", label.bold()));
            }
            line.push_str(&flags(layout.visible, layout.enabled));
            out.push_str(&line);
            out.push('\n');
            for child in &layout.children {
                write_node(child, depth + 1, out);
            }
        }
        RenderNode::Label(label) => {
            out.push_str(&format!("{indent}{}{}\n", label.text.italic(), flags(label.visible, true)));
        }
        RenderNode::Custom(custom) => {
            out.push_str(&format!(
                "{indent}{} {}{}\n",
                view_name(custom.view),
                custom.type_name.dimmed(),
                flags(custom.visible, custom.enabled)
            ));
        }
        RenderNode::Empty => {}
    }
}

fn view_name(view: ControlKind) -> ColoredString {
    if view.is_layout() {
        view.to_string().blue().bold()
    } else {
        format!("[{view}]").cyan()
    }
}

fn control_line(control: &RenderedControl<ControlKind>) -> String {
    let props = &control.props;
    let mut name = props.label.clone().unwrap_or_else(|| props.path.to_string());
    if props.required {
        name.push('*');
    }
    format!(
        "{} {} = {}{}",
        name.bold(),
        view_name(control.view),
        display_value(&props.presented),
        flags(props.visible, props.enabled)
    )
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.is_empty() => "\"\"".dimmed().to_string(),
        Value::String(s) => format!("{s:?}").green().to_string(),
        other => other.to_string().green().to_string(),
    }
}

fn flags(visible: bool, enabled: bool) -> String {
    let mut out = String::new();
    if !visible {
        out.push_str(&format!(" {}", "(hidden)".dimmed()));
    }
    if !enabled {
        out.push_str(&format!(" {}", "(disabled)".yellow()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaform::{
        FormSession,
        data::uischema::LayoutKind,
        registry::default_renderers,
        session::{RenderedCustom, RenderedLayout},
    };
    use serde_json::json;

    #[test]
    fn test_render_tree() {
        colored::control::set_override(false);
        let mut session = FormSession::new(default_renderers());
        session
            .init(
                json!({ "age": 3, "locked": true }),
                json!({
                    "type": "object",
                    "properties": {
                        "age": { "type": "integer", "minimum": 5 },
                        "name": { "type": "string" },
                        "locked": { "type": "boolean" }
                    },
                    "required": ["age"]
                }),
                Some(&json!({
                    "type": "Group",
                    "label": "Person",
                    "elements": [
                        { "type": "Control", "scope": "#/properties/age" },
                        {
                            "type": "Control",
                            "scope": "#/properties/name",
                            "rule": {
                                "effect": "DISABLE",
                                "condition": { "scope": "#/properties/locked", "schema": { "const": true } }
                            }
                        }
                    ]
                })),
            )
            .unwrap();

        let text = render_tree(&session.render());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "group Person");
        assert_eq!(lines[1], "  Age* [integer] = 3");
        assert!(lines[2].starts_with("    ! "));
        assert_eq!(lines[3], "  Name [text] = \"\" (disabled)");
    }

    #[test]
    fn test_render_custom_element() {
        colored::control::set_override(false);
        let tree = RenderNode::Layout(RenderedLayout {
            view: ControlKind::VerticalLayout,
            kind: LayoutKind::Vertical,
            label: None,
            visible: true,
            enabled: true,
            children: vec![
                RenderNode::Custom(RenderedCustom {
                    view: ControlKind::Group,
                    type_name: "Categorization".into(),
                    visible: false,
                    enabled: true,
                }),
                RenderNode::Empty,
            ],
        });
        assert_eq!(render_tree(&tree), "vertical\n  group Categorization (hidden)\n");
    }
}
