//! Ordered `(tester, view)` registry.
//!
//! Entries are registered in priority order. Lookup runs every tester and
//! returns the view with the highest rank; on equal ranks the entry that was
//! registered first wins.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::{
    data::uischema::{LayoutKind, UiSchemaElement},
    tester::{self, Rank, Tester, TesterContext},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("renderer registry has no entries")]
    Empty,
}

struct Entry<V> {
    tester: Tester,
    view: V,
}

/// The renderer registry.
///
/// `V` is whatever the caller draws with; the registry never inspects it.
pub struct RendererRegistry<V> {
    entries: Vec<Entry<V>>,
}

impl<V> RendererRegistry<V> {
    /// Start a new registry.
    pub fn builder() -> RegistryBuilder<V> {
        RegistryBuilder {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the view with the highest applicable rank.
    ///
    /// Returns `None` when every tester says [`Rank::NotApplicable`].
    pub fn find_most_applicable(
        &self,
        uischema: &UiSchemaElement,
        schema: &Value,
        ctx: &TesterContext<'_>,
    ) -> Option<&V> {
        self.best(uischema, schema, ctx).map(|(view, _)| view)
    }

    /// Like [`find_most_applicable`](Self::find_most_applicable) but also
    /// reports the winning rank.
    pub fn best(
        &self,
        uischema: &UiSchemaElement,
        schema: &Value,
        ctx: &TesterContext<'_>,
    ) -> Option<(&V, Rank)> {
        let mut best: Option<(&V, Rank)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            let rank = entry.tester.rank(uischema, schema, ctx);
            trace!("tester #{i} ranked `{}` as {rank:?}", uischema.type_name());
            if !rank.is_applicable() {
                continue;
            }
            // Strictly greater keeps the earliest entry on ties.
            if best.is_none_or(|(_, current)| rank > current) {
                best = Some((&entry.view, rank));
            }
        }
        best
    }
}

impl<V> fmt::Debug for RendererRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Builder for [`RendererRegistry`].
pub struct RegistryBuilder<V> {
    entries: Vec<Entry<V>>,
}

impl<V> RegistryBuilder<V> {
    /// Append an entry.
    pub fn register(mut self, tester: Tester, view: V) -> Self {
        self.entries.push(Entry { tester, view });
        self
    }

    pub fn build(self) -> Result<RendererRegistry<V>, RegistryError> {
        if self.entries.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(RendererRegistry {
            entries: self.entries,
        })
    }
}

/// Views of the built-in registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Integer,
    Number,
    Boolean,
    Text,
    Enum,
    OneOfEnum,
    Date,
    Time,
    DateTime,
    Object,
    Array,
    Generic,
    VerticalLayout,
    HorizontalLayout,
    Group,
    Label,
}

impl ControlKind {
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            ControlKind::VerticalLayout | ControlKind::HorizontalLayout | ControlKind::Group
        )
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Integer => "integer",
            ControlKind::Number => "number",
            ControlKind::Boolean => "boolean",
            ControlKind::Text => "text",
            ControlKind::Enum => "enum",
            ControlKind::OneOfEnum => "oneOf-enum",
            ControlKind::Date => "date",
            ControlKind::Time => "time",
            ControlKind::DateTime => "date-time",
            ControlKind::Object => "object",
            ControlKind::Array => "array",
            ControlKind::Generic => "generic",
            ControlKind::VerticalLayout => "vertical",
            ControlKind::HorizontalLayout => "horizontal",
            ControlKind::Group => "group",
            ControlKind::Label => "label",
        };
        f.write_str(name)
    }
}

/// The built-in registry. The generic control fallback is registered last.
pub fn default_renderers() -> RendererRegistry<ControlKind> {
    RendererRegistry {
        entries: default_entries(),
    }
}

fn default_entries() -> Vec<Entry<ControlKind>> {
    vec![
        Entry { tester: tester::integer_control_tester(), view: ControlKind::Integer },
        Entry { tester: tester::number_control_tester(), view: ControlKind::Number },
        Entry { tester: tester::boolean_control_tester(), view: ControlKind::Boolean },
        Entry { tester: tester::enum_control_tester(), view: ControlKind::Enum },
        Entry { tester: tester::one_of_enum_control_tester(), view: ControlKind::OneOfEnum },
        Entry { tester: tester::date_control_tester(), view: ControlKind::Date },
        Entry { tester: tester::time_control_tester(), view: ControlKind::Time },
        Entry { tester: tester::date_time_control_tester(), view: ControlKind::DateTime },
        Entry { tester: tester::object_control_tester(), view: ControlKind::Object },
        Entry { tester: tester::array_control_tester(), view: ControlKind::Array },
        Entry { tester: tester::text_control_tester(), view: ControlKind::Text },
        Entry {
            tester: tester::layout_tester(LayoutKind::Vertical),
            view: ControlKind::VerticalLayout,
        },
        Entry {
            tester: tester::layout_tester(LayoutKind::Horizontal),
            view: ControlKind::HorizontalLayout,
        },
        Entry { tester: tester::layout_tester(LayoutKind::Group), view: ControlKind::Group },
        Entry { tester: tester::label_tester(), view: ControlKind::Label },
        Entry { tester: tester::generic_control_tester(), view: ControlKind::Generic },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tester::{is_control, rank_with};
    use serde_json::json;

    fn control(scope: &str) -> UiSchemaElement {
        UiSchemaElement::try_from(&json!({ "type": "Control", "scope": scope })).unwrap()
    }

    #[test]
    fn test_empty_registry_is_rejected() {
        let err = RendererRegistry::<&str>::builder().build().unwrap_err();
        assert_eq!(err, RegistryError::Empty);
    }

    #[test]
    fn test_highest_rank_wins() {
        let registry = RendererRegistry::builder()
            .register(rank_with(1, is_control()), "low")
            .register(rank_with(5, is_control()), "high")
            .register(rank_with(3, is_control()), "mid")
            .build()
            .unwrap();
        let schema = json!({});
        let ctx = TesterContext::new(&schema);
        assert_eq!(
            registry.best(&control("#"), &schema, &ctx),
            Some((&"high", Rank::Priority(5)))
        );
    }

    #[test]
    fn test_ties_keep_first_registered() {
        let registry = RendererRegistry::builder()
            .register(rank_with(2, is_control()), "first")
            .register(rank_with(2, is_control()), "second")
            .build()
            .unwrap();
        let schema = json!({});
        assert_eq!(
            registry.find_most_applicable(&control("#"), &schema, &TesterContext::new(&schema)),
            Some(&"first")
        );
    }

    #[test]
    fn test_nothing_applicable() {
        let registry = RendererRegistry::builder()
            .register(rank_with(2, is_control()), "control")
            .build()
            .unwrap();
        let schema = json!({});
        let label = UiSchemaElement::try_from(&json!({ "type": "Label", "text": "hi" })).unwrap();
        assert_eq!(
            registry.find_most_applicable(&label, &schema, &TesterContext::new(&schema)),
            None
        );
    }

    #[test]
    fn test_default_renderers() {
        let registry = default_renderers();
        let schema = json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer" },
                "ratio": { "type": "number" },
                "done": { "type": "boolean" },
                "name": { "type": "string" },
                "color": { "type": "string", "enum": ["red"] },
                "when": { "type": "string", "format": "date-time" },
                "tags": { "type": "array", "items": { "type": "string" } },
                "address": { "type": "object", "properties": {} },
                "anything": {}
            }
        });
        let ctx = TesterContext::new(&schema);
        let pick = |scope: &str| registry.find_most_applicable(&control(scope), &schema, &ctx).copied();

        assert_eq!(pick("#/properties/count"), Some(ControlKind::Integer));
        assert_eq!(pick("#/properties/ratio"), Some(ControlKind::Number));
        assert_eq!(pick("#/properties/done"), Some(ControlKind::Boolean));
        assert_eq!(pick("#/properties/name"), Some(ControlKind::Text));
        assert_eq!(pick("#/properties/color"), Some(ControlKind::Enum));
        assert_eq!(pick("#/properties/when"), Some(ControlKind::DateTime));
        assert_eq!(pick("#/properties/tags"), Some(ControlKind::Array));
        assert_eq!(pick("#/properties/address"), Some(ControlKind::Object));
        assert_eq!(pick("#/properties/anything"), Some(ControlKind::Generic));
        assert_eq!(pick("#/properties/missing"), None);

        let group = UiSchemaElement::try_from(&json!({ "type": "Group", "label": "g", "elements": [] })).unwrap();
        assert_eq!(registry.find_most_applicable(&group, &schema, &ctx), Some(&ControlKind::Group));

        let scopeless = UiSchemaElement::try_from(&json!({ "type": "Control" })).unwrap();
        assert_eq!(registry.find_most_applicable(&scopeless, &schema, &ctx), None);
        let unknown = UiSchemaElement::try_from(&json!({ "type": "Categorization", "elements": [] })).unwrap();
        assert_eq!(registry.find_most_applicable(&unknown, &schema, &ctx), None);
    }

    #[test]
    fn test_control_kind_names() {
        assert!(ControlKind::Group.is_layout());
        assert!(ControlKind::VerticalLayout.is_layout());
        assert!(!ControlKind::Object.is_layout());
        assert!(!ControlKind::Label.is_layout());
        assert_eq!(ControlKind::DateTime.to_string(), "date-time");
        assert_eq!(ControlKind::HorizontalLayout.to_string(), "horizontal");
    }
}
