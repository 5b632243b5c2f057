//! A rendered form.
//!
//! [`FormSession`] owns everything one form needs: the renderer registry,
//! the validator, the data store and the indexed schema. [`FormSession::render`]
//! walks the UI schema, asks the registry for a view per element, and mounts
//! a [`ControlBinder`] for every control. Binders are kept between renders
//! and only recomputed when a dispatched change touches their dependencies.
//!
//! Schema loading may be asynchronous. A session whose schema is pending
//! (between [`FormSession::begin_schema`] and [`FormSession::complete_schema`])
//! renders nothing, and a completion for a superseded ticket is discarded.

use std::{collections::HashMap, sync::Arc};

use schemars::JsonSchema;
use serde_json::Value;

use crate::{
    binder::{BindContext, ControlBinder, ControlProps},
    data::{
        path::DataPath,
        schema::SchemaError,
        uischema::{LayoutKind, UiSchemaElement},
    },
    generate::default_uischema,
    loader::{LoadError, RefFetcher, bundle_refs},
    registry::RendererRegistry,
    resolver::SchemaIndex,
    rule::{is_enabled, is_visible, rule_dependencies},
    store::{Action, Change, DataStore, FormState},
    tester::TesterContext,
    validator::{BasicValidator, Validator},
};

/// A mounted control.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedControl<V> {
    pub view: V,
    pub props: ControlProps,
}

/// A mounted layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLayout<V> {
    pub view: V,
    pub kind: LayoutKind,
    pub label: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub children: Vec<RenderNode<V>>,
}

/// A mounted label.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLabel<V> {
    pub view: V,
    pub text: String,
    pub visible: bool,
}

/// An element outside the built-in set, picked up by a custom tester.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCustom<V> {
    pub view: V,
    pub type_name: String,
    pub visible: bool,
    pub enabled: bool,
}

/// Result of rendering one UI element.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode<V> {
    Control(RenderedControl<V>),
    Layout(RenderedLayout<V>),
    Label(RenderedLabel<V>),
    Custom(RenderedCustom<V>),
    /// No view applies, or the schema is not ready yet.
    Empty,
}

impl<V> RenderNode<V> {
    pub fn as_control(&self) -> Option<&RenderedControl<V>> {
        match self {
            RenderNode::Control(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_layout(&self) -> Option<&RenderedLayout<V>> {
        match self {
            RenderNode::Layout(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RenderNode::Empty)
    }

    /// Every mounted control, depth first.
    pub fn controls(&self) -> Vec<&RenderedControl<V>> {
        let mut out = Vec::new();
        self.collect_controls(&mut out);
        out
    }

    fn collect_controls<'a>(&'a self, out: &mut Vec<&'a RenderedControl<V>>) {
        match self {
            RenderNode::Control(c) => out.push(c),
            RenderNode::Layout(l) => l.children.iter().for_each(|c| c.collect_controls(out)),
            RenderNode::Label(_) | RenderNode::Custom(_) | RenderNode::Empty => {}
        }
    }
}

/// Handle for one asynchronous schema resolution.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolutionTicket {
    generation: u64,
}

struct Mounted {
    binder: ControlBinder,
    props: Option<ControlProps>,
    dirty: bool,
}

pub struct FormSession<V> {
    registry: RendererRegistry<V>,
    validator: Box<dyn Validator>,
    store: DataStore,
    index: SchemaIndex,
    generation: u64,
    pending: Option<u64>,
    readonly: bool,
    mounted: HashMap<String, Mounted>,
}

impl<V: Clone> FormSession<V> {
    /// Session with the [`BasicValidator`] and an empty form.
    pub fn new(registry: RendererRegistry<V>) -> Self {
        Self::with_validator(registry, Box::new(BasicValidator::new()))
    }

    pub fn with_validator(registry: RendererRegistry<V>, validator: Box<dyn Validator>) -> Self {
        let store = DataStore::default();
        let index = SchemaIndex::new(store.state().schema.clone());
        Self {
            registry,
            validator,
            store,
            index,
            generation: 0,
            pending: None,
            readonly: false,
            mounted: HashMap::new(),
        }
    }

    /// Session for the JSON Schema generated from `C`, with a default UI schema.
    pub fn for_type<C: JsonSchema>(registry: RendererRegistry<V>, data: Value) -> Result<Self, SchemaError> {
        let schema = schemars::schema_for!(C).to_value();
        let mut session = Self::new(registry);
        session.init(data, schema, None)?;
        Ok(session)
    }

    /// Replace data, schema and UI schema at once. Without a UI schema a
    /// default one is generated from the schema.
    pub fn init(&mut self, data: Value, schema: Value, uischema: Option<&Value>) -> Result<(), SchemaError> {
        let uischema = match uischema {
            Some(ui) => UiSchemaElement::try_from(ui)?,
            None => default_uischema(&schema),
        };
        self.supersede();
        self.dispatch(Action::Init {
            data,
            schema: Arc::new(schema),
            uischema: Some(uischema),
        });
        Ok(())
    }

    pub fn state(&self) -> &FormState {
        self.store.state()
    }

    pub fn data(&self) -> &Value {
        &self.store.state().data
    }

    pub fn uischema(&self) -> Option<&UiSchemaElement> {
        self.store.state().uischema.as_ref()
    }

    /// Mutable access to the store, for subscriptions.
    pub fn store_mut(&mut self) -> &mut DataStore {
        &mut self.store
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        if self.readonly != readonly {
            self.readonly = readonly;
            self.mounted.values_mut().for_each(|m| m.dirty = true);
        }
    }

    pub fn is_schema_ready(&self) -> bool {
        self.pending.is_none()
    }

    /// Start an asynchronous schema resolution. Until the returned ticket is
    /// completed, the session renders nothing.
    pub fn begin_schema(&mut self) -> ResolutionTicket {
        self.generation += 1;
        self.pending = Some(self.generation);
        ResolutionTicket {
            generation: self.generation,
        }
    }

    /// Finish a resolution started by [`begin_schema`](Self::begin_schema).
    ///
    /// Returns `Ok(false)` when the ticket was superseded; its result is
    /// dropped. A failed resolution keeps the previous schema.
    pub fn complete_schema(
        &mut self,
        ticket: ResolutionTicket,
        result: Result<Value, LoadError>,
    ) -> Result<bool, LoadError> {
        if self.pending != Some(ticket.generation) {
            debug!("discarding stale schema resolution #{}", ticket.generation);
            return Ok(false);
        }
        self.pending = None;
        let schema = result?;
        self.set_schema(schema);
        Ok(true)
    }

    /// Bundle external references of `schema` and install it.
    pub async fn load_schema<F: RefFetcher>(&mut self, schema: Value, fetcher: &F) -> Result<bool, LoadError> {
        let ticket = self.begin_schema();
        let result = bundle_refs(schema, fetcher).await;
        self.complete_schema(ticket, result)
    }

    /// Install a new schema; any pending resolution is superseded.
    pub fn set_schema(&mut self, schema: Value) {
        self.supersede();
        self.dispatch(Action::SetSchema(Arc::new(schema)));
    }

    pub fn set_uischema(&mut self, uischema: &Value) -> Result<(), SchemaError> {
        let ui = UiSchemaElement::try_from(uischema)?;
        self.dispatch(Action::SetUiSchema(Some(ui)));
        Ok(())
    }

    fn supersede(&mut self) {
        if self.pending.take().is_some() {
            debug!("pending schema resolution superseded");
        }
        self.generation += 1;
    }

    /// Dispatch an action and invalidate the binders it touches.
    pub fn dispatch(&mut self, action: Action) -> Vec<Change> {
        let changes = self.store.dispatch(action);
        for change in &changes {
            self.apply_change(change);
        }
        changes
    }

    /// Store `value` at `path`; `None` stores undefined.
    pub fn set_value(&mut self, path: &str, value: Option<Value>) -> Vec<Change> {
        self.dispatch(Action::set(path, value))
    }

    /// Apply `updater` at `path`. A `None` or empty path is a no-op.
    pub fn update(
        &mut self,
        path: Option<&str>,
        updater: impl FnOnce(Option<&Value>) -> Option<Value> + Send + 'static,
    ) -> Vec<Change> {
        self.dispatch(Action::Update {
            path: path.map(String::from),
            updater: Box::new(updater),
        })
    }

    fn apply_change(&mut self, change: &Change) {
        match change {
            Change::Reset | Change::Schema => {
                let schema = self.store.state().schema.clone();
                if !Arc::ptr_eq(&schema, &self.index.root_arc()) {
                    self.index = SchemaIndex::new(schema);
                }
                if *change == Change::Reset {
                    self.mounted.clear();
                } else {
                    self.mounted.values_mut().for_each(|m| m.dirty = true);
                }
            }
            Change::UiSchema => self.mounted.clear(),
            Change::Data(_) => {
                for m in self.mounted.values_mut() {
                    if !m.dirty && m.binder.is_affected_by(change) {
                        m.dirty = true;
                    }
                }
            }
        }
    }

    /// The binder mounted for the control bound to `path`.
    pub fn binder(&self, path: &DataPath) -> Option<&ControlBinder> {
        self.mounted
            .values()
            .map(|m| &m.binder)
            .find(|b| b.path() == path)
    }

    /// Total number of binder recomputations since the UI schema was mounted.
    pub fn recompute_count(&self) -> usize {
        self.mounted.values().map(|m| m.binder.recompute_count()).sum()
    }

    /// Render the whole UI schema.
    pub fn render(&mut self) -> RenderNode<V> {
        if self.pending.is_some() {
            debug!("schema not ready, rendering nothing");
            return RenderNode::Empty;
        }
        let FormSession {
            registry,
            validator,
            store,
            index,
            readonly,
            mounted,
            ..
        } = self;
        let Some(ui) = store.state().uischema.as_ref() else {
            return RenderNode::Empty;
        };
        let mut walker = Walker {
            registry,
            validator: validator.as_ref(),
            data: &store.state().data,
            index,
            readonly: *readonly,
            mounted,
        };
        walker.render(ui, "#".to_string(), true, &[])
    }
}

struct Walker<'a, V> {
    registry: &'a RendererRegistry<V>,
    validator: &'a dyn Validator,
    data: &'a Value,
    index: &'a SchemaIndex,
    readonly: bool,
    mounted: &'a mut HashMap<String, Mounted>,
}

impl<V: Clone> Walker<'_, V> {
    fn render(
        &mut self,
        element: &UiSchemaElement,
        key: String,
        parent_enabled: bool,
        inherited: &[DataPath],
    ) -> RenderNode<V> {
        let ctx = TesterContext::with_index(self.index);
        let Some(view) = self
            .registry
            .find_most_applicable(element, self.index.root(), &ctx)
            .cloned()
        else {
            trace!("no view for `{}` at {key}", element.type_name());
            return RenderNode::Empty;
        };

        let root = DataPath::root();
        match element {
            UiSchemaElement::Control(control) => {
                if !self.mounted.contains_key(&key) {
                    let binder = match ControlBinder::new(control.clone(), &root, inherited) {
                        Ok(b) => b,
                        Err(e) => {
                            debug!("{e}");
                            return RenderNode::Empty;
                        }
                    };
                    self.mounted.insert(
                        key.clone(),
                        Mounted {
                            binder,
                            props: None,
                            dirty: true,
                        },
                    );
                }
                let Some(mounted) = self.mounted.get_mut(&key) else {
                    return RenderNode::Empty;
                };
                if mounted.dirty {
                    let ctx = BindContext {
                        data: self.data,
                        index: self.index,
                        validator: self.validator,
                        parent_enabled,
                        readonly: self.readonly,
                    };
                    mounted.props = mounted.binder.compute(&ctx);
                    mounted.dirty = false;
                }
                match &mounted.props {
                    Some(props) => RenderNode::Control(RenderedControl {
                        view,
                        props: props.clone(),
                    }),
                    None => RenderNode::Empty,
                }
            }
            UiSchemaElement::Layout(layout) => {
                let visible = is_visible(element, self.data, &root, self.validator);
                let enabled = parent_enabled && is_enabled(element, self.data, &root, self.validator);
                let mut deps = inherited.to_vec();
                deps.extend(rule_dependencies(element, &root));
                let children = layout
                    .elements
                    .iter()
                    .enumerate()
                    .map(|(i, child)| self.render(child, format!("{key}/{i}"), enabled, &deps))
                    .collect();
                RenderNode::Layout(RenderedLayout {
                    view,
                    kind: layout.kind,
                    label: layout.label.clone(),
                    visible,
                    enabled,
                    children,
                })
            }
            UiSchemaElement::Label(label) => RenderNode::Label(RenderedLabel {
                view,
                text: label.text.clone(),
                visible: is_visible(element, self.data, &root, self.validator),
            }),
            UiSchemaElement::Unknown(unknown) => RenderNode::Custom(RenderedCustom {
                view,
                type_name: unknown.type_name.clone(),
                visible: is_visible(element, self.data, &root, self.validator),
                enabled: parent_enabled && is_enabled(element, self.data, &root, self.validator),
            }),
        }
    }
}
