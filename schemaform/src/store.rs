//! Form data store.
//!
//! The store owns the form state and changes it only through [`Action`]s.
//! Actions are applied strictly in dispatch order: a FIFO queue is drained
//! on every [`DataStore::dispatch`], and actions issued by subscribers while
//! they are being notified are appended to the same queue.
//!
//! Subscribers may declare the data paths they depend on. A data change at
//! `p` only reaches subscribers with a dependency that is an ancestor of,
//! equal to, or a descendant of `p`. Init and schema changes reach everyone.

use std::{collections::VecDeque, fmt, sync::Arc};

use serde_json::Value;

use crate::data::{path::DataPath, uischema::UiSchemaElement, value::{resolve_data, update_data}};

/// Produces the new value from the current one. `None` means undefined.
pub type Updater = Box<dyn FnOnce(Option<&Value>) -> Option<Value> + Send>;

/// State held by the store.
#[derive(Debug, Clone)]
pub struct FormState {
    pub data: Value,
    pub schema: Arc<Value>,
    pub uischema: Option<UiSchemaElement>,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            data: Value::Null,
            schema: Arc::new(Value::Bool(true)),
            uischema: None,
        }
    }
}

/// Intents accepted by the store.
pub enum Action {
    Init {
        data: Value,
        schema: Arc<Value>,
        uischema: Option<UiSchemaElement>,
    },
    /// Replace the value at `path`. A missing or empty path is a no-op.
    Update {
        path: Option<String>,
        updater: Updater,
    },
    SetSchema(Arc<Value>),
    SetUiSchema(Option<UiSchemaElement>),
}

impl Action {
    /// Update intent for `path`.
    pub fn update(
        path: impl Into<String>,
        updater: impl FnOnce(Option<&Value>) -> Option<Value> + Send + 'static,
    ) -> Self {
        Action::Update {
            path: Some(path.into()),
            updater: Box::new(updater),
        }
    }

    /// Store `value` at `path`; `None` stores undefined.
    pub fn set(path: impl Into<String>, value: Option<Value>) -> Self {
        Self::update(path, move |_| value)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Init { data, .. } => f.debug_struct("Init").field("data", data).finish_non_exhaustive(),
            Action::Update { path, .. } => f.debug_struct("Update").field("path", path).finish_non_exhaustive(),
            Action::SetSchema(_) => f.write_str("SetSchema"),
            Action::SetUiSchema(_) => f.write_str("SetUiSchema"),
        }
    }
}

/// What an applied action changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The whole state was replaced.
    Reset,
    /// Data at this path was written.
    Data(DataPath),
    Schema,
    UiSchema,
}

impl Change {
    /// Whether a consumer reading `dependencies` must recompute.
    pub fn affects(&self, dependencies: &[DataPath]) -> bool {
        match self {
            Change::Data(path) => dependencies.iter().any(|d| d.overlaps(path)),
            Change::Reset | Change::Schema | Change::UiSchema => true,
        }
    }
}

/// Handle passed to listeners for follow-up dispatches.
///
/// Actions are queued and applied after the current one, in order.
pub struct Dispatcher<'a> {
    queue: &'a mut VecDeque<Action>,
}

impl Dispatcher<'_> {
    pub fn dispatch(&mut self, action: Action) {
        self.queue.push_back(action);
    }
}

type Listener = Box<dyn FnMut(&FormState, &Change, &mut Dispatcher<'_>) + Send>;

/// Identifies a subscription for [`DataStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

struct Subscriber {
    id: SubscriptionId,
    dependencies: Option<Vec<DataPath>>,
    listener: Listener,
}

/// The data store.
pub struct DataStore {
    state: FormState,
    queue: VecDeque<Action>,
    subscribers: Vec<Subscriber>,
    next_id: usize,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(FormState::default())
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl DataStore {
    pub fn new(state: FormState) -> Self {
        Self {
            state,
            queue: VecDeque::new(),
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Read the data at `path`.
    pub fn get(&self, path: &DataPath) -> Option<&Value> {
        resolve_data(&self.state.data, path)
    }

    /// Listen to every change.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&FormState, &Change, &mut Dispatcher<'_>) + Send + 'static,
    ) -> SubscriptionId {
        self.add_subscriber(None, Box::new(listener))
    }

    /// Listen to changes overlapping `dependencies`.
    pub fn subscribe_paths(
        &mut self,
        dependencies: Vec<DataPath>,
        listener: impl FnMut(&FormState, &Change, &mut Dispatcher<'_>) + Send + 'static,
    ) -> SubscriptionId {
        self.add_subscriber(Some(dependencies), Box::new(listener))
    }

    fn add_subscriber(&mut self, dependencies: Option<Vec<DataPath>>, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            dependencies,
            listener,
        });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Apply `action` and everything it triggers, returning the changes in
    /// the order they were applied.
    pub fn dispatch(&mut self, action: Action) -> Vec<Change> {
        self.queue.push_back(action);
        let mut changes = Vec::new();
        while let Some(action) = self.queue.pop_front() {
            let Some(change) = self.apply(action) else {
                continue;
            };
            self.notify(&change);
            changes.push(change);
        }
        changes
    }

    fn apply(&mut self, action: Action) -> Option<Change> {
        match action {
            Action::Init {
                data,
                schema,
                uischema,
            } => {
                self.state = FormState {
                    data,
                    schema,
                    uischema,
                };
                Some(Change::Reset)
            }
            Action::Update { path, updater } => {
                let path = match path.as_deref() {
                    Some(p) if !p.is_empty() => DataPath::parse(p),
                    _ => {
                        debug!("update without a path ignored");
                        return None;
                    }
                };
                if path.is_root() {
                    debug!("update of the data root ignored");
                    return None;
                }
                if update_data(&mut self.state.data, &path, updater) {
                    Some(Change::Data(path))
                } else {
                    debug!("update target `{path}` does not exist, ignored");
                    None
                }
            }
            Action::SetSchema(schema) => {
                self.state.schema = schema;
                Some(Change::Schema)
            }
            Action::SetUiSchema(uischema) => {
                self.state.uischema = uischema;
                Some(Change::UiSchema)
            }
        }
    }

    fn notify(&mut self, change: &Change) {
        let DataStore {
            state,
            queue,
            subscribers,
            ..
        } = self;
        let mut dispatcher = Dispatcher { queue };
        for sub in subscribers.iter_mut() {
            let interested = match &sub.dependencies {
                Some(deps) => change.affects(deps),
                None => true,
            };
            if interested {
                (sub.listener)(state, change, &mut dispatcher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::uischema::ControlElement;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn store(data: Value) -> DataStore {
        DataStore::new(FormState {
            data,
            ..FormState::default()
        })
    }

    #[test]
    fn test_update_in_order() {
        let mut store = store(json!({ "n": 1 }));
        store.dispatch(Action::update("n", |v| Some(json!(v.and_then(Value::as_i64).unwrap_or(0) + 1))));
        store.dispatch(Action::update("n", |v| Some(json!(v.and_then(Value::as_i64).unwrap_or(0) * 10))));
        assert_eq!(store.state().data, json!({ "n": 20 }));
    }

    #[test]
    fn test_noop_updates() {
        let mut store = store(json!({ "foo": 42 }));
        let changes = store.dispatch(Action::Update {
            path: None,
            updater: Box::new(|_| Some(json!(1))),
        });
        assert!(changes.is_empty());
        assert!(store.dispatch(Action::set("", Some(json!(1)))).is_empty());
        assert!(store.dispatch(Action::set("a/b", Some(json!(1)))).is_empty());
        assert_eq!(store.state().data, json!({ "foo": 42 }));
    }

    #[test]
    fn test_set_undefined_removes() {
        let mut store = store(json!({ "foo": 42 }));
        let changes = store.dispatch(Action::set("foo", None));
        assert_eq!(changes, [Change::Data("foo".into())]);
        assert_eq!(store.get(&"foo".into()), None);
    }

    #[test]
    fn test_path_filtered_subscriptions() {
        let mut store = store(json!({ "a": { "x": 1 }, "b": 2 }));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        store.subscribe_paths(vec!["a".into()], move |_, change, _| {
            log.lock().unwrap().push(change.clone());
        });

        store.dispatch(Action::set("b", Some(json!(3))));
        store.dispatch(Action::set("a/x", Some(json!(5))));
        store.dispatch(Action::set("a", Some(json!({}))));
        assert_eq!(
            *seen.lock().unwrap(),
            [Change::Data("a/x".into()), Change::Data("a".into())]
        );
    }

    #[test]
    fn test_set_uischema_reaches_path_subscribers() {
        let mut store = store(json!({ "a": 1 }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        store.subscribe_paths(vec!["a".into()], move |state, change, _| {
            log.lock().unwrap().push((change.clone(), state.uischema.is_some()));
        });

        let ui = UiSchemaElement::Control(ControlElement::new("#/properties/a"));
        let changes = store.dispatch(Action::SetUiSchema(Some(ui.clone())));
        assert_eq!(changes, [Change::UiSchema]);
        assert_eq!(store.state().uischema, Some(ui));

        store.dispatch(Action::SetUiSchema(None));
        assert_eq!(*seen.lock().unwrap(), [(Change::UiSchema, true), (Change::UiSchema, false)]);
        assert!(store.state().uischema.is_none());
    }

    #[test]
    fn test_listener_dispatch_is_queued() {
        let mut store = store(json!({ "a": 0, "b": 0 }));
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = order.clone();
        store.subscribe(move |state, change, dispatcher| {
            log.lock().unwrap().push(state.data.clone());
            if *change == Change::Data("a".into()) {
                dispatcher.dispatch(Action::set("b", Some(json!(2))));
            }
        });

        let changes = store.dispatch(Action::set("a", Some(json!(1))));
        assert_eq!(changes, [Change::Data("a".into()), Change::Data("b".into())]);
        assert_eq!(
            *order.lock().unwrap(),
            [json!({ "a": 1, "b": 0 }), json!({ "a": 1, "b": 2 })]
        );
    }

    #[test]
    fn test_unsubscribe_and_reset() {
        let mut store = DataStore::default();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let id = store.subscribe_paths(vec!["x".into()], move |_, _, _| *counter.lock().unwrap() += 1);

        store.dispatch(Action::Init {
            data: json!({ "x": 1 }),
            schema: Arc::new(json!({})),
            uischema: None,
        });
        store.dispatch(Action::SetSchema(Arc::new(json!({ "type": "object" }))));
        assert_eq!(*hits.lock().unwrap(), 2);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.dispatch(Action::set("x", Some(json!(2))));
        assert_eq!(*hits.lock().unwrap(), 2);
    }
}
