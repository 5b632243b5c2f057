//! # schemaform
//!
//! A JSON Schema and UI Schema driven form engine.
//!
//! Given a JSON Schema and an optional UI Schema, schemaform decides which
//! view applies to every UI element, whether it is visible and enabled, and
//! keeps each bound control in sync with a data store. Views themselves are
//! opaque: the engine picks them, the caller draws them.
//!
//! ## Features
//!
//! - `$ref`-aware schema resolution with cycle detection and memoization
//! - Declarative SHOW/HIDE/ENABLE/DISABLE rules
//! - Composable testers ranked by priority
//! - Path-filtered data store subscriptions
//! - Asynchronous loading of remote `$ref` documents
//!
//! ## Quick Start
//!
//! ```rust
//! use schemaform::{FormSession, registry::default_renderers};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": { "foo": { "type": "integer", "minimum": 5 } }
//! });
//! let uischema = json!({ "type": "Control", "scope": "#/properties/foo" });
//!
//! let mut session = FormSession::new(default_renderers());
//! session.init(json!({ "foo": 42 }), schema, Some(&uischema)).unwrap();
//!
//! let tree = session.render();
//! assert_eq!(tree.as_control().unwrap().props.value, Some(json!(42)));
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Scopes, data paths, UI schema model and data access
//! - [`resolver`] - Sub-schema lookup for scopes
//! - [`validator`] - JSON Schema validation contract and default validator
//! - [`rule`] - Visibility and enablement rules
//! - [`tester`] - Testers and predicates
//! - [`registry`] - Ordered (tester, view) registry
//! - [`store`] - Data store, actions and subscriptions
//! - [`binder`] - Binding of one control to the store
//! - [`session`] - A rendered form session
//! - [`loader`] - Asynchronous `$ref` loading
//! - [`generate`] - Default UI schema generation

#[macro_use]
extern crate log;

/// Scopes, data paths, UI schema model and data access.
pub mod data;

/// Sub-schema lookup for scopes.
pub mod resolver;

/// JSON Schema validation contract and default validator.
pub mod validator;

/// Visibility and enablement rules.
pub mod rule;

/// Testers, predicates and ranks.
pub mod tester;

/// Ordered (tester, view) registry.
pub mod registry;

/// Data store with actions and path-filtered subscriptions.
pub mod store;

/// Binding of a single control to the data store.
pub mod binder;

/// Form session tying registry, store and rules together.
pub mod session;

/// Asynchronous loading of non-local `$ref` documents.
pub mod loader;

/// Default UI schema generation.
pub mod generate;

pub use data::{
    path::{DataPath, Scope},
    schema::SchemaError,
    uischema::{Condition, Effect, LayoutKind, Rule, UiSchemaElement},
};
pub use registry::{RegistryError, RendererRegistry};
pub use resolver::{SchemaIndex, resolve_schema};
pub use rule::{eval_enablement, eval_visibility, has_enable_rule, has_show_rule};
pub use session::FormSession;
pub use tester::{Rank, Tester, rank_with};
pub use validator::{BasicValidator, ValidationError, Validator};
pub use serde_json::Value;
