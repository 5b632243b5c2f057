//! Form data structures and schema inspection.
//!
//! This module provides the building blocks shared by every other part of
//! the engine:
//!
//! - Scope parsing and data paths
//! - The UI schema element model
//! - Reading and updating values inside a data tree
//! - JSON Schema inspection helpers and the schema error type
//!
//! ## Architecture
//!
//! - [`path`] - [`Scope`](path::Scope) and [`DataPath`](path::DataPath)
//! - [`uischema`] - UI schema elements, rules and conditions
//! - [`value`] - Path-based reads and in-place updates
//! - [`schema`] - Type derivation and [`SchemaError`](schema::SchemaError)

/// Scope parsing and slash-delimited data paths.
pub mod path;

/// JSON Schema inspection helpers and error type.
pub mod schema;

/// UI schema element model.
pub mod uischema;

/// Path-based data access.
pub mod value;

pub use path::{DataPath, Scope};
pub use uischema::UiSchemaElement;
