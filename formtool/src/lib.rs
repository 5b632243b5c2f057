//! # formtool
//!
//! Command-line front end for [`schemaform`].
//!
//! `formtool` loads a JSON Schema, an optional UI Schema and a JSON or TOML
//! data file, shows which control the engine picks for every field, and
//! edits the data through the same update path a graphical form would use.
//!
//! ## Modules
//!
//! - [`config`] - `.formtool.toml` configuration
//! - [`ctx`] - Loaded files bound to a form session
//! - [`render`] - Text rendering of the form tree
//! - [`utils`] - Placeholder expansion and assignment parsing

/// `.formtool.toml` configuration.
pub mod config;

/// Loaded files bound to a form session.
pub mod ctx;

/// Text rendering of the form tree.
pub mod render;

/// Placeholder expansion and assignment parsing.
pub mod utils;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
