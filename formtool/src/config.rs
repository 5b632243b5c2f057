//! `formtool` configuration.
//!
//! Stored in `.formtool.toml` in the working directory:
//!
//! ```toml
//! schema = "schemas/person.json"
//! uischema = "schemas/person.ui.json"
//! data = "${env:HOME}/person.toml"
//! readonly = false
//! backup = true
//! ```
//!
//! Paths may contain `${env:VAR}` placeholders and are relative to the
//! directory of the config file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::utils::replace_env_placeholders;

/// Default config file name.
pub const CONFIG_FILE: &str = ".formtool.toml";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FormtoolConfig {
    /// Path to the JSON Schema describing the data.
    pub schema: Option<String>,
    /// Path to the UI Schema. A default layout is generated when absent.
    pub uischema: Option<String>,
    /// Path to the data file (`.json` or `.toml`).
    pub data: Option<String>,
    /// Render every control disabled and refuse `set`.
    pub readonly: bool,
    /// Keep a timestamped copy of the data file before overwriting it.
    pub backup: bool,
}

impl Default for FormtoolConfig {
    fn default() -> Self {
        Self {
            schema: None,
            uischema: None,
            data: None,
            readonly: false,
            backup: true,
        }
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub schema: Option<String>,
    pub uischema: Option<String>,
    pub data: Option<String>,
    pub readonly: bool,
    pub no_backup: bool,
}

/// Fully resolved file locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub schema: PathBuf,
    pub uischema: Option<PathBuf>,
    pub data: Option<PathBuf>,
}

impl FormtoolConfig {
    /// Load `path`, falling back to defaults when it does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if overrides.schema.is_some() {
            self.schema = overrides.schema;
        }
        if overrides.uischema.is_some() {
            self.uischema = overrides.uischema;
        }
        if overrides.data.is_some() {
            self.data = overrides.data;
        }
        self.readonly |= overrides.readonly;
        if overrides.no_backup {
            self.backup = false;
        }
    }

    /// Expand placeholders and anchor relative paths at `base`.
    pub fn resolve(&self, base: &Path) -> anyhow::Result<ResolvedPaths> {
        let expand = |p: &String| {
            let p = PathBuf::from(replace_env_placeholders(p));
            if p.is_absolute() { p } else { base.join(p) }
        };
        let schema = self
            .schema
            .as_ref()
            .map(expand)
            .ok_or_else(|| anyhow!("no schema given: pass --schema or set `schema` in {CONFIG_FILE}"))?;
        Ok(ResolvedPaths {
            schema,
            uischema: self.uischema.as_ref().map(expand),
            data: self.data.as_ref().map(expand),
        })
    }
}

/// JSON Schema of the config file.
pub fn config_schema() -> serde_json::Value {
    schemars::schema_for!(FormtoolConfig).to_value()
}
