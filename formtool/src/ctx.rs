//! Loaded form state: schema, UI schema and data files bound to a session.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::Context;
use colored::Colorize;
use schemaform::{
    FormSession,
    loader::{DefaultFetcher, bundle_refs},
    registry::{ControlKind, default_renderers},
    session::RenderNode,
};
use serde_json::Value;
use tokio::fs;

use crate::config::{FormtoolConfig, ResolvedPaths};

/// Data file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Toml,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
            "json" => Ok(DataFormat::Json),
            "toml" | "tml" => Ok(DataFormat::Toml),
            ext => bail!("Unsupported data file extension: {ext:?}"),
        }
    }

    pub fn parse(&self, content: &str) -> anyhow::Result<Value> {
        if content.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(match self {
            DataFormat::Json => serde_json::from_str(content)?,
            DataFormat::Toml => {
                let v: toml::Value = toml::from_str(content)?;
                serde_json::to_value(v)?
            }
        })
    }

    pub fn to_text(&self, value: &Value) -> anyhow::Result<String> {
        Ok(match self {
            DataFormat::Json => serde_json::to_string_pretty(value)?,
            DataFormat::Toml => toml::to_string_pretty(value)?,
        })
    }
}

fn contains_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().any(contains_null),
        Value::Object(map) => map.values().any(contains_null),
        _ => false,
    }
}

async fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// A form bound to files on disk.
pub struct FormContext {
    pub session: FormSession<ControlKind>,
    pub config: FormtoolConfig,
    pub paths: ResolvedPaths,
    pub needs_save: bool,
}

impl FormContext {
    /// Load every file named by `config`. Relative paths start at `workdir`.
    pub async fn load(config: FormtoolConfig, workdir: &Path) -> anyhow::Result<Self> {
        let paths = config.resolve(workdir)?;

        let raw_schema = read_json(&paths.schema).await?;
        let schema_dir = paths
            .schema
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workdir.to_path_buf());
        let fetcher = DefaultFetcher::new(schema_dir)?;

        let uischema = match &paths.uischema {
            Some(p) => Some(read_json(p).await?),
            None => None,
        };

        let data = match &paths.data {
            Some(p) if p.exists() => {
                let content = fs::read_to_string(p)
                    .await
                    .with_context(|| format!("Failed to read {}", p.display()))?;
                DataFormat::from_path(p)?
                    .parse(&content)
                    .with_context(|| format!("Invalid data in {}", p.display()))?
            }
            Some(p) => {
                info!("{} does not exist yet, starting with empty data", p.display());
                Value::Object(Default::default())
            }
            None => Value::Object(Default::default()),
        };

        let schema = bundle_refs(raw_schema, &fetcher)
            .await
            .with_context(|| format!("Failed to load references of {}", paths.schema.display()))?;

        let mut session = FormSession::new(default_renderers());
        session.set_readonly(config.readonly);
        session.init(data, schema, uischema.as_ref())?;

        Ok(Self {
            session,
            config,
            paths,
            needs_save: false,
        })
    }

    pub fn render(&mut self) -> RenderNode<ControlKind> {
        self.session.render()
    }

    /// Apply `path=value` assignments in order.
    pub fn apply(&mut self, assignments: &[(String, Option<Value>)]) -> anyhow::Result<()> {
        if self.config.readonly {
            bail!("form is read-only");
        }
        if self.data_format()? == Some(DataFormat::Toml) {
            if let Some((path, _)) = assignments
                .iter()
                .find(|(_, v)| v.as_ref().is_some_and(contains_null))
            {
                bail!("`{path}`: TOML cannot store null, use `{path}=` to remove the field");
            }
        }
        for (path, value) in assignments {
            let changes = self.session.set_value(path, value.clone());
            if changes.is_empty() {
                warn!("{} has no place in the data, skipped", path.yellow());
            } else {
                self.needs_save = true;
            }
        }
        Ok(())
    }

    fn data_format(&self) -> anyhow::Result<Option<DataFormat>> {
        self.paths.data.as_deref().map(DataFormat::from_path).transpose()
    }

    /// Write the data file, keeping a timestamped backup when configured.
    pub async fn save(&mut self) -> anyhow::Result<Option<PathBuf>> {
        if !self.needs_save {
            return Ok(None);
        }
        let Some(path) = self.paths.data.clone() else {
            bail!("no data file configured, nothing to save to");
        };
        let format = DataFormat::from_path(&path)?;
        if format == DataFormat::Toml && contains_null(self.session.data()) {
            bail!("{} would contain null values, which TOML cannot store", path.display());
        }
        let content = format.to_text(self.session.data())?;

        if self.config.backup && path.exists() {
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            let bk = format!(
                "bk-{:?}.{ext}",
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)?
                    .as_secs()
            );
            let backup_path = path.with_extension(bk);
            fs::copy(&path, &backup_path)
                .await
                .with_context(|| format!("Failed to back up {}", path.display()))?;
            info!("backup written to {}", backup_path.display());
        }

        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.needs_save = false;
        Ok(Some(path))
    }
}
