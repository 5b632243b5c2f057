//! Asynchronous loading of non-local `$ref` documents.
//!
//! Rendering only follows local references. [`bundle_refs`] runs before a
//! schema is handed to a session: every external document is fetched once,
//! stored under the root's `$defs`, and all references to it are rewritten
//! to local pointers.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    future::Future,
    path::PathBuf,
};

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read `{uri}`: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch `{uri}`: {message}")]
    Http { uri: String, message: String },
    #[error("`{uri}` is not valid JSON: {source}")]
    Parse {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no fetcher for `{0}`")]
    Unsupported(String),
    #[error("schema root must be an object to hold bundled definitions")]
    RootNotObject,
}

/// Fetches a JSON document by URI.
pub trait RefFetcher: Sync {
    fn fetch(&self, uri: &str) -> impl Future<Output = Result<Value, LoadError>> + Send;
}

/// Reads documents from the filesystem, relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    base: PathBuf,
}

impl FileFetcher {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl RefFetcher for FileFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, LoadError> {
        let relative = uri.strip_prefix("file://").unwrap_or(uri);
        let path = self.base.join(relative);
        debug!("loading referenced schema {}", path.display());
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LoadError::Io {
                uri: uri.to_string(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            uri: uri.to_string(),
            source,
        })
    }
}

/// Fetches `http(s)` documents.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl HttpFetcher {
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("schemaform/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoadError::Http {
                uri: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
impl RefFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, LoadError> {
        if !is_http(uri) {
            return Err(LoadError::Unsupported(uri.to_string()));
        }
        let http_err = |e: reqwest::Error| LoadError::Http {
            uri: uri.to_string(),
            message: e.to_string(),
        };
        debug!("fetching referenced schema {uri}");
        let response = self.client.get(uri).send().await.map_err(http_err)?;
        if !response.status().is_success() {
            return Err(LoadError::Http {
                uri: uri.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        let body = response.text().await.map_err(http_err)?;
        serde_json::from_str(&body).map_err(|source| LoadError::Parse {
            uri: uri.to_string(),
            source,
        })
    }
}

fn is_http(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

/// Routes `http(s)` URIs to [`HttpFetcher`] and everything else to
/// [`FileFetcher`].
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    files: FileFetcher,
    #[cfg(feature = "remote")]
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, LoadError> {
        Ok(Self {
            files: FileFetcher::new(base),
            #[cfg(feature = "remote")]
            http: HttpFetcher::new()?,
        })
    }
}

impl RefFetcher for DefaultFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, LoadError> {
        if is_http(uri) {
            #[cfg(feature = "remote")]
            return self.http.fetch(uri).await;
            #[cfg(not(feature = "remote"))]
            return Err(LoadError::Unsupported(uri.to_string()));
        }
        self.files.fetch(uri).await
    }
}

/// Resolve `reference` against the URI of the document it appears in.
fn join_uri(base: &str, reference: &str) -> String {
    if reference.contains("://") || reference.starts_with('/') || base.is_empty() {
        return reference.to_string();
    }
    let dir = match base.rfind('/') {
        Some(i) => &base[..=i],
        None => "",
    };
    let mut parts: Vec<&str> = dir.trim_end_matches('/').split('/').filter(|p| !p.is_empty()).collect();
    let scheme_prefix = if let Some(i) = dir.find("://") {
        // keep `scheme://host` intact
        parts = dir[i + 3..].trim_end_matches('/').split('/').collect();
        &dir[..i + 3]
    } else if dir.starts_with('/') {
        "/"
    } else {
        ""
    };
    for seg in reference.split('/') {
        match seg {
            "." | "" => {}
            ".." if parts.len() > 1 || (scheme_prefix.is_empty() && !parts.is_empty()) => {
                parts.pop();
            }
            _ => parts.push(seg),
        }
    }
    format!("{scheme_prefix}{}", parts.join("/"))
}

/// Definition key derived from a URI: its file stem, made pointer-safe.
fn key_stem(uri: &str) -> String {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    let stem = name.split('.').next().unwrap_or(name);
    let key: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if key.is_empty() { "external".to_string() } else { key }
}

#[derive(Default)]
struct Bundler {
    keys: HashMap<String, String>,
    taken: HashSet<String>,
    pending: VecDeque<String>,
}

impl Bundler {
    fn key_for(&mut self, uri: &str) -> String {
        if let Some(key) = self.keys.get(uri) {
            return key.clone();
        }
        let stem = key_stem(uri);
        let mut key = stem.clone();
        let mut n = 1;
        while self.taken.contains(&key) {
            n += 1;
            key = format!("{stem}_{n}");
        }
        self.taken.insert(key.clone());
        self.keys.insert(uri.to_string(), key.clone());
        self.pending.push_back(uri.to_string());
        key
    }

    /// Rewrite every `$ref` below `value`. `base` is the URI of the document
    /// being rewritten and `doc_key` its `$defs` key (`None` for the root).
    fn rewrite(&mut self, value: &mut Value, base: &str, doc_key: Option<&str>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get_mut("$ref") {
                    if let Some(new) = self.rewrite_ref(reference, base, doc_key) {
                        *reference = new;
                    }
                }
                for (key, child) in map.iter_mut() {
                    if key != "$ref" {
                        self.rewrite(child, base, doc_key);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rewrite(item, base, doc_key);
                }
            }
            _ => {}
        }
    }

    fn rewrite_ref(&mut self, reference: &str, base: &str, doc_key: Option<&str>) -> Option<String> {
        let (uri, fragment) = match reference.split_once('#') {
            Some((uri, fragment)) => (uri, fragment),
            None => (reference, ""),
        };
        if uri.is_empty() {
            // Local to a bundled document: rebase under its definition.
            return doc_key.map(|k| format!("#/$defs/{k}{fragment}"));
        }
        let key = self.key_for(&join_uri(base, uri));
        Some(format!("#/$defs/{key}{fragment}"))
    }
}

/// Inline every non-local `$ref` target of `schema`.
///
/// Each distinct URI is fetched once, stored as `$defs/<key>` of the root,
/// and references are rewritten to `#/$defs/<key>` plus their original
/// fragment. References inside fetched documents are resolved against the
/// document's own URI and bundled the same way.
pub async fn bundle_refs<F: RefFetcher>(mut schema: Value, fetcher: &F) -> Result<Value, LoadError> {
    let mut bundler = Bundler::default();
    if let Some(defs) = schema.get("$defs").and_then(Value::as_object) {
        bundler.taken.extend(defs.keys().cloned());
    }
    bundler.rewrite(&mut schema, "", None);

    let mut bundled = Vec::new();
    while let Some(uri) = bundler.pending.pop_front() {
        let Some(key) = bundler.keys.get(&uri).cloned() else {
            continue;
        };
        let mut doc = fetcher.fetch(&uri).await?;
        bundler.rewrite(&mut doc, &uri, Some(key.as_str()));
        bundled.push((key, doc));
    }

    if bundled.is_empty() {
        return Ok(schema);
    }
    debug!("bundled {} external schema document(s)", bundled.len());

    let root = schema.as_object_mut().ok_or(LoadError::RootNotObject)?;
    let defs = root
        .entry("$defs")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(defs) = defs else {
        return Err(LoadError::RootNotObject);
    };
    for (key, doc) in bundled {
        defs.insert(key, doc);
    }
    Ok(schema)
}
