//! Sub-schema resolution for scopes.
//!
//! A scope such as `#/properties/user/properties/email` is walked segment by
//! segment through the schema. Before every step the current node's `$ref`
//! chain is followed inside the root schema. When a segment is missing, the
//! alternatives of `allOf`, `anyOf` and `oneOf` are searched in order.
//!
//! Reference cycles (`A → B → A` without consuming a segment) fail the
//! resolution instead of recursing. Every failure is reported as `None`.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::data::path::{Scope, escape_segment};

const COMBINATORS: [&str; 3] = ["allOf", "anyOf", "oneOf"];

/// Resolved node plus its canonical JSON Pointer inside the root, when known.
type Located<'a> = (&'a Value, Option<String>);

/// Turn a local reference (`#`, `#/definitions/x`) into a JSON Pointer.
fn local_pointer(reference: &str) -> Option<&str> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() || pointer.starts_with('/') {
        Some(pointer)
    } else {
        None
    }
}

/// Follow the `$ref` chain of `node` until a node without `$ref` is found.
fn deref<'a>(
    root: &'a Value,
    mut node: &'a Value,
    mut pointer: Option<String>,
    visited: &mut HashSet<String>,
) -> Option<Located<'a>> {
    while let Some(target) = node.get("$ref").and_then(Value::as_str) {
        if !visited.insert(target.to_string()) {
            debug!("reference cycle detected at `{target}`");
            return None;
        }
        let Some(local) = local_pointer(target) else {
            debug!("unresolved non-local reference `{target}`");
            return None;
        };
        node = match root.pointer(local) {
            Some(next) => next,
            None => {
                debug!("reference target `{target}` does not exist");
                return None;
            }
        };
        pointer = Some(local.to_string());
    }
    Some((node, pointer))
}

fn child<'a>(node: &'a Value, seg: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => items.get(seg.parse::<usize>().ok()?),
        _ => None,
    }
}

fn walk<'a>(
    root: &'a Value,
    node: &'a Value,
    pointer: Option<String>,
    segments: &[String],
    visited: &mut HashSet<String>,
) -> Option<Located<'a>> {
    let (node, pointer) = deref(root, node, pointer, visited)?;
    let Some((first, rest)) = segments.split_first() else {
        return Some((node, pointer));
    };

    if let Some(next) = child(node, first) {
        let next_pointer = pointer
            .as_ref()
            .map(|p| format!("{p}/{}", escape_segment(first)));
        // A consumed segment starts a fresh reference chain.
        if let Some(found) = walk(root, next, next_pointer, rest, &mut HashSet::new()) {
            return Some(found);
        }
    }

    for key in COMBINATORS {
        let Some(alternatives) = node.get(key).and_then(Value::as_array) else {
            continue;
        };
        for (i, alt) in alternatives.iter().enumerate() {
            let alt_pointer = pointer.as_ref().map(|p| format!("{p}/{key}/{i}"));
            if let Some(found) = walk(root, alt, alt_pointer, segments, &mut visited.clone()) {
                return Some(found);
            }
        }
    }

    None
}

fn resolve_located<'a>(schema: &'a Value, scope: &str, root: &'a Value) -> Option<Located<'a>> {
    let scope = match Scope::parse(scope) {
        Ok(s) => s,
        Err(e) => {
            debug!("{e}");
            return None;
        }
    };
    let pointer = std::ptr::eq(schema, root).then(String::new);
    walk(root, schema, pointer, scope.segments(), &mut HashSet::new())
}

/// Locate the sub-schema addressed by `scope`.
///
/// `schema` is the node the walk starts from and `root` is where `$ref`
/// targets are looked up; both are usually the same document.
pub fn resolve_schema<'a>(schema: &'a Value, scope: &str, root: &'a Value) -> Option<&'a Value> {
    resolve_located(schema, scope, root).map(|(node, _)| node)
}

/// Whether the property addressed by a `#/.../properties/<name>` scope is
/// listed in its parent object's `required`.
pub fn is_required(root: &Value, scope: &str) -> bool {
    let Ok(parsed) = Scope::parse(scope) else {
        return false;
    };
    let segments = parsed.segments();
    let n = segments.len();
    if n < 2 || segments[n - 2] != "properties" {
        return false;
    }
    let parent_scope: String = std::iter::once("#".to_string())
        .chain(segments[..n - 2].iter().map(|s| escape_segment(s)))
        .collect::<Vec<_>>()
        .join("/");
    resolve_schema(root, &parent_scope, root)
        .and_then(|parent| parent.get("required"))
        .and_then(Value::as_array)
        .is_some_and(|req| req.iter().any(|r| r.as_str() == Some(segments[n - 1].as_str())))
}

/// A loaded root schema with memoized scope resolution.
///
/// The cache maps a scope string to the canonical JSON Pointer of the node
/// it resolves to, so repeated lookups skip the `$ref` walk. The schema is
/// never mutated, so cache entries stay valid for the index's lifetime.
#[derive(Debug)]
pub struct SchemaIndex {
    root: Arc<Value>,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl SchemaIndex {
    /// Index a schema.
    pub fn new(root: impl Into<Arc<Value>>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The root schema.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Shared handle to the root schema.
    pub fn root_arc(&self) -> Arc<Value> {
        self.root.clone()
    }

    /// Resolve `scope` against the root schema.
    pub fn resolve(&self, scope: &str) -> Option<&Value> {
        let pointer = self.resolve_pointer(scope)?;
        self.root.pointer(&pointer)
    }

    /// Canonical JSON Pointer of the node `scope` resolves to.
    pub fn resolve_pointer(&self, scope: &str) -> Option<String> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(scope) {
            return hit.clone();
        }
        let root: &Value = &self.root;
        let pointer = resolve_located(root, scope, root).and_then(|(_, p)| p);
        cache.insert(scope.to_string(), pointer.clone());
        pointer
    }

    /// Number of memoized scopes.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Clone for SchemaIndex {
    fn clone(&self) -> Self {
        Self::new(self.root.clone())
    }
}
