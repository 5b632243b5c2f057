use std::fmt;

use crate::data::schema::SchemaError;

/// Schema keywords that never name a data location when they appear in a
/// scope.
const COMBINATORS: [&str; 3] = ["allOf", "anyOf", "oneOf"];

/// Decode a single JSON Pointer segment (`~1` → `/`, `~0` → `~`).
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode a single JSON Pointer segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A JSON-Pointer-style scope such as `#/properties/foo`.
///
/// Scopes starting with `#` are relative to the path of the element they
/// are evaluated for. Scopes starting with `/` are absolute and always
/// start from the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    raw: String,
    segments: Vec<String>,
    absolute: bool,
}

impl Scope {
    /// Parse a scope string.
    ///
    /// Accepted forms are `#`, `#/a/b` and `/a/b`. Segments are unescaped.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let (rest, absolute) = if let Some(rest) = raw.strip_prefix('#') {
            (rest, false)
        } else if raw.starts_with('/') {
            (raw, true)
        } else {
            return Err(SchemaError::InvalidScope(raw.to_string()));
        };

        let segments = if rest.is_empty() {
            Vec::new()
        } else if let Some(rest) = rest.strip_prefix('/') {
            rest.split('/').map(unescape_segment).collect()
        } else {
            return Err(SchemaError::InvalidScope(raw.to_string()));
        };

        Ok(Self {
            raw: raw.to_string(),
            segments,
            absolute,
        })
    }

    /// The scope exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Unescaped pointer segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the scope ignores the element path.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// The JSON Pointer (without `#`) addressing the schema location.
    pub fn schema_pointer(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("/{}", escape_segment(s)))
            .collect()
    }

    /// Data path segments addressed by this scope.
    ///
    /// The segment following `properties` is a data key, `items` addresses
    /// the array element itself, and `allOf/anyOf/oneOf/<n>` as well as
    /// `then`/`else` are skipped. Any other segment is taken as a data key,
    /// so `#/foo` and `#/properties/foo` both address `foo`.
    pub fn data_segments(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut iter = self.segments.iter().peekable();
        while let Some(seg) = iter.next() {
            match seg.as_str() {
                "properties" => {
                    if let Some(key) = iter.next() {
                        out.push(key.clone());
                    }
                }
                "items" | "then" | "else" => {}
                s if COMBINATORS.contains(&s) => {
                    if iter.peek().is_some_and(|n| n.parse::<usize>().is_ok()) {
                        iter.next();
                    }
                }
                _ => out.push(seg.clone()),
            }
        }
        out
    }

    /// Resolve this scope against the path of the element it belongs to.
    pub fn to_data_path(&self, base: &DataPath) -> DataPath {
        let segments = self.data_segments();
        if self.absolute {
            DataPath::from_segments(segments)
        } else {
            base.join(segments)
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A slash-delimited location inside the form data, e.g. `address/street`.
///
/// The empty path addresses the data root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataPath {
    segments: Vec<String>,
}

impl DataPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-delimited path. Empty segments are ignored.
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s
                .split('/')
                .filter(|s| !s.is_empty())
                .map(unescape_segment)
                .collect(),
        }
    }

    /// Build a path from already decoded segments.
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Decoded segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Append a single segment.
    pub fn push(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.segments.push(segment.into());
        new
    }

    /// Append several segments.
    pub fn join(&self, segments: impl IntoIterator<Item = String>) -> Self {
        let mut new = self.clone();
        new.segments.extend(segments);
        new
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &DataPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// Whether a change at one path can affect a value read at the other.
    pub fn overlaps(&self, other: &DataPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// The scope that addresses this path through `properties` keywords.
    /// JSON Pointer form: `/a/b`, or `""` for the root.
    pub fn to_pointer(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("/{}", escape_segment(s)))
            .collect()
    }

    pub fn to_scope(&self) -> String {
        let mut s = String::from("#");
        for seg in &self.segments {
            s.push_str("/properties/");
            s.push_str(&escape_segment(seg));
        }
        s
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded: Vec<String> = self.segments.iter().map(|s| escape_segment(s)).collect();
        f.write_str(&encoded.join("/"))
    }
}

impl From<&str> for DataPath {
    fn from(s: &str) -> Self {
        DataPath::parse(s)
    }
}
