//! Get-if-present access to the hierarchical source tree
//!
//! The bootstrap intent arrives as a loosely-typed, deeply nested tree in
//! which almost every block is optional. All reads go through a single
//! abstraction with get-if-present semantics: an absent path is not an
//! error, it simply leaves the corresponding target field at its default.
//!
//! Paths are dotted, with numeric segments indexing into lists, mirroring
//! how nested optional blocks are addressed in the intent format
//! (e.g. `api.0.internal`, `runtime.0.extra_args.0.kubelet`).

use std::collections::BTreeMap;

use serde_json::Value;

/// Read-only, get-if-present view of a hierarchical configuration tree
///
/// Implementations expose typed accessors over dotted/indexed paths. A path
/// that is absent, or whose value does not have the requested shape, reads
/// as `None`. The tree is caller-owned and never mutated by the engine.
pub trait ConfigSource {
    /// Get a string value if present at the given path
    fn get_str(&self, path: &str) -> Option<String>;

    /// Get a list of strings if present at the given path
    fn get_str_list(&self, path: &str) -> Option<Vec<String>>;

    /// Get a string-to-string mapping if present at the given path
    fn get_str_map(&self, path: &str) -> Option<BTreeMap<String, String>>;

    /// Check whether any value is present at the given path
    fn contains(&self, path: &str) -> bool;
}

/// A [`ConfigSource`] backed by a JSON-like tree
///
/// Object fields are addressed by name, array elements by numeric segment.
/// Scalars other than strings read as absent from the typed accessors; the
/// engine only consumes strings, string lists, and string maps.
#[derive(Clone, Debug)]
pub struct JsonSource {
    root: Value,
}

impl JsonSource {
    /// Create a source over the given JSON tree
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Create an empty source (every lookup is absent)
    pub fn empty() -> Self {
        Self {
            root: Value::Null,
        }
    }

    /// Navigate to the value at a dotted/indexed path, if present
    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl ConfigSource for JsonSource {
    fn get_str(&self, path: &str) -> Option<String> {
        match self.lookup(path)? {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn get_str_list(&self, path: &str) -> Option<Vec<String>> {
        match self.lookup(path)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn get_str_map(&self, path: &str) -> Option<BTreeMap<String, String>> {
        match self.lookup(path)? {
            Value::Object(map) => Some(
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn contains(&self, path: &str) -> bool {
        !matches!(self.lookup(path), None | Some(Value::Null))
    }
}
