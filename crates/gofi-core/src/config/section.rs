//! Hierarchical dotted-key configuration tree (§4.E).

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {0:?} is not blank and has no '='")]
    ParseInvalid(String),
    #[error("unsupported model {0:?}")]
    UnsupportedModel(String),
    #[error("at least one network must be specified")]
    NoNetworks,
    #[error("at most 2 networks are supported, got {0}")]
    TooManyNetworks(usize),
}

/// A node in the config tree. Children are kept in a `BTreeMap` purely for
/// deterministic iteration in tests; the serialize ordering contract below
/// does not rely on map order — it sorts the fully flattened lines instead.
#[derive(Debug, Clone, Default)]
pub struct Section {
    value: Option<String>,
    children: BTreeMap<String, Section>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Read-only child lookup. Returns a detached empty section on a miss —
    /// chaining `.get("a").get("b").set_val(...)` on a nonexistent branch
    /// mutates a throwaway node, not the tree. Callers that need write-through
    /// creation should use [`Section::ensure`].
    pub fn get(&self, name: &str) -> Section {
        self.children.get(name).cloned().unwrap_or_default()
    }

    /// Write-through accessor: walks (creating as needed) to the named child
    /// and returns a mutable reference to it.
    pub fn ensure(&mut self, name: &str) -> &mut Section {
        self.children.entry(name.to_string()).or_default()
    }

    /// Walk (creating as needed) a dotted path and return a mutable reference
    /// to the final segment.
    pub fn ensure_path(&mut self, path: &str) -> &mut Section {
        let mut cursor = self;
        for segment in path.split('.') {
            cursor = cursor.ensure(segment);
        }
        cursor
    }

    pub fn set_val(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    /// Children whose name parses as a decimal integer, in no particular order.
    pub fn iterate_numeric(&self) -> impl Iterator<Item = (u64, &Section)> {
        self.children
            .iter()
            .filter_map(|(name, s)| name.parse::<u64>().ok().map(|n| (n, s)))
    }

    /// Structural merge of `other` into `self`: graft absent children, recurse
    /// into present ones, overwrite existing values.
    pub fn consume(&mut self, other: Section) {
        if let Some(v) = other.value {
            self.value = Some(v);
        }
        for (name, child) in other.children {
            match self.children.get_mut(&name) {
                Some(existing) => existing.consume(child),
                None => {
                    self.children.insert(name, child);
                }
            }
        }
    }

    /// Depth-first flatten into `path=value` lines, then sort all emitted
    /// lines lexicographically (the "sort-all" ordering contract — the
    /// source's alternate "numerics first" policy is non-deterministic
    /// across alphabetic siblings and must not be used).
    pub fn serialize(&self) -> String {
        let mut lines = Vec::new();
        self.flatten(String::new(), &mut lines);
        lines.sort();
        lines.join("\n")
    }

    fn flatten(&self, prefix: String, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let child_prefix = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            child.flatten(child_prefix, out);
        }
        if let Some(v) = &self.value {
            out.push(format!("{prefix}={v}"));
        }
    }

    pub fn ensure_path_val(&mut self, path: &str, value: impl Into<String>) {
        self.ensure_path(path).set_val(value);
    }
}

/// Split `input` on newlines, trim, skip blanks; every remaining line must
/// contain at least one `=`. Duplicate keys last-write-wins.
pub fn parse(input: &str) -> Result<Section, ConfigError> {
    let mut root = Section::new();
    for raw_line in input.split('\n') {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let eq = line
            .find('=')
            .ok_or_else(|| ConfigError::ParseInvalid(line.to_string()))?;
        let (path, rest) = line.split_at(eq);
        let value = &rest[1..]; // drop the '=', keep any extra '=' in the value
        root.ensure_path_val(path, value);
    }
    Ok(root)
}
