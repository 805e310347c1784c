//! Per-record set of locally authored field paths.
//!
//! Only overridden paths are stored; any path not in the set inherits. The set
//! keeps one invariant: an overridden path's ancestors are overridden too.

use crate::path::FieldPath;
use crate::schema::Schema;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideSet {
    paths: BTreeSet<FieldPath>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_overridden(&self, path: &FieldPath) -> bool {
        self.paths.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPath> {
        self.paths.iter()
    }

    /// Flag or clear `path`.
    ///
    /// Flagging also flags every ancestor, and every schema path below `path`
    /// (a nested record becomes local as a whole). Clearing removes `path` and
    /// everything below it; ancestors stay flagged.
    ///
    /// Returns whether the set changed. The caller is responsible for
    /// re-resolving the record afterwards.
    pub fn set(&mut self, schema: &Schema, path: &FieldPath, overridden: bool) -> bool {
        if overridden {
            let mut changed = false;
            for ancestor in path.ancestors() {
                changed |= self.paths.insert(ancestor);
            }
            for p in schema.field_paths() {
                if p.starts_with(path) {
                    changed |= self.paths.insert(p);
                }
            }
            changed
        } else {
            let before = self.paths.len();
            self.paths.retain(|p| !p.starts_with(path));
            before != self.paths.len()
        }
    }

    /// Drop entries that no longer name a path of `schema`, and restore the
    /// ancestor invariant. Returns the dropped entries.
    pub fn prune(&mut self, schema: &Schema) -> Vec<FieldPath> {
        let (kept, dropped): (BTreeSet<_>, BTreeSet<_>) = std::mem::take(&mut self.paths)
            .into_iter()
            .partition(|p| schema.is_schema_path(p));
        self.paths = kept;
        let ancestors: Vec<FieldPath> = self.paths.iter().flat_map(|p| p.ancestors()).collect();
        self.paths.extend(ancestors);
        dropped.into_iter().collect()
    }
}

impl FromIterator<FieldPath> for OverrideSet {
    fn from_iter<I: IntoIterator<Item = FieldPath>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}
