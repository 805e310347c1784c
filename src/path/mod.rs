//! Field addresses inside a record.
//!
//! Example: `items[2].name`  =>  [Field("items"), Index(2), Field("name")]
//!
//! Segments derive ordering so paths can key BTreeSet/Map. Ordering is only
//! used for storage; canonical field order comes from the schema.

pub mod parse;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// The empty path, addressing the whole record.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Field(name.to_string()));
        Self(segments)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(i));
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Ancestors from the outermost down, excluding `self` and the root.
    pub fn ancestors(&self) -> Vec<Self> {
        (1..self.0.len()).map(|n| Self(self.0[..n].to_vec())).collect()
    }

    /// True when `prefix` is `self` or one of its ancestors.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Cut the path at its first array index, yielding the schema-level address
    /// that owns it (`items[2].name` -> `items`).
    pub fn schema_path(&self) -> Self {
        let end = self
            .0
            .iter()
            .position(|s| matches!(s, Segment::Index(_)))
            .unwrap_or(self.0.len());
        Self(self.0[..end].to_vec())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{}", name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse_path(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse::parse_path(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}
