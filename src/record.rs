//! Records: schema instances with an optional prototype reference.

use crate::error::{EngineError, Result};
use crate::overrides::OverrideSet;
use crate::path::FieldPath;
use crate::schema::{self, Schema};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Host-assigned identity of a record. Two records are the same record iff
/// their ids are equal; content never matters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Standalone template records versus records embedded in a placed instance.
/// Only affects whether cycle checks run (see `EngineConfig`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Asset,
    Instance,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub schema: Arc<Schema>,
    pub kind: RecordKind,
    /// Declared prototype. May name a record that is not registered yet.
    pub prototype: Option<RecordId>,
    pub overrides: OverrideSet,
    /// Current values: local ones for overridden paths, resolved ones otherwise.
    pub values: Value,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, schema: Arc<Schema>) -> Self {
        let values = schema.default_value();
        Self {
            id: id.into(),
            schema,
            kind: RecordKind::Asset,
            prototype: None,
            overrides: OverrideSet::new(),
            values,
        }
    }

    pub fn with_prototype(mut self, prototype: impl Into<RecordId>) -> Self {
        self.prototype = Some(prototype.into());
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    /// Author `value` locally at `path`.
    pub fn with_local(mut self, path: &str, value: Value) -> Result<Self> {
        let path: FieldPath = path.parse()?;
        self.write_local(&path, value)?;
        Ok(self)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        schema::get_at(&self.values, path)
    }

    pub fn same_schema(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) || self.schema == other.schema
    }

    /// Check `value` against the field at `path`, write it, and flag the
    /// owning schema path as overridden. Nothing changes on error.
    ///
    /// Returns whether the values or the override set changed.
    pub fn write_local(&mut self, path: &FieldPath, value: Value) -> Result<bool> {
        let kind = self
            .schema
            .kind_at(path)
            .ok_or_else(|| self.unknown_field(path))?
            .clone();
        kind.check(&value, path).map_err(|detail| self.mismatch(detail))?;

        let override_path = path.schema_path();
        let Some(slot) = schema::get_at_mut(&mut self.values, path) else {
            return Err(self.unknown_field(path));
        };
        let value_changed = *slot != value;
        *slot = value;

        let flags_changed = self.overrides.set(&self.schema, &override_path, true);
        Ok(value_changed || flags_changed)
    }

    /// Copy one field's value from `source`, which must share this record's
    /// schema. All-or-nothing: the source field is checked before writing.
    pub fn copy_field_from(&mut self, source: &Record, path: &FieldPath) -> Result<bool> {
        if !self.same_schema(source) {
            return Err(self.mismatch(format!(
                "cannot copy '{}' from '{}' ({} vs {})",
                path,
                source.id,
                source.schema.name(),
                self.schema.name()
            )));
        }
        let kind = self
            .schema
            .kind_at(path)
            .ok_or_else(|| self.unknown_field(path))?
            .clone();
        let src = source.get(path).ok_or_else(|| self.unknown_field(path))?;
        let record = self.id.clone();
        let Some(dst) = schema::get_at_mut(&mut self.values, path) else {
            return Err(self.unknown_field(path));
        };
        schema::copy_value(&kind, src, dst)
            .map_err(|detail| EngineError::SchemaMismatch { record, detail })
    }

    pub(crate) fn unknown_field(&self, path: &FieldPath) -> EngineError {
        EngineError::UnknownField {
            record: self.id.clone(),
            path: path.clone(),
        }
    }

    pub(crate) fn mismatch(&self, detail: String) -> EngineError {
        EngineError::SchemaMismatch {
            record: self.id.clone(),
            detail,
        }
    }
}
