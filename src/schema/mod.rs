//! Schema descriptors: the shape of a record's field tree.
//!
//! All core algorithms work against this descriptor rather than against host
//! types. A host describes each record type once and attaches the `Arc<Schema>`
//! to every record of that type.

pub mod copy;

pub use copy::{copy_value, get_at, get_at_mut};

use crate::path::{FieldPath, Segment};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    /// Opaque handle to a host object; `null` when unset.
    Reference,
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            "ref" | "reference" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Reference => "ref",
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::from(0i64),
            Self::Float => Value::from(0.0f64),
            Self::String => Value::String(String::new()),
            Self::Reference => Value::Null,
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Reference => value.is_null() || value.is_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Record(Arc<Schema>),
    Array(Box<FieldKind>),
}

impl FieldKind {
    pub fn default_value(&self) -> Value {
        match self {
            Self::Scalar(s) => s.default_value(),
            Self::Record(schema) => schema.default_value(),
            Self::Array(_) => Value::Array(Vec::new()),
        }
    }

    /// Short human form used in messages: `int`, `Vec2`, `[string]`.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(s) => s.name().to_string(),
            Self::Record(schema) => schema.name().to_string(),
            Self::Array(elem) => format!("[{}]", elem.describe()),
        }
    }

    /// Check that `value` has exactly this shape. The error names the first
    /// offending address relative to `at`.
    pub fn check(&self, value: &Value, at: &FieldPath) -> Result<(), String> {
        match self {
            Self::Scalar(s) => {
                if s.accepts(value) {
                    Ok(())
                } else {
                    Err(format!("'{}' expects {}, got {}", at, s.name(), value))
                }
            }
            Self::Record(schema) => schema.check_at(value, at),
            Self::Array(elem) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("'{}' expects an array, got {}", at, value))?;
                for (i, item) in items.iter().enumerate() {
                    elem.check(item, &at.index(i))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// A named, ordered set of typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The empty instance: every field at its default.
    pub fn default_value(&self) -> Value {
        let mut map = Map::new();
        for f in &self.fields {
            map.insert(f.name.clone(), f.kind.default_value());
        }
        Value::Object(map)
    }

    /// Every address reachable from the default instance, in declaration
    /// order, parents before their children. Arrays are one address each since
    /// the default instance holds no elements.
    pub fn field_paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        collect_schema_paths(self, &FieldPath::root(), &mut out);
        out
    }

    /// Like [`Schema::field_paths`], but also walks the array elements present
    /// in `instance`.
    pub fn enumerate_fields(&self, instance: &Value) -> Vec<FieldPath> {
        let mut out = Vec::new();
        collect_instance_paths(self, instance, &FieldPath::root(), &mut out);
        out
    }

    /// Kind of the field at `path`. Index segments step into array elements.
    pub fn kind_at(&self, path: &FieldPath) -> Option<&FieldKind> {
        let mut segments = path.segments().iter();
        let first = match segments.next()? {
            Segment::Field(name) => name,
            Segment::Index(_) => return None,
        };
        let mut kind = &self.field(first)?.kind;
        for segment in segments {
            kind = match (segment, kind) {
                (Segment::Field(name), FieldKind::Record(schema)) => &schema.field(name)?.kind,
                (Segment::Index(_), FieldKind::Array(elem)) => elem,
                _ => return None,
            };
        }
        Some(kind)
    }

    /// True for addresses that can carry an override flag.
    pub fn is_schema_path(&self, path: &FieldPath) -> bool {
        path.schema_path() == *path && self.kind_at(path).is_some()
    }

    /// Check a whole record value against this schema.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        self.check_at(value, &FieldPath::root())
    }

    fn check_at(&self, value: &Value, at: &FieldPath) -> Result<(), String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("'{}' expects a {} record, got {}", at, self.name, value))?;
        for f in &self.fields {
            let field_at = at.child(&f.name);
            let v = obj
                .get(&f.name)
                .ok_or_else(|| format!("'{}' is missing", field_at))?;
            f.kind.check(v, &field_at)?;
        }
        if let Some(extra) = obj.keys().find(|k| self.field(k).is_none()) {
            return Err(format!(
                "'{}' is not a field of {}",
                at.child(extra),
                self.name
            ));
        }
        Ok(())
    }

    /// Fill absent fields with defaults (recursively through nested records
    /// and array elements), then check the result.
    pub fn complete(&self, value: Value) -> Result<Value, String> {
        let mut value = value;
        fill_defaults(self, &mut value);
        self.check(&value)?;
        Ok(value)
    }
}

fn collect_schema_paths(schema: &Schema, prefix: &FieldPath, out: &mut Vec<FieldPath>) {
    for f in &schema.fields {
        let path = prefix.child(&f.name);
        out.push(path.clone());
        if let FieldKind::Record(nested) = &f.kind {
            collect_schema_paths(nested, &path, out);
        }
    }
}

fn collect_instance_paths(
    schema: &Schema,
    instance: &Value,
    prefix: &FieldPath,
    out: &mut Vec<FieldPath>,
) {
    for f in &schema.fields {
        let path = prefix.child(&f.name);
        let value = instance.get(&f.name);
        out.push(path.clone());
        collect_kind_paths(&f.kind, value, &path, out);
    }
}

fn collect_kind_paths(
    kind: &FieldKind,
    value: Option<&Value>,
    path: &FieldPath,
    out: &mut Vec<FieldPath>,
) {
    match kind {
        FieldKind::Scalar(_) => {}
        FieldKind::Record(nested) => {
            let fallback = Value::Null;
            collect_instance_paths(nested, value.unwrap_or(&fallback), path, out);
        }
        FieldKind::Array(elem) => {
            let items = value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
            for (i, item) in items.iter().enumerate() {
                let item_path = path.index(i);
                out.push(item_path.clone());
                collect_kind_paths(elem, Some(item), &item_path, out);
            }
        }
    }
}

fn fill_defaults(schema: &Schema, value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    for f in &schema.fields {
        let slot = obj
            .entry(f.name.clone())
            .or_insert_with(|| f.kind.default_value());
        fill_kind_defaults(&f.kind, slot);
    }
}

fn fill_kind_defaults(kind: &FieldKind, value: &mut Value) {
    match kind {
        FieldKind::Scalar(_) => {}
        FieldKind::Record(nested) => fill_defaults(nested, value),
        FieldKind::Array(elem) => {
            if let Some(items) = value.as_array_mut() {
                for item in items {
                    fill_kind_defaults(elem, item);
                }
            }
        }
    }
}
