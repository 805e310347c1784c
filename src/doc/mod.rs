//! Record document (records.json): schemas plus records, as a host would
//! persist them.
//!
//! JSON shape:
//! {
//!   "config": { "instance_cycle_check": true },   // optional
//!   "schemas": [
//!     { "name": "Vec2", "fields": [ { "name": "x", "type": "float" } ] },
//!     { "name": "Enemy", "fields": [
//!         { "name": "pos",  "type": "Vec2" },                  // nested record
//!         { "name": "tags", "type": { "array": "string" } }     // array
//!     ] }
//!   ],
//!   "records": [
//!     {
//!       "id": "grunt",
//!       "schema": "Enemy",
//!       "kind": "asset",              // or "instance"; default asset
//!       "prototype": "base",          // optional
//!       "overridden": ["pos.x"],      // optional, see below
//!       "values": { "pos": { "x": 3 } }
//!     }
//!   ]
//! }
//!
//! When `overridden` is omitted, every top-level key present in `values` is
//! treated as overridden. Missing values take schema defaults.

mod schemas;

use crate::config::EngineConfig;
use crate::overrides::OverrideSet;
use crate::path::FieldPath;
use crate::record::{Record, RecordId, RecordKind};
use crate::schema::Schema;

use anyhow::{Context, bail};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub config: EngineConfig,

    #[serde(default)]
    pub schemas: Vec<RawSchema>,

    #[serde(default)]
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSchema {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: RawType,
}

/// Field type references in records.json.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawType {
    // "int", "float", ... or the name of another schema
    Named(String),
    // { "array": <type> }
    Array { array: Box<RawType> },
    // Explicit form: { "record": "Vec2" }
    Record { record: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: String,

    pub schema: String,

    #[serde(default)]
    pub kind: RecordKind,

    #[serde(default)]
    pub prototype: Option<String>,

    #[serde(default)]
    pub overridden: Option<Vec<String>>,

    #[serde(default)]
    pub values: Option<Value>,
}

/// Validated document ready to feed `Session::full_rebuild`.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub config: EngineConfig,
    pub schemas: BTreeMap<String, Arc<Schema>>,
    pub records: Vec<Record>,
}

impl Document {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("parse records document")
    }

    /// Build schemas, then records.
    ///
    /// Phases:
    /// 1) Schemas: unique names, known type references, no recursive nesting.
    /// 2) Records: unique ids, known schemas, parseable override paths,
    ///    values that fit the schema.
    ///
    /// Prototype links are not checked here; unknown prototypes are legal
    /// (the record waits) and cycles are reported by the rebuild.
    pub fn validate_and_build(&self) -> anyhow::Result<Loaded> {
        let schemas = schemas::build_schemas(&self.schemas)?;

        let mut seen = BTreeSet::new();
        let mut records = Vec::with_capacity(self.records.len());
        for raw in &self.records {
            if !seen.insert(raw.id.as_str()) {
                bail!("duplicate record id in records document: {}", raw.id);
            }
            let record = build_record(raw, &schemas)
                .with_context(|| format!("record '{}'", raw.id))?;
            records.push(record);
        }

        Ok(Loaded {
            config: self.config.clone(),
            schemas,
            records,
        })
    }
}

fn build_record(
    raw: &RawRecord,
    schemas: &BTreeMap<String, Arc<Schema>>,
) -> anyhow::Result<Record> {
    let Some(schema) = schemas.get(&raw.schema) else {
        bail!("unknown schema '{}'", raw.schema);
    };

    let values = raw.values.clone().unwrap_or_else(|| Value::Object(Default::default()));
    let local_keys: Vec<String> = values
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    let values = schema.complete(values).map_err(|detail| {
        anyhow::anyhow!("values do not fit schema {}: {}", schema.name(), detail)
    })?;

    let mut overrides = match &raw.overridden {
        // Exactly the listed paths; children of a listed record keep their
        // own flags.
        Some(paths) => {
            let mut parsed = Vec::with_capacity(paths.len());
            for p in paths {
                let path: FieldPath = p
                    .parse()
                    .with_context(|| format!("overridden path {:?}", p))?;
                if !schema.is_schema_path(&path) {
                    bail!("overridden path '{}' is not a field of {}", path, schema.name());
                }
                parsed.push(path);
            }
            parsed.into_iter().collect::<OverrideSet>()
        }
        None => {
            let mut set = OverrideSet::new();
            for key in &local_keys {
                set.set(schema, &FieldPath::root().child(key), true);
            }
            set
        }
    };
    // Restores ancestor flags.
    overrides.prune(schema);

    Ok(Record {
        id: RecordId::from(raw.id.as_str()),
        schema: schema.clone(),
        kind: raw.kind,
        prototype: raw.prototype.as_deref().map(RecordId::from),
        overrides,
        values,
    })
}
