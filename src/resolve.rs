//! Per-record override resolution.
//!
//! A record is resolved against the *current* values of its prototype, so a
//! chain must be resolved parent before child. `Session` guarantees that order.

use crate::error::{EngineError, Result};
use crate::overrides::OverrideSet;
use crate::path::FieldPath;
use crate::record::Record;
use crate::schema::{self, Schema};

use serde_json::Value;

/// Recompute every inherited field of `record`.
///
/// `prototype` holds the resolved values of the record's linked prototype, or
/// `None` for a root or a record still waiting for its prototype; inherited
/// fields then fall back to their schema defaults. Overridden leaves and arrays
/// keep their local value; an overridden nested record lets each of its
/// fields decide by its own flag.
///
/// Returns whether any value changed.
pub fn resolve(record: &mut Record, prototype: Option<&Value>) -> Result<bool> {
    let Record {
        id,
        schema,
        overrides,
        values,
        ..
    } = record;

    if !values.is_object() {
        *values = schema.default_value();
    }

    resolve_fields(schema, &FieldPath::root(), overrides, values, prototype).map_err(|detail| {
        EngineError::SchemaMismatch {
            record: id.clone(),
            detail,
        }
    })
}

fn resolve_fields(
    schema: &Schema,
    prefix: &FieldPath,
    overrides: &OverrideSet,
    values: &mut Value,
    prototype: Option<&Value>,
) -> Result<bool, String> {
    let mut changed = false;
    let Some(obj) = values.as_object_mut() else {
        return Err(format!("'{}' is not a {} record", prefix, schema.name()));
    };

    for f in schema.fields() {
        let path = prefix.child(&f.name);
        let slot = obj
            .entry(f.name.clone())
            .or_insert_with(|| f.kind.default_value());
        let inherited = prototype.and_then(|p| p.get(&f.name));

        if overrides.is_overridden(&path) {
            if let schema::FieldKind::Record(nested) = &f.kind {
                changed |= resolve_fields(nested, &path, overrides, slot, inherited)?;
            }
            continue;
        }

        match inherited {
            Some(src) => {
                changed |= schema::copy_value(&f.kind, src, slot)
                    .map_err(|e| format!("inheriting '{}': {}", path, e))?;
            }
            None => {
                let default = f.kind.default_value();
                if *slot != default {
                    *slot = default;
                    changed = true;
                }
            }
        }
    }

    Ok(changed)
}
