//! Path access and the recursive field copy.

use crate::path::{FieldPath, Segment};
use crate::schema::FieldKind;

use serde_json::Value;

pub fn get_at<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut cur = value;
    for segment in path.segments() {
        cur = match segment {
            Segment::Field(name) => cur.as_object()?.get(name)?,
            Segment::Index(i) => cur.as_array()?.get(*i)?,
        };
    }
    Some(cur)
}

pub fn get_at_mut<'a>(value: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    let mut cur = value;
    for segment in path.segments() {
        cur = match segment {
            Segment::Field(name) => cur.as_object_mut()?.get_mut(name)?,
            Segment::Index(i) => cur.as_array_mut()?.get_mut(*i)?,
        };
    }
    Some(cur)
}

/// Copy `source` into `dest` as a value of `kind`.
///
/// The whole source subtree is checked before anything is written, so a
/// mismatch leaves `dest` untouched. Arrays are resized to the source length
/// and copied element by element; records are copied field by field.
///
/// Returns whether `dest` changed.
pub fn copy_value(kind: &FieldKind, source: &Value, dest: &mut Value) -> Result<bool, String> {
    kind.check(source, &FieldPath::root())?;
    Ok(copy_into(kind, source, dest))
}

fn copy_into(kind: &FieldKind, source: &Value, dest: &mut Value) -> bool {
    match kind {
        FieldKind::Scalar(_) => {
            if dest == source {
                return false;
            }
            *dest = source.clone();
            true
        }
        FieldKind::Record(schema) => {
            let mut changed = false;
            if !dest.is_object() {
                *dest = schema.default_value();
                changed = true;
            }
            let (Some(src), Some(dst)) = (source.as_object(), dest.as_object_mut()) else {
                return changed;
            };
            dst.retain(|k, _| schema.field(k).is_some());
            for f in schema.fields() {
                let Some(src_field) = src.get(&f.name) else {
                    continue;
                };
                let slot = dst.entry(f.name.clone()).or_insert_with(|| {
                    changed = true;
                    f.kind.default_value()
                });
                changed |= copy_into(&f.kind, src_field, slot);
            }
            changed
        }
        FieldKind::Array(elem) => {
            let mut changed = false;
            if !dest.is_array() {
                *dest = Value::Array(Vec::new());
                changed = true;
            }
            let (Some(src), Some(dst)) = (source.as_array(), dest.as_array_mut()) else {
                return changed;
            };
            if dst.len() != src.len() {
                dst.resize_with(src.len(), || elem.default_value());
                changed = true;
            }
            for (s, d) in src.iter().zip(dst.iter_mut()) {
                changed |= copy_into(elem, s, d);
            }
            changed
        }
    }
}
