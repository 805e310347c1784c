//! Schema section of the records document.

use super::{RawSchema, RawType};
use crate::schema::{FieldKind, ScalarKind, Schema};

use anyhow::{Context, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Validate the raw schemas and build shared descriptors:
/// - unique schema names, unique field names per schema
/// - every named type is a scalar or a declared schema
/// - no schema nests itself, directly or through other schemas
pub(super) fn build_schemas(raw: &[RawSchema]) -> anyhow::Result<BTreeMap<String, Arc<Schema>>> {
    // 1) Unique names.
    let mut by_name = BTreeMap::<&str, &RawSchema>::new();
    for s in raw {
        if ScalarKind::from_name(&s.name).is_some() {
            bail!("schema name shadows a scalar type: {}", s.name);
        }
        if by_name.insert(s.name.as_str(), s).is_some() {
            bail!("duplicate schema name in records document: {}", s.name);
        }
        let mut fields = BTreeSet::new();
        for f in &s.fields {
            if !fields.insert(f.name.as_str()) {
                bail!("duplicate field '{}' in schema {}", f.name, s.name);
            }
        }
    }

    // 2) Nesting edges, checking references on the way.
    let mut nests = BTreeMap::<&str, Vec<&str>>::new();
    for s in raw {
        let kids = nests.entry(s.name.as_str()).or_default();
        for f in &s.fields {
            let Some(target) = nested_schema(&f.ty)? else {
                continue;
            };
            if !by_name.contains_key(target) {
                bail!("field '{}.{}' references unknown type: {}", s.name, f.name, target);
            }
            kids.push(target);
        }
    }

    // 3) Cycle detection (DFS coloring).
    #[derive(Copy, Clone, PartialEq, Eq)]
    enum Mark {
        Temp,
        Perm,
    }

    fn dfs<'a>(
        v: &'a str,
        nests: &BTreeMap<&'a str, Vec<&'a str>>,
        marks: &mut BTreeMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> anyhow::Result<()> {
        match marks.get(v) {
            Some(Mark::Perm) => return Ok(()),
            Some(Mark::Temp) => {
                stack.push(v);
                bail!("recursive schema nesting: {}", stack.join(" -> "));
            }
            None => {}
        }

        marks.insert(v, Mark::Temp);
        stack.push(v);
        for &k in nests.get(v).into_iter().flatten() {
            dfs(k, nests, marks, stack)?;
        }
        stack.pop();
        marks.insert(v, Mark::Perm);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    for name in by_name.keys() {
        stack.clear();
        dfs(*name, &nests, &mut marks, &mut stack)
            .with_context(|| format!("nesting check failed starting at schema {}", name))?;
    }

    // 4) Build, memoized so a nested schema is shared by every user.
    let mut built = BTreeMap::<String, Arc<Schema>>::new();
    for name in by_name.keys() {
        build_one(name, &by_name, &mut built)?;
    }
    Ok(built)
}

/// The schema a field type nests, if any. Scalars and arrays of scalars nest
/// nothing.
fn nested_schema(ty: &RawType) -> anyhow::Result<Option<&str>> {
    match ty {
        RawType::Named(name) if ScalarKind::from_name(name).is_some() => Ok(None),
        RawType::Named(name) => Ok(Some(name.as_str())),
        RawType::Record { record } => {
            if ScalarKind::from_name(record).is_some() {
                bail!("'{}' is a scalar type, not a record", record);
            }
            Ok(Some(record.as_str()))
        }
        RawType::Array { array } => nested_schema(array),
    }
}

fn build_one(
    name: &str,
    by_name: &BTreeMap<&str, &RawSchema>,
    built: &mut BTreeMap<String, Arc<Schema>>,
) -> anyhow::Result<Arc<Schema>> {
    if let Some(schema) = built.get(name) {
        return Ok(schema.clone());
    }
    let Some(raw) = by_name.get(name) else {
        bail!("unknown schema: {}", name);
    };

    let mut schema = Schema::new(name);
    for f in &raw.fields {
        let kind = field_kind(&f.ty, by_name, built)?;
        schema = schema.with_field(f.name.clone(), kind);
    }
    let schema = Arc::new(schema);
    built.insert(name.to_string(), schema.clone());
    Ok(schema)
}

fn field_kind(
    ty: &RawType,
    by_name: &BTreeMap<&str, &RawSchema>,
    built: &mut BTreeMap<String, Arc<Schema>>,
) -> anyhow::Result<FieldKind> {
    Ok(match ty {
        RawType::Named(name) => match ScalarKind::from_name(name) {
            Some(scalar) => FieldKind::Scalar(scalar),
            None => FieldKind::Record(build_one(name, by_name, built)?),
        },
        RawType::Record { record } => FieldKind::Record(build_one(record, by_name, built)?),
        RawType::Array { array } => FieldKind::Array(Box::new(field_kind(array, by_name, built)?)),
    })
}
