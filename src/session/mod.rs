//! Edit session: owns the hierarchy index and drives resolution.
//!
//! A host creates one `Session` per edit session and funnels every change
//! through it. Each call runs to completion: validate, mutate the index,
//! re-resolve the touched record and its descendants parent-first, then
//! notify observers.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::hierarchy::{Hierarchy, NodeId};
use crate::path::FieldPath;
use crate::record::{Record, RecordId};
use crate::resolve::resolve;
use crate::schema::Schema;

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace, warn};

/// Notification sent to observers after a change has fully propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyEvent {
    /// `record` changed; `affected` lists it and every re-resolved descendant,
    /// parents first.
    Changed {
        record: RecordId,
        affected: Vec<RecordId>,
    },
    /// The index was rebuilt from scratch.
    Rebuilt { records: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    pub registered: usize,
    /// Records left out of the index, with the reason.
    pub rejected: Vec<(RecordId, EngineError)>,
    /// Registered records whose resolution failed; they keep their local
    /// values.
    pub unresolved: Vec<(RecordId, EngineError)>,
}

type Observer = Box<dyn FnMut(&HierarchyEvent)>;

#[derive(Default)]
pub struct Session {
    hierarchy: Hierarchy,
    observers: Vec<Observer>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            hierarchy: Hierarchy::new(config),
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.hierarchy.config()
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Call `observer` after every propagated change and every rebuild.
    pub fn subscribe(&mut self, observer: impl FnMut(&HierarchyEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Introduce a record, or change the prototype of a known one.
    ///
    /// A known record must keep its schema. Re-declaring the current prototype
    /// does nothing: no relinking, no resolution, no event.
    pub fn register_or_update(
        &mut self,
        id: impl Into<RecordId>,
        prototype: Option<RecordId>,
        schema: Arc<Schema>,
    ) -> Result<()> {
        let id = id.into();
        match self.hierarchy.lookup(&id) {
            Some(node) => {
                let record = self.hierarchy.record(node);
                if !Arc::ptr_eq(&record.schema, &schema) && *record.schema != *schema {
                    return Err(record.mismatch(format!(
                        "already registered as {}, not {}",
                        record.schema.name(),
                        schema.name()
                    )));
                }
                let reg = self.hierarchy.set_prototype(node, prototype)?;
                if reg.changed {
                    self.refresh(node)?;
                }
                Ok(())
            }
            None => {
                let mut record = Record::new(id, schema);
                record.prototype = prototype;
                self.insert_record(record)
            }
        }
    }

    /// Register a record that carries its own local values and override set.
    pub fn insert_record(&mut self, record: Record) -> Result<()> {
        let record = prepare(record)?;
        let reg = self.hierarchy.insert(record)?;
        self.refresh(reg.node)
    }

    /// Mark `path` as locally authored, or let it inherit again.
    ///
    /// Only schema-level paths carry flags; array element paths are rejected
    /// as unknown fields.
    pub fn set_field_override(
        &mut self,
        id: &RecordId,
        path: &FieldPath,
        overridden: bool,
    ) -> Result<()> {
        let node = self.node_for(id)?;
        let record = self.hierarchy.record_mut(node);
        if !record.schema.is_schema_path(path) {
            return Err(record.unknown_field(path));
        }
        let schema = record.schema.clone();
        if record.overrides.set(&schema, path, overridden) {
            self.refresh(node)?;
        }
        Ok(())
    }

    /// Write a local value and push it to every descendant that inherits it.
    pub fn set_field_value(&mut self, id: &RecordId, path: &FieldPath, value: Value) -> Result<()> {
        let node = self.node_for(id)?;
        if self.hierarchy.record_mut(node).write_local(path, value)? {
            self.refresh(node)?;
        }
        Ok(())
    }

    /// Current value at `path`, or `None` for unknown records or fields.
    pub fn get_resolved_value(&self, id: &RecordId, path: &FieldPath) -> Option<Value> {
        self.hierarchy.get(id)?.get(path).cloned()
    }

    pub fn resolved_record(&self, id: &RecordId) -> Option<&Record> {
        self.hierarchy.get(id)
    }

    /// Would declaring `candidate` as `id`'s prototype be accepted?
    pub fn validate_prototype_assignment(&self, id: &RecordId, candidate: &RecordId) -> Result<()> {
        let kind = self
            .hierarchy
            .get(id)
            .map(|r| r.kind)
            .unwrap_or_default();
        self.hierarchy.validate_assignment(id, Some(candidate), kind)
    }

    /// Re-resolve every descendant of `id` from its current values.
    pub fn propagate(&mut self, id: &RecordId) -> Result<()> {
        let node = self.node_for(id)?;
        let mut affected = vec![id.clone()];
        for d in self.hierarchy.descendants(node) {
            self.resolve_node(d)?;
            affected.push(self.hierarchy.record(d).id.clone());
        }
        self.emit(HierarchyEvent::Changed {
            record: id.clone(),
            affected,
        });
        Ok(())
    }

    /// Snapshot of every registered record, in registration order. Feeding it
    /// back to `full_rebuild` reproduces the current state.
    pub fn records(&self) -> Vec<Record> {
        self.hierarchy
            .node_ids()
            .map(|n| self.hierarchy.record(n).clone())
            .collect()
    }

    /// Reset the index and register `records` in the given order.
    ///
    /// Records that cannot be registered (cycles, schema mismatches,
    /// duplicates) are skipped and reported as rejected; everything else is
    /// linked and resolved once, roots first. The result does not depend on
    /// input order.
    pub fn full_rebuild(&mut self, records: impl IntoIterator<Item = Record>) -> RebuildReport {
        let started = Instant::now();
        self.hierarchy.clear();

        let mut report = RebuildReport::default();
        for record in records {
            let id = record.id.clone();
            match prepare(record).and_then(|r| self.hierarchy.insert(r)) {
                Ok(_) => report.registered += 1,
                Err(err) => {
                    warn!(record = %id, error = %err, "record rejected during rebuild");
                    report.rejected.push((id, err));
                }
            }
        }

        self.resolve_all(&mut report);

        info!(
            registered = report.registered,
            rejected = report.rejected.len(),
            unresolved = report.unresolved.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hierarchy rebuilt"
        );
        self.emit(HierarchyEvent::Rebuilt {
            records: report.registered,
        });
        report
    }

    /// Resolve every tree top-down, one node at a time, so a failing record
    /// does not stop its siblings.
    fn resolve_all(&mut self, report: &mut RebuildReport) {
        let tops: Vec<NodeId> = self
            .hierarchy
            .node_ids()
            .filter(|&n| self.hierarchy.node(n).parent().is_none())
            .collect();
        for top in tops {
            for n in std::iter::once(top).chain(self.hierarchy.descendants(top)) {
                if let Err(err) = self.resolve_node(n) {
                    let id = self.hierarchy.record(n).id.clone();
                    warn!(record = %id, error = %err, "resolution failed during rebuild");
                    report.unresolved.push((id, err));
                }
            }
        }
    }

    fn node_for(&self, id: &RecordId) -> Result<NodeId> {
        self.hierarchy
            .lookup(id)
            .ok_or_else(|| EngineError::UnknownRecord(id.clone()))
    }

    /// Resolve `node`, propagate below it and tell observers.
    fn refresh(&mut self, node: NodeId) -> Result<()> {
        let affected = self.resolve_subtree(node)?;
        self.emit(HierarchyEvent::Changed {
            record: self.hierarchy.record(node).id.clone(),
            affected,
        });
        Ok(())
    }

    fn resolve_subtree(&mut self, node: NodeId) -> Result<Vec<RecordId>> {
        let mut affected = Vec::new();
        for n in std::iter::once(node).chain(self.hierarchy.descendants(node)) {
            self.resolve_node(n)?;
            affected.push(self.hierarchy.record(n).id.clone());
        }
        Ok(affected)
    }

    fn resolve_node(&mut self, node: NodeId) -> Result<bool> {
        let inherited = self
            .hierarchy
            .node(node)
            .parent()
            .map(|p| self.hierarchy.record(p).values.clone());
        let record = self.hierarchy.record_mut(node);
        let changed = resolve(record, inherited.as_ref())?;
        trace!(record = %record.id, changed, "resolved");
        Ok(changed)
    }

    fn emit(&mut self, event: HierarchyEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}

/// Normalize host-supplied local data: fill missing fields with defaults,
/// check the values, and drop override entries that name no schema path.
fn prepare(mut record: Record) -> Result<Record> {
    let values = std::mem::take(&mut record.values);
    let values = match record.schema.complete(values) {
        Ok(v) => v,
        Err(detail) => return Err(record.mismatch(detail)),
    };
    record.values = values;

    for dropped in record.overrides.prune(&record.schema) {
        warn!(record = %record.id, path = %dropped, "dropping override for unknown field");
    }
    Ok(record)
}
