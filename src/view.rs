//! Serializable snapshot of a session: structure plus resolved values.

use crate::error::EngineError;
use crate::hierarchy::{LinkState, NodeId};
use crate::record::{RecordId, RecordKind};
use crate::session::{RebuildReport, Session};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub id: String,
    pub schema: String,
    pub kind: RecordKind,
    /// Declared prototype, linked or not.
    pub prototype: Option<String>,
    /// "root", "linked" or "pending".
    pub state: &'static str,
    pub children: Vec<String>,
    pub overridden: Vec<String>,
    pub values: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedView {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalsView {
    pub records: usize,
    pub roots: usize,
    pub pending: usize,
    pub overridden_fields: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    pub roots: Vec<String>,
    /// Missing prototype id -> records waiting for it.
    pub pending: BTreeMap<String, Vec<String>>,
    pub records: BTreeMap<String, RecordView>,
    pub rejected: Vec<RejectedView>,
    /// Registered, but resolution failed.
    pub unresolved: Vec<RejectedView>,
    pub totals: TotalsView,
}

pub fn build_snapshot(session: &Session, report: Option<&RebuildReport>) -> SnapshotView {
    let h = session.hierarchy();
    let name = |n: NodeId| h.record(n).id.to_string();

    let mut roots: Vec<String> = h.roots().map(name).collect();
    roots.sort();

    let pending: BTreeMap<String, Vec<String>> = h
        .pending()
        .map(|(missing, waiting)| {
            let mut ids: Vec<String> = waiting.into_iter().map(name).collect();
            ids.sort();
            (missing.to_string(), ids)
        })
        .collect();

    let mut records = BTreeMap::new();
    let mut overridden_fields = 0usize;
    for node in h.node_ids() {
        let record = h.record(node);
        let state = match h.link_state(node) {
            LinkState::Root => "root",
            LinkState::Linked(_) => "linked",
            LinkState::Pending(_) => "pending",
        };
        let mut children: Vec<String> = h.node(node).children().map(name).collect();
        children.sort();
        let overridden: Vec<String> = record.overrides.iter().map(|p| p.to_string()).collect();
        overridden_fields += overridden.len();

        records.insert(
            record.id.to_string(),
            RecordView {
                id: record.id.to_string(),
                schema: record.schema.name().to_string(),
                kind: record.kind,
                prototype: record.prototype.as_ref().map(|p| p.to_string()),
                state,
                children,
                overridden,
                values: record.values.clone(),
            },
        );
    }

    let rejected = report.map(|r| failure_views(&r.rejected)).unwrap_or_default();
    let unresolved = report.map(|r| failure_views(&r.unresolved)).unwrap_or_default();

    SnapshotView {
        totals: TotalsView {
            records: records.len(),
            roots: roots.len(),
            pending: pending.values().map(Vec::len).sum(),
            overridden_fields,
        },
        roots,
        pending,
        records,
        rejected,
        unresolved,
    }
}

fn failure_views(failures: &[(RecordId, EngineError)]) -> Vec<RejectedView> {
    failures
        .iter()
        .map(|(id, err)| RejectedView {
            id: id.to_string(),
            error: err.to_string(),
        })
        .collect()
}
