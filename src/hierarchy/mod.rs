//! Hierarchy index: who inherits from whom.
//!
//! Nodes live in an arena and refer to each other by `NodeId`. Each node owns
//! one record, an optional parent link and a child set. Records may arrive in
//! any order: a record whose prototype is not registered yet waits in the
//! pending queue under that prototype's id and is linked the moment the
//! prototype registers.
//!
//! States of a node:
//! - `Root`: no declared prototype.
//! - `Pending(p)`: declared prototype `p` is not registered yet.
//! - `Linked(n)`: parent is node `n`, which holds the declared prototype.

mod validate;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::record::{Record, RecordId, RecordKind};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Root,
    Pending(RecordId),
    Linked(NodeId),
}

#[derive(Debug)]
pub struct Node {
    record: Record,
    parent: Option<NodeId>,
    children: BTreeSet<NodeId>,
}

impl Node {
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().copied()
    }
}

/// Outcome of a structural change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub node: NodeId,
    /// False when the call was a no-op (same prototype re-registered).
    pub changed: bool,
    /// Nodes that were waiting for this record and are now its children.
    pub drained: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct Hierarchy {
    config: EngineConfig,
    nodes: Vec<Node>,
    by_record: BTreeMap<RecordId, NodeId>,
    roots: BTreeSet<NodeId>,
    pending: BTreeMap<RecordId, BTreeSet<NodeId>>,
}

impl Hierarchy {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop every node, root and pending entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_record.clear();
        self.roots.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, id: &RecordId) -> Option<NodeId> {
        self.by_record.get(id).copied()
    }

    /// Arena access. `node` must come from this index since its last
    /// `clear`; outside the crate, go through [`Hierarchy::get`].
    pub(crate) fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node.index()]
    }

    pub(crate) fn record(&self, node: NodeId) -> &Record {
        &self.nodes[node.index()].record
    }

    /// Mutable access for value and override edits. Structural fields
    /// (`id`, `prototype`, `schema`) must only change through this index.
    pub(crate) fn record_mut(&mut self, node: NodeId) -> &mut Record {
        &mut self.nodes[node.index()].record
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.lookup(id).map(|n| self.record(n))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.iter().copied()
    }

    /// Missing prototype ids with the nodes waiting for each.
    pub fn pending(&self) -> impl Iterator<Item = (&RecordId, Vec<NodeId>)> + '_ {
        self.pending
            .iter()
            .map(|(id, waiting)| (id, waiting.iter().copied().collect()))
    }

    /// Link state of a registered record, by id.
    pub fn state(&self, id: &RecordId) -> Option<LinkState> {
        self.lookup(id).map(|n| self.link_state(n))
    }

    pub(crate) fn link_state(&self, node: NodeId) -> LinkState {
        let n = self.node(node);
        match (&n.record.prototype, n.parent) {
            (None, _) => LinkState::Root,
            (Some(_), Some(parent)) => LinkState::Linked(parent),
            (Some(p), None) => LinkState::Pending(p.clone()),
        }
    }

    /// Add a record that is not in the index yet.
    ///
    /// Checks the declared prototype (self-reference, cycles, schema) and the
    /// schemas of any records already waiting for this one before touching
    /// the index. On success the record is linked, queued, or made a root,
    /// and every waiter is moved under it.
    pub fn insert(&mut self, record: Record) -> Result<Registration> {
        if self.by_record.contains_key(&record.id) {
            return Err(EngineError::DuplicateRecord(record.id));
        }
        self.validate_assignment(&record.id, record.prototype.as_ref(), record.kind)?;
        if let Some(parent) = record.prototype.as_ref().and_then(|p| self.get(p)) {
            ensure_same_schema(&record, parent)?;
        }
        if let Some(waiting) = self.pending.get(&record.id) {
            for w in waiting {
                let waiter = &self.nodes[w.index()].record;
                ensure_same_schema(waiter, &record)?;
                if record.kind == RecordKind::Instance && !self.config.instance_cycle_check {
                    return Err(EngineError::InstancePrototype {
                        record: waiter.id.clone(),
                        prototype: record.id.clone(),
                    });
                }
            }
        }

        let node = NodeId(self.nodes.len() as u32);
        let id = record.id.clone();
        let prototype = record.prototype.clone();
        self.nodes.push(Node {
            record,
            parent: None,
            children: BTreeSet::new(),
        });
        self.by_record.insert(id.clone(), node);
        self.attach(node, prototype.as_ref());

        let drained: Vec<NodeId> = self
            .pending
            .remove(&id)
            .map(|waiting| waiting.into_iter().collect())
            .unwrap_or_default();
        for &child in &drained {
            self.nodes[child.index()].parent = Some(node);
            self.nodes[node.index()].children.insert(child);
        }
        if !drained.is_empty() {
            debug!(record = %id, waiting = drained.len(), "drained pending links");
        }

        Ok(Registration {
            node,
            changed: true,
            drained,
        })
    }

    /// Point a registered record at a new prototype (or none).
    ///
    /// Re-declaring the current prototype is a no-op. A rejected assignment
    /// leaves the index unchanged.
    pub fn set_prototype(
        &mut self,
        node: NodeId,
        prototype: Option<RecordId>,
    ) -> Result<Registration> {
        let record = self.record(node);
        if record.prototype == prototype {
            return Ok(Registration {
                node,
                changed: false,
                drained: Vec::new(),
            });
        }
        self.validate_assignment(&record.id, prototype.as_ref(), record.kind)?;
        if let Some(parent) = prototype.as_ref().and_then(|p| self.get(p)) {
            ensure_same_schema(record, parent)?;
        }

        self.detach(node);
        self.nodes[node.index()].record.prototype = prototype.clone();
        self.attach(node, prototype.as_ref());

        Ok(Registration {
            node,
            changed: true,
            drained: Vec::new(),
        })
    }

    fn attach(&mut self, node: NodeId, prototype: Option<&RecordId>) {
        let id = &self.nodes[node.index()].record.id;
        match prototype {
            None => {
                debug!(record = %id, "registered as root");
                self.roots.insert(node);
            }
            Some(p) => match self.lookup(p) {
                Some(parent) => {
                    debug!(record = %id, prototype = %p, "linked to prototype");
                    self.nodes[node.index()].parent = Some(parent);
                    self.nodes[parent.index()].children.insert(node);
                }
                None => {
                    debug!(record = %id, prototype = %p, "prototype not registered yet, queued");
                    self.pending.entry(p.clone()).or_default().insert(node);
                }
            },
        }
    }

    /// Remove every structural trace of `node`'s current prototype.
    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.index()].parent.take() {
            self.nodes[parent.index()].children.remove(&node);
        }
        self.roots.remove(&node);
        if let Some(p) = self.nodes[node.index()].record.prototype.clone() {
            if let Some(waiting) = self.pending.get_mut(&p) {
                waiting.remove(&node);
                if waiting.is_empty() {
                    self.pending.remove(&p);
                }
            }
        }
    }

    /// Every node below `node`, parents before their children, each once.
    pub(crate) fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::from([node]);
        let mut queue: VecDeque<NodeId> = self.node(node).children().collect();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            queue.extend(self.node(next).children());
        }
        out
    }

    /// Verify the structural invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for (i, n) in self.nodes.iter().enumerate() {
            let node = NodeId(i as u32);
            let id = &n.record.id;
            if self.lookup(id) != Some(node) {
                return Err(format!("record '{}' is not indexed at its node", id));
            }

            let queued: Vec<&RecordId> = self
                .pending
                .iter()
                .filter(|(_, w)| w.contains(&node))
                .map(|(k, _)| k)
                .collect();

            match &n.record.prototype {
                None => {
                    if n.parent.is_some() || !self.roots.contains(&node) || !queued.is_empty() {
                        return Err(format!("root '{}' is linked or queued", id));
                    }
                }
                Some(p) => {
                    if self.roots.contains(&node) {
                        return Err(format!("'{}' declares '{}' but is a root", id, p));
                    }
                    match self.lookup(p) {
                        Some(expected) => {
                            if n.parent != Some(expected) || !queued.is_empty() {
                                return Err(format!("'{}' is not linked to '{}'", id, p));
                            }
                        }
                        None => {
                            if n.parent.is_some() || queued != vec![p] {
                                return Err(format!("'{}' is not queued under '{}'", id, p));
                            }
                        }
                    }
                }
            }

            if let Some(parent) = n.parent {
                if !self.node(parent).children.contains(&node) {
                    return Err(format!("parent of '{}' does not list it as a child", id));
                }
            }
            for child in &n.children {
                if self.node(*child).parent != Some(node) {
                    return Err(format!("child of '{}' points at another parent", id));
                }
            }

            let mut seen = BTreeSet::from([node]);
            let mut cur = n.parent;
            while let Some(p) = cur {
                if !seen.insert(p) {
                    return Err(format!("'{}' is its own ancestor", id));
                }
                cur = self.node(p).parent;
            }
        }

        for (key, waiting) in &self.pending {
            if self.by_record.contains_key(key) {
                return Err(format!("stale pending entry for registered '{}'", key));
            }
            if waiting.is_empty() {
                return Err(format!("empty pending entry for '{}'", key));
            }
        }
        Ok(())
    }
}

fn ensure_same_schema(child: &Record, prototype: &Record) -> Result<()> {
    if child.same_schema(prototype) {
        return Ok(());
    }
    Err(child.mismatch(format!(
        "prototype '{}' is a {}, record is a {}",
        prototype.id,
        prototype.schema.name(),
        child.schema.name()
    )))
}

#[cfg(test)]
mod tests;
