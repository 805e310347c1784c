use super::*;
use crate::record::RecordKind;
use crate::schema::{FieldKind, ScalarKind, Schema};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new("Info").with_field("x", FieldKind::Scalar(ScalarKind::Int)))
}

fn rec(id: &str, prototype: Option<&str>) -> Record {
    let r = Record::new(id, schema());
    match prototype {
        Some(p) => r.with_prototype(p),
        None => r,
    }
}

fn id(s: &str) -> RecordId {
    RecordId::from(s)
}

fn parent_id(h: &Hierarchy, s: &str) -> Option<RecordId> {
    let node = h.lookup(&id(s))?;
    h.node(node).parent().map(|p| h.record(p).id.clone())
}

fn child_ids(h: &Hierarchy, s: &str) -> Vec<String> {
    let node = h.lookup(&id(s)).unwrap();
    h.node(node)
        .children()
        .map(|c| h.record(c).id.to_string())
        .collect()
}

#[test]
fn links_child_under_registered_prototype() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", None)).unwrap();
    h.insert(rec("b", Some("a"))).unwrap();

    assert_eq!(parent_id(&h, "b"), Some(id("a")));
    assert_eq!(child_ids(&h, "a"), vec!["b"]);
    assert_eq!(h.roots().count(), 1);
    h.check_invariants().unwrap();
}

#[test]
fn queues_until_prototype_registers() {
    let mut h = Hierarchy::default();
    h.insert(rec("c", Some("b"))).unwrap();
    h.insert(rec("b", Some("a"))).unwrap();

    let c = h.lookup(&id("c")).unwrap();
    let b = h.lookup(&id("b")).unwrap();
    assert_eq!(h.link_state(c), LinkState::Linked(b));
    assert_eq!(h.link_state(b), LinkState::Pending(id("a")));
    h.check_invariants().unwrap();

    let reg = h.insert(rec("a", None)).unwrap();
    assert_eq!(reg.drained, vec![b]);
    assert_eq!(h.pending().count(), 0);
    assert_eq!(h.link_state(b), LinkState::Linked(reg.node));
    h.check_invariants().unwrap();
}

#[test]
fn several_records_can_wait_on_one_prototype() {
    let mut h = Hierarchy::default();
    h.insert(rec("x", Some("p"))).unwrap();
    h.insert(rec("y", Some("p"))).unwrap();
    let waiting: Vec<_> = h.pending().collect();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].1.len(), 2);

    h.insert(rec("p", None)).unwrap();
    assert_eq!(child_ids(&h, "p"), vec!["x", "y"]);
    h.check_invariants().unwrap();
}

#[test]
fn rejects_self_reference() {
    let mut h = Hierarchy::default();
    let err = h.insert(rec("a", Some("a"))).unwrap_err();
    assert_eq!(err, EngineError::SelfReference(id("a")));
    assert!(h.is_empty());
}

#[test]
fn rejects_cycle_through_registered_chain() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", None)).unwrap();
    h.insert(rec("b", Some("a"))).unwrap();
    h.insert(rec("c", Some("b"))).unwrap();

    let a = h.lookup(&id("a")).unwrap();
    let err = h.set_prototype(a, Some(id("c"))).unwrap_err();
    assert_eq!(
        err,
        EngineError::CycleDetected {
            record: id("a"),
            chain: vec![id("c"), id("b"), id("a")],
        }
    );
    assert_eq!(h.link_state(a), LinkState::Root);
    h.check_invariants().unwrap();
}

#[test]
fn rejects_cycle_closing_over_pending_records() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", Some("b"))).unwrap();
    let err = h.insert(rec("b", Some("a"))).unwrap_err();
    assert!(matches!(err, EngineError::CycleDetected { .. }));
    assert!(h.lookup(&id("b")).is_none());
    h.check_invariants().unwrap();
}

#[test]
fn instance_cycle_check_can_be_disabled() {
    let mut h = Hierarchy::new(EngineConfig {
        instance_cycle_check: false,
    });
    h.insert(rec("a", Some("b"))).unwrap();
    let instance = rec("b", Some("a")).with_kind(RecordKind::Instance);
    assert!(
        h.validate_assignment(&instance.id, instance.prototype.as_ref(), instance.kind)
            .is_ok()
    );
    assert!(h.validate_assignment(&id("b"), Some(&id("a")), RecordKind::Asset).is_err());
    assert_eq!(
        h.validate_assignment(&id("b"), Some(&id("b")), RecordKind::Instance),
        Err(EngineError::SelfReference(id("b")))
    );

    // `a` already waits on `b`, so `b` may not arrive as an instance.
    assert_eq!(
        h.insert(instance),
        Err(EngineError::InstancePrototype {
            record: id("a"),
            prototype: id("b"),
        })
    );
    assert!(h.lookup(&id("b")).is_none());
    h.check_invariants().unwrap();
}

#[test]
fn instances_cannot_be_prototypes_without_the_cycle_check() {
    let mut h = Hierarchy::new(EngineConfig {
        instance_cycle_check: false,
    });
    h.insert(rec("a", None)).unwrap();
    h.insert(rec("i", Some("a")).with_kind(RecordKind::Instance))
        .unwrap();

    assert_eq!(
        h.insert(rec("b", Some("i"))),
        Err(EngineError::InstancePrototype {
            record: id("b"),
            prototype: id("i"),
        })
    );
    let a = h.lookup(&id("a")).unwrap();
    assert!(matches!(
        h.set_prototype(a, Some(id("i"))),
        Err(EngineError::InstancePrototype { .. })
    ));
    assert_eq!(h.link_state(a), LinkState::Root);
    h.check_invariants().unwrap();

    // With the check on, instances are ordinary prototypes.
    let mut checked = Hierarchy::default();
    checked.insert(rec("a", None)).unwrap();
    checked
        .insert(rec("i", Some("a")).with_kind(RecordKind::Instance))
        .unwrap();
    checked.insert(rec("b", Some("i"))).unwrap();
    checked.check_invariants().unwrap();
}

#[test]
fn reparenting_moves_child_links() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", None)).unwrap();
    h.insert(rec("b", None)).unwrap();
    h.insert(rec("c", Some("a"))).unwrap();

    let c = h.lookup(&id("c")).unwrap();
    assert!(h.set_prototype(c, Some(id("b"))).unwrap().changed);
    assert!(child_ids(&h, "a").is_empty());
    assert_eq!(child_ids(&h, "b"), vec!["c"]);

    assert!(h.set_prototype(c, None).unwrap().changed);
    assert_eq!(h.link_state(c), LinkState::Root);
    assert_eq!(h.roots().count(), 3);
    h.check_invariants().unwrap();
}

#[test]
fn reparenting_away_from_a_pending_prototype_clears_the_queue() {
    let mut h = Hierarchy::default();
    h.insert(rec("c", Some("ghost"))).unwrap();
    h.insert(rec("a", None)).unwrap();

    let c = h.lookup(&id("c")).unwrap();
    h.set_prototype(c, Some(id("a"))).unwrap();
    assert_eq!(h.pending().count(), 0);
    h.check_invariants().unwrap();
}

#[test]
fn same_prototype_is_a_no_op() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", None)).unwrap();
    h.insert(rec("b", Some("a"))).unwrap();

    let b = h.lookup(&id("b")).unwrap();
    let reg = h.set_prototype(b, Some(id("a"))).unwrap();
    assert!(!reg.changed);
    assert_eq!(child_ids(&h, "a"), vec!["b"]);
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", None)).unwrap();
    assert_eq!(
        h.insert(rec("a", None)).unwrap_err(),
        EngineError::DuplicateRecord(id("a"))
    );
}

#[test]
fn schema_mismatch_with_waiters_rejects_the_prototype() {
    let mut h = Hierarchy::default();
    h.insert(rec("child", Some("p"))).unwrap();

    let other = Arc::new(Schema::new("Other").with_field("y", FieldKind::Scalar(ScalarKind::Bool)));
    let err = h.insert(Record::new("p", other)).unwrap_err();
    assert!(matches!(err, EngineError::SchemaMismatch { .. }));
    assert!(h.lookup(&id("p")).is_none());
    assert_eq!(h.pending().count(), 1);
    h.check_invariants().unwrap();
}

#[test]
fn descendants_are_parent_first() {
    let mut h = Hierarchy::default();
    h.insert(rec("d", Some("b"))).unwrap();
    h.insert(rec("b", Some("a"))).unwrap();
    h.insert(rec("c", Some("a"))).unwrap();
    h.insert(rec("a", None)).unwrap();

    let a = h.lookup(&id("a")).unwrap();
    let order: Vec<String> = h
        .descendants(a)
        .into_iter()
        .map(|n| h.record(n).id.to_string())
        .collect();
    let pos = |s: &str| order.iter().position(|o| o == s).unwrap();
    assert_eq!(order.len(), 3);
    assert!(pos("b") < pos("d"));
}

#[test]
fn clear_resets_everything() {
    let mut h = Hierarchy::default();
    h.insert(rec("a", None)).unwrap();
    h.insert(rec("b", Some("missing"))).unwrap();
    assert_eq!(h.state(&id("b")), Some(LinkState::Pending(id("missing"))));
    h.clear();
    assert!(h.is_empty());
    assert!(h.get(&id("a")).is_none());
    assert_eq!(h.state(&id("b")), None);
    assert_eq!(h.roots().count(), 0);
    assert_eq!(h.pending().count(), 0);
}
