use pretty_assertions::assert_eq;
use protochain::{
    EngineConfig, EngineError, FieldKind, FieldPath, LinkState, Record, RecordId, RecordKind,
    ScalarKind, Schema, Session,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn info() -> Arc<Schema> {
    Arc::new(
        Schema::new("Info")
            .with_field("x", FieldKind::Scalar(ScalarKind::Int))
            .with_field("label", FieldKind::Scalar(ScalarKind::String))
            .with_field(
                "weights",
                FieldKind::Array(Box::new(FieldKind::Scalar(ScalarKind::Float))),
            ),
    )
}

fn id(s: &str) -> RecordId {
    RecordId::from(s)
}

fn x() -> FieldPath {
    "x".parse().unwrap()
}

fn value(s: &Session, record: &str, path: &str) -> Option<Value> {
    s.get_resolved_value(&id(record), &path.parse().unwrap())
}

#[test]
fn roots_keep_defaults_except_overrides() {
    let mut s = Session::default();
    s.insert_record(Record::new("r", info()).with_local("label", json!("hi")).unwrap())
        .unwrap();
    let r = s.resolved_record(&id("r")).unwrap();
    assert_eq!(r.values, json!({ "x": 0, "label": "hi", "weights": [] }));
}

#[test]
fn chain_resolves_the_same_in_every_registration_order() {
    let orders = [
        ["a", "b", "c"],
        ["a", "c", "b"],
        ["b", "a", "c"],
        ["b", "c", "a"],
        ["c", "a", "b"],
        ["c", "b", "a"],
    ];
    for order in orders {
        let mut s = Session::default();
        for name in order {
            let record = match name {
                "a" => Record::new("a", info())
                    .with_local("x", json!(1))
                    .unwrap()
                    .with_local("weights", json!([0.5, 2.0]))
                    .unwrap(),
                "b" => Record::new("b", info()).with_prototype("a"),
                _ => Record::new("c", info()).with_prototype("b"),
            };
            s.insert_record(record).unwrap();
            s.hierarchy().check_invariants().unwrap();
        }
        for path in ["x", "label", "weights", "weights[1]"] {
            assert_eq!(value(&s, "c", path), value(&s, "a", path), "order {:?}", order);
        }
        assert_eq!(s.hierarchy().pending().count(), 0);
    }
}

#[test]
fn override_on_middle_record_reaches_the_leaf() {
    let mut s = Session::default();
    s.insert_record(Record::new("a", info()).with_local("x", json!(1)).unwrap())
        .unwrap();
    s.register_or_update("b", Some(id("a")), info()).unwrap();
    s.register_or_update("c", Some(id("b")), info()).unwrap();
    assert_eq!(value(&s, "b", "x"), Some(json!(1)));

    s.set_field_override(&id("b"), &x(), true).unwrap();
    s.set_field_value(&id("b"), &x(), json!(5)).unwrap();
    assert_eq!(value(&s, "c", "x"), Some(json!(5)));
    assert_eq!(value(&s, "a", "x"), Some(json!(1)));

    // Clearing falls back to whatever A holds now.
    s.set_field_value(&id("a"), &x(), json!(2)).unwrap();
    s.set_field_override(&id("b"), &x(), false).unwrap();
    assert_eq!(value(&s, "b", "x"), Some(json!(2)));
    assert_eq!(value(&s, "c", "x"), Some(json!(2)));
}

#[test]
fn overridden_record_shields_its_descendants() {
    let mut s = Session::default();
    s.insert_record(Record::new("R0", info()).with_local("x", json!(10)).unwrap())
        .unwrap();
    s.register_or_update("R1", Some(id("R0")), info()).unwrap();
    assert_eq!(value(&s, "R1", "x"), Some(json!(10)));

    s.set_field_value(&id("R1"), &x(), json!(99)).unwrap();
    s.register_or_update("R2", Some(id("R1")), info()).unwrap();
    assert_eq!(value(&s, "R2", "x"), Some(json!(99)));

    s.set_field_value(&id("R0"), &x(), json!(20)).unwrap();
    assert_eq!(value(&s, "R0", "x"), Some(json!(20)));
    assert_eq!(value(&s, "R1", "x"), Some(json!(99)));
    assert_eq!(value(&s, "R2", "x"), Some(json!(99)));
}

#[test]
fn assignment_validation_reports_self_reference_and_cycles() {
    let mut s = Session::default();
    s.register_or_update("a", None, info()).unwrap();
    s.register_or_update("b", Some(id("a")), info()).unwrap();
    s.register_or_update("c", Some(id("b")), info()).unwrap();

    for r in ["a", "b", "c", "unregistered"] {
        assert_eq!(
            s.validate_prototype_assignment(&id(r), &id(r)),
            Err(EngineError::SelfReference(id(r)))
        );
    }
    assert_eq!(
        s.validate_prototype_assignment(&id("a"), &id("c")),
        Err(EngineError::CycleDetected {
            record: id("a"),
            chain: vec![id("c"), id("b"), id("a")],
        })
    );
    assert_eq!(s.validate_prototype_assignment(&id("c"), &id("a")), Ok(()));
}

#[test]
fn rejected_cycle_leaves_the_index_untouched() {
    let mut s = Session::default();
    s.register_or_update("a", None, info()).unwrap();
    s.register_or_update("b", Some(id("a")), info()).unwrap();
    let before = s.records().into_iter().map(|r| (r.id, r.prototype)).collect::<Vec<_>>();

    assert!(s.register_or_update("a", Some(id("b")), info()).is_err());
    assert!(s.register_or_update("b", Some(id("b")), info()).is_err());

    let after = s.records().into_iter().map(|r| (r.id, r.prototype)).collect::<Vec<_>>();
    assert_eq!(before, after);
    s.hierarchy().check_invariants().unwrap();
}

#[test]
fn instance_cycle_check_can_be_disabled() {
    let config = EngineConfig {
        instance_cycle_check: false,
    };
    let mut s = Session::new(config);
    s.register_or_update("a", None, info()).unwrap();
    s.register_or_update("i", Some(id("a")), info()).unwrap();

    // Assets are still checked.
    assert!(matches!(
        s.register_or_update("a", Some(id("i")), info()),
        Err(EngineError::CycleDetected { .. })
    ));

    // An instance may not arrive under an id a record is waiting on.
    s.register_or_update("j", Some(id("k")), info()).unwrap();
    let closing = Record::new("k", info())
        .with_kind(RecordKind::Instance)
        .with_prototype("j");
    assert_eq!(
        s.insert_record(closing),
        Err(EngineError::InstancePrototype {
            record: id("j"),
            prototype: id("k"),
        })
    );
    assert!(s.resolved_record(&id("k")).is_none());
    s.hierarchy().check_invariants().unwrap();

    let mut placed = Record::new("p", info()).with_kind(RecordKind::Instance);
    placed.prototype = Some(id("p"));
    assert_eq!(
        s.insert_record(placed),
        Err(EngineError::SelfReference(id("p")))
    );
}

#[test]
fn rebuild_without_instance_cycle_check_rejects_instance_loops() {
    let mut s = Session::new(EngineConfig {
        instance_cycle_check: false,
    });
    let mut closing = Record::new("k", info())
        .with_kind(RecordKind::Instance)
        .with_prototype("j");
    closing.values = json!({ "x": 77, "label": "stale", "weights": [] });

    let report = s.full_rebuild(vec![
        Record::new("j", info())
            .with_local("x", json!(1))
            .unwrap()
            .with_prototype("k"),
        closing,
    ]);

    assert_eq!(report.registered, 1);
    let rejected: Vec<&str> = report.rejected.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(rejected, vec!["k"]);
    assert!(report.unresolved.is_empty());
    assert_eq!(
        s.hierarchy().state(&id("j")),
        Some(LinkState::Pending(id("k")))
    );
    assert_eq!(value(&s, "j", "x"), Some(json!(1)));
    s.hierarchy().check_invariants().unwrap();
}
