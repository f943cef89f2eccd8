//! Node state mirrored into client objects.

use xforms_engine::{
    BridgeError, DefinitionError, EngineConfig, Payload, PlainFactory, PlainState,
    ReactiveFactory, StateObject,
};
use xforms_scenarios::{FieldWrite, RecordingFactory, Scenario, forms};

#[test]
fn only_changed_fields_are_pushed() {
    let factory = RecordingFactory::default();
    let journal = factory.journal();
    let created = factory.created();
    let mut scenario = Scenario::init_with(&forms::doubling_form(), factory, EngineConfig::default());

    assert!(journal.borrow().is_empty());
    assert_eq!(*created.borrow(), scenario.instance().stats().mirrored_objects);
    assert_eq!(*created.borrow(), 6);

    scenario.answer("/data/a", "4");
    let mut writes = journal.borrow().clone();
    writes.sort_by(|left, right| left.value.as_text().cmp(right.value.as_text()));
    assert_eq!(
        writes,
        [
            FieldWrite {
                field: "value".to_owned(),
                value: Payload::text("4"),
            },
            FieldWrite {
                field: "value".to_owned(),
                value: Payload::text("8"),
            },
        ]
    );

    scenario.answer("/data/a", "4");
    assert_eq!(journal.borrow().len(), 2);
}

#[test]
fn current_state_tracks_the_node() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    let detail = scenario.node("/data/detail");
    let state = scenario.instance().current_state(detail).unwrap();
    assert_eq!(state.field("reference"), Some(&Payload::text("/data/detail")));
    assert_eq!(state.field("relevant"), Some(&Payload::Bool(false)));
    assert_eq!(state.field("node_type"), Some(&Payload::text("leaf")));

    scenario.answer("/data/toggle", "yes");
    scenario.answer("/data/detail", "abc");
    let state = scenario.instance().current_state(detail).unwrap();
    assert_eq!(state.field("relevant"), Some(&Payload::Bool(true)));
    assert_eq!(state.field("value"), Some(&Payload::text("abc")));
}

#[test]
fn repeat_mirrors_follow_instances() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let range = scenario.range("/data/member");
    let third = scenario.node("/data/member[3]");

    scenario.add_repeat("/data/member");
    let added = scenario.node("/data/member[4]");
    let children = |state: &PlainState| match state.field("children") {
        Some(Payload::Nodes(nodes)) => nodes.to_vec(),
        other => panic!("unexpected children field {other:?}"),
    };
    let state = scenario.instance().current_state(range).unwrap();
    assert_eq!(children(state).len(), 4);
    assert_eq!(children(state)[3], added);
    assert!(scenario.instance().current_state(added).is_ok());
    assert!(scenario.instance().validation_mirror(added).is_ok());

    scenario.remove_repeat("/data/member", 2);
    assert!(scenario.instance().current_state(third).is_err());
    let state = scenario.instance().current_state(range).unwrap();
    assert_eq!(children(state).len(), 3);

    let added_state = scenario.instance().current_state(added).unwrap();
    assert_eq!(added_state.field("reference"), Some(&Payload::text("/data/member[3]")));
}

#[test]
fn validation_mirror_tracks_violations() {
    let mut scenario = Scenario::init(&forms::validation_form());
    let root = scenario.root();
    let violation_count = |state: &PlainState| match state.field("violations") {
        Some(Payload::Violations(violations)) => violations.len(),
        other => panic!("unexpected violations field {other:?}"),
    };
    assert_eq!(violation_count(scenario.instance().validation_mirror(root).unwrap()), 2);

    scenario.answer("/data/name", "Ana");
    assert_eq!(violation_count(scenario.instance().validation_mirror(root).unwrap()), 1);
}

/// Drops every field it is given.
struct Forgetful;

impl ReactiveFactory for Forgetful {
    type Object = PlainState;

    fn create(&mut self, _state: StateObject) -> PlainState {
        PlainFactory.create(StateObject::new())
    }
}

#[test]
fn factory_changing_the_shape_fails_the_load() {
    let error = Scenario::try_init_with(&forms::doubling_form(), Forgetful, EngineConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        error,
        DefinitionError::Bridge(BridgeError::ShapeMismatch { .. })
    ));
}
