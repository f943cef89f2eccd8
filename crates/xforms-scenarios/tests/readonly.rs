//! Readonly is the OR of a node's own expression and its ancestors'.

use xforms_engine::EngineError;
use xforms_scenarios::{Scenario, forms};

#[test]
fn readonly_is_inherited_from_ancestors() {
    let mut scenario = Scenario::init(&forms::readonly_form());
    assert!(!scenario.readonly("/data/locked"));
    assert!(!scenario.readonly("/data/locked/free"));
    assert!(scenario.readonly("/data/locked/always"));

    scenario.answer("/data/lock", "yes");
    assert!(scenario.readonly("/data/locked"));
    assert!(scenario.readonly("/data/locked/free"));
    assert!(scenario.readonly("/data/locked/always"));

    scenario.answer("/data/lock", "no");
    assert!(!scenario.readonly("/data/locked/free"));
    assert!(scenario.readonly("/data/locked/always"));
}

#[test]
fn readonly_leaves_reject_answers() {
    let mut scenario = Scenario::init(&forms::readonly_form());
    scenario.answer("/data/locked/free", "before");
    scenario.answer("/data/lock", "yes");

    assert_eq!(
        scenario.try_answer("/data/locked/free", "after").unwrap_err(),
        EngineError::Readonly {
            reference: "/data/locked/free".to_owned(),
        }
    );
    assert_eq!(scenario.value("/data/locked/free"), "before");
}

#[test]
fn answering_a_group_is_a_type_error() {
    let mut scenario = Scenario::init(&forms::readonly_form());
    assert_eq!(
        scenario.try_answer("/data/locked", "x").unwrap_err(),
        EngineError::WrongNodeType {
            operation: "set_value",
            found: "group",
        }
    );
}
