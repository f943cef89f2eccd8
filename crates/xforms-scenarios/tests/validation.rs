//! Leaf violations and their document-order roll-up.

use xforms_engine::{ValidationCondition, ValidationState};
use xforms_scenarios::{Scenario, forms};

fn violated_references(state: &ValidationState) -> Vec<String> {
    match state {
        ValidationState::Parent { violations } => violations
            .iter()
            .map(|violation| violation.reference.to_string())
            .collect(),
        ValidationState::Leaf { .. } => panic!("expected a parent validation state"),
    }
}

#[test]
fn blank_required_leaf_is_violated() {
    let mut scenario = Scenario::init(&forms::validation_form());
    let ValidationState::Leaf { validation } = scenario.validation("/data/name") else {
        panic!("expected a leaf validation state");
    };
    let violation = validation.violation.clone().unwrap();
    assert_eq!(violation.condition, ValidationCondition::Required);
    assert_eq!(&*violation.message, "This field is required.");
    assert!(validation.constraint.valid);

    scenario.answer("/data/name", "Ana");
    assert!(scenario.validation("/data/name").is_valid());
}

#[test]
fn constraint_applies_to_non_blank_values_only() {
    let mut scenario = Scenario::init(&forms::validation_form());
    assert!(scenario.validation("/data/age").is_valid());

    scenario.answer("/data/age", "200");
    let ValidationState::Leaf { validation } = scenario.validation("/data/age") else {
        panic!("expected a leaf validation state");
    };
    let violation = validation.violation.clone().unwrap();
    assert_eq!(violation.condition, ValidationCondition::Constraint);
    assert_eq!(&*violation.message, "Age must be between 0 and 129.");

    scenario.answer("/data/age", "40");
    assert!(scenario.validation("/data/age").is_valid());
}

#[test]
fn violations_roll_up_in_document_order() {
    let mut scenario = Scenario::init(&forms::validation_form());
    scenario.answer("/data/age", "-1");

    assert_eq!(
        violated_references(&scenario.validation("/data")),
        ["/data/name", "/data/age", "/data/contact/phone"]
    );
    assert_eq!(
        violated_references(&scenario.validation("/data/contact")),
        ["/data/contact/phone"]
    );
}

#[test]
fn non_relevant_leaves_are_not_violated() {
    let mut scenario = Scenario::init(&forms::validation_form());
    scenario.answer("/data/consent", "no");
    assert!(scenario.validation("/data/contact/phone").is_valid());
    assert_eq!(violated_references(&scenario.validation("/data")), ["/data/name"]);

    scenario.answer("/data/consent", "yes");
    scenario.answer("/data/name", "Ana");
    assert_eq!(
        violated_references(&scenario.validation("/data")),
        ["/data/contact/phone"]
    );

    scenario.answer("/data/contact/phone", "555");
    assert!(scenario.validation("/data").is_valid());
}
