//! `setvalue` actions on load, on new repeat instances and on value changes.

use xforms_engine::{ActionDefinition, DefinitionError, EngineConfig, PlainFactory};
use xforms_scenarios::{Scenario, forms};

#[test]
fn first_load_action_runs_once() {
    let mut scenario = Scenario::init(&forms::actions_form());
    assert_eq!(scenario.value("/data/started"), "yes");

    scenario.answer("/data/started", "later");
    scenario.add_repeat("/data/item");
    assert_eq!(scenario.value("/data/started"), "later");
}

#[test]
fn new_repeat_action_runs_for_added_instances_only() {
    let mut scenario = Scenario::init(&forms::actions_form());
    assert_eq!(scenario.value("/data/item[1]/label"), "seeded");
    assert_eq!(scenario.value("/data/item[1]/index"), "");

    scenario.add_repeat("/data/item");
    scenario.add_repeat("/data/item");
    assert_eq!(scenario.value("/data/item[2]/index"), "2");
    assert_eq!(scenario.value("/data/item[3]/index"), "3");
    assert_eq!(scenario.value("/data/item[1]/index"), "");
}

#[test]
fn value_changed_action_follows_the_observed_leaf() {
    let mut scenario = Scenario::init(&forms::actions_form());
    assert_eq!(scenario.value("/data/copy"), "");

    scenario.answer("/data/source", "hi");
    assert_eq!(scenario.value("/data/copy"), "hi!");

    scenario.answer("/data/copy", "edited");
    scenario.answer("/data/source", "hi");
    assert_eq!(scenario.value("/data/copy"), "edited");

    scenario.answer("/data/source", "bye");
    assert_eq!(scenario.value("/data/copy"), "bye!");
}

#[test]
fn unsupported_event_fails_the_load() {
    let definition = forms::actions_form()
        .action(ActionDefinition::new("xforms-ready", "/data/started").value("'no'"));
    let error = Scenario::try_init_with(&definition, PlainFactory, EngineConfig::default())
        .err()
        .unwrap();
    assert_eq!(
        error,
        DefinitionError::UnsupportedEvent {
            event: "xforms-ready".to_owned(),
        }
    );
}
