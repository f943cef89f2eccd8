//! Adding, removing and sizing repeat instances.

use xforms_engine::{EngineConfig, EngineError, Lifecycle, PlainFactory};
use xforms_scenarios::{Scenario, forms};

#[test]
fn calculations_are_contextualized_per_instance() {
    let mut scenario = Scenario::init(&forms::nested_calculation_form());
    assert_eq!(scenario.repeat_count("/data/rep"), 0);
    scenario.add_repeat("/data/rep");
    scenario.add_repeat("/data/rep");

    scenario.answer("/data/rep[1]/inner1", "5");
    assert_eq!(scenario.value("/data/rep[1]/inner2"), "10");
    assert_eq!(scenario.value("/data/rep[1]/inner3"), "20");

    scenario.answer("/data/rep[2]/inner1", "1");
    assert_eq!(scenario.value("/data/rep[2]/inner2"), "2");
    assert_eq!(scenario.value("/data/rep[2]/inner3"), "4");
    assert_eq!(scenario.value("/data/rep[1]/inner2"), "10");
    assert_eq!(scenario.value("/data/rep[1]/inner3"), "20");
}

#[test]
fn seeded_instances_are_live_after_load() {
    let mut scenario = Scenario::init(&forms::roster_form());
    assert_eq!(
        scenario.instance_references("/data/member"),
        ["/data/member[1]", "/data/member[2]", "/data/member[3]"]
    );
    assert_eq!(scenario.value("/data/member[2]/name"), "Ben");
    assert_eq!(scenario.value("/data/member[3]/position"), "3");
    assert_eq!(scenario.value("/data/total_age"), "116");
    assert_eq!(scenario.value("/data/members"), "3");

    let first = scenario.node("/data/member[1]");
    assert_eq!(scenario.instance().lifecycle(first).unwrap(), Lifecycle::Live);
}

#[test]
fn removal_renumbers_following_instances_and_keeps_their_ids() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let ben = scenario.node("/data/member[2]");
    let cai = scenario.node("/data/member[3]");
    let cai_age = scenario.node("/data/member[3]/age");

    scenario.remove_repeat("/data/member", 1);

    assert_eq!(
        scenario.instance_references("/data/member"),
        ["/data/member[1]", "/data/member[2]"]
    );
    assert_eq!(scenario.node("/data/member[2]"), cai);
    assert_eq!(scenario.node("/data/member[2]/age"), cai_age);
    assert_eq!(scenario.instance().reference(cai_age).unwrap(), "/data/member[2]/age");
    assert_eq!(scenario.value("/data/member[2]/name"), "Cai");
    assert_eq!(scenario.value("/data/member[2]/position"), "2");
    assert_eq!(scenario.value("/data/total_age"), "104");
    assert_eq!(scenario.value("/data/members"), "2");
    assert!(!scenario.exists("/data/member[3]"));

    assert_eq!(
        scenario.instance().lifecycle(ben).unwrap_err(),
        EngineError::UnknownNode(ben)
    );
}

#[test]
fn removed_instance_scopes_are_torn_down() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let before = scenario.instance().stats();

    scenario.remove_repeat("/data/member", 0);
    let after = scenario.instance().stats();
    assert!(after.live_nodes < before.live_nodes);
    assert!(after.live_cells < before.live_cells);
    assert!(after.live_scopes < before.live_scopes);
    assert!(after.mirrored_objects < before.mirrored_objects);

    scenario.add_repeat("/data/member");
    assert_eq!(scenario.instance().stats().live_nodes, before.live_nodes);
    assert_eq!(scenario.instance().stats().live_scopes, before.live_scopes);
}

#[test]
fn insertion_after_an_index_shifts_the_rest() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let ben = scenario.node("/data/member[2]");

    scenario.try_add_repeat("/data/member", Some(0), 1).unwrap();

    assert_eq!(scenario.repeat_count("/data/member"), 4);
    assert_eq!(scenario.node("/data/member[3]"), ben);
    assert_eq!(scenario.value("/data/member[2]/name"), "");
    assert_eq!(scenario.value("/data/member[2]/position"), "2");
    assert_eq!(scenario.value("/data/member[4]/position"), "4");
    assert_eq!(scenario.value("/data/total_age"), "NaN");

    scenario.answer("/data/member[2]/age", "8");
    assert_eq!(scenario.value("/data/total_age"), "124");

    let added = scenario.node("/data/member[2]");
    assert_eq!(scenario.instance().lifecycle(added).unwrap(), Lifecycle::Live);
}

#[test]
fn mutators_return_the_root() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let root = scenario.root();
    assert_eq!(scenario.try_add_repeat("/data/member", None, 2).unwrap(), root);
    assert_eq!(scenario.try_remove_repeat("/data/member", 3, 2).unwrap(), root);
    assert_eq!(scenario.repeat_count("/data/member"), 3);
}

#[test]
fn out_of_range_indices_are_rejected() {
    let mut scenario = Scenario::init(&forms::roster_form());

    assert_eq!(
        scenario.try_remove_repeat("/data/member", 3, 1).unwrap_err(),
        EngineError::RepeatIndexOutOfRange {
            reference: "/data/member".to_owned(),
            index: 3,
            len: 3,
        }
    );
    assert!(matches!(
        scenario.try_remove_repeat("/data/member", 2, 2).unwrap_err(),
        EngineError::RepeatIndexOutOfRange { .. }
    ));
    assert!(matches!(
        scenario.try_add_repeat("/data/member", Some(5), 1).unwrap_err(),
        EngineError::RepeatIndexOutOfRange { index: 5, len: 3, .. }
    ));
    assert!(matches!(
        scenario.try_add_repeat("/data/member", None, 0).unwrap_err(),
        EngineError::EmptyRepeatMutation { .. }
    ));
    assert_eq!(scenario.repeat_count("/data/member"), 3);
}

#[test]
fn repeat_mutation_on_a_leaf_is_a_type_error() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let leaf = scenario.node("/data/total_age");
    let error = scenario.instance().add_instances(leaf, None, 1).unwrap_err();
    assert_eq!(
        error,
        EngineError::WrongNodeType {
            operation: "add_instances",
            found: "leaf",
        }
    );
}

#[test]
fn controlled_repeat_follows_its_count() {
    let mut scenario = Scenario::init(&forms::controlled_repeat_form());
    assert_eq!(scenario.repeat_count("/data/plots"), 2);
    assert_eq!(scenario.value("/data/plots[2]/crop"), "maize");

    scenario.answer("/data/plots[1]/crop", "beans");
    scenario.answer("/data/plot_count", "4");
    assert_eq!(scenario.repeat_count("/data/plots"), 4);
    assert_eq!(scenario.value("/data/plots[1]/crop"), "beans");
    assert_eq!(scenario.value("/data/plots[4]/crop"), "maize");

    scenario.answer("/data/plot_count", "1");
    assert_eq!(scenario.instance_references("/data/plots"), ["/data/plots[1]"]);
    assert_eq!(scenario.value("/data/plots[1]/crop"), "beans");

    scenario.answer("/data/plot_count", "");
    assert_eq!(scenario.repeat_count("/data/plots"), 0);
}

#[test]
fn controlled_repeat_rejects_client_mutation() {
    let mut scenario = Scenario::init(&forms::controlled_repeat_form());
    assert_eq!(
        scenario.try_add_repeat("/data/plots", None, 1).unwrap_err(),
        EngineError::ControlledRange {
            reference: "/data/plots".to_owned(),
        }
    );
    assert!(matches!(
        scenario.try_remove_repeat("/data/plots", 0, 1).unwrap_err(),
        EngineError::ControlledRange { .. }
    ));
}

#[test]
fn controlled_count_is_clamped_to_the_configured_limit() {
    let config = EngineConfig {
        max_repeat_count: 5,
        ..EngineConfig::default()
    };
    let mut scenario =
        Scenario::init_with(&forms::controlled_repeat_form(), PlainFactory, config);
    scenario.answer("/data/plot_count", "1000000000");
    assert_eq!(scenario.repeat_count("/data/plots"), 5);
    assert_eq!(scenario.value("/data/plots[5]/crop"), "maize");

    scenario.answer("/data/plot_count", "3");
    assert_eq!(scenario.repeat_count("/data/plots"), 3);
}

#[test]
fn predicate_over_instances_reads_every_instance() {
    let mut scenario = Scenario::init(&forms::picked_instance_form());
    scenario.add_repeat("/data/rep");
    scenario.add_repeat("/data/rep");
    scenario.add_repeat("/data/rep");

    scenario.answer("/data/rep[1]/x", "3");
    assert_eq!(scenario.value("/data/rep[2]/y"), "3");
    assert_eq!(scenario.value("/data/rep[3]/y"), "3");

    scenario.answer("/data/rep[2]/x", "4");
    scenario.answer("/data/pick", "2");
    assert_eq!(scenario.value("/data/rep[1]/y"), "4");

    scenario.answer("/data/rep[2]/x", "9");
    assert_eq!(scenario.value("/data/rep[1]/y"), "9");
    assert_eq!(scenario.value("/data/rep[3]/y"), "9");
}

#[test]
fn nested_repeats_bind_to_their_enclosing_instances() {
    let mut scenario = Scenario::init(&forms::household_form());
    assert_eq!(scenario.value("/data/household[1]/total"), "30");
    assert_eq!(scenario.value("/data/household[2]/total"), "1");
    assert_eq!(scenario.value("/data/household[1]/person[2]/double"), "40");
    assert_eq!(scenario.value("/data/household[1]/person[2]/tag"), "North-2");
    assert_eq!(scenario.value("/data/household[2]/person[1]/tag"), "South-1");

    scenario.add_repeat("/data/household[2]/person");
    scenario.answer("/data/household[2]/person[2]/age", "4");
    assert_eq!(scenario.value("/data/household[2]/total"), "5");
    assert_eq!(scenario.value("/data/household[2]/person[2]/tag"), "South-2");
    assert_eq!(scenario.value("/data/household[1]/total"), "30");

    let south_age = scenario.node("/data/household[2]/person[1]/age");
    scenario.remove_repeat("/data/household", 0);

    assert!(!scenario.exists("/data/household[2]"));
    assert_eq!(
        scenario.instance_references("/data/household[1]/person"),
        ["/data/household[1]/person[1]", "/data/household[1]/person[2]"]
    );
    assert_eq!(scenario.node("/data/household[1]/person[1]/age"), south_age);
    assert_eq!(scenario.value("/data/household[1]/total"), "5");
    assert_eq!(scenario.value("/data/household[1]/person[1]/tag"), "South-1");

    scenario.answer("/data/household[1]/person[1]/age", "6");
    assert_eq!(scenario.value("/data/household[1]/person[1]/double"), "12");
    assert_eq!(scenario.value("/data/household[1]/total"), "10");
}
