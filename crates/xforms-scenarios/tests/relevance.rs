//! Non-relevant nodes blank their values and restore them when relevance
//! comes back.

use xforms_scenarios::{Scenario, forms};

#[test]
fn relevance_follows_its_expression() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    assert!(!scenario.relevant("/data/detail"));
    assert!(!scenario.relevant("/data/section"));

    scenario.answer("/data/toggle", "yes");
    assert!(scenario.relevant("/data/detail"));
    assert!(scenario.relevant("/data/section"));
}

#[test]
fn blanking_and_restoration_round_trip() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    scenario.answer("/data/toggle", "yes");
    scenario.answer("/data/detail", "abc");
    assert_eq!(scenario.value("/data/length"), "3");

    scenario.answer("/data/toggle", "no");
    assert_eq!(scenario.value("/data/detail"), "");
    assert_eq!(scenario.value("/data/length"), "0");

    scenario.answer("/data/toggle", "yes");
    assert_eq!(scenario.value("/data/detail"), "abc");
    assert_eq!(scenario.value("/data/length"), "3");
}

#[test]
fn group_relevance_is_inherited() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    assert!(!scenario.relevant("/data/section/inside"));
    assert_eq!(scenario.value("/data/section/inside"), "");

    scenario.answer("/data/toggle", "yes");
    assert!(scenario.relevant("/data/section/inside"));
    assert_eq!(scenario.value("/data/section/inside"), "kept");
}

#[test]
fn calculations_wait_for_relevance() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    assert_eq!(scenario.value("/data/section/echo"), "");

    scenario.answer("/data/toggle", "yes");
    assert_eq!(scenario.value("/data/section/echo"), "[kept]");

    scenario.answer("/data/toggle", "no");
    scenario.answer("/data/toggle", "yes");
    assert_eq!(scenario.value("/data/section/echo"), "[kept]");
}

#[test]
fn calculation_keeps_client_override_when_relevance_returns() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    scenario.answer("/data/toggle", "yes");
    scenario.answer("/data/section/echo", "edited");

    scenario.answer("/data/toggle", "no");
    scenario.answer("/data/toggle", "yes");
    assert_eq!(scenario.value("/data/section/echo"), "edited");
}
