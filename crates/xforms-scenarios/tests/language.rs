//! Translated texts follow the active language.

use xforms_engine::EngineError;
use xforms_scenarios::{Scenario, forms};

#[test]
fn default_language_is_the_first_one() {
    let mut scenario = Scenario::init(&forms::translated_form());
    assert_eq!(scenario.instance().language().as_deref(), Some("en"));
    assert_eq!(scenario.label("/data/name").as_deref(), Some("Name"));
    assert_eq!(scenario.value("/data/greeting"), "Hello");
}

#[test]
fn switching_language_updates_translated_texts() {
    let mut scenario = Scenario::init(&forms::translated_form());
    scenario.set_language("fr");

    assert_eq!(scenario.instance().language().as_deref(), Some("fr"));
    assert_eq!(scenario.label("/data/name").as_deref(), Some("Nom"));
    assert_eq!(scenario.value("/data/greeting"), "Bonjour");

    let name = scenario.node("/data/name");
    assert_eq!(
        scenario.instance().hint(name).unwrap().as_deref(),
        Some("Full name")
    );
}

#[test]
fn unsupported_language_is_rejected() {
    let mut scenario = Scenario::init(&forms::translated_form());
    assert_eq!(
        scenario.instance().set_language("de").unwrap_err(),
        EngineError::UnsupportedLanguage("de".to_owned())
    );
    assert_eq!(scenario.instance().language().as_deref(), Some("en"));
}

#[test]
fn untranslated_form_has_no_language() {
    let mut scenario = Scenario::init(&forms::doubling_form());
    assert_eq!(scenario.instance().language(), None);
}
