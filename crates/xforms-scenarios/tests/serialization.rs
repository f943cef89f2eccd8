//! Instance XML and state snapshots.

use xforms_engine::NodeType;
use xforms_scenarios::{Scenario, forms};

#[test]
fn instance_xml_omits_non_relevant_nodes() {
    let mut scenario = Scenario::init(&forms::relevance_form());
    assert_eq!(
        scenario.instance().instance_xml().unwrap(),
        "<data><toggle>no</toggle><length>0</length></data>"
    );

    scenario.answer("/data/toggle", "yes");
    assert_eq!(
        scenario.instance().instance_xml().unwrap(),
        "<data><toggle>yes</toggle><detail/><section><inside>kept</inside>\
         <echo>[kept]</echo></section><length>0</length></data>"
    );
}

#[test]
fn repeat_instances_serialize_as_siblings() {
    let mut scenario = Scenario::init(&forms::roster_form());
    scenario.remove_repeat("/data/member", 1);
    scenario.answer("/data/member[1]/name", "Ana & Co");
    assert_eq!(
        scenario.instance().instance_xml().unwrap(),
        "<data>\
         <member><name>Ana &amp; Co</name><age>34</age><position>1</position></member>\
         <member><name>Cai</name><age>70</age><position>2</position></member>\
         <total_age>104</total_age><members>2</members>\
         </data>"
    );
}

#[test]
fn snapshot_mirrors_the_tree() {
    let mut scenario = Scenario::init(&forms::roster_form());
    let snapshot = scenario.instance().snapshot().unwrap();
    assert_eq!(snapshot.node_type, NodeType::Root);
    assert_eq!(snapshot.reference, "/data");

    let range = &snapshot.children[0];
    assert_eq!(range.node_type, NodeType::RepeatRange);
    assert_eq!(range.children.len(), 3);
    let age = &range.children[1].children[1];
    assert_eq!(age.reference, "/data/member[2]/age");
    assert_eq!(age.value.as_deref(), Some("12"));
    assert!(age.violation.is_none());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["children"][1]["name"], "total_age");
    assert_eq!(json["children"][1]["value"], "116");
    assert_eq!(json["node_type"], "root");
}
