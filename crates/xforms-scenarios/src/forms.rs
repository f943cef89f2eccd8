//! Form definitions shared by the scenario tests.

use xforms_engine::{ActionDefinition, FormDefinition, NodeDefinition, Seed, SeedValue, ValueType};

/// `/data/a` (int) and `/data/b = ../a * 2`.
pub fn doubling_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("a").value_type(ValueType::Int))
            .child(NodeDefinition::leaf("b").calculate("../a * 2")),
    )
    .title("Doubling")
}

/// `/data/detail` and the `/data/section` group are relevant only while
/// `/data/toggle` is `yes`.
pub fn relevance_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("toggle").default_value("no"))
            .child(NodeDefinition::leaf("detail").relevant("/data/toggle = 'yes'"))
            .child(
                NodeDefinition::group("section")
                    .relevant("../toggle = 'yes'")
                    .child(NodeDefinition::leaf("inside").default_value("kept"))
                    .child(NodeDefinition::leaf("echo").calculate("concat('[', ../inside, ']')")),
            )
            .child(NodeDefinition::leaf("length").calculate("string-length(/data/detail)")),
    )
    .title("Relevance")
}

/// A repeat whose instances chain two calculations off `inner1`.
pub fn nested_calculation_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data").child(
            NodeDefinition::repeat("rep")
                .child(NodeDefinition::leaf("inner1").value_type(ValueType::Int))
                .child(NodeDefinition::leaf("inner2").calculate("2*../inner1"))
                .child(NodeDefinition::leaf("inner3").calculate("2*../inner2")),
        ),
    )
    .title("Nested calculation")
}

/// A household roster seeded with three members, a position calculation per
/// member and a total over all of them.
pub fn roster_form() -> FormDefinition {
    let member = |name: &str, age: &str| {
        Seed::from([
            ("name".to_owned(), SeedValue::Value(name.to_owned())),
            ("age".to_owned(), SeedValue::Value(age.to_owned())),
        ])
    };
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(
                NodeDefinition::repeat("member")
                    .seed(member("Ana", "34"))
                    .seed(member("Ben", "12"))
                    .seed(member("Cai", "70"))
                    .child(NodeDefinition::leaf("name"))
                    .child(NodeDefinition::leaf("age").value_type(ValueType::Int))
                    .child(NodeDefinition::leaf("position").calculate("position(..)")),
            )
            .child(NodeDefinition::leaf("total_age").calculate("sum(/data/member/age)"))
            .child(NodeDefinition::leaf("members").calculate("count(/data/member)")),
    )
    .title("Roster")
}

/// `/data/plots` is sized by `/data/plot_count`.
pub fn controlled_repeat_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(
                NodeDefinition::leaf("plot_count")
                    .value_type(ValueType::Int)
                    .default_value("2"),
            )
            .child(
                NodeDefinition::repeat("plots")
                    .count("/data/plot_count")
                    .child(NodeDefinition::leaf("crop").default_value("maize")),
            ),
    )
    .title("Plots")
}

/// Readonly on a group and on a leaf inside it.
pub fn readonly_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("lock").default_value("no"))
            .child(
                NodeDefinition::group("locked")
                    .readonly("/data/lock = 'yes'")
                    .child(NodeDefinition::leaf("free"))
                    .child(NodeDefinition::leaf("always").readonly("true()")),
            ),
    )
    .title("Readonly")
}

/// Required and constrained leaves, one of them behind a relevance switch.
pub fn validation_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("name").required("true()"))
            .child(
                NodeDefinition::leaf("age")
                    .value_type(ValueType::Int)
                    .constraint(". >= 0 and . < 130")
                    .constraint_message("Age must be between 0 and 129."),
            )
            .child(NodeDefinition::leaf("consent").default_value("yes"))
            .child(
                NodeDefinition::group("contact")
                    .relevant("/data/consent = 'yes'")
                    .child(
                        NodeDefinition::leaf("phone")
                            .required("true()")
                            .required_message("A phone number is needed."),
                    ),
            ),
    )
    .title("Validation")
}

/// Labels that follow the active language.
pub fn translated_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("name").label_ref("name-label").hint("Full name"))
            .child(NodeDefinition::leaf("greeting").calculate("jr:itext('hello')")),
    )
    .title("Languages")
    .language("en")
    .language("fr")
    .translation("en", "name-label", "Name")
    .translation("fr", "name-label", "Nom")
    .translation("en", "hello", "Hello")
    .translation("fr", "hello", "Bonjour")
}

/// Every supported action event.
pub fn actions_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("started"))
            .child(NodeDefinition::leaf("source"))
            .child(NodeDefinition::leaf("copy"))
            .child(
                NodeDefinition::repeat("item")
                    .seed(Seed::from([(
                        "label".to_owned(),
                        SeedValue::Value("seeded".to_owned()),
                    )]))
                    .child(NodeDefinition::leaf("label"))
                    .child(NodeDefinition::leaf("index")),
            ),
    )
    .title("Actions")
    .action(ActionDefinition::new("odk-instance-first-load", "/data/started").value("'yes'"))
    .action(
        ActionDefinition::new("xforms-value-changed", "/data/copy")
            .value("concat(/data/source, '!')")
            .observe("/data/source"),
    )
    .action(ActionDefinition::new("odk-new-repeat", "/data/item/index").value("position(..)"))
}

/// A repeat whose instances each sum the `x` of the instance picked by
/// `/data/pick`.
pub fn picked_instance_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(
                NodeDefinition::leaf("pick")
                    .value_type(ValueType::Int)
                    .default_value("1"),
            )
            .child(
                NodeDefinition::repeat("rep")
                    .child(NodeDefinition::leaf("x").value_type(ValueType::Int))
                    .child(
                        NodeDefinition::leaf("y")
                            .calculate("sum(/data/rep[position() = /data/pick]/x)"),
                    ),
            ),
    )
    .title("Picked instance")
}

/// Price lookup through a predicate over item names.
pub fn price_lookup_form() -> FormDefinition {
    let item = |name: &str, price: &str| {
        Seed::from([
            ("name".to_owned(), SeedValue::Value(name.to_owned())),
            ("price".to_owned(), SeedValue::Value(price.to_owned())),
        ])
    };
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("sel").default_value("b"))
            .child(
                NodeDefinition::repeat("item")
                    .seed(item("a", "5"))
                    .seed(item("c", "7"))
                    .child(NodeDefinition::leaf("name"))
                    .child(NodeDefinition::leaf("price").value_type(ValueType::Int)),
            )
            .child(
                NodeDefinition::leaf("chosen")
                    .calculate("sum(/data/item[name = /data/sel]/price)"),
            ),
    )
    .title("Price lookup")
}

/// A calculation over the string-value of a group holding leaves and a
/// repeat.
pub fn group_text_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(
                NodeDefinition::group("g")
                    .child(NodeDefinition::leaf("a"))
                    .child(NodeDefinition::leaf("b"))
                    .child(
                        NodeDefinition::repeat("tag")
                            .child(NodeDefinition::leaf("t").default_value("x")),
                    ),
            )
            .child(NodeDefinition::leaf("len").calculate("string-length(/data/g)")),
    )
    .title("Group text")
}

/// Binds reading `/data/missing`, which the form does not define.
pub fn missing_reference_form() -> FormDefinition {
    FormDefinition::new(
        NodeDefinition::group("data")
            .child(NodeDefinition::leaf("a"))
            .child(NodeDefinition::leaf("echo").calculate("concat(../a, '|', /data/missing)"))
            .child(NodeDefinition::leaf("shown").relevant("not(/data/missing)")),
    )
    .title("Missing reference")
}

/// Households seeded with their members, a total per household and a tag
/// per member naming its household.
pub fn household_form() -> FormDefinition {
    let person = |age: &str| Seed::from([("age".to_owned(), SeedValue::Value(age.to_owned()))]);
    let household = |name: &str, people: Vec<Seed>| {
        Seed::from([
            ("name".to_owned(), SeedValue::Value(name.to_owned())),
            ("person".to_owned(), SeedValue::Repeat(people)),
        ])
    };
    FormDefinition::new(
        NodeDefinition::group("data").child(
            NodeDefinition::repeat("household")
                .seed(household("North", vec![person("10"), person("20")]))
                .seed(household("South", vec![person("1")]))
                .child(NodeDefinition::leaf("name"))
                .child(
                    NodeDefinition::repeat("person")
                        .child(NodeDefinition::leaf("age").value_type(ValueType::Int))
                        .child(NodeDefinition::leaf("double").calculate("../age * 2"))
                        .child(
                            NodeDefinition::leaf("tag")
                                .calculate("concat(/data/household/name, '-', position(..))"),
                        ),
                )
                .child(NodeDefinition::leaf("total").calculate("sum(../person/age)")),
        ),
    )
    .title("Households")
}
