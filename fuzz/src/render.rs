#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use dry::Options;
use libfuzzer_sys::fuzz_target;
use serde::Serialize;

#[derive(Debug, Serialize, Arbitrary)]
enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

fuzz_target!(|data: (&str, Vec<(&str, &str)>, Value)| {
    let (root, partials, value) = data;
    let options = Options::builder()
        .render_length_limit(1 << 16)
        .render_score_limit(1 << 16)
        .assign_score_limit(1 << 16)
        .build();
    let mut engine = dry::Engine::with_options(options);
    engine.set_max_include_depth(8);
    if engine.add_template("fuzz", root).is_err() {
        return;
    }
    for (name, source) in partials {
        let _ = engine.add_template(name, source);
    }
    let Some(template) = engine.get_template("fuzz") else {
        return;
    };
    let _ = template.render(&value).to_string();
});
