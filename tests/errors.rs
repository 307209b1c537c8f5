mod helpers;

use std::sync::{Arc, Barrier};
use std::thread;

use dry::{Engine, ErrorKind, ErrorMode, Options, Value};
use serde_json::json;

use crate::helpers::render;

#[test]
fn undefined_variable_is_written_inline() {
    let engine = Engine::new();
    let template = engine.parse("a{{ x }}b").unwrap();

    let result = template.render(json!({})).to_string().unwrap();
    assert_eq!(result, "ab");

    let result = template
        .render(json!({}))
        .strict_variables(true)
        .to_string()
        .unwrap();
    assert_eq!(result, "aDry error (line 1): undefined variable xb");

    let err = template
        .render_strict(json!({}))
        .strict_variables(true)
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UndefinedVariable);
    assert!(err.is_recoverable());
}

#[test]
fn undefined_member_with_strict_variables() {
    let engine = Engine::new();
    let result = engine
        .parse("{{ a.b }}")
        .unwrap()
        .render(json!({ "a": {} }))
        .strict_variables(true)
        .to_string()
        .unwrap();
    assert_eq!(result, "Dry error (line 1): undefined variable b");
}

#[test]
fn undefined_filter() {
    let engine = Engine::new();
    let template = engine.parse("{{ 1 | nope }}").unwrap();
    assert_eq!(template.render(json!({})).to_string().unwrap(), "1");
    let result = template
        .render(json!({}))
        .strict_filters(true)
        .to_string()
        .unwrap();
    assert_eq!(result, "Dry error (line 1): undefined filter nope");
}

#[test]
fn lax_undefined_are_collected_as_warnings() {
    let engine = Engine::new();
    let template = engine
        .parse_named("page", "a{{ missing }}{{ 1 | nope }}b")
        .unwrap();

    let mut warnings = Vec::new();
    let result = template
        .render(json!({}))
        .warnings(&mut warnings)
        .to_string()
        .unwrap();
    assert_eq!(result, "a1b");
    let kinds: Vec<_> = warnings.iter().map(|w| w.kind()).collect();
    assert_eq!(kinds, [ErrorKind::UndefinedVariable, ErrorKind::UndefinedFilter]);
    assert_eq!(warnings[0].message(), "undefined variable missing");
    assert_eq!(warnings[0].template_name(), Some("page"));
    assert_eq!(warnings[1].message(), "undefined filter nope");

    let mut warnings = Vec::new();
    let result = template
        .render(json!({}))
        .strict_variables(true)
        .warnings(&mut warnings)
        .to_string()
        .unwrap();
    assert_eq!(
        result,
        "aDry error (page line 1): undefined variable missing1b"
    );
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind(), ErrorKind::UndefinedFilter);
}

#[test]
fn strict_options_on_the_engine() {
    let engine = Engine::with_options(
        Options::builder()
            .strict_variables(true)
            .strict_filters(true)
            .build(),
    );
    let err = engine
        .parse("{{ x | nope }}")
        .unwrap()
        .render_strict(json!({ "x": 1 }))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UndefinedFilter);
}

#[test]
fn argument_error_has_template_name_and_line() {
    let engine = Engine::new();
    let result = engine
        .parse_named("page", "line1\n{{ 'a' | plus: list }}")
        .unwrap()
        .render(json!({ "list": [1] }))
        .to_string()
        .unwrap();
    assert_eq!(result, "line1\nDry error (page line 2): invalid number Array");
}

#[test]
fn argument_error_without_line_numbers() {
    let engine = Engine::with_options(Options::builder().line_numbers(false).build());
    let result = render(&engine, "{{ 'a' | plus: list }}", json!({ "list": [1] }));
    assert_eq!(result, "Dry error: invalid number Array");
}

#[test]
fn errors_in_blank_tags_are_not_written() {
    let engine = Engine::new();
    let template = engine
        .parse("{% assign x = 'a' | plus: list %}ok")
        .unwrap();
    let data = json!({ "list": [1] });
    assert_eq!(template.render(&data).to_string().unwrap(), "ok");
    let err = template.render_strict(&data).to_string().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(err.message(), "invalid number Array");
}

#[test]
fn filter_arity_error() {
    let result = render(&Engine::new(), "{{ 'a' | append }}", json!({}));
    assert_eq!(
        result,
        "Dry error (line 1): wrong number of arguments (given 0, expected 1)"
    );
}

#[test]
fn comparison_error() {
    let result = render(
        &Engine::new(),
        "{% if 'a' > 1 %}x{% endif %}",
        json!({}),
    );
    assert_eq!(result, "Dry error (line 1): comparison of String with 1 failed");
}

#[test]
fn invalid_loop_limit() {
    let result = render(
        &Engine::new(),
        "{% for i in (1..3) limit: 'x' %}{{ i }}{% endfor %}",
        json!({}),
    );
    assert_eq!(result, "Dry error (line 1): invalid integer");
}

#[test]
fn undefined_macro() {
    let engine = Engine::new();
    assert_eq!(
        render(&engine, "{% call nope() %}", json!({})),
        "Dry error (line 1): undefined macro nope"
    );
    assert_eq!(
        render(
            &engine,
            "{% macro m(a) %}{% endmacro %}{% call m(1, 2) %}",
            json!({})
        ),
        "Dry error (line 1): wrong number of arguments (given 2, expected 1)"
    );
}

#[test]
fn syntax_errors() {
    let engine = Engine::new();
    let cases = [
        ("{% foo %}", "Unknown tag 'foo'"),
        ("\n{% if x %}", "'if' tag was never closed"),
        ("{% if x %}{% endfor %}", "'endfor' is not a valid delimiter for if tags. use endif"),
        ("{% endif %}", "Unexpected outer 'endif' tag"),
        ("{% else %}", "Unexpected outer 'else' tag"),
        ("{% if a %}{% else %}{% elsif b %}{% endif %}", "Unexpected 'elsif' tag after 'else'"),
        ("{% case x %}{% endcase %}", "'case' tag requires at least one 'when' tag"),
        ("{% case x %}{% else %}{% endcase %}", "Unexpected 'else' tag before any 'when' tag"),
        (
            "{% block a %}{% endblock %}{% block a %}{% endblock %}",
            "Block 'a' is already defined",
        ),
        (
            "{% extends 'a' %}{% layout 'b' %}",
            "A template can only extend or use a layout once",
        ),
        (
            "{% cycle %}",
            "Syntax Error in 'cycle' - Valid syntax: cycle [name :] var [, var2, var3 ...]",
        ),
    ];
    for (source, msg) in cases {
        let err = engine.parse(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax, "{source}");
        assert_eq!(err.message(), msg, "{source}");
    }
}

#[test]
fn syntax_error_display() {
    let engine = Engine::new();
    let err = engine.parse("\n{% if x %}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Dry syntax error (line 2): 'if' tag was never closed"
    );
    let err = engine.parse_named("page", "{% foo %}").unwrap_err();
    assert_eq!(err.template_name(), Some("page"));
    assert_eq!(err.line(), Some(1));
    assert_eq!(
        err.to_string(),
        "Dry syntax error (page line 1): Unknown tag 'foo'"
    );
}

#[test]
fn error_modes() {
    let source = "{{ a b }}";
    let data = json!({ "a": 1 });

    let engine = Engine::new();
    assert_eq!(render(&engine, source, data.clone()), "1");

    let engine = Engine::with_options(Options::builder().error_mode(ErrorMode::Warn).build());
    let template = engine.parse(source).unwrap();
    assert_eq!(template.warnings().len(), 1);
    assert_eq!(template.warnings()[0].kind(), ErrorKind::Syntax);
    assert_eq!(template.render(&data).to_string().unwrap(), "1");

    let engine = Engine::with_options(Options::builder().error_mode(ErrorMode::Strict).build());
    let err = engine.parse(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "Expected end_of_string but found id");
}

#[test]
fn missing_include_is_fatal() {
    let engine = Engine::new();
    let err = engine
        .parse(r#"a{% include "nope" %}b"#)
        .unwrap()
        .render(json!({}))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileSystem);
}

#[test]
fn template_busy() {
    let barrier = Arc::new(Barrier::new(2));
    let mut engine = Engine::new();
    let b = barrier.clone();
    engine.add_filter("wait", move |v: Value| {
        b.wait();
        b.wait();
        v
    });
    let template = engine.parse("{{ 'done' | wait }}").unwrap();

    thread::scope(|s| {
        let handle = s.spawn(|| template.render_from(&Value::None).to_string());
        barrier.wait();
        let err = template.render_from(&Value::None).to_string().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateBusy);
        barrier.wait();
        assert_eq!(handle.join().unwrap().unwrap(), "done");
    });

    // The guard is released afterwards.
    assert!(engine
        .parse("{{ 1 }}")
        .unwrap()
        .render_from(&Value::None)
        .to_string()
        .is_ok());
}

#[test]
fn error_is_std_error() {
    let err = Engine::new().parse("{% foo %}").unwrap_err();
    let err: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    assert!(err.to_string().contains("Unknown tag 'foo'"));
}
