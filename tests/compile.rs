mod helpers;

use dry::{Context, Engine, ErrorKind, ErrorMode, Options, Parsed, Tag, TagParser, Value};
use serde_json::json;

use crate::helpers::render;

#[test]
fn template_name_and_source() {
    let engine = Engine::new();
    let template = engine.parse_named("page", "Hi {{ name }}").unwrap();
    assert_eq!(template.name(), Some("page"));
    assert_eq!(template.source(), "Hi {{ name }}");

    let template = engine.parse("x").unwrap();
    assert_eq!(template.name(), None);
}

#[test]
fn get_and_remove_template() {
    let mut engine = Engine::new();
    engine.add_template("a", "A").unwrap();
    assert!(engine.get_template("a").is_some());
    assert!(engine.get_template("b").is_none());
    engine.remove_template("a");
    assert!(engine.get_template("a").is_none());
}

#[test]
fn add_template_reports_syntax_errors() {
    let mut engine = Engine::new();
    let err = engine.add_template("bad", "{% if %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.template_name(), Some("bad"));
}

#[test]
fn pretty_syntax_error() {
    let err = Engine::new().parse("lorem {% foo %}").unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "
   |
 1 | lorem {% foo %}
   |          ^^^ Unknown tag 'foo'
"
    );
}

#[test]
fn unterminated_tags() {
    let engine = Engine::new();
    let err = engine.parse("{{ a ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    let err = engine.parse("{% if a %}x").unwrap_err();
    assert_eq!(err.message(), "'if' tag was never closed");
}

#[test]
fn lax_mode_collects_nothing() {
    let engine = Engine::new();
    let template = engine.parse("{{ a b }}").unwrap();
    assert!(template.warnings().is_empty());
}

#[test]
fn warn_mode_collects_warnings() {
    let engine = Engine::with_options(Options::builder().error_mode(ErrorMode::Warn).build());
    let template = engine.parse("{{ a b }}{{ c }}").unwrap();
    assert_eq!(template.warnings().len(), 1);
    assert_eq!(
        template.warnings()[0].message(),
        "Expected end_of_string but found id"
    );
}

#[test]
fn whitespace_control() {
    let engine = Engine::new();
    let data = json!({ "a": 1 });
    assert_eq!(render(&engine, "x  {{- a -}}  y", data.clone()), "x1y");
    assert_eq!(render(&engine, "x\n  {%- if true -%}\n  y\n{%- endif %}", data.clone()), "xy");
    assert_eq!(render(&engine, "[ {{ a }} ]", data), "[ 1 ]");
}

#[test]
fn inline_comment() {
    let engine = Engine::new();
    assert_eq!(render(&engine, "a{% # note %}b", json!({})), "ab");
    assert_eq!(
        render(&engine, "a{% comment %}{{ x }}{% if %}{% endcomment %}b", json!({})),
        "ab"
    );
}

#[test]
fn raw_keeps_markup() {
    let engine = Engine::new();
    assert_eq!(
        render(&engine, "{% raw %}{{ x }}{% if %}{% endraw %}", json!({})),
        "{{ x }}{% if %}"
    );
}

struct Repeat {
    text: String,
    times: usize,
}

impl Tag for Repeat {
    fn render(&self, _: &mut Context<'_>, out: &mut String) -> dry::Result<()> {
        for _ in 0..self.times {
            out.push_str(&self.text);
        }
        Ok(())
    }
}

fn parse_repeat(tag: &mut TagParser<'_, '_>) -> dry::Result<Parsed> {
    let text = tag.markup().name()?;
    let times = tag.markup().expr()?;
    tag.markup().finish()?;
    let times = match times {
        dry::ast::Expr::Literal(Value::Integer(n)) => n.max(0) as usize,
        _ => 1,
    };
    Ok(Parsed::Tag(Box::new(Repeat { text, times })))
}

#[test]
fn custom_tag() {
    let mut engine = Engine::new();
    engine.add_tag("repeat", parse_repeat);
    assert_eq!(render(&engine, "{% repeat ab 3 %}!", json!({})), "ababab!");
}

#[test]
fn custom_tag_replaces_builtin() {
    let mut engine = Engine::new();
    engine.add_tag("echo", |_: &mut TagParser<'_, '_>| -> dry::Result<Parsed> {
        Ok(Parsed::Nothing)
    });
    assert_eq!(render(&engine, "a{% echo 'x' %}b", json!({})), "ab");
}

#[test]
fn custom_verbatim_tag() {
    let mut engine = Engine::new();
    engine.add_tag("verbatim", |_: &mut TagParser<'_, '_>| -> dry::Result<Parsed> {
        Ok(Parsed::Verbatim { keep: true })
    });
    assert_eq!(
        render(&engine, "{% verbatim %}{{ a }}{% endverbatim %}", json!({ "a": 1 })),
        "{{ a }}"
    );
}

#[test]
fn custom_tag_errors_have_markup() {
    let mut engine = Engine::new();
    engine.add_tag("repeat", parse_repeat);
    let err = engine.parse("{% repeat %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.to_string().ends_with(" in \"{% repeat %}\""), "{err}");
}
