mod helpers;

use std::thread;

use dry::{Engine, Registers, Value};
use serde_json::json;

use crate::helpers::{render, Writer};

#[test]
fn render_output_lookups() {
    let result = render(
        &Engine::new(),
        "{{ a }}|{{ b.c }}|{{ d[0] }}|{{ d[-1] }}|{{ d.size }}|{{ d.first }}|{{ b['c'] }}",
        json!({ "a": "x", "b": { "c": 1 }, "d": [1, 2, 3] }),
    );
    assert_eq!(result, "x|1|1|3|3|1|1");
}

#[test]
fn render_output_literals() {
    let result = render(
        &Engine::new(),
        "{{ nil }}{{ true }} {{ 1.0 }} {{ 'a' }} {{ (1..3) }}",
        json!({}),
    );
    assert_eq!(result, "true 1.0 a 123");
}

#[test]
fn render_output_dynamic_key() {
    let result = render(
        &Engine::new(),
        "{{ h[k] }} {{ [k] }}",
        json!({ "h": { "x": "found" }, "k": "x", "x": "root" }),
    );
    assert_eq!(result, "found root");
}

#[test]
fn render_output_missing_variable_is_empty() {
    let result = render(&Engine::new(), "[{{ missing.x }}][{{ a.b.c }}]", json!({ "a": 1 }));
    assert_eq!(result, "[][]");
}

#[test]
fn render_output_map_inspect() {
    let result = render(&Engine::new(), "{{ h }}", json!({ "h": { "a": [1, "b"] } }));
    assert_eq!(result, r#"{"a"=>[1, "b"]}"#);
}

#[test]
fn render_if_elsif_else() {
    let engine = Engine::new();
    let source = "{% if a > 2 %}big{% elsif a == 2 %}two{% else %}small{% endif %}";
    assert_eq!(render(&engine, source, json!({ "a": 5 })), "big");
    assert_eq!(render(&engine, source, json!({ "a": 2 })), "two");
    assert_eq!(render(&engine, source, json!({ "a": 0 })), "small");
}

#[test]
fn render_unless() {
    let engine = Engine::new();
    let source = "{% unless x %}no{% else %}yes{% endunless %}";
    assert_eq!(render(&engine, source, json!({ "x": false })), "no");
    assert_eq!(render(&engine, source, json!({ "x": 0 })), "yes");
}

#[test]
fn render_condition_chain_is_right_associative() {
    let engine = Engine::new();
    let result = render(
        &engine,
        "{% if true or false and false %}y{% else %}n{% endif %}",
        json!({}),
    );
    assert_eq!(result, "y");
    let result = render(
        &engine,
        "{% if false and false or true %}y{% else %}n{% endif %}",
        json!({}),
    );
    assert_eq!(result, "n");
}

#[test]
fn render_condition_contains() {
    let result = render(
        &Engine::new(),
        "{% if 'hello' contains 'ell' %}a{% endif %}\
         {% if list contains 2 %}b{% endif %}\
         {% if h contains 'k' %}c{% endif %}\
         {% if missing contains 'k' %}d{% endif %}",
        json!({ "list": [1, 2], "h": { "k": 1 } }),
    );
    assert_eq!(result, "abc");
}

#[test]
fn render_condition_empty_and_blank() {
    let result = render(
        &Engine::new(),
        "{% if s == empty %}e{% endif %}\
         {% if w == blank %}b{% endif %}\
         {% if l != empty %}l{% endif %}\
         {% if nothing == blank %}n{% endif %}",
        json!({ "s": "", "w": "  ", "l": [1] }),
    );
    assert_eq!(result, "ebln");
}

#[test]
fn render_condition_nil_comparison_is_false() {
    let result = render(
        &Engine::new(),
        "{% if missing > 1 %}y{% else %}n{% endif %}",
        json!({}),
    );
    assert_eq!(result, "n");
}

#[test]
fn render_case() {
    let engine = Engine::new();
    let source = "{% case x %}{% when 1, 2 %}low{% when 3 or 4 %}mid{% else %}high{% endcase %}";
    assert_eq!(render(&engine, source, json!({ "x": 2 })), "low");
    assert_eq!(render(&engine, source, json!({ "x": 4 })), "mid");
    assert_eq!(render(&engine, source, json!({ "x": 9 })), "high");
}

#[test]
fn render_case_first_match_wins() {
    let result = render(
        &Engine::new(),
        "{% case x %}{% when 'a' %}first{% when 'a' %}second{% endcase %}",
        json!({ "x": "a" }),
    );
    assert_eq!(result, "first");
}

#[test]
fn render_for_loop_object() {
    let result = render(
        &Engine::new(),
        "{% for i in list %}{{ forloop.index }}:{{ i }}{% unless forloop.last %},{% endunless %}{% endfor %}",
        json!({ "list": ["a", "b", "c"] }),
    );
    assert_eq!(result, "1:a,2:b,3:c");
}

#[test]
fn render_for_loop_rindex_and_length() {
    let result = render(
        &Engine::new(),
        "{% for i in (1..3) %}{{ forloop.rindex0 }}/{{ forloop.length }} {% endfor %}",
        json!({}),
    );
    assert_eq!(result, "2/3 1/3 0/3 ");
}

#[test]
fn render_for_offset_limit_reversed() {
    let engine = Engine::new();
    assert_eq!(
        render(&engine, "{% for i in (1..10) offset:2 limit:3 %}{{ i }}{% endfor %}", json!({})),
        "345"
    );
    assert_eq!(
        render(&engine, "{% for i in (1..3) reversed %}{{ i }}{% endfor %}", json!({})),
        "321"
    );
    assert_eq!(
        render(&engine, "{% for i in (1..10) reversed limit:2 %}{{ i }}{% endfor %}", json!({})),
        "21"
    );
    assert_eq!(
        render(
            &engine,
            "{% for i in list limit: n %}{{ i }}{% endfor %}",
            json!({ "list": [1, 2, 3], "n": "2" })
        ),
        "12"
    );
}

#[test]
fn render_for_reversed_range_longer_than_usize() {
    let engine = Engine::new();
    let result = render(
        &engine,
        "{% for i in (a..b) reversed %}{{ i }},{% if forloop.index == 2 %}{% break %}{% endif %}{% endfor %}",
        json!({ "a": i64::MIN, "b": i64::MAX }),
    );
    assert_eq!(result, "9223372036854775807,9223372036854775806,");
}

#[test]
fn render_for_else() {
    let engine = Engine::new();
    let source = "{% for i in list %}x{% else %}none{% endfor %}";
    assert_eq!(render(&engine, source, json!({ "list": [] })), "none");
    assert_eq!(render(&engine, source, json!({})), "none");
    assert_eq!(render(&engine, source, json!({ "list": [1] })), "x");
}

#[test]
fn render_for_break_and_continue() {
    let result = render(
        &Engine::new(),
        "{% for i in (1..5) %}\
         {% if i == 2 %}{% continue %}{% endif %}\
         {% if i == 4 %}{% break %}{% endif %}\
         {{ i }}\
         {% endfor %}",
        json!({}),
    );
    assert_eq!(result, "13");
}

#[test]
fn render_for_break_only_leaves_inner_loop() {
    let result = render(
        &Engine::new(),
        "{% for a in (1..2) %}{% for b in (1..3) %}{% if b == 2 %}{% break %}{% endif %}{{ a }}{{ b }} {% endfor %}{% endfor %}",
        json!({}),
    );
    assert_eq!(result, "11 21 ");
}

#[test]
fn render_for_parentloop() {
    let result = render(
        &Engine::new(),
        "{% for a in (1..2) %}{% for b in (1..2) %}{{ forloop.parentloop.index }}{{ b }} {% endfor %}{% endfor %}",
        json!({}),
    );
    assert_eq!(result, "11 12 21 22 ");
}

#[test]
fn render_for_offset_continue() {
    let result = render(
        &Engine::new(),
        "{% for i in list limit:2 %}{{ i }}{% endfor %};\
         {% for i in list offset:continue limit:2 %}{{ i }}{% endfor %};\
         {% for i in list offset:continue %}{{ i }}{% endfor %}",
        json!({ "list": [1, 2, 3, 4, 5] }),
    );
    assert_eq!(result, "12;34;5");
}

#[test]
fn render_for_offset_continue_across_renders() {
    let engine = Engine::new();
    let template = engine
        .parse("{% for i in (1..5) offset:continue limit:2 %}{{ i }}{% endfor %}")
        .unwrap();
    let mut registers = Registers::new();
    let mut pages = Vec::new();
    for _ in 0..3 {
        pages.push(
            template
                .render_from(&Value::None)
                .registers(&mut registers)
                .to_string()
                .unwrap(),
        );
    }
    assert_eq!(pages, ["12", "34", "5"]);
    assert_eq!(registers.for_offset("i-(1..5)"), 5);
}

#[test]
fn render_for_over_map() {
    let result = render(
        &Engine::new(),
        "{% for pair in h %}{{ pair[0] }}={{ pair[1] }};{% endfor %}",
        json!({ "h": { "b": 2, "a": 1 } }),
    );
    assert_eq!(result, "a=1;b=2;");
}

#[test]
fn render_for_variable_does_not_leak() {
    let result = render(
        &Engine::new(),
        "{% for i in (1..2) %}{% endfor %}[{{ i }}]",
        json!({}),
    );
    assert_eq!(result, "[]");
}

#[test]
fn render_assign_and_capture() {
    let result = render(
        &Engine::new(),
        "{% assign x = 'hi' | upcase %}{% capture y %}{{ x }}!{% endcapture %}{{ y }}{{ y }}",
        json!({}),
    );
    assert_eq!(result, "HI!HI!");
}

#[test]
fn render_assign_in_loop_is_visible_after() {
    let result = render(
        &Engine::new(),
        "{% for i in (1..3) %}{% assign last = i %}{% endfor %}{{ last }}",
        json!({}),
    );
    assert_eq!(result, "3");
}

#[test]
fn render_assign_shadows_data() {
    let result = render(
        &Engine::new(),
        "{{ x }}{% assign x = 2 %}{{ x }}",
        json!({ "x": 1 }),
    );
    assert_eq!(result, "12");
}

#[test]
fn render_increment_and_decrement() {
    let engine = Engine::new();
    assert_eq!(
        render(
            &engine,
            "{% increment c %}{% increment c %}{% decrement d %}{% decrement d %}",
            json!({})
        ),
        "01-1-2"
    );
    assert_eq!(
        render(&engine, "{% assign c = 10 %}{% increment c %}{{ c }}", json!({})),
        "010"
    );
}

#[test]
fn render_cycle() {
    let engine = Engine::new();
    assert_eq!(
        render(
            &engine,
            "{% for i in (1..4) %}{% cycle 'a', 'b', 'c' %}{% endfor %}",
            json!({})
        ),
        "abca"
    );
    assert_eq!(
        render(
            &engine,
            "{% cycle 'g': 1, 2 %}{% cycle 'g': 1, 2 %}{% cycle 1, 2 %}",
            json!({})
        ),
        "121"
    );
}

#[test]
fn render_echo() {
    let result = render(&Engine::new(), "{% echo 'x' | upcase %}", json!({}));
    assert_eq!(result, "X");
}

#[test]
fn render_raw_and_comments() {
    let result = render(
        &Engine::new(),
        "{% raw %}{{ a }}{% if %}{% endraw %}{% comment %}hidden {{ a }}{% endcomment %}{# note #}",
        json!({ "a": 1 }),
    );
    assert_eq!(result, "{{ a }}{% if %}");
}

#[test]
fn render_whitespace_control() {
    let engine = Engine::new();
    assert_eq!(render(&engine, "a  {{- 'b' -}}  c", json!({})), "abc");
    assert_eq!(
        render(&engine, "<{%- if true -%}\n  x\n{%- endif -%}>", json!({})),
        "<x>"
    );
}

#[test]
fn render_whitespace_control_ignores_branch_taken() {
    let engine = Engine::new();
    let source = "a {%- if x -%} A {%- endif -%} b";
    assert_eq!(render(&engine, source, json!({ "x": true })), "aAb");
    assert_eq!(render(&engine, source, json!({ "x": false })), "ab");
}

#[test]
fn render_for_keeps_body_whitespace() {
    let result = render(
        &Engine::new(),
        "{%for item in array%} yo {%endfor%}",
        json!({ "array": [1, 2, 3, 4] }),
    );
    assert_eq!(result, " yo  yo  yo  yo ");
}

#[test]
fn render_blank_block_drops_whitespace() {
    let result = render(
        &Engine::new(),
        "[{% if true %}\n  {% assign a = 1 %}\n{% endif %}]{{ a }}",
        json!({}),
    );
    assert_eq!(result, "[]1");
}

#[test]
fn render_macro_with_defaults() {
    let result = render(
        &Engine::new(),
        "{% macro greet(name, greeting: 'Hello') %}{{ greeting }}, {{ name }}!{% endmacro %}\
         {% call greet('Ann') %} {% call greet('Bo', greeting: 'Hi') %}",
        json!({}),
    );
    assert_eq!(result, "Hello, Ann! Hi, Bo!");
}

#[test]
fn render_macro_is_hoisted_and_isolated() {
    let result = render(
        &Engine::new(),
        "{% assign x = 1 %}{% call m() %}{% macro m() %}[{{ x }}]{% endmacro %}",
        json!({ "x": 2 }),
    );
    assert_eq!(result, "[]");
}

#[test]
fn render_static_environment() {
    let engine = Engine::new();
    let template = engine.parse("{{ a }} {{ site }}").unwrap();
    let result = template
        .render(json!({ "a": 1 }))
        .static_environment(Value::from([("site", "dry"), ("a", "shadowed")]))
        .to_string()
        .unwrap();
    assert_eq!(result, "1 dry");
}

#[test]
fn render_global_filter() {
    let engine = Engine::new();
    let template = engine.parse("{{ a }}{{ 'x' }}").unwrap();
    let result = template
        .render(json!({ "a": 1 }))
        .global_filter(|v| match v {
            Value::String(s) => Value::from(s.to_uppercase()),
            v => v,
        })
        .to_string()
        .unwrap();
    assert_eq!(result, "1X");
}

#[test]
fn render_from_value() {
    let engine = Engine::new();
    let data = Value::from([("names", vec!["a", "b"])]);
    let result = engine
        .parse("{% for n in names %}{{ n }}{% endfor %}")
        .unwrap()
        .render_from(&data)
        .to_string()
        .unwrap();
    assert_eq!(result, "ab");
}

#[test]
fn render_to_fragments() {
    let engine = Engine::new();
    let fragments = engine
        .parse("a{{ b }}c{% if true %}d{% endif %}")
        .unwrap()
        .render(json!({ "b": 1 }))
        .to_fragments()
        .unwrap();
    assert_eq!(fragments, ["a", "1", "c", "d"]);
}

#[test]
fn render_to_writer() {
    let engine = Engine::new();
    let template = engine.parse("lorem {{ ipsum }}").unwrap();

    let mut w = Writer::new();
    template
        .render(json!({ "ipsum": "dolor" }))
        .to_writer(&mut w)
        .unwrap();
    assert_eq!(w.into_string(), "lorem dolor");

    let err = template
        .render(json!({ "ipsum": "dolor" }))
        .to_writer(Writer::with_max(0))
        .unwrap_err();
    assert_eq!(err.kind(), dry::ErrorKind::Render);
}

#[test]
fn render_template_reused_after_render() {
    let engine = Engine::new();
    let template = engine.parse("{{ a }}").unwrap();
    for i in 0..3 {
        let result = template.render(json!({ "a": i })).to_string().unwrap();
        assert_eq!(result, i.to_string());
    }
}

#[test]
fn render_engine_send_and_sync() {
    let mut engine = Engine::new();
    engine.add_template("hello", "hello {{ name }}").unwrap();
    thread::scope(|s| {
        for name in ["a", "b"] {
            let engine = &engine;
            s.spawn(move || {
                let result = engine
                    .get_template("hello")
                    .unwrap()
                    .render(json!({ "name": name }))
                    .to_string()
                    .unwrap();
                assert_eq!(result, format!("hello {name}"));
            });
        }
    });
}
