//! Builtin filters.
//!
//! These are registered on every [`Engine`][crate::Engine] created with
//! [`Engine::new`][crate::Engine::new].

use crate::value::Map;
use crate::{Engine, Value};

pub(crate) fn register(engine: &mut Engine) {
    engine.add_filter("upcase", upcase);
    engine.add_filter("downcase", downcase);
    engine.add_filter("capitalize", capitalize);
    engine.add_filter("append", append);
    engine.add_filter("prepend", prepend);
    engine.add_filter("replace", replace);
    engine.add_filter("remove", remove);
    engine.add_filter("strip", strip);
    engine.add_filter("lstrip", lstrip);
    engine.add_filter("rstrip", rstrip);
    engine.add_filter("split", split);
    engine.add_filter("join", join);
    engine.add_filter("size", size);
    engine.add_filter("first", first);
    engine.add_filter("last", last);
    engine.add_filter("reverse", reverse);
    engine.add_filter("keys", keys);
    engine.add_filter("values", values);
    engine.add_filter("default", default);
    engine.add_filter("plus", plus);
    engine.add_filter("minus", minus);
    engine.add_filter("times", times);
}

/// Returns the uppercase equivalent of the string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn upcase(s: String) -> String {
    s.to_uppercase()
}

/// Returns the lowercase equivalent of the string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn downcase(s: String) -> String {
    s.to_lowercase()
}

/// Uppercases the first character and lowercases the rest.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn capitalize(s: String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => s,
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn append(s: String, suffix: String) -> String {
    s + &suffix
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn prepend(s: String, prefix: String) -> String {
    prefix + &s
}

/// Replaces all matches of a substring with another substring.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn replace(s: String, from: String, to: Option<String>) -> String {
    s.replace(&from, &to.unwrap_or_default())
}

/// Removes all matches of a substring.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn remove(s: String, needle: String) -> String {
    s.replace(&needle, "")
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn strip(s: String) -> String {
    s.trim().to_owned()
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn lstrip(s: String) -> String {
    s.trim_start().to_owned()
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn rstrip(s: String) -> String {
    s.trim_end().to_owned()
}

/// Splits a string on a separator, a single space splits on any run of
/// whitespace.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn split(s: String, sep: String) -> Vec<String> {
    match sep.as_str() {
        " " => s.split_whitespace().map(String::from).collect(),
        "" => s.chars().map(String::from).collect(),
        sep => s.split(sep).map(String::from).collect(),
    }
}

/// Joins the elements of a list, the separator defaults to a single space.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn join(list: Value, sep: Option<String>) -> String {
    let sep = sep.unwrap_or_else(|| " ".to_owned());
    match list {
        Value::List(list) => list
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(&sep),
        value => value.to_string(),
    }
}

/// Returns the number of characters in a string or elements in a list or
/// map.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn size(value: Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        _ => 0,
    }
}

/// Returns the first element in a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn first(value: Value) -> Value {
    value.property("first").unwrap_or_default()
}

/// Returns the last element in a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn last(value: Value) -> Value {
    value.property("last").unwrap_or_default()
}

/// Reverses a list or string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn reverse(value: Value) -> Result<Value, String> {
    match value {
        Value::String(string) => Ok(Value::String(string.chars().rev().collect())),
        Value::List(list) => Ok(Value::List(list.into_iter().rev().collect())),
        value => Err(format!("cannot reverse {}", value.human())),
    }
}

/// Returns the map keys as a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn keys(map: Map<String, Value>) -> Vec<String> {
    map.into_keys().collect()
}

/// Returns the map values as a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn values(map: Map<String, Value>) -> Vec<Value> {
    map.into_values().collect()
}

/// Returns the given default if the value is `nil`, `false` or empty.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn default(value: Value, default: Value) -> Value {
    if !value.is_truthy() || value.is_empty() {
        default
    } else {
        value
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn plus(a: Value, b: Value) -> Result<Value, String> {
    arithmetic(a, b, i64::checked_add, |a, b| a + b)
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn minus(a: Value, b: Value) -> Result<Value, String> {
    arithmetic(a, b, i64::checked_sub, |a, b| a - b)
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn times(a: Value, b: Value) -> Result<Value, String> {
    arithmetic(a, b, i64::checked_mul, |a, b| a * b)
}

/// Integers stay integers unless either side is a float. Strings are parsed
/// and `nil` counts as zero.
fn arithmetic(
    a: Value,
    b: Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value, String> {
    match (to_number(a)?, to_number(b)?) {
        (Value::Integer(a), Value::Integer(b)) => int(a, b)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_owned()),
        (a, b) => Ok(Value::Float(float(
            a.as_f64().unwrap_or(0.0),
            b.as_f64().unwrap_or(0.0),
        ))),
    }
}

fn to_number(v: Value) -> Result<Value, String> {
    match v {
        Value::None => Ok(Value::Integer(0)),
        v @ (Value::Integer(_) | Value::Float(_)) => Ok(v),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                Ok(Value::Float(s.parse::<f64>().unwrap_or(0.0)))
            }
        }
        v => Err(format!("invalid number {}", v.human())),
    }
}
