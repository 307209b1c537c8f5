//! Expression evaluation.

use std::borrow::Cow;

use crate::render::context::Context;
use crate::render::core;
use crate::types::ast::{Expr, Key, Lookup, Variable};
use crate::value::Map;
use crate::{Error, ErrorKind, Result, Value};

/// Evaluates an expression to a value.
pub(crate) fn evaluate(ctx: &mut Context<'_>, expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        // Outside of a comparison `empty` and `blank` render as nothing.
        Expr::Empty | Expr::Blank => Ok(Value::String(String::new())),
        Expr::Range(start, end) => {
            let (start, end) = range(ctx, start, end)?;
            range_list(ctx, start, end)
        }
        Expr::Lookup(lookup) => resolve(ctx, lookup),
        Expr::Super => {
            let mut out = String::new();
            let old = ctx.limits.begin_buffer();
            let result = core::render_super(ctx, &mut out);
            ctx.limits.end_capture(old);
            result?;
            Ok(Value::String(out))
        }
    }
}

/// Evaluates the bounds of a range literal.
pub(crate) fn range(ctx: &mut Context<'_>, start: &Expr, end: &Expr) -> Result<(i64, i64)> {
    let start = evaluate(ctx, start)?;
    let end = evaluate(ctx, end)?;
    Ok((range_bound(&start)?, range_bound(&end)?))
}

/// Builds the list for a range used as a value, each element is charged to
/// the render score before anything is allocated.
fn range_list(ctx: &mut Context<'_>, start: i64, end: i64) -> Result<Value> {
    let len = range_len(start, end);
    ctx.limits.increment_render_score(len)?;
    let mut list = Vec::new();
    list.try_reserve_exact(len).map_err(|_| Error::memory())?;
    list.extend((start..=end).map(Value::Integer));
    Ok(Value::List(list))
}

/// The number of integers in `start..=end`, saturating at `usize::MAX`.
fn range_len(start: i64, end: i64) -> usize {
    if end < start {
        return 0;
    }
    let len = (i128::from(end) - i128::from(start)).saturating_add(1);
    usize::try_from(len).unwrap_or(usize::MAX)
}

fn range_bound(value: &Value) -> Result<i64> {
    match value {
        Value::None => Ok(0),
        Value::Integer(i) => Ok(*i),
        Value::Float(f) => Ok(*f as i64),
        Value::String(s) => Ok(leading_integer(s)),
        v => Err(Error::argument(format!("invalid integer {}", v.human()))),
    }
}

/// Parses the integer at the start of the string, zero if there is none.
fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let digits = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .count();
    s[..digits].parse().unwrap_or(0)
}

/// Converts a loop offset or limit to an integer.
pub(crate) fn to_integer(value: &Value) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Float(f) => Ok(*f as i64),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::argument("invalid integer")),
        _ => Err(Error::argument("invalid integer")),
    }
}

enum Segment<'a> {
    /// A `.name` segment, these also resolve the builtin properties.
    Name(&'a str),
    /// A `[expr]` segment.
    Index(Value),
}

/// Resolves a variable path, e.g. `product.variants[0].title`.
fn resolve(ctx: &mut Context<'_>, lookup: &Lookup) -> Result<Value> {
    let root = match &lookup.root {
        Key::Name(name) => Cow::Borrowed(name.as_str()),
        Key::Expr(expr) => Cow::Owned(evaluate(ctx, expr)?.to_string()),
    };
    let mut path = Vec::with_capacity(lookup.path.len());
    for key in &lookup.path {
        path.push(match key {
            Key::Name(name) => Segment::Name(name),
            Key::Expr(expr) => Segment::Index(evaluate(ctx, expr)?),
        });
    }

    let mut current = match ctx.find_variable(&root) {
        Some(value) => Cow::Borrowed(value),
        None => return undefined(ctx, &root),
    };
    for segment in &path {
        let next = match current {
            Cow::Borrowed(value) => step(value, segment),
            Cow::Owned(ref value) => step(value, segment).map(|v| Cow::Owned(v.into_owned())),
        };
        current = match next {
            Some(value) => value,
            None => {
                let key = match segment {
                    Segment::Name(name) => Cow::Borrowed(*name),
                    Segment::Index(value) => Cow::Owned(value.to_string()),
                };
                return undefined(ctx, &key);
            }
        };
    }
    Ok(current.into_owned())
}

fn step<'v>(value: &'v Value, segment: &Segment<'_>) -> Option<Cow<'v, Value>> {
    match segment {
        Segment::Name(name) => match value {
            Value::Map(map) if map.contains_key(*name) => map.get(*name).map(Cow::Borrowed),
            value => value.property(name).map(Cow::Owned),
        },
        Segment::Index(key) => value.get(key).map(Cow::Borrowed),
    }
}

fn undefined(ctx: &mut Context<'_>, key: &str) -> Result<Value> {
    let err = Error::new(
        ErrorKind::UndefinedVariable,
        format!("undefined variable {key}"),
    );
    if ctx.strict_variables() {
        return Err(err);
    }
    ctx.warn(err);
    Ok(Value::None)
}

/// Evaluates an expression and applies its filter pipeline, followed by the
/// global filter if there is one.
pub(crate) fn render_variable(ctx: &mut Context<'_>, var: &Variable) -> Result<Value> {
    let mut value = evaluate(ctx, &var.expr)?;
    for filter in &var.filters {
        let mut args = Vec::with_capacity(filter.args.len() + 1);
        for arg in &filter.args {
            args.push(evaluate(ctx, arg)?);
        }
        if !filter.kwargs.is_empty() {
            let mut kwargs = Map::new();
            for (key, arg) in &filter.kwargs {
                kwargs.insert(key.clone(), evaluate(ctx, arg)?);
            }
            args.push(Value::Map(kwargs));
        }
        value = invoke(ctx, &filter.name, value, args)?;
    }
    if let Some(global) = ctx.global_filter() {
        value = global(value);
    }
    Ok(value)
}

/// Calls a filter, an unknown filter passes the value through unless
/// rendering with strict filters.
fn invoke(ctx: &mut Context<'_>, name: &str, value: Value, args: Vec<Value>) -> Result<Value> {
    #[cfg(feature = "filters")]
    if let Some(filter) = ctx.engine.filters.get(name) {
        return filter(value, args);
    }
    #[cfg(not(feature = "filters"))]
    let _ = args;
    let err = Error::new(ErrorKind::UndefinedFilter, format!("undefined filter {name}"));
    if ctx.strict_filters() {
        return Err(err);
    }
    ctx.warn(err);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_integer_parses_prefix() {
        assert_eq!(leading_integer("12abc"), 12);
        assert_eq!(leading_integer(" -3"), -3);
        assert_eq!(leading_integer("abc"), 0);
        assert_eq!(leading_integer(""), 0);
    }

    #[test]
    fn to_integer_rejects_junk() {
        assert_eq!(to_integer(&Value::from("4")).unwrap(), 4);
        assert_eq!(to_integer(&Value::Float(2.9)).unwrap(), 2);
        let err = to_integer(&Value::from("four")).unwrap_err();
        assert_eq!(err.to_string(), "Dry error: invalid integer");
    }

    #[test]
    fn range_len_saturates() {
        assert_eq!(range_len(1, 3), 3);
        assert_eq!(range_len(3, 1), 0);
        assert_eq!(range_len(-2, -2), 1);
        assert_eq!(range_len(i64::MIN, i64::MAX), usize::MAX);
    }

    #[test]
    fn step_prefers_map_keys_over_properties() {
        let map = Value::from([("size", "big")]);
        let v = step(&map, &Segment::Name("size")).unwrap();
        assert_eq!(v.as_ref(), &Value::from("big"));
        let list = Value::from(vec![1, 2, 3]);
        let v = step(&list, &Segment::Name("size")).unwrap();
        assert_eq!(v.as_ref(), &Value::Integer(3));
        let v = step(&list, &Segment::Index(Value::Integer(-1))).unwrap();
        assert_eq!(v.as_ref(), &Value::Integer(3));
        assert!(step(&list, &Segment::Name("nope")).is_none());
    }
}
