//! The condition engine used by `if`, `unless` and `case`.

use std::cmp::Ordering;

use crate::render::context::Context;
use crate::render::value;
use crate::types::ast::{Condition, Expr, Logic, Op};
use crate::{Error, Result, Value};

/// Evaluates a chain of conditions.
///
/// The chain is walked from the left. An `and` stops the walk at the first
/// false link and an `or` at the first true one, so `a or b and c` means
/// `a or (b and c)`.
pub(crate) fn evaluate(ctx: &mut Context<'_>, cond: &Condition) -> Result<bool> {
    let mut cond = cond;
    loop {
        let result = match &cond.op {
            Some((op, right)) => compare(ctx, &cond.left, *op, right)?,
            None => value::evaluate(ctx, &cond.left)?.is_truthy(),
        };
        match &cond.child {
            Some((Logic::And, child)) if result => cond = child,
            Some((Logic::Or, child)) if !result => cond = child,
            _ => return Ok(result),
        }
    }
}

/// Compares two expressions.
///
/// The `empty` and `blank` literals are compared by asking the other side
/// whether it is empty or blank.
pub(crate) fn compare(ctx: &mut Context<'_>, left: &Expr, op: Op, right: &Expr) -> Result<bool> {
    match op {
        Op::Eq => equals(ctx, left, right),
        Op::Ne => equals(ctx, left, right).map(|eq| !eq),
        op => {
            let left = value::evaluate(ctx, left)?;
            let right = value::evaluate(ctx, right)?;
            match op {
                Op::Contains => Ok(contains(&left, &right)),
                op => order(&left, op, &right),
            }
        }
    }
}

fn equals(ctx: &mut Context<'_>, left: &Expr, right: &Expr) -> Result<bool> {
    match (left, right) {
        (Expr::Empty, other) | (other, Expr::Empty) => {
            Ok(value::evaluate(ctx, other)?.is_empty())
        }
        (Expr::Blank, other) | (other, Expr::Blank) => {
            Ok(value::evaluate(ctx, other)?.is_blank())
        }
        (left, right) => {
            let left = value::evaluate(ctx, left)?;
            let right = value::evaluate(ctx, right)?;
            Ok(left == right)
        }
    }
}

/// Whether `right` is a substring of a string, an element of a list or a
/// key of a map. Never fails.
fn contains(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (_, Value::None) => false,
        (Value::String(s), needle) => s.contains(needle.to_string().as_str()),
        (Value::List(list), needle) => list.contains(needle),
        (Value::Map(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

/// Applies one of the ordering operators.
///
/// Numbers compare with numbers and strings with strings. Any other
/// combination involving a number or string is an error, and `nil` or a
/// value that has no ordering makes the comparison false.
fn order(left: &Value, op: Op, right: &Value) -> Result<bool> {
    let ordering = match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
        (l, r) if l.is_number() && r.is_number() => {
            let (l, r) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
            l.partial_cmp(&r)
        }
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (l, r) if l.is_number() && !matches!(r, Value::None) => {
            return Err(Error::argument(format!(
                "comparison of {} with {} failed",
                l.human(),
                r.human()
            )));
        }
        (Value::String(_), r) if !matches!(r, Value::None) => {
            return Err(Error::argument(format!(
                "comparison of String with {} failed",
                inspect(r)
            )));
        }
        _ => None,
    };
    Ok(match (ordering, op) {
        (Some(o), Op::Lt) => o == Ordering::Less,
        (Some(o), Op::Gt) => o == Ordering::Greater,
        (Some(o), Op::Le) => o != Ordering::Greater,
        (Some(o), Op::Ge) => o != Ordering::Less,
        _ => false,
    })
}

fn inspect(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        Value::List(_) => "Array".to_owned(),
        Value::Map(_) => "Hash".to_owned(),
        v => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_never_fails() {
        assert!(contains(&Value::from("hello"), &Value::from("ell")));
        assert!(contains(&Value::from("a1"), &Value::Integer(1)));
        assert!(contains(&Value::from(vec![1, 2]), &Value::Integer(2)));
        assert!(contains(&Value::from([("a", 1)]), &Value::from("a")));
        assert!(!contains(&Value::None, &Value::from("a")));
        assert!(!contains(&Value::from("a"), &Value::None));
        assert!(!contains(&Value::Integer(1), &Value::Integer(1)));
    }

    #[test]
    fn order_numbers_and_strings() {
        assert!(order(&Value::Integer(1), Op::Lt, &Value::Float(1.5)).unwrap());
        assert!(order(&Value::from("a"), Op::Lt, &Value::from("b")).unwrap());
        assert!(order(&Value::Integer(2), Op::Ge, &Value::Integer(2)).unwrap());
        assert!(!order(&Value::None, Op::Lt, &Value::Integer(1)).unwrap());
        assert!(!order(&Value::Integer(1), Op::Lt, &Value::None).unwrap());
        assert!(!order(&Value::Bool(true), Op::Gt, &Value::Bool(false)).unwrap());
    }

    #[test]
    fn order_mixed_types_fails() {
        let err = order(&Value::Integer(1), Op::Lt, &Value::from("a")).unwrap_err();
        assert_eq!(err.message(), "comparison of Integer with String failed");
        let err = order(&Value::from("a"), Op::Lt, &Value::Integer(1)).unwrap_err();
        assert_eq!(err.message(), "comparison of String with 1 failed");
    }
}
