//! The `for` loop.

use std::vec;

use crate::render::context::{Context, Interrupt};
use crate::render::core::render_body;
use crate::render::value::{evaluate, range, to_integer};
use crate::types::ast::{Expr, For, Offset};
use crate::value::Map;
use crate::{Result, Value};

/// The slice of a collection a loop iterates over.
///
/// Ranges are not materialized, the loop only ever holds the current
/// integer.
#[cfg_attr(test, derive(Debug))]
enum LoopItems {
    Range {
        next: i64,
        /// The final integer, kept apart from `remaining` which saturates
        /// for ranges longer than `usize::MAX`.
        last: i64,
        step: i64,
        remaining: usize,
    },
    List(vec::IntoIter<Value>),
}

impl LoopItems {
    /// Resolves the collection and keeps the items with an index in
    /// `from..to`.
    fn new(ctx: &mut Context<'_>, collection: &Expr, from: i64, to: Option<i64>) -> Result<Self> {
        if let Expr::Range(start, end) = collection {
            let (start, end) = range(ctx, start, end)?;
            let total = (i128::from(end) - i128::from(start) + 1).max(0);
            let lo = i128::from(from).clamp(0, total);
            let hi = to.map_or(total, |to| i128::from(to).clamp(0, total));
            let len = (hi - lo).max(0);
            let next = (i128::from(start) + lo) as i64;
            return Ok(Self::Range {
                next,
                last: if len > 0 { (i128::from(start) + hi - 1) as i64 } else { next },
                step: 1,
                remaining: usize::try_from(len).unwrap_or(usize::MAX),
            });
        }

        let items: Vec<Value> = match evaluate(ctx, collection)? {
            Value::List(list) => list,
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| Value::List(vec![Value::String(k), v]))
                .collect(),
            Value::String(s) if s.is_empty() => Vec::new(),
            Value::String(s) => vec![Value::String(s)],
            _ => Vec::new(),
        };
        let total = items.len() as i64;
        let lo = from.clamp(0, total) as usize;
        let hi = to.map_or(total, |to| to.clamp(0, total)) as usize;
        let items = if lo < hi {
            items.into_iter().skip(lo).take(hi - lo).collect()
        } else {
            Vec::new()
        };
        Ok(Self::List(items.into_iter()))
    }

    fn reverse(self) -> Self {
        match self {
            Self::Range {
                next,
                last,
                step,
                remaining,
            } => Self::Range {
                next: last,
                last: next,
                step: -step,
                remaining,
            },
            Self::List(iter) => {
                let mut items: Vec<_> = iter.collect();
                items.reverse();
                Self::List(items.into_iter())
            }
        }
    }
}

impl Iterator for LoopItems {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Range {
                next,
                step,
                remaining,
                ..
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                *next = next.saturating_add(*step);
                Some(Value::Integer(value))
            }
            Self::List(iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = match self {
            Self::Range { remaining, .. } => *remaining,
            Self::List(iter) => iter.len(),
        };
        (len, Some(len))
    }
}

impl ExactSizeIterator for LoopItems {}

pub(crate) fn render_for(ctx: &mut Context<'_>, node: &For, out: &mut String) -> Result<()> {
    let from = match &node.offset {
        Some(Offset::Continue) => ctx.registers().for_offset(&node.name) as i64,
        Some(Offset::Expr(expr)) => match evaluate(ctx, expr)? {
            Value::None => 0,
            value => to_integer(&value)?,
        },
        None => 0,
    };
    let to = match &node.limit {
        Some(expr) => match evaluate(ctx, expr)? {
            Value::None => None,
            value => Some(from.saturating_add(to_integer(&value)?)),
        },
        None => None,
    };

    let mut items = LoopItems::new(ctx, &node.collection, from, to)?;
    if node.reversed {
        items = items.reverse();
    }
    let len = items.len();
    let next_offset = usize::try_from(from.max(0))
        .unwrap_or(0)
        .saturating_add(len);
    ctx.registers_mut()
        .for_offsets
        .insert(node.name.clone(), next_offset);

    if len == 0 {
        return match &node.else_body {
            Some(body) => render_body(ctx, body, out),
            None => Ok(()),
        };
    }

    let parentloop = ctx.for_stack.last().cloned().unwrap_or_default();
    ctx.for_stack.push(Value::None);
    let result = ctx.stack(|ctx| {
        for (index, item) in items.enumerate() {
            let forloop = forloop(&node.name, index, len, &parentloop);
            if let Some(top) = ctx.for_stack.last_mut() {
                *top = forloop.clone();
            }
            ctx.set("forloop", forloop);
            ctx.set(node.var.as_str(), item);
            render_body(ctx, &node.body, out)?;
            if let Some(Interrupt::Break) = ctx.pop_interrupt() {
                break;
            }
        }
        Ok(())
    });
    ctx.for_stack.pop();
    result
}

/// The `forloop` object for the iteration at `index`.
pub(crate) fn forloop(name: &str, index: usize, length: usize, parentloop: &Value) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), Value::from(name));
    map.insert("length".into(), Value::from(length));
    map.insert("index".into(), Value::from(index + 1));
    map.insert("index0".into(), Value::from(index));
    map.insert("rindex".into(), Value::from(length - index));
    map.insert("rindex0".into(), Value::from(length - index - 1));
    map.insert("first".into(), Value::Bool(index == 0));
    map.insert("last".into(), Value::Bool(index + 1 == length));
    map.insert("parentloop".into(), parentloop.clone());
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forloop_fields() {
        let v = forloop("i-items", 1, 3, &Value::None);
        let Value::Map(map) = v else { panic!() };
        assert_eq!(map["index"], Value::Integer(2));
        assert_eq!(map["rindex0"], Value::Integer(1));
        assert_eq!(map["first"], Value::Bool(false));
        assert_eq!(map["last"], Value::Bool(false));
        assert_eq!(map["name"], Value::from("i-items"));
    }

    #[test]
    fn reversed_range() {
        let items = LoopItems::Range {
            next: 3,
            last: 5,
            step: 1,
            remaining: 3,
        };
        let values: Vec<_> = items.reverse().collect();
        assert_eq!(values, [Value::Integer(5), Value::Integer(4), Value::Integer(3)]);
    }

    #[test]
    fn reversed_range_longer_than_usize() {
        let items = LoopItems::Range {
            next: i64::MIN,
            last: i64::MAX,
            step: 1,
            remaining: usize::MAX,
        };
        let values: Vec<_> = items.reverse().take(2).collect();
        assert_eq!(values, [Value::Integer(i64::MAX), Value::Integer(i64::MAX - 1)]);
    }
}
