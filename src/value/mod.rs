//! Defines the [`Value`] enum, representing any valid renderable data.

mod from;
#[cfg(feature = "serde")]
mod ser;

pub use std::collections::BTreeMap as Map;
use std::fmt;
use std::mem;
pub use std::vec::Vec as List;

#[cfg(feature = "serde")]
pub use crate::value::ser::to_value;

/// Data to be rendered represented as a recursive enum.
///
/// Maps keep their keys sorted, so iterating a map in a `for` loop visits
/// the entries in key order.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(List<Value>),
    Map(Map<String, Value>),
}

impl Value {
    /// Returns a human readable name for the type of this value.
    pub(crate) fn human(&self) -> &'static str {
        match self {
            Self::None => "nil",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::List(_) => "Array",
            Self::Map(_) => "Hash",
        }
    }

    /// Only `nil` and `false` are falsy, everything else is truthy. This
    /// includes `0` and the empty string.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::None | Self::Bool(false))
    }

    /// Whether this value equals the special `empty` literal.
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    /// Whether this value equals the special `blank` literal.
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            Self::None | Self::Bool(false) => true,
            Self::String(s) => s.trim().is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Looks up a member of a list or map.
    ///
    /// Lists accept integer indexes, negative ones count from the end. Maps
    /// accept string keys. Returns `None` if there is no such member.
    pub(crate) fn get(&self, key: &Value) -> Option<&Value> {
        match (self, key) {
            (Self::Map(map), Self::String(k)) => map.get(k),
            (Self::List(list), Self::Integer(i)) => {
                let i = if *i < 0 {
                    list.len().checked_sub(i.unsigned_abs() as usize)?
                } else {
                    *i as usize
                };
                list.get(i)
            }
            _ => None,
        }
    }

    /// Resolves the builtin `size`, `first` and `last` properties.
    pub(crate) fn property(&self, name: &str) -> Option<Value> {
        match (self, name) {
            (Self::String(s), "size") => Some(Value::Integer(s.chars().count() as i64)),
            (Self::List(l), "size") => Some(Value::Integer(l.len() as i64)),
            (Self::Map(m), "size") => Some(Value::Integer(m.len() as i64)),
            (Self::List(l), "first") => Some(l.first().cloned().unwrap_or_default()),
            (Self::List(l), "last") => Some(l.last().cloned().unwrap_or_default()),
            (Self::String(s), "first") => Some(s.chars().next().map(Value::from).unwrap_or_default()),
            (Self::String(s), "last") => {
                Some(s.chars().next_back().map(Value::from).unwrap_or_default())
            }
            _ => None,
        }
    }

    /// The resource cost of assigning this value.
    ///
    /// Strings cost their length in bytes, containers cost one plus the
    /// cost of each of their members, everything else costs one.
    pub(crate) fn assign_score(&self) -> usize {
        match self {
            Self::String(s) => s.len(),
            Self::List(list) => 1 + list.iter().map(Value::assign_score).sum::<usize>(),
            Self::Map(map) => {
                1 + map
                    .iter()
                    .map(|(k, v)| k.len() + v.assign_score())
                    .sum::<usize>()
            }
            _ => 1,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(s), Self::Bool(o)) => s == o,
            (Self::Integer(s), Self::Integer(o)) => s == o,
            (Self::Float(s), Self::Float(o)) => s == o,
            (Self::Integer(s), Self::Float(o)) => (*s as f64) == *o,
            (Self::Float(s), Self::Integer(o)) => *s == (*o as f64),
            (Self::String(s), Self::String(o)) => s == o,
            (Self::List(s), Self::List(o)) => s == o,
            (Self::Map(s), Self::Map(o)) => s == o,
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

/// Formats the value the way it is written into template output.
///
/// `None` renders as nothing, lists render as the concatenation of their
/// elements and maps render in an inspect style.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(n) => fmt_float(*n, f),
            Self::String(s) => f.write_str(s),
            Self::List(list) => list.iter().try_for_each(|v| write!(f, "{v}")),
            Self::Map(_) => fmt_inspect(self, f),
        }
    }
}

fn fmt_float(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{n:.1}")
    } else {
        write!(f, "{n}")
    }
}

fn fmt_inspect(v: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match v {
        Value::None => f.write_str("nil"),
        Value::String(s) => write!(f, "{s:?}"),
        Value::List(list) => {
            f.write_str("[")?;
            for (i, v) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_inspect(v, f)?;
            }
            f.write_str("]")
        }
        Value::Map(map) => {
            f.write_str("{")?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{k:?}=>")?;
                fmt_inspect(v, f)?;
            }
            f.write_str("}")
        }
        v => write!(f, "{v}"),
    }
}
