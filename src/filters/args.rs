use crate::filters::FilterArg;
use crate::value::{List, Map};
use crate::Value;

pub type Result<T> = std::result::Result<T, Error>;

/// A type mismatch, the expected and the given type.
pub struct Error(&'static str, &'static str);

impl Error {
    /// `what` is either "value" or "argument".
    pub(crate) fn into_error(self, what: &str) -> crate::Error {
        crate::Error::argument(format!(
            "filter expected {} {what}, found {}",
            self.0, self.1
        ))
    }
}

impl FilterArg for Value {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v)
    }
}

impl FilterArg for bool {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Bool(b) => Ok(b),
            Value::None => Ok(false),
            v => Err(Error("bool", v.human())),
        }
    }
}

/// Strings that look like numbers are accepted where a number is expected.
impl FilterArg for i64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Integer(i) => Ok(i),
            Value::Float(f) => Ok(f as i64),
            Value::String(ref s) => s.trim().parse().map_err(|_| Error("Integer", v.human())),
            v => Err(Error("Integer", v.human())),
        }
    }
}

impl FilterArg for f64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Integer(i) => Ok(i as f64),
            Value::Float(f) => Ok(f),
            Value::String(ref s) => s.trim().parse().map_err(|_| Error("Float", v.human())),
            v => Err(Error("Float", v.human())),
        }
    }
}

/// Scalars are converted to their output text, `nil` is the empty string.
impl FilterArg for String {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::String(s) => Ok(s),
            v @ (Value::None | Value::Bool(_) | Value::Integer(_) | Value::Float(_)) => {
                Ok(v.to_string())
            }
            v => Err(Error("String", v.human())),
        }
    }
}

impl FilterArg for List<Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::List(list) => Ok(list),
            v => Err(Error("Array", v.human())),
        }
    }
}

impl FilterArg for Map<String, Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Map(map) => Ok(map),
            v => Err(Error("Hash", v.human())),
        }
    }
}

impl<T> FilterArg for Option<T>
where
    T: FilterArg,
{
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::None => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }

    fn missing() -> Option<Self> {
        Some(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_arg_from_scalars() {
        assert_eq!(String::from_value(Value::Integer(3)).ok(), Some("3".into()));
        assert_eq!(String::from_value(Value::None).ok(), Some(String::new()));
        assert!(String::from_value(Value::List(vec![])).is_err());
    }

    #[test]
    fn number_arg_from_numeric_string() {
        assert_eq!(i64::from_value(Value::from(" 42 ")).ok(), Some(42));
        assert_eq!(f64::from_value(Value::from("1.5")).ok(), Some(1.5));
        assert!(i64::from_value(Value::from("x")).is_err());
    }
}
