mod args;
#[cfg(feature = "builtins")]
pub mod builtins;

use crate::{Error, ErrorKind, Result, Value};

/// A type erased filter, called with the piped value and the evaluated
/// arguments.
pub type FilterFn = dyn Fn(Value, Vec<Value>) -> Result<Value> + Send + Sync + 'static;

pub(crate) fn new<F, R, A>(f: F) -> Box<FilterFn>
where
    F: Filter<R, A> + Send + Sync + 'static,
    R: FilterReturn,
    A: FilterArgs,
{
    Box::new(move |value: Value, args: Vec<Value>| -> Result<Value> {
        let args = A::from_values(value, args)?;
        FilterReturn::to_value(f.filter(args))
    })
}

/// Represents any filter function.
///
/// This trait is used by the [`Engine::add_filter`][crate::Engine::add_filter]
/// method to abstract over a variety of function and closure types. This
/// includes filters with variable argument types, return types and arity. The
/// first argument to a filter function always receives the piped value. It
/// can then have up to four more arguments, which receive the arguments
/// written after the filter name, e.g. `{{ x | filter: a, b }}`. Keyword
/// arguments are collected into a map that is passed as the last argument.
///
/// [`Filter`] is implemented for functions that return any of the following
/// types.
///
/// - `R` where `R` implements `Into<Value>`, this includes `Option<R>`
/// - `Result<R>` where `R` implements `Into<Value>`
/// - `Result<R, String>` where `R` implements `Into<Value>`
///
/// [`Filter`] is implemented for functions that take any of the following
/// types as arguments.
/// - [`bool`]
/// - [`i64`]
/// - [`f64`]
/// - [`String`]
/// - [`Vec<Value>`]
/// - [`BTreeMap<String, Value>`][std::collections::BTreeMap]
/// - [`Value`]
/// - `Option<T>` of any of the above, for optional trailing arguments
///
/// The arguments are checked when the filter is used. Passing the wrong
/// number of arguments or an argument of the wrong type is an error.
///
/// ## Examples
///
/// ```rust
/// use dry::{Engine, Value};
///
/// let mut engine = Engine::new();
/// engine.add_filter("shout", shout);
/// engine.add_filter("pick", pick);
///
/// fn shout(s: String, times: Option<i64>) -> String {
///     let times = times.unwrap_or(1).max(0) as usize;
///     format!("{}{}", s.to_uppercase(), "!".repeat(times))
/// }
///
/// fn pick(mut list: Vec<Value>, index: i64) -> Option<Value> {
///     let index = usize::try_from(index).ok()?;
///     (index < list.len()).then(|| list.swap_remove(index))
/// }
///
/// let template = engine.parse("{{ 'hi' | shout: 3 }}")?;
/// assert_eq!(template.render_from(&Value::None).to_string()?, "HI!!!");
/// # Ok::<(), dry::Error>(())
/// ```
pub trait Filter<R, A> {
    #[doc(hidden)]
    fn filter(&self, args: A) -> R;
}

/// The argument list of a filter, converted from the piped value and the
/// evaluated arguments.
pub trait FilterArgs: Sized {
    #[doc(hidden)]
    fn from_values(value: Value, args: Vec<Value>) -> Result<Self>;
}

/// A single filter argument.
pub trait FilterArg: Sized {
    #[doc(hidden)]
    fn from_value(v: Value) -> args::Result<Self>;

    /// The value to use when the argument was not given, `None` if the
    /// argument is required.
    #[doc(hidden)]
    fn missing() -> Option<Self> {
        None
    }
}

pub trait FilterReturn {
    #[doc(hidden)]
    fn to_value(self) -> Result<Value>;
}

////////////////////////////////////////////////////////////////////////////////
// Filter and FilterArgs
////////////////////////////////////////////////////////////////////////////////

macro_rules! impl_filter {
    ($($arg:ident $var:ident),*) => {
        impl<Func, R, V, $($arg),*> Filter<R, (V, $($arg,)*)> for Func
        where
            Func: Fn(V, $($arg),*) -> R,
            R: FilterReturn,
            V: FilterArg,
            $($arg: FilterArg,)*
        {
            #[doc(hidden)]
            fn filter(&self, (v, $($var,)*): (V, $($arg,)*)) -> R {
                self(v, $($var),*)
            }
        }

        impl<V, $($arg),*> FilterArgs for (V, $($arg,)*)
        where
            V: FilterArg,
            $($arg: FilterArg,)*
        {
            #[allow(unused_mut, unused_variables)]
            fn from_values(value: Value, args: Vec<Value>) -> Result<Self> {
                let max = <[&str]>::len(&[$(stringify!($arg)),*]);
                let min: usize = 0 $(+ usize::from(<$arg as FilterArg>::missing().is_none()))*;
                check_arity(args.len(), min, max)?;
                let v = V::from_value(value).map_err(|e| e.into_error("value"))?;
                let mut args = args.into_iter();
                $(
                    let $var = next_arg::<$arg>(&mut args)?;
                )*
                Ok((v, $($var,)*))
            }
        }
    };
}

impl_filter! {}
impl_filter! { A a }
impl_filter! { A a, B b }
impl_filter! { A a, B b, C c }
impl_filter! { A a, B b, C c, D d }

fn check_arity(given: usize, min: usize, max: usize) -> Result<()> {
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let expected = if min == max {
        max.to_string()
    } else {
        format!("{min}..{max}")
    };
    Err(Error::argument(format!(
        "wrong number of arguments (given {given}, expected {expected})"
    )))
}

fn next_arg<T: FilterArg>(args: &mut std::vec::IntoIter<Value>) -> Result<T> {
    match args.next() {
        Some(v) => T::from_value(v).map_err(|e| e.into_error("argument")),
        // The arity was checked, only optional arguments can be missing.
        None => T::missing().ok_or_else(|| Error::argument("missing filter argument")),
    }
}

////////////////////////////////////////////////////////////////////////////////
// FilterReturn
////////////////////////////////////////////////////////////////////////////////

impl<T> FilterReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T> FilterReturn for Result<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
    }
}

impl<T> FilterReturn for std::result::Result<T, String>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
            .map_err(|msg| Error::new(ErrorKind::Argument, msg))
    }
}
