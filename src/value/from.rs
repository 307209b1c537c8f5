//! `From` conversions used to build template data without serde.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use crate::value::{List, Map};
use crate::Value;

macro_rules! impl_from {
    ($($ty:ty => |$v:ident| $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )+
    };
}

impl_from! {
    () => |_v| Self::None,
    bool => |v| Self::Bool(v),
    u8 => |v| Self::Integer(i64::from(v)),
    u16 => |v| Self::Integer(i64::from(v)),
    u32 => |v| Self::Integer(i64::from(v)),
    i8 => |v| Self::Integer(i64::from(v)),
    i16 => |v| Self::Integer(i64::from(v)),
    i32 => |v| Self::Integer(i64::from(v)),
    i64 => |v| Self::Integer(v),
    usize => |v| Self::Integer(i64::try_from(v).unwrap_or(i64::MAX)),
    f32 => |v| Self::Float(f64::from(v)),
    f64 => |v| Self::Float(v),
    char => |v| Self::String(String::from(v)),
    String => |v| Self::String(v),
    &str => |v| Self::String(String::from(v)),
    &String => |v| Self::String(v.clone()),
    Cow<'_, str> => |v| Self::String(v.into_owned()),
    RangeInclusive<i64> => |v| Self::List(v.map(Self::Integer).collect()),
}

impl<V> From<Vec<V>> for Value
where
    V: Into<Value>,
{
    fn from(list: Vec<V>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

impl<V, const N: usize> From<[V; N]> for Value
where
    V: Into<Value>,
{
    fn from(list: [V; N]) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

impl<K, V> From<BTreeMap<K, V>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> From<HashMap<K, V>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(map: HashMap<K, V>) -> Self {
        Self::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(map: [(K, V); N]) -> Self {
        Self::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<V> From<Option<V>> for Value
where
    V: Into<Value>,
{
    fn from(opt: Option<V>) -> Self {
        opt.map_or(Self::None, Into::into)
    }
}

impl<V> FromIterator<V> for Value
where
    V: Into<Value>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = V>,
    {
        Self::List(iter.into_iter().map(Into::into).collect::<List<_>>())
    }
}

impl<K, V> FromIterator<(K, V)> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect::<Map<_, _>>(),
        )
    }
}
