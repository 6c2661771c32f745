//! Bridges between Rust types and the dynamic [`Value`] model.
//!
//! [`Shaped`] maps a Rust type to the [`Annotation`] the converter and
//! translator work with, [`FromValue`] reads a converted value back out,
//! and [`IntoValue`] turns a callable's return into a [`Value`].
//! `#[entrypoint]` uses all three to wire ordinary functions.

use crate::error::{ConversionError, XapiError};
use crate::shape::Annotation;
use crate::value::Value;
use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeMap, HashMap};

/// A Rust type with a known annotation.
pub trait Shaped {
    fn annotation() -> Annotation;
}

/// Extracts a Rust value from an already converted [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

/// Converts a callable's return into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

fn mismatch<T: Shaped>(value: Value, expected: &str) -> ConversionError {
    let annotation = T::annotation();
    let message = format!("expected {}, found {}", expected, value.kind());
    ConversionError::new(value, annotation.origin(), annotation, message)
}

macro_rules! impl_int {
    ($($ty:ty),*) => {
        $(
            impl Shaped for $ty {
                fn annotation() -> Annotation {
                    Annotation::Int
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|e| {
                            mismatch::<$ty>(Value::Int(i), stringify!($ty)).with_source(e)
                        }),
                        other => Err(mismatch::<$ty>(other, "int")),
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    i64::try_from(self).map(Value::Int).unwrap_or(Value::Float(self as f64))
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float {
    ($($ty:ty),*) => {
        $(
            impl Shaped for $ty {
                fn annotation() -> Annotation {
                    Annotation::Float
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Float(f) => Ok(f as $ty),
                        Value::Int(i) => Ok(i as $ty),
                        other => Err(mismatch::<$ty>(other, "float")),
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Float(self as f64)
                }
            }
        )*
    };
}

impl_float!(f32, f64);

impl Shaped for bool {
    fn annotation() -> Annotation {
        Annotation::Bool
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<bool>(other, "bool")),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Shaped for String {
    fn annotation() -> Annotation {
        Annotation::Str
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch::<String>(other, "str")),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::None
    }
}

impl Shaped for Value {
    fn annotation() -> Annotation {
        Annotation::Any
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl Shaped for DateTime<FixedOffset> {
    fn annotation() -> Annotation {
        Annotation::DateTime
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(mismatch::<DateTime<FixedOffset>>(other, "datetime")),
        }
    }
}

impl IntoValue for DateTime<FixedOffset> {
    fn into_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl<T: Shaped> Shaped for Option<T> {
    fn annotation() -> Annotation {
        Annotation::optional(T::annotation())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map(IntoValue::into_value).unwrap_or(Value::None)
    }
}

impl<T: Shaped> Shaped for Vec<T> {
    fn annotation() -> Annotation {
        Annotation::list(T::annotation())
    }
}

impl<T: FromValue + Shaped> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) | Value::Tuple(items) => {
                items.into_iter().map(T::from_value).collect()
            }
            other => Err(mismatch::<Vec<T>>(other, "list")),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

macro_rules! impl_tuple {
    ($len:literal; $($name:ident),+) => {
        impl<$($name: Shaped),+> Shaped for ($($name,)+) {
            fn annotation() -> Annotation {
                Annotation::tuple(vec![$($name::annotation()),+])
            }
        }

        impl<$($name: FromValue + Shaped),+> FromValue for ($($name,)+) {
            fn from_value(value: Value) -> Result<Self, ConversionError> {
                match value {
                    Value::Tuple(items) | Value::List(items) if items.len() == $len => {
                        let mut items = items.into_iter();
                        Ok(($(
                            $name::from_value(items.next().unwrap_or(Value::None))?,
                        )+))
                    }
                    other => Err(mismatch::<Self>(other, concat!("tuple of ", $len))),
                }
            }
        }

        impl<$($name: IntoValue),+> IntoValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_value(self) -> Value {
                let ($($name,)+) = self;
                Value::Tuple(vec![$($name.into_value()),+])
            }
        }
    };
}

impl_tuple!(2; A, B);
impl_tuple!(3; A, B, C);
impl_tuple!(4; A, B, C, D);

impl<T> Shaped for BTreeMap<String, T> {
    fn annotation() -> Annotation {
        Annotation::Map
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch::<Self>(other, "dict")),
        }
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T> Shaped for HashMap<String, T> {
    fn annotation() -> Annotation {
        Annotation::Map
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        BTreeMap::<String, T>::from_value(value).map(|map| map.into_iter().collect())
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

/// Positional and keyword arguments assembled for one callable invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Number of positional values.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Reads the positional value at `index`, falling back to a keyword
    /// of the same name.
    pub fn positional<T: FromValue>(&self, name: &str, index: usize) -> Result<T, XapiError> {
        let value = self
            .args
            .get(index)
            .or_else(|| self.kwargs.get(name))
            .cloned()
            .ok_or_else(|| XapiError::MissingArgument(name.to_string()))?;
        T::from_value(value).map_err(|e| e.with_argument(name).into())
    }

    /// Reads a positional value counted from the end (`1` is the last one).
    pub fn trailing<T: FromValue>(&self, name: &str, back: usize) -> Result<T, XapiError> {
        let value = self
            .args
            .len()
            .checked_sub(back)
            .and_then(|index| self.args.get(index))
            .or_else(|| self.kwargs.get(name))
            .cloned()
            .ok_or_else(|| XapiError::MissingArgument(name.to_string()))?;
        T::from_value(value).map_err(|e| e.with_argument(name).into())
    }

    /// Positional values between the first `start` and the last `trailing`.
    pub fn variadic<T: FromValue>(&self, start: usize, trailing: usize) -> Result<Vec<T>, XapiError> {
        let end = self.args.len().saturating_sub(trailing).max(start);
        self.args
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .cloned()
            .map(|v| T::from_value(v).map_err(XapiError::from))
            .collect()
    }

    /// Reads a keyword value, or `default` when it was omitted.
    pub fn keyword_or<T: FromValue>(
        &self,
        name: &str,
        default: impl FnOnce() -> T,
    ) -> Result<T, XapiError> {
        match self.kwargs.get(name) {
            Some(value) => T::from_value(value.clone()).map_err(|e| e.with_argument(name).into()),
            None => Ok(default()),
        }
    }

    /// Keyword values not claimed by a named parameter.
    pub fn extra<T: FromValue>(&self, claimed: &[&str]) -> Result<BTreeMap<String, T>, XapiError> {
        self.kwargs
            .iter()
            .filter(|(key, _)| !claimed.contains(&key.as_str()))
            .map(|(key, value)| {
                T::from_value(value.clone())
                    .map(|v| (key.clone(), v))
                    .map_err(|e| e.with_argument(key.as_str()).into())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_args(args: Vec<Value>, kwargs: &[(&str, Value)]) -> CallArgs {
        CallArgs::new(
            args,
            kwargs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_shapes_of_rust_types() {
        assert_eq!(<Vec<i64>>::annotation(), Annotation::list(Annotation::Int));
        assert_eq!(
            <Option<String>>::annotation(),
            Annotation::optional(Annotation::Str)
        );
        assert_eq!(
            <(String, i32)>::annotation(),
            Annotation::tuple(vec![Annotation::Str, Annotation::Int])
        );
    }

    #[test]
    fn test_from_value_numbers() {
        assert_eq!(f64::from_value(Value::Int(3)).unwrap(), 3.0);
        assert_eq!(u8::from_value(Value::Int(7)).unwrap(), 7);
        assert!(u8::from_value(Value::Int(-1)).is_err());
        assert!(i64::from_value(Value::from("1")).is_err());
    }

    #[test]
    fn test_from_value_tuple() {
        let value = Value::Tuple(vec![Value::from("abc"), Value::Int(123)]);
        let (s, n) = <(String, i64)>::from_value(value).unwrap();
        assert_eq!(s, "abc");
        assert_eq!(n, 123);

        let short = Value::Tuple(vec![Value::from("abc")]);
        assert!(<(String, i64)>::from_value(short).is_err());
    }

    #[test]
    fn test_into_value() {
        assert_eq!(().into_value(), Value::None);
        assert_eq!(
            vec![1i64, 2].into_value(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            ("a", 1i32).into_value(),
            Value::Tuple(vec![Value::from("a"), Value::Int(1)])
        );
    }

    #[test]
    fn test_positional_and_missing() {
        let args = call_args(vec![Value::Float(3.0)], &[]);
        let a: f64 = args.positional("a", 0).unwrap();
        assert_eq!(a, 3.0);
        assert!(matches!(
            args.positional::<f64>("b", 1),
            Err(XapiError::MissingArgument(name)) if name == "b"
        ));
    }

    #[test]
    fn test_variadic_with_trailing() {
        let args = call_args(
            vec![Value::Int(3), Value::from("x"), Value::from("y"), Value::Int(9)],
            &[],
        );
        let words: Vec<String> = args.variadic(1, 1).unwrap();
        assert_eq!(words, vec!["x", "y"]);
        let last: i64 = args.trailing("last", 1).unwrap();
        assert_eq!(last, 9);
    }

    #[test]
    fn test_variadic_empty() {
        let args = call_args(vec![Value::Int(3)], &[]);
        let words: Vec<String> = args.variadic(1, 0).unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn test_keyword_or_default() {
        let args = call_args(vec![], &[("precision", Value::Int(3))]);
        assert_eq!(args.keyword_or("precision", || 1i64).unwrap(), 3);
        assert!(args.keyword_or("upper", || true).unwrap());
    }

    #[test]
    fn test_extra_skips_claimed() {
        let args = call_args(
            vec![],
            &[("precision", Value::Int(3)), ("color", Value::from("red"))],
        );
        let extra: BTreeMap<String, String> = args.extra(&["precision"]).unwrap();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra["color"], "red");
    }
}
