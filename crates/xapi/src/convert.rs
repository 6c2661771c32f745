//! Value conversion against annotations.
//!
//! [`Converter`] holds a registry of strategies keyed by [`Origin`]. A lookup
//! tries the exact origin, then the shape's declared bases in order, and
//! finally falls back to the default strategy which coerces scalars and
//! constructs custom types. Every failure surfaces as a [`ConversionError`]
//! carrying the offending value and annotation.

use crate::error::ConversionError;
use crate::shape::{resolve, Annotation, Origin, Shape};
use crate::value::Value;
use anyhow::{anyhow, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// A conversion strategy: `(converter, value, resolved shape, annotation)`.
///
/// Strategies receive the converter so they can recurse into element types.
pub type Strategy = Rc<dyn Fn(&Converter, Value, &Shape, &Annotation) -> anyhow::Result<Value>>;

/// Registry of conversion strategies.
#[derive(Clone)]
pub struct Converter {
    strategies: HashMap<Origin, Strategy>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("origins", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// A converter with the built-in strategies registered.
    pub fn new() -> Self {
        let mut converter = Self::empty();
        converter
            .register(Origin::Any, |_, value, _, _| Ok(value))
            .register(Origin::Union, union_strategy)
            .register(Origin::Literal, literal_strategy)
            .register(Origin::List, iterable_strategy)
            .register(Origin::Tuple, iterable_strategy)
            .register(Origin::DateTime, datetime_strategy)
            .register(Origin::Map, map_strategy)
            .register(Origin::Enum, enum_strategy)
            .register(Origin::Function, function_strategy);
        converter
    }

    /// A converter with no strategies; everything goes through the default.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registers (or replaces) the strategy for `origin`.
    pub fn register<F>(&mut self, origin: Origin, strategy: F) -> &mut Self
    where
        F: Fn(&Converter, Value, &Shape, &Annotation) -> anyhow::Result<Value> + 'static,
    {
        self.strategies.insert(origin, Rc::new(strategy));
        self
    }

    /// Finds the strategy for a shape: exact origin first, then declared
    /// bases nearest first.
    pub fn lookup(&self, shape: &Shape) -> Option<&Strategy> {
        std::iter::once(&shape.origin)
            .chain(shape.bases.iter())
            .find_map(|origin| self.strategies.get(origin))
    }

    /// Converts `value` to the shape `annotation` describes.
    ///
    /// A missing annotation, or the null type, passes the value through.
    pub fn convert(
        &self,
        value: Value,
        annotation: Option<&Annotation>,
    ) -> Result<Value, ConversionError> {
        let annotation = match annotation {
            None | Some(Annotation::NoneType) => return Ok(value),
            Some(annotation) => annotation,
        };

        let shape = resolve(annotation);
        let result = match self.lookup(&shape) {
            Some(strategy) => {
                debug!(value = %value, annotation = %annotation, "converting with registered strategy");
                strategy(self, value.clone(), &shape, annotation)
            }
            None => {
                debug!(value = %value, annotation = %annotation, "converting with default strategy");
                default_strategy(self, value.clone(), &shape, annotation)
            }
        };

        result.map_err(|err| {
            ConversionError::new(value, shape.origin, annotation, err.to_string()).with_source(err)
        })
    }
}

/// Coerces scalars, iterates bare containers and constructs custom types.
pub fn default_strategy(
    _converter: &Converter,
    value: Value,
    shape: &Shape,
    annotation: &Annotation,
) -> anyhow::Result<Value> {
    match annotation {
        Annotation::Custom(custom) => match &custom.construct {
            Some(construct) => construct(&value),
            None => match custom.bases.first() {
                Some(base) => scalar(base, value),
                None => bail!("{} has no constructor", custom.id),
            },
        },
        _ => scalar(&shape.origin, value),
    }
}

fn scalar(origin: &Origin, value: Value) -> anyhow::Result<Value> {
    match origin {
        Origin::Any | Origin::NoneType => Ok(value),
        Origin::Int => to_int(value),
        Origin::Float => to_float(value),
        Origin::Str => Ok(match value {
            Value::Str(s) => Value::Str(s),
            other => Value::Str(other.to_string()),
        }),
        Origin::Bool => to_bool(value),
        Origin::List => Ok(Value::List(iterate(value)?)),
        Origin::Tuple => Ok(Value::Tuple(iterate(value)?)),
        other => bail!("no conversion available for {}", other),
    }
}

fn to_int(value: Value) -> anyhow::Result<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => Ok(Value::Int(s.trim().parse::<i64>()?)),
        other => bail!("{} is not a number", other.kind()),
    }
}

fn to_float(value: Value) -> anyhow::Result<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Value::Str(s) => Ok(Value::Float(s.trim().parse::<f64>()?)),
        other => bail!("{} is not a number", other.kind()),
    }
}

fn to_bool(value: Value) -> anyhow::Result<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(i) => Ok(Value::Bool(i != 0)),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
            other => bail!("'{}' is not a boolean", other),
        },
        other => bail!("{} is not a boolean", other.kind()),
    }
}

/// Items of an iterable value. Strings iterate as characters, maps as keys.
fn iterate(value: Value) -> anyhow::Result<Vec<Value>> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
        other => bail!("{} is not iterable", other.kind()),
    }
}

fn iterable_strategy(
    converter: &Converter,
    value: Value,
    shape: &Shape,
    annotation: &Annotation,
) -> anyhow::Result<Value> {
    let types = shape.type_args();
    let build = |items: Vec<Value>| match shape.origin {
        Origin::Tuple => Value::Tuple(items),
        _ => Value::List(items),
    };

    match types.as_slice() {
        [] => default_strategy(converter, value, shape, annotation),
        [item] => {
            if value.is_none() {
                let converted = converter.convert(Value::None, Some(*item))?;
                return Ok(if converted.is_truthy() {
                    build(vec![converted])
                } else {
                    Value::None
                });
            }
            let items = iterate(value)?
                .into_iter()
                .map(|v| converter.convert(v, Some(*item)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(build(items))
        }
        [fixed @ .., last] if shape.is_open() => {
            let items = iterate(value)?;
            if items.len() < fixed.len() {
                bail!(
                    "annotation expected at least {} items, found {}",
                    fixed.len(),
                    items.len()
                );
            }
            let items = items
                .into_iter()
                .enumerate()
                .map(|(index, v)| converter.convert(v, Some(*fixed.get(index).unwrap_or(last))))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(build(items))
        }
        _ => {
            let items = iterate(value)?;
            if items.len() != types.len() {
                bail!(
                    "annotation expected {} items, found {}",
                    types.len(),
                    items.len()
                );
            }
            let items = items
                .into_iter()
                .zip(types.iter())
                .map(|(v, ann)| converter.convert(v, Some(*ann)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(build(items))
        }
    }
}

fn literal_strategy(
    _converter: &Converter,
    value: Value,
    shape: &Shape,
    _annotation: &Annotation,
) -> anyhow::Result<Value> {
    let members = shape.value_args();
    if members.contains(&&value) {
        return Ok(value);
    }
    if let Value::Str(token) = &value {
        if let Some(member) = members.iter().find(|m| m.to_string() == *token) {
            return Ok((*member).clone());
        }
    }
    let expected: Vec<String> = members.iter().map(|m| m.to_string()).collect();
    bail!("expected one of [{}], found '{}'", expected.join(", "), value)
}

fn datetime_strategy(
    _converter: &Converter,
    value: Value,
    _shape: &Shape,
    _annotation: &Annotation,
) -> anyhow::Result<Value> {
    match value {
        Value::None => Ok(Value::None),
        Value::Str(s) if s.trim().is_empty() => Ok(Value::None),
        Value::DateTime(dt) => Ok(Value::DateTime(dt)),
        Value::Str(s) => parse_datetime(s.trim()).map(Value::DateTime),
        other => bail!("{} is not a datetime", other.kind()),
    }
}

/// Parses ISO-8601 text. Inputs without an offset are read as UTC.
fn parse_datetime(text: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt);
    }
    let utc = FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid offset"))?;
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc().with_timezone(&utc));
        }
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| anyhow!("invalid isoformat string '{}': {}", text, e))?;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid date '{}'", text))?;
    Ok(naive.and_utc().with_timezone(&utc))
}

fn union_strategy(
    converter: &Converter,
    value: Value,
    shape: &Shape,
    _annotation: &Annotation,
) -> anyhow::Result<Value> {
    if value.is_none() && shape.admits_none() {
        return Ok(Value::None);
    }

    for member in shape.type_args() {
        if matches!(member, Annotation::NoneType) {
            continue;
        }
        match converter.convert(value.clone(), Some(member)) {
            Ok(converted) => return Ok(converted),
            Err(err) => debug!(member = %member, error = %err, "union member rejected value"),
        }
    }

    bail!("unable to convert value {}", value)
}

fn map_strategy(
    _converter: &Converter,
    value: Value,
    _shape: &Shape,
    _annotation: &Annotation,
) -> anyhow::Result<Value> {
    match value {
        Value::Map(map) => Ok(Value::Map(map)),
        Value::Str(s) => {
            let json: serde_json::Value = serde_json::from_str(&s)?;
            match Value::from(json) {
                Value::Map(map) => Ok(Value::Map(map)),
                other => bail!("expected a JSON object, found {}", other.kind()),
            }
        }
        other => bail!("{} is not a mapping", other.kind()),
    }
}

fn enum_strategy(
    _converter: &Converter,
    value: Value,
    _shape: &Shape,
    annotation: &Annotation,
) -> anyhow::Result<Value> {
    let Annotation::Enum(shape) = annotation else {
        bail!("{} is not an enumeration", annotation);
    };
    shape
        .members
        .iter()
        .find(|(name, member)| *member == value || value.as_str() == Some(name.as_str()))
        .map(|(name, _)| Value::Str(name.clone()))
        .ok_or_else(|| anyhow!("'{}' is not a valid {}", value, shape.name))
}

fn function_strategy(
    _converter: &Converter,
    value: Value,
    _shape: &Shape,
    annotation: &Annotation,
) -> anyhow::Result<Value> {
    match annotation {
        Annotation::Function(func) => (func.func)(&value),
        other => bail!("{} is not callable", other),
    }
}
