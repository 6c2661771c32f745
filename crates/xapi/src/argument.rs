//! Argument descriptors.
//!
//! An [`Argument`] describes one callable parameter as a CLI argument and
//! knows how to fold a raw parsed value into the positional and keyword
//! arguments of the eventual call.

use crate::convert::Converter;
use crate::error::ConversionError;
use crate::shape::Annotation;
use crate::value::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A parameter default. `Required` is distinct from a `None` default.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultValue {
    #[default]
    Required,
    Value(Value),
}

impl DefaultValue {
    pub fn is_required(&self) -> bool {
        matches!(self, DefaultValue::Required)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DefaultValue::Required => None,
            DefaultValue::Value(v) => Some(v),
        }
    }

    /// The default value, or `None` when required.
    pub fn value_or_none(&self) -> Value {
        self.as_value().cloned().unwrap_or(Value::None)
    }
}

/// Describes one callable parameter as a CLI argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    /// Shape used for conversion and translation; `None` means opaque text.
    pub annotation: Option<Annotation>,
    /// Call position; `None` for keyword-style parameters.
    pub index: Option<usize>,
    pub default: DefaultValue,
    /// Collects zero or more values: `*args` with an index, `**kwargs`
    /// without one.
    pub vararg: bool,
    pub aliases: Vec<String>,
    pub help: Option<String>,
    pub metavar: Option<String>,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            index: None,
            default: DefaultValue::Required,
            vararg: false,
            aliases: Vec::new(),
            help: None,
            metavar: None,
        }
    }

    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = DefaultValue::Value(default.into());
        self
    }

    pub fn vararg(mut self) -> Self {
        self.vararg = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = Some(metavar.into());
        self
    }

    /// Required non-variadic argument.
    pub fn is_required(&self) -> bool {
        !self.vararg && self.default.is_required()
    }

    /// `**kwargs`-style collector.
    pub fn is_keyword_collector(&self) -> bool {
        self.vararg && self.index.is_none()
    }

    /// `*args`-style collector.
    pub fn is_variadic_positional(&self) -> bool {
        self.vararg && self.index.is_some()
    }

    /// Value used when nothing was parsed for this argument.
    pub fn missing_value(&self) -> Value {
        match (self.vararg, self.index) {
            (true, Some(_)) => Value::List(Vec::new()),
            (true, None) => Value::Map(BTreeMap::new()),
            (false, _) => self.default.value_or_none(),
        }
    }

    /// Converts `value` and folds it into the call arguments.
    ///
    /// Required arguments append to `args`; keyword-style arguments land in
    /// `kwargs` only when the converted value differs from the default.
    pub fn generate_call_arg(
        &self,
        converter: &Converter,
        value: Value,
        args: &mut Vec<Value>,
        kwargs: &mut BTreeMap<String, Value>,
    ) -> Result<(), ConversionError> {
        debug!(argument = %self.name, value = %value, "generating call arg");
        let tag = |e: ConversionError| e.with_argument(self.name.as_str());

        if self.is_variadic_positional() {
            let list = Annotation::List(self.annotation.iter().cloned().collect());
            match converter.convert(value, Some(&list)).map_err(tag)? {
                Value::List(items) | Value::Tuple(items) => args.extend(items),
                Value::None => {}
                other => args.push(other),
            }
            return Ok(());
        }

        if self.is_keyword_collector() {
            if let Value::Map(map) = converter.convert(value, Some(&Annotation::Map)).map_err(tag)? {
                debug!(argument = %self.name, count = map.len(), "merging keyword collector");
                kwargs.extend(map);
            }
            return Ok(());
        }

        let converted = converter.convert(value, self.annotation.as_ref()).map_err(tag)?;

        match &self.default {
            DefaultValue::Required => args.push(converted),
            DefaultValue::Value(default) if *default != converted => {
                kwargs.insert(self.name.clone(), converted);
            }
            DefaultValue::Value(_) => {
                debug!(argument = %self.name, "value equals default, omitted");
            }
        }
        Ok(())
    }
}
