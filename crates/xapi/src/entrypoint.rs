//! The entrypoint tree.
//!
//! An [`Entrypoint`] is a command: a callable, its argument descriptors and
//! its subcommands. Children are owned by their parent; the parent of a node
//! is whatever precedes it in the chain resolved at dispatch time.

use crate::argument::Argument;
use crate::convert::Converter;
use crate::docinfo::DocInfo;
use crate::error::{ConversionError, XapiError};
use crate::signature::{extract, Callable, Function};
use crate::typed::CallArgs;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// A command node.
#[derive(Clone, Default)]
pub struct Entrypoint {
    pub name: String,
    pub aliases: Vec<String>,
    /// One-line help shown in the parent's command list.
    pub help: Option<String>,
    pub description: Option<String>,
    pub epilog: Option<String>,
    pub usage: Option<String>,
    pub deprecated: bool,
    pub callable: Option<Callable>,
    pub arguments: Vec<Argument>,
    pub entrypoints: Vec<Entrypoint>,
}

impl fmt::Debug for Entrypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entrypoint")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("callable", &self.callable.is_some())
            .field("arguments", &self.arguments)
            .field("entrypoints", &self.entrypoints)
            .finish_non_exhaustive()
    }
}

impl Entrypoint {
    /// A node without a callable. It only hosts subcommands.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds a node from a function's signature.
    ///
    /// Doc comment text fills the description, the summary line fills `help`
    /// and `:param` lines fill argument help the signature left empty.
    pub fn from_function(function: Function) -> Result<Self, XapiError> {
        let (spec, mut arguments) = extract(&function.signature);
        let name = spec.name.filter(|n| !n.is_empty()).ok_or(XapiError::MissingName)?;

        let doc = spec.description.as_deref().map(DocInfo::parse).unwrap_or_default();
        for argument in arguments.iter_mut() {
            if argument.help.is_none() {
                argument.help = doc.param(&argument.name).map(str::to_string);
            }
        }

        debug!(entrypoint = %name, arguments = arguments.len(), "entrypoint ready");

        Ok(Self {
            name,
            help: doc.summary,
            description: doc.description,
            callable: Some(function.callable),
            arguments,
            ..Self::default()
        })
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
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

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn epilog(mut self, epilog: impl Into<String>) -> Self {
        self.epilog = Some(epilog.into());
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Adjusts an introspected argument descriptor in place.
    pub fn configure_argument<F>(mut self, name: &str, configure: F) -> Result<Self, XapiError>
    where
        F: FnOnce(Argument) -> Argument,
    {
        let position = self
            .arguments
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| XapiError::UnknownArgument {
                entrypoint: self.name.clone(),
                argument: name.to_string(),
            })?;
        let argument = self.arguments.remove(position);
        self.arguments.insert(position, configure(argument));
        Ok(self)
    }

    /// Builder form of [`add_subentrypoint`](Self::add_subentrypoint).
    pub fn subentrypoint(mut self, child: Entrypoint) -> Result<Self, XapiError> {
        self.add_subentrypoint(child)?;
        Ok(self)
    }

    /// Appends a subcommand.
    ///
    /// Fails when this node has a required argument: it could never be
    /// supplied ahead of the subcommand token.
    pub fn add_subentrypoint(&mut self, child: Entrypoint) -> Result<(), XapiError> {
        if let Some(required) = self.arguments.iter().find(|a| a.is_required()) {
            return Err(XapiError::RequiredArgumentsOnParent {
                parent: self.name.clone(),
                argument: required.name.clone(),
            });
        }
        self.entrypoints.push(child);
        Ok(())
    }

    pub fn is_group(&self) -> bool {
        self.callable.is_none()
    }

    /// True when this node accepts arbitrary keyword arguments.
    pub fn has_keyword_collector(&self) -> bool {
        self.arguments.iter().any(Argument::is_keyword_collector)
    }

    /// True when this node or any descendant accepts arbitrary keyword
    /// arguments.
    pub fn tolerates_extra_kwargs(&self) -> bool {
        self.has_keyword_collector() || self.entrypoints.iter().any(Self::tolerates_extra_kwargs)
    }

    /// True when `name` is this node's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Folds parsed parameters into call arguments in declaration order.
    ///
    /// Parameters missing from `params` fall back to the descriptor's own
    /// default, or an empty collection for varargs.
    pub fn generate_call_args(
        &self,
        converter: &Converter,
        params: &BTreeMap<String, Value>,
    ) -> Result<CallArgs, ConversionError> {
        let mut call = CallArgs::default();
        for argument in &self.arguments {
            let value = params
                .get(&argument.name)
                .cloned()
                .unwrap_or_else(|| argument.missing_value());
            argument.generate_call_arg(converter, value, &mut call.args, &mut call.kwargs)?;
        }
        Ok(call)
    }

    /// Runs the callable with arguments built from `params`.
    pub fn execute(
        &self,
        converter: &Converter,
        params: &BTreeMap<String, Value>,
    ) -> Result<Value, XapiError> {
        let callable = self
            .callable
            .as_ref()
            .ok_or_else(|| XapiError::MissingCallable(self.name.clone()))?;

        if self.deprecated {
            warn!(entrypoint = %self.name, "entrypoint is deprecated");
        }

        let call = self.generate_call_args(converter, params)?;
        debug!(entrypoint = %self.name, args = call.len(), kwargs = call.kwargs.len(), "executing entrypoint");
        callable(&call).map_err(|e| XapiError::callable(self.name.as_str(), e))
    }
}
