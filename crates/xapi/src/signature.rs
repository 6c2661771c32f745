//! Callable signatures and descriptor extraction.
//!
//! Rust has no runtime parameter introspection, so a [`Signature`] is
//! declared explicitly, either by hand with the builder methods or by the
//! `#[entrypoint]` attribute. [`extract`] then derives the argument
//! descriptors from it.

use crate::argument::{Argument, DefaultValue};
use crate::shape::Annotation;
use crate::typed::CallArgs;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// The type-erased body of an entrypoint.
pub type Callable = Rc<dyn Fn(&CallArgs) -> anyhow::Result<Value>>;

/// How a parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    /// `*args`
    VarPositional,
    KeywordOnly,
    /// `**kwargs`
    VarKeyword,
}

impl ParamKind {
    fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<Annotation>,
    pub default: DefaultValue,
    pub help: Option<String>,
    pub metavar: Option<String>,
    pub aliases: Vec<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            annotation: None,
            default: DefaultValue::Required,
            help: None,
            metavar: None,
            aliases: Vec::new(),
        }
    }

    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    pub fn varargs(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarPositional)
    }

    pub fn kwargs(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarKeyword)
    }

    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = DefaultValue::Value(default.into());
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

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// A callable's name, documentation and ordered parameter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub name: Option<String>,
    pub doc: Option<String>,
    pub params: Vec<Parameter>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        let doc = doc.into();
        if !doc.trim().is_empty() {
            self.doc = Some(doc);
        }
        self
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }
}

/// Entrypoint-level metadata read from a signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntrypointSpec {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Derives argument descriptors from a signature.
///
/// Positional parameters get sequential indexes and `*args` takes the next
/// one. Keyword-only parameters and `**kwargs` get none. Missing
/// annotations fall back to the default value's type.
pub fn extract(signature: &Signature) -> (EntrypointSpec, Vec<Argument>) {
    let spec = EntrypointSpec {
        name: signature.name.clone(),
        description: signature.doc.clone(),
    };

    let mut next_index = 0;
    let arguments = signature
        .params
        .iter()
        .map(|param| {
            let mut argument = Argument::new(param.name.as_str());

            match param.kind {
                kind if kind.is_positional() => {
                    argument.index = Some(next_index);
                    next_index += 1;
                }
                ParamKind::VarPositional => {
                    argument.index = Some(next_index);
                    argument.vararg = true;
                    next_index += 1;
                }
                ParamKind::VarKeyword => argument.vararg = true,
                _ => {}
            }

            argument.annotation = param
                .annotation
                .clone()
                .or_else(|| param.default.as_value().and_then(Annotation::of_value));
            argument.default = param.default.clone();
            argument.help = param.help.clone();
            argument.metavar = param.metavar.clone();
            argument.aliases = param.aliases.clone();

            trace!(argument = %argument.name, index = ?argument.index, vararg = argument.vararg, "extracted argument");
            argument
        })
        .collect();

    (spec, arguments)
}

/// A signature paired with its body.
#[derive(Clone)]
pub struct Function {
    pub signature: Signature,
    pub callable: Callable,
}

impl Function {
    pub fn new<F>(signature: Signature, callable: F) -> Self
    where
        F: Fn(&CallArgs) -> anyhow::Result<Value> + 'static,
    {
        Self {
            signature,
            callable: Rc::new(callable),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
