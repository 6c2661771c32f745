//! Error types for binding, conversion and dispatch.

use crate::shape::Origin;
use crate::value::Value;
use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn StdError + Send + Sync>;

/// A raw value could not be coerced to its declared annotation.
///
/// Carries the offending value, the origin that was tried and the annotation
/// it was tried against. `message` holds the underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("cannot convert {value} to {annotation}{}: {message}", argument_suffix(.argument))]
pub struct ConversionError {
    pub value: Value,
    pub origin: Origin,
    pub annotation: String,
    pub message: String,
    pub argument: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

fn argument_suffix(argument: &Option<String>) -> String {
    match argument {
        Some(name) => format!(" for argument '{}'", name),
        None => String::new(),
    }
}

impl ConversionError {
    pub fn new(
        value: Value,
        origin: Origin,
        annotation: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self {
            value,
            origin,
            annotation: annotation.to_string(),
            message: message.into(),
            argument: None,
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Records which argument was being converted.
    pub fn with_argument(mut self, name: impl Into<String>) -> Self {
        if self.argument.is_none() {
            self.argument = Some(name.into());
        }
        self
    }
}

/// Errors that can occur while building or dispatching a command tree.
#[derive(Debug, thiserror::Error)]
pub enum XapiError {
    /// No subcommand was selected.
    #[error("No entrypoint selected.")]
    EntrypointNotFound,

    /// A value could not be converted to its declared type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The selected entrypoint has nothing to execute.
    #[error("Entrypoint '{0}' has nothing to do.")]
    MissingCallable(String),

    /// An entrypoint was declared without a name.
    #[error("Entrypoint has no name.")]
    MissingName,

    /// A node with required arguments was given subcommands.
    #[error("Entrypoint '{parent}' has required argument '{argument}' and cannot host subcommands.")]
    RequiredArgumentsOnParent { parent: String, argument: String },

    /// An argument could not be mapped onto parser options.
    #[error("Cannot translate argument '{argument}': {reason}")]
    Translation { argument: String, reason: String },

    /// `configure_argument` named an argument the entrypoint does not have.
    #[error("Entrypoint '{entrypoint}' has no argument '{argument}'.")]
    UnknownArgument { entrypoint: String, argument: String },

    /// A callable asked for an argument that was not supplied.
    #[error("Required argument '{0}' not provided.")]
    MissingArgument(String),

    /// Keyword tokens nothing in the command chain accepts.
    #[error("unrecognized arguments: {}", .0.join(" "))]
    UnrecognizedArguments(Vec<String>),

    /// The command line was rejected by the parser.
    #[error(transparent)]
    Parse(#[from] clap::Error),

    /// The entrypoint body returned an error.
    #[error("Entrypoint '{entrypoint}' failed: {source}")]
    Callable {
        entrypoint: String,
        #[source]
        source: BoxError,
    },

    /// Registry lookup by name failed.
    #[error("Unknown entrypoint '{0}'.")]
    UnknownEntrypoint(String),
}

impl XapiError {
    /// Create a translation error.
    pub fn translation(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Translation {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Create a callable failure, unwrapping errors the body re-raised from
    /// this crate.
    pub fn callable(entrypoint: impl Into<String>, err: anyhow::Error) -> Self {
        match err.downcast::<XapiError>() {
            Ok(inner) => inner,
            Err(err) => Self::Callable {
                entrypoint: entrypoint.into(),
                source: err.into(),
            },
        }
    }

    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            XapiError::EntrypointNotFound => 5,
            XapiError::Conversion(_) => 10,
            XapiError::UnrecognizedArguments(_) => 2,
            XapiError::Parse(e) => e.exit_code(),
            XapiError::Callable { .. } => 1,
            XapiError::MissingCallable(_)
            | XapiError::MissingName
            | XapiError::RequiredArgumentsOnParent { .. }
            | XapiError::Translation { .. }
            | XapiError::UnknownArgument { .. }
            | XapiError::MissingArgument(_)
            | XapiError::UnknownEntrypoint(_) => 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_kinds() {
        let conversion = XapiError::from(ConversionError::new(
            Value::from("a"),
            Origin::Int,
            "int",
            "invalid digit",
        ));
        assert_eq!(XapiError::EntrypointNotFound.exit_code(), 5);
        assert_eq!(conversion.exit_code(), 10);
        assert_eq!(XapiError::MissingCallable("x".into()).exit_code(), 20);
        assert_eq!(
            XapiError::UnrecognizedArguments(vec!["--bogus".into()]).exit_code(),
            2
        );
    }

    #[test]
    fn test_conversion_message_mentions_argument() {
        let err = ConversionError::new(Value::from("a"), Origin::Int, "int", "invalid digit")
            .with_argument("count");
        let text = err.to_string();
        assert!(text.contains("invalid digit"));
        assert!(text.contains("count"));
    }

    #[test]
    fn test_callable_unwraps_nested_xapi_error() {
        let err = anyhow::Error::from(XapiError::MissingArgument("a".into()));
        assert!(matches!(
            XapiError::callable("add", err),
            XapiError::MissingArgument(_)
        ));

        let err = anyhow::anyhow!("boom");
        let wrapped = XapiError::callable("add", err);
        assert_eq!(wrapped.exit_code(), 1);
        assert!(wrapped.to_string().contains("boom"));
    }
}
