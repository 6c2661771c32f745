//! The application registry.
//!
//! [`Xapi`] owns the top-level entrypoints and effects, the conversion and
//! translation registries, and program presentation. Registration is an
//! explicit builder call made during setup.

use crate::convert::Converter;
use crate::entrypoint::Entrypoint;
use crate::error::XapiError;
use crate::executor::Executor;
use crate::parser::{build, usage_for, CommandTree, ProgramInfo};
use crate::translate::Translator;
use crate::value::Value;
use std::ffi::OsString;
use tracing::debug;

/// A CLI application assembled from entrypoints.
///
/// ```rust,ignore
/// let app = Xapi::new("xmath")
///     .about("Small math toolbox")
///     .effect(Entrypoint::from_function(setup_logging__function())?)
///     .entrypoint(Entrypoint::from_function(add__function())?);
///
/// let result = app.run()?;
/// ```
#[derive(Debug)]
pub struct Xapi {
    program: ProgramInfo,
    exit_on_error: bool,
    entrypoints: Vec<Entrypoint>,
    effects: Vec<Entrypoint>,
    converter: Converter,
    translator: Translator,
}

impl Xapi {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: ProgramInfo {
                name: program.into(),
                ..ProgramInfo::default()
            },
            exit_on_error: true,
            entrypoints: Vec::new(),
            effects: Vec::new(),
            converter: Converter::new(),
            translator: Translator::new(),
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.program.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.program.version = Some(version.into());
        self
    }

    /// When set (the default), failures print usage and exit the process.
    pub fn exit_on_error(mut self, exit_on_error: bool) -> Self {
        self.exit_on_error = exit_on_error;
        self
    }

    /// Replaces the value conversion registry.
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    /// Replaces the grammar translation registry.
    pub fn translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    /// Registers a selectable top-level command.
    pub fn entrypoint(mut self, entrypoint: Entrypoint) -> Self {
        debug!(entrypoint = %entrypoint.name, "registered entrypoint");
        self.entrypoints.push(entrypoint);
        self
    }

    /// Registers an effect. Effects run on every invocation, in
    /// registration order, before the selected command.
    pub fn effect(mut self, effect: Entrypoint) -> Self {
        debug!(effect = %effect.name, "registered effect");
        self.effects.push(effect);
        self
    }

    pub fn entrypoints(&self) -> &[Entrypoint] {
        &self.entrypoints
    }

    pub fn effects(&self) -> &[Entrypoint] {
        &self.effects
    }

    /// Finds a top-level effect or entrypoint by name or alias.
    pub fn get_entrypoint(&self, name: &str) -> Result<&Entrypoint, XapiError> {
        self.effects
            .iter()
            .chain(&self.entrypoints)
            .find(|e| e.answers_to(name))
            .ok_or_else(|| XapiError::UnknownEntrypoint(name.to_string()))
    }

    /// Builds the clap command tree for the current registrations.
    pub fn command_tree(&self) -> Result<CommandTree, XapiError> {
        build(&self.program, &self.entrypoints, &self.effects, &self.translator)
    }

    /// Runs with the process arguments.
    pub fn run(&self) -> Result<Value, XapiError> {
        self.run_from(std::env::args_os())
    }

    /// Runs with `args`, whose first element is the program name.
    pub fn run_from<I, T>(&self, args: I) -> Result<Value, XapiError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let argv: Vec<String> = args
            .into_iter()
            .map(|a| a.into().to_string_lossy().into_owned())
            .collect();

        let tree = match self.command_tree() {
            Ok(tree) => tree,
            Err(err) => return self.fail(None, &argv, err),
        };

        let executor = Executor {
            tree: &tree,
            entrypoints: &self.entrypoints,
            effects: &self.effects,
            converter: &self.converter,
        };

        match executor.execute(argv.clone()) {
            Ok(value) => Ok(value),
            Err(err) => self.fail(Some(&tree), &argv, err),
        }
    }

    fn fail(
        &self,
        tree: Option<&CommandTree>,
        argv: &[String],
        err: XapiError,
    ) -> Result<Value, XapiError> {
        debug!(error = %err, code = err.exit_code(), "invocation failed");
        if !self.exit_on_error {
            return Err(err);
        }

        let err = match err {
            XapiError::Parse(e) => e.exit(),
            other => other,
        };
        if let Some(tree) = tree {
            if !matches!(err, XapiError::Callable { .. }) {
                eprintln!("{}", usage_for(&tree.command, argv));
            }
        }
        eprintln!("{}: error: {}", self.program.name, err);
        std::process::exit(err.exit_code())
    }
}
