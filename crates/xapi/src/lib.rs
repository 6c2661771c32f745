//! # xapi - declarative CLI bindings
//!
//! xapi turns annotated functions into a command-line interface. Each
//! function becomes an [`Entrypoint`]; its parameters become arguments whose
//! CLI grammar is derived from their type annotations; the tree of
//! entrypoints becomes a clap command tree. At dispatch the selected
//! entrypoint's raw string values are converted back into typed call
//! arguments and the function is invoked.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use xapi::{entrypoint, Entrypoint, Xapi};
//!
//! /// Adds two numbers.
//! ///
//! /// :param a: the first term
//! /// :param b: the second term
//! #[entrypoint]
//! fn add(a: f64, b: f64, #[arg(default = 2)] precision: i64) -> f64 {
//!     let scale = 10f64.powi(precision as i32);
//!     ((a + b) * scale).round() / scale
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = Xapi::new("xmath").entrypoint(Entrypoint::from_function(add__function())?);
//!     println!("{}", app.run()?);
//!     Ok(())
//! }
//! ```
//!
//! `xmath add 1 2 --precision 0` prints `3.0`.
//!
//! ## Pieces
//!
//! - [`shape`]: annotations and their resolved shape (origin plus arguments)
//! - [`convert`]: per-origin conversion of raw values into annotated values
//! - [`argument`]: argument descriptors and call-argument generation
//! - [`signature`]: explicit function signatures and their introspection
//! - [`entrypoint`]: the command tree
//! - [`translate`]: annotation to CLI grammar
//! - [`parser`]: clap command building, parsing and value extraction
//! - [`executor`]: effects and chain dispatch
//! - [`registry`]: the [`Xapi`] application object
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod argument;
pub mod convert;
pub mod docinfo;
pub mod entrypoint;
pub mod error;
pub mod executor;
pub mod parser;
pub mod registry;
pub mod shape;
pub mod signature;
pub mod translate;
pub mod typed;
pub mod value;

pub use argument::{Argument, DefaultValue};
pub use convert::{Converter, Strategy};
pub use docinfo::DocInfo;
pub use entrypoint::Entrypoint;
pub use error::{ConversionError, XapiError};
pub use registry::Xapi;
pub use shape::{resolve, Annotation, CustomType, EnumShape, NamedFn, Origin, Shape, TypeArg};
pub use signature::{Callable, Function, ParamKind, Parameter, Signature};
pub use translate::{Action, Nargs, ParserOptions, Translation, Translator};
pub use typed::{CallArgs, FromValue, IntoValue, Shaped};
pub use value::{Value, KWARG_MARKER};

pub use xapi_macros::entrypoint;

#[doc(hidden)]
pub mod __private {
    pub use anyhow;
}
