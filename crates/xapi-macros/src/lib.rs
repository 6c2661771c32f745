//! Proc macros for xapi.
//!
//! Rust has no runtime view of a function's parameters, so the signature an
//! entrypoint is built from is read at compile time instead.
//!
//! # Available Macros
//!
//! - [`macro@entrypoint`] - Derive an `xapi::Function` (signature plus body)
//!   from a plain function
//!
//! For working examples, see `xapi/tests/entrypoint_macro.rs`.

mod entrypoint;

use proc_macro::TokenStream;

/// Turns a plain function into an xapi entrypoint source.
///
/// The function is left as written (minus the parameter attributes) and a
/// sibling `<name>__function()` is generated that returns an
/// `xapi::Function` ready for `xapi::Entrypoint::from_function`.
///
/// # Example
///
/// ```rust,ignore
/// use xapi::{entrypoint, Entrypoint};
///
/// /// Subtracts b from a.
/// ///
/// /// :param a: the minuend
/// /// :param b: the subtrahend
/// #[entrypoint]
/// fn subtract(a: f64, b: f64) -> f64 {
///     a - b
/// }
///
/// let ep = Entrypoint::from_function(subtract__function())?.alias("sub");
/// ```
///
/// # Attributes
///
/// | Attribute | Target | Description |
/// |-----------|--------|-------------|
/// | `#[entrypoint(name = "x")]` | function | Command name (defaults to the function name) |
/// | `#[arg(default = expr)]` | parameter | Optional, rendered as `--name` |
/// | `#[arg(keyword)]` | parameter | Keyword-only |
/// | `#[arg(help = "..")]` | parameter | Help text (overrides `:param` doc lines) |
/// | `#[arg(metavar = "..")]` | parameter | Placeholder shown in usage |
/// | `#[arg(alias = "..")]` | parameter | Extra flag spelling, repeatable |
/// | `#[arg(annotation = expr)]` | parameter | An `xapi::Annotation` replacing the type's own |
/// | `#[varargs]` | `Vec<T>` parameter | Collects the remaining positionals |
/// | `#[kwargs]` | `String`-keyed map parameter | Collects unknown `--key value` pairs |
///
/// # Compile-Time Errors
///
/// - `self` receivers, generic or async functions
/// - `#[varargs]` on anything but `Vec<T>`, `#[kwargs]` on anything but a map
/// - more than one `#[varargs]` or `#[kwargs]` parameter
#[proc_macro_attribute]
pub fn entrypoint(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = proc_macro2::TokenStream::from(attr);
    let item = proc_macro2::TokenStream::from(item);
    entrypoint::entrypoint_impl(attr, item)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
