//! `#[entrypoint]` proc macro.
//!
//! Reads a free function's parameters, types and doc comment and generates
//! a companion constructor returning an `xapi::Function`: the declared
//! signature plus a type-erased body that pulls each parameter out of the
//! call arguments and invokes the original function.
//!
//! # Example
//!
//! ```rust,ignore
//! use xapi::entrypoint;
//!
//! /// Picks words.
//! #[entrypoint]
//! fn pick(count: i64, #[varargs] words: Vec<String>, #[arg(default = false)] upper: bool) -> Vec<String> {
//!     ...
//! }
//!
//! // Generates:
//! // pub fn pick__function() -> ::xapi::Function {
//! //     ::xapi::Function::new(
//! //         ::xapi::Signature::new("pick")
//! //             .doc("Picks words.")
//! //             .param(::xapi::Parameter::new("count", PositionalOrKeyword).annotation(<i64>::annotation()))
//! //             .param(::xapi::Parameter::new("words", VarPositional).annotation(<String>::annotation()))
//! //             .param(::xapi::Parameter::new("upper", PositionalOrKeyword)...default(false)),
//! //         move |__args| {
//! //             let count: i64 = __args.positional("count", 0)?;
//! //             let words: Vec<String> = __args.variadic(1, 0)?;
//! //             let upper: bool = __args.keyword_or("upper", || false)?;
//! //             Ok(IntoValue::into_value(pick(count, words, upper)))
//! //         },
//! //     )
//! // }
//! ```
//!
//! # Parameter Annotations
//!
//! | Annotation | Binds as | Read with |
//! |------------|----------|-----------|
//! | none | required positional | `positional(name, index)` |
//! | `#[arg(default = expr)]` | optional, `--name` | `keyword_or(name, default)` |
//! | `#[arg(keyword)]` | keyword-only | as above |
//! | `#[varargs]` on `Vec<T>` | `*args` | `variadic(start, trailing)` |
//! | `#[kwargs]` on a `String`-keyed map | `**kwargs` | `extra(claimed)` |
//!
//! `#[arg]` also takes `help`, `metavar`, `alias` and `annotation` (an
//! `xapi::Annotation` expression replacing the one derived from the type).
//!
//! # Return Type Handling
//!
//! | Return Type | Result |
//! |-------------|--------|
//! | none | `Value::None` |
//! | `Result<T, E>` | `E` propagates as an `anyhow::Error`, `T` via `IntoValue` |
//! | `T` | `IntoValue` |

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Expr, FnArg, ItemFn, Lit, Meta, Pat, PatType, Result, ReturnType, Token,
    Type,
};

/// How a parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Positional,
    Keyword,
    Varargs,
    Kwargs,
}

/// Settings from `#[arg(...)]`.
#[derive(Default)]
struct ArgAttr {
    default: Option<Expr>,
    keyword: bool,
    help: Option<String>,
    metavar: Option<String>,
    aliases: Vec<String>,
    annotation: Option<Expr>,
}

impl Parse for ArgAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = ArgAttr::default();
        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match meta {
                Meta::Path(path) if path.is_ident("keyword") => args.keyword = true,
                Meta::NameValue(nv) if nv.path.is_ident("default") => args.default = Some(nv.value),
                Meta::NameValue(nv) if nv.path.is_ident("annotation") => {
                    args.annotation = Some(nv.value)
                }
                Meta::NameValue(nv) if nv.path.is_ident("help") => {
                    args.help = Some(string_value(&nv.value)?)
                }
                Meta::NameValue(nv) if nv.path.is_ident("metavar") => {
                    args.metavar = Some(string_value(&nv.value)?)
                }
                Meta::NameValue(nv) if nv.path.is_ident("alias") => {
                    args.aliases.push(string_value(&nv.value)?)
                }
                other => {
                    return Err(Error::new(
                        other.span(),
                        "unknown attribute, expected `default`, `keyword`, `help`, `metavar`, `alias` or `annotation`",
                    ))
                }
            }
        }

        Ok(args)
    }
}

/// Settings from `#[entrypoint(...)]`.
#[derive(Default)]
struct EntrypointAttr {
    name: Option<String>,
}

impl Parse for EntrypointAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = EntrypointAttr::default();
        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    args.name = Some(string_value(&nv.value)?)
                }
                other => {
                    return Err(Error::new(
                        other.span(),
                        "unknown attribute, expected `name`",
                    ))
                }
            }
        }

        Ok(args)
    }
}

/// Parsed parameter information
struct ParamInfo {
    name: String,
    ty: Type,
    binding: Binding,
    arg: ArgAttr,
}

fn string_value(expr: &Expr) -> Result<String> {
    if let Expr::Lit(expr_lit) = expr {
        if let Lit::Str(lit_str) = &expr_lit.lit {
            return Ok(lit_str.value());
        }
    }
    Err(Error::new(expr.span(), "expected string literal"))
}

fn parse_param(pat_type: &PatType) -> Result<ParamInfo> {
    let name = match pat_type.pat.as_ref() {
        Pat::Ident(ident) => ident.ident.to_string(),
        other => {
            return Err(Error::new(
                other.span(),
                "expected identifier pattern for parameter",
            ))
        }
    };

    let mut binding = Binding::Positional;
    let mut arg = ArgAttr::default();
    for attr in &pat_type.attrs {
        if attr.path().is_ident("varargs") {
            binding = Binding::Varargs;
        } else if attr.path().is_ident("kwargs") {
            binding = Binding::Kwargs;
        } else if attr.path().is_ident("arg") {
            if attr.meta.require_path_only().is_err() {
                arg = attr.parse_args()?;
            }
        }
    }

    if binding == Binding::Positional && arg.keyword {
        binding = Binding::Keyword;
    }
    let ty = (*pat_type.ty).clone();

    match binding {
        Binding::Varargs if !is_vec_type(&ty) => {
            return Err(Error::new(ty.span(), "#[varargs] parameters must be Vec<T>"))
        }
        Binding::Kwargs if map_value_type(&ty).is_none() => {
            return Err(Error::new(
                ty.span(),
                "#[kwargs] parameters must be a map keyed by String",
            ))
        }
        Binding::Varargs | Binding::Kwargs if arg.default.is_some() => {
            return Err(Error::new(
                pat_type.span(),
                "variadic parameters cannot take a default",
            ))
        }
        _ => {}
    }

    Ok(ParamInfo {
        name,
        ty,
        binding,
        arg,
    })
}

/// Check if a type is Vec<T>
fn is_vec_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Vec";
        }
    }
    false
}

/// Check if a type is Result<T, E>
fn is_result_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Result";
        }
    }
    false
}

/// Extract the inner type from Vec<T>
fn extract_inner_type(ty: &Type) -> Option<&Type> {
    generic_types(ty).into_iter().next()
}

/// Extract the value type from BTreeMap<String, V> or HashMap<String, V>
fn map_value_type(ty: &Type) -> Option<&Type> {
    let types = generic_types(ty);
    match types.as_slice() {
        [_, value] => Some(value),
        _ => None,
    }
}

fn generic_types(ty: &Type) -> Vec<&Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                return args
                    .args
                    .iter()
                    .filter_map(|arg| match arg {
                        syn::GenericArgument::Type(inner) => Some(inner),
                        _ => None,
                    })
                    .collect();
            }
        }
    }
    Vec::new()
}

/// Joins `///` lines, dropping the single space rustdoc leaves after `///`.
fn doc_text(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => string_value(&nv.value).ok(),
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').map(str::to_string).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The `Parameter` builder expression for one parameter.
fn generate_parameter(param: &ParamInfo) -> TokenStream {
    let name = &param.name;
    let ty = &param.ty;

    let kind = match param.binding {
        Binding::Positional => quote! { ::xapi::ParamKind::PositionalOrKeyword },
        Binding::Keyword => quote! { ::xapi::ParamKind::KeywordOnly },
        Binding::Varargs => quote! { ::xapi::ParamKind::VarPositional },
        Binding::Kwargs => quote! { ::xapi::ParamKind::VarKeyword },
    };

    let annotation = match (&param.arg.annotation, param.binding) {
        (Some(expr), _) => Some(quote! { .annotation(#expr) }),
        (None, Binding::Varargs) => extract_inner_type(ty)
            .map(|inner| quote! { .annotation(<#inner as ::xapi::Shaped>::annotation()) }),
        (None, Binding::Kwargs) => None,
        (None, _) => Some(quote! { .annotation(<#ty as ::xapi::Shaped>::annotation()) }),
    };

    let default = param.arg.default.as_ref().map(|expr| {
        quote! {
            .default({
                let __default: #ty = #expr;
                ::xapi::IntoValue::into_value(__default)
            })
        }
    });
    let help = param.arg.help.as_ref().map(|h| quote! { .help(#h) });
    let metavar = param.arg.metavar.as_ref().map(|m| quote! { .metavar(#m) });
    let aliases = param.arg.aliases.iter().map(|a| quote! { .alias(#a) });

    quote! {
        ::xapi::Parameter::new(#name, #kind)
            #annotation
            #default
            #help
            #metavar
            #(#aliases)*
    }
}

/// Extraction statements, in declaration order.
///
/// Required parameters occupy the positional list in order, with varargs
/// spliced in where they are declared. Defaulted parameters arrive as
/// keywords only when they differ from their default.
fn generate_extractions(params: &[ParamInfo]) -> Vec<TokenStream> {
    let required = |p: &&ParamInfo| {
        matches!(p.binding, Binding::Positional | Binding::Keyword) && p.arg.default.is_none()
    };
    let varargs_at = params.iter().position(|p| p.binding == Binding::Varargs);
    let before = params[..varargs_at.unwrap_or(params.len())]
        .iter()
        .filter(required)
        .count();
    let after = varargs_at.map_or(0, |at| params[at..].iter().filter(required).count());
    let claimed: Vec<&str> = params
        .iter()
        .filter(|p| p.arg.default.is_some())
        .map(|p| p.name.as_str())
        .collect();

    let mut extractions = Vec::with_capacity(params.len());
    let mut index = 0usize;
    let mut back = after;

    for param in params {
        let ident = format_ident!("{}", param.name);
        let name = &param.name;
        let ty = &param.ty;

        let extraction = match (&param.arg.default, param.binding) {
            (_, Binding::Varargs) => {
                let inner = extract_inner_type(ty).unwrap_or(ty);
                quote! {
                    let #ident: #ty = __args.variadic::<#inner>(#before, #after)?;
                }
            }
            (_, Binding::Kwargs) => {
                let value = map_value_type(ty).unwrap_or(ty);
                quote! {
                    let #ident: #ty = __args.extra::<#value>(&[#(#claimed),*])?.into_iter().collect();
                }
            }
            (Some(expr), _) => quote! {
                let #ident: #ty = __args.keyword_or(#name, || {
                    let __default: #ty = #expr;
                    __default
                })?;
            },
            (None, _) if index < before => {
                let at = index;
                index += 1;
                quote! {
                    let #ident: #ty = __args.positional(#name, #at)?;
                }
            }
            (None, _) => {
                let from_end = back;
                back = back.saturating_sub(1);
                quote! {
                    let #ident: #ty = __args.trailing(#name, #from_end)?;
                }
            }
        };
        extractions.push(extraction);
    }

    extractions
}

/// Main implementation of the #[entrypoint] macro
pub fn entrypoint_impl(attr: TokenStream, item: TokenStream) -> Result<TokenStream> {
    let fn_item: ItemFn = syn::parse2(item)?;
    let attr: EntrypointAttr = syn::parse2(attr)?;

    let fn_name = &fn_item.sig.ident;
    let fn_vis = &fn_item.vis;
    let constructor = format_ident!("{}__function", fn_name);
    let entrypoint_name = attr.name.unwrap_or_else(|| fn_name.to_string());

    if let Some(asyncness) = &fn_item.sig.asyncness {
        return Err(Error::new(
            asyncness.span(),
            "#[entrypoint] functions must be synchronous",
        ));
    }
    if !fn_item.sig.generics.params.is_empty() {
        return Err(Error::new(
            fn_item.sig.generics.span(),
            "#[entrypoint] functions cannot be generic",
        ));
    }

    let mut params: Vec<ParamInfo> = Vec::new();
    for fn_arg in &fn_item.sig.inputs {
        match fn_arg {
            FnArg::Typed(pat_type) => params.push(parse_param(pat_type)?),
            FnArg::Receiver(_) => {
                return Err(Error::new(
                    fn_arg.span(),
                    "#[entrypoint] functions cannot have self parameter",
                ));
            }
        }
    }
    for binding in [Binding::Varargs, Binding::Kwargs] {
        if params.iter().filter(|p| p.binding == binding).count() > 1 {
            return Err(Error::new(
                fn_item.sig.inputs.span(),
                "at most one #[varargs] and one #[kwargs] parameter",
            ));
        }
    }

    let doc = doc_text(&fn_item.attrs);
    let parameters: Vec<TokenStream> = params.iter().map(generate_parameter).collect();
    let extractions = generate_extractions(&params);
    let call_args: Vec<_> = params
        .iter()
        .map(|p| format_ident!("{}", p.name))
        .collect();

    let call_and_return = match &fn_item.sig.output {
        ReturnType::Default => quote! {
            #fn_name(#(#call_args),*);
            Ok(::xapi::Value::None)
        },
        ReturnType::Type(_, ty) if is_result_type(ty) => quote! {
            let __output = #fn_name(#(#call_args),*)?;
            Ok(::xapi::IntoValue::into_value(__output))
        },
        ReturnType::Type(..) => quote! {
            Ok(::xapi::IntoValue::into_value(#fn_name(#(#call_args),*)))
        },
    };

    // Strip attributes from the original function's parameters
    let mut clean_fn = fn_item.clone();
    for fn_arg in &mut clean_fn.sig.inputs {
        if let FnArg::Typed(pat_type) = fn_arg {
            pat_type.attrs.retain(|attr| {
                !attr.path().is_ident("arg")
                    && !attr.path().is_ident("varargs")
                    && !attr.path().is_ident("kwargs")
            });
        }
    }

    Ok(quote! {
        #clean_fn

        #[allow(non_snake_case)]
        #fn_vis fn #constructor() -> ::xapi::Function {
            ::xapi::Function::new(
                ::xapi::Signature::new(#entrypoint_name)
                    .doc(#doc)
                    #(.param(#parameters))*,
                move |__args: &::xapi::CallArgs| -> ::xapi::__private::anyhow::Result<::xapi::Value> {
                    #(#extractions)*
                    #call_and_return
                },
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(tokens: TokenStream) -> ParamInfo {
        let fn_item: ItemFn = syn::parse2(quote! { fn f(#tokens) {} }).unwrap();
        match fn_item.sig.inputs.first().unwrap() {
            FnArg::Typed(pat_type) => parse_param(pat_type).unwrap(),
            FnArg::Receiver(_) => unreachable!(),
        }
    }

    #[test]
    fn test_is_vec_type() {
        let ty: Type = syn::parse_quote!(Vec<String>);
        assert!(is_vec_type(&ty));

        let ty: Type = syn::parse_quote!(String);
        assert!(!is_vec_type(&ty));
    }

    #[test]
    fn test_map_value_type() {
        let ty: Type = syn::parse_quote!(BTreeMap<String, i64>);
        let value = map_value_type(&ty).map(|v| quote!(#v).to_string());
        assert_eq!(value.as_deref(), Some("i64"));

        let ty: Type = syn::parse_quote!(Vec<String>);
        assert!(map_value_type(&ty).is_none());
    }

    #[test]
    fn test_parse_arg_attribute() {
        let info = param(quote! { #[arg(default = 2, help = "digits", alias = "-p")] precision: i64 });
        assert_eq!(info.name, "precision");
        assert_eq!(info.binding, Binding::Positional);
        assert!(info.arg.default.is_some());
        assert_eq!(info.arg.help.as_deref(), Some("digits"));
        assert_eq!(info.arg.aliases, vec!["-p"]);

        let info = param(quote! { #[arg(keyword, default = false)] upper: bool });
        assert_eq!(info.binding, Binding::Keyword);
    }

    #[test]
    fn test_varargs_requires_vec() {
        let fn_item: ItemFn = syn::parse2(quote! { fn f(#[varargs] words: String) {} }).unwrap();
        let FnArg::Typed(pat_type) = fn_item.sig.inputs.first().unwrap() else {
            unreachable!()
        };
        assert!(parse_param(pat_type).is_err());
    }

    #[test]
    fn test_doc_text() {
        let fn_item: ItemFn = syn::parse2(quote! {
            /// Adds numbers.
            ///
            /// :param a: first
            fn add() {}
        })
        .unwrap();
        assert_eq!(doc_text(&fn_item.attrs), "Adds numbers.\n\n:param a: first");
    }

    #[test]
    fn test_extraction_layout_around_varargs() {
        let params = vec![
            param(quote! { first: i64 }),
            param(quote! { #[varargs] middle: Vec<i64> }),
            param(quote! { #[arg(default = 1)] step: i64 }),
            param(quote! { last: i64 }),
        ];
        let code: Vec<String> = generate_extractions(&params)
            .iter()
            .map(|t| t.to_string().replace(' ', ""))
            .collect();
        assert!(code[0].contains("positional(\"first\",0usize)"));
        assert!(code[1].contains("variadic::<i64>(1usize,1usize)"));
        assert!(code[2].contains("keyword_or(\"step\""));
        assert!(code[3].contains("trailing(\"last\",1usize)"));
    }

    #[test]
    fn test_rejects_self() {
        let result = entrypoint_impl(
            TokenStream::new(),
            quote! { fn method(&self) {} },
        );
        assert!(result.is_err());
    }
}
