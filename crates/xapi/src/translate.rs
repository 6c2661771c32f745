//! Grammar translation: argument descriptors to parser options.
//!
//! [`Translator::translate`] decides between flag and positional syntax and
//! fills a [`ParserOptions`] bag. Annotation-specific options come from a
//! registry of handlers keyed by [`Origin`], looked up by exact origin and
//! then by the shape's declared bases.

use crate::argument::Argument;
use crate::error::XapiError;
use crate::shape::{resolve, Annotation, Origin, Shape};
use crate::value::{Value, KWARG_MARKER};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Token arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    Exact(usize),
    ZeroOrMore,
}

/// Parser behavior when the argument is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StoreTrue,
    StoreFalse,
    /// Store [`ParserOptions::constant`].
    StoreConst,
}

/// Option bag handed to the parser for one argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserOptions {
    pub help: Option<String>,
    pub metavar: Option<String>,
    /// Binding key, set when it differs from the primary token.
    pub dest: Option<String>,
    pub default: Option<Value>,
    pub choices: Option<Vec<String>>,
    pub nargs: Option<Nargs>,
    pub action: Option<Action>,
    pub constant: Option<Value>,
}

impl ParserOptions {
    /// Overlays every option `other` sets.
    pub fn merge(&mut self, other: ParserOptions) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(help, metavar, dest, default, choices, nargs, action, constant);
    }
}

/// Name tokens (primary first, then aliases) plus their options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub tokens: Vec<String>,
    pub options: ParserOptions,
}

impl Translation {
    /// True when the primary token is a flag.
    pub fn is_flag(&self) -> bool {
        self.tokens.first().is_some_and(|t| t.starts_with('-'))
    }

    /// Key the parsed value binds to.
    pub fn dest<'a>(&'a self, argument: &'a Argument) -> &'a str {
        self.options.dest.as_deref().unwrap_or(&argument.name)
    }
}

/// Handler for one origin: `(translator, argument, annotation, shape, context)`.
pub type Handler =
    Rc<dyn Fn(&Translator, &Argument, &Annotation, &Shape, &mut Translation) -> Result<(), XapiError>>;

/// Registry of annotation handlers.
#[derive(Clone)]
pub struct Translator {
    handlers: HashMap<Origin, Handler>,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("origins", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    /// A translator with the built-in handlers registered.
    pub fn new() -> Self {
        let mut translator = Self {
            handlers: HashMap::new(),
        };
        translator
            .register(Origin::Bool, bool_handler)
            .register(Origin::Literal, literal_handler)
            .register(Origin::Enum, enum_handler)
            .register(Origin::List, |_, _, _, _, ctx| {
                ctx.options.nargs = Some(Nargs::ZeroOrMore);
                Ok(())
            })
            .register(Origin::Tuple, tuple_handler)
            .register(Origin::Union, union_handler);
        translator
    }

    /// Registers (or replaces) the handler for `origin`.
    pub fn register<F>(&mut self, origin: Origin, handler: F) -> &mut Self
    where
        F: Fn(&Translator, &Argument, &Annotation, &Shape, &mut Translation) -> Result<(), XapiError>
            + 'static,
    {
        self.handlers.insert(origin, Rc::new(handler));
        self
    }

    /// Exact origin first, then declared bases nearest first.
    pub fn lookup(&self, shape: &Shape) -> Option<&Handler> {
        std::iter::once(&shape.origin)
            .chain(shape.bases.iter())
            .find_map(|origin| self.handlers.get(origin))
    }

    /// Maps a descriptor onto name tokens and parser options.
    ///
    /// The argument becomes `--dashed-name` when it has a default, collects
    /// keywords, or is boolean; otherwise it is positional.
    pub fn translate(&self, argument: &Argument) -> Result<Translation, XapiError> {
        let flag = argument.default.as_value().is_some()
            || argument.is_keyword_collector()
            || matches!(argument.annotation, Some(Annotation::Bool));
        self.translate_as(argument, flag)
    }

    /// Like [`translate`](Self::translate) but always renders a flag.
    pub fn translate_flag(&self, argument: &Argument) -> Result<Translation, XapiError> {
        self.translate_as(argument, true)
    }

    fn translate_as(&self, argument: &Argument, flag: bool) -> Result<Translation, XapiError> {
        if argument.name.is_empty() {
            return Err(XapiError::translation("", "argument has no name"));
        }

        let mut ctx = Translation::default();
        if flag {
            let dashed = argument.name.replace('_', "-");
            if dashed != argument.name {
                ctx.options.dest = Some(argument.name.clone());
            }
            ctx.tokens.push(format!("--{}", dashed));
        } else {
            ctx.tokens.push(argument.name.clone());
        }
        ctx.tokens.extend(argument.aliases.iter().cloned());

        ctx.options.help = argument.help.clone();
        ctx.options.metavar = argument.metavar.clone();
        ctx.options.default = argument.default.as_value().cloned();

        if argument.is_variadic_positional() {
            ctx.options.nargs = Some(Nargs::ZeroOrMore);
        } else if argument.is_keyword_collector() {
            ctx.options.action = Some(Action::StoreConst);
            ctx.options.constant = Some(Value::from(KWARG_MARKER));
        } else if let Some(annotation) = &argument.annotation {
            self.apply(argument, annotation, &mut ctx)?;
        }

        debug!(argument = %argument.name, tokens = ?ctx.tokens, options = ?ctx.options, "translated argument");
        Ok(ctx)
    }

    /// Applies the handler for `annotation`, if any, to `ctx`.
    pub fn apply(
        &self,
        argument: &Argument,
        annotation: &Annotation,
        ctx: &mut Translation,
    ) -> Result<(), XapiError> {
        let shape = resolve(annotation);
        match self.lookup(&shape) {
            Some(handler) => handler(self, argument, annotation, &shape, ctx),
            None => Ok(()),
        }
    }
}

/// Presence flips the default: `--flag` stores the opposite of it.
fn bool_handler(
    _translator: &Translator,
    argument: &Argument,
    _annotation: &Annotation,
    _shape: &Shape,
    ctx: &mut Translation,
) -> Result<(), XapiError> {
    let default_state = argument.default.as_value() == Some(&Value::Bool(true));
    ctx.options.default = Some(Value::Bool(default_state));
    ctx.options.action = Some(if default_state {
        Action::StoreFalse
    } else {
        Action::StoreTrue
    });
    Ok(())
}

fn literal_handler(
    _translator: &Translator,
    argument: &Argument,
    _annotation: &Annotation,
    shape: &Shape,
    ctx: &mut Translation,
) -> Result<(), XapiError> {
    let choices: Vec<String> = shape.value_args().iter().map(|v| v.to_string()).collect();
    if choices.is_empty() {
        return Err(XapiError::translation(
            argument.name.as_str(),
            "literal has no members",
        ));
    }
    ctx.options.choices = Some(choices);
    Ok(())
}

fn enum_handler(
    _translator: &Translator,
    _argument: &Argument,
    annotation: &Annotation,
    _shape: &Shape,
    ctx: &mut Translation,
) -> Result<(), XapiError> {
    if let Annotation::Enum(shape) = annotation {
        ctx.options.choices = Some(shape.public_names());
    }
    Ok(())
}

fn tuple_handler(
    _translator: &Translator,
    _argument: &Argument,
    _annotation: &Annotation,
    shape: &Shape,
    ctx: &mut Translation,
) -> Result<(), XapiError> {
    let items = shape.type_args().len();
    ctx.options.nargs = Some(if shape.is_open() || items == 0 {
        Nargs::ZeroOrMore
    } else {
        Nargs::Exact(items)
    });
    Ok(())
}

/// Translates each member in a fresh context and merges the results.
fn union_handler(
    translator: &Translator,
    argument: &Argument,
    _annotation: &Annotation,
    shape: &Shape,
    ctx: &mut Translation,
) -> Result<(), XapiError> {
    for member in shape.type_args() {
        let mut sub = Translation::default();
        translator.apply(argument, member, &mut sub)?;
        ctx.tokens.extend(sub.tokens);
        ctx.options.merge(sub.options);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::EnumShape;

    fn translate(argument: Argument) -> Translation {
        Translator::new().translate(&argument).unwrap()
    }

    #[test]
    fn test_required_is_positional() {
        let t = translate(Argument::new("count").index(0).annotation(Annotation::Int));
        assert_eq!(t.tokens, vec!["count"]);
        assert!(!t.is_flag());
        assert_eq!(t.options, ParserOptions::default());
    }

    #[test]
    fn test_default_makes_flag_with_dest() {
        let t = translate(Argument::new("log_level").default("WARNING").help("Level"));
        assert_eq!(t.tokens, vec!["--log-level"]);
        assert_eq!(t.options.dest.as_deref(), Some("log_level"));
        assert_eq!(t.options.default, Some(Value::from("WARNING")));
        assert_eq!(t.options.help.as_deref(), Some("Level"));
    }

    #[test]
    fn test_undashed_flag_has_no_dest() {
        let t = translate(Argument::new("precision").default(1i64).annotation(Annotation::Int));
        assert_eq!(t.tokens, vec!["--precision"]);
        assert_eq!(t.options.dest, None);
    }

    #[test]
    fn test_aliases_follow_primary() {
        let t = translate(Argument::new("precision").default(1i64).alias("-p"));
        assert_eq!(t.tokens, vec!["--precision", "-p"]);
    }

    #[test]
    fn test_bool_default_false_stores_true() {
        let t = translate(Argument::new("verbose").annotation(Annotation::Bool).default(false));
        assert_eq!(t.options.action, Some(Action::StoreTrue));
        assert_eq!(t.options.default, Some(Value::Bool(false)));
    }

    #[test]
    fn test_bool_default_true_stores_false() {
        let t = translate(Argument::new("upper").annotation(Annotation::Bool).default(true));
        assert_eq!(t.tokens, vec!["--upper"]);
        assert_eq!(t.options.action, Some(Action::StoreFalse));
        assert_eq!(t.options.default, Some(Value::Bool(true)));
    }

    #[test]
    fn test_required_bool_is_flag() {
        let t = translate(Argument::new("force").annotation(Annotation::Bool));
        assert!(t.is_flag());
        assert_eq!(t.options.action, Some(Action::StoreTrue));
    }

    #[test]
    fn test_literal_choices() {
        let t = translate(Argument::new("mode").annotation(Annotation::literal(["min", "max"])));
        assert_eq!(
            t.options.choices,
            Some(vec!["min".to_string(), "max".to_string()])
        );
    }

    #[test]
    fn test_empty_literal_fails() {
        let argument = Argument::new("mode").annotation(Annotation::Literal(vec![]));
        assert!(matches!(
            Translator::new().translate(&argument),
            Err(XapiError::Translation { .. })
        ));
    }

    #[test]
    fn test_enum_choices_skip_private() {
        let ann = Annotation::Enum(EnumShape {
            name: "Color".into(),
            members: vec![
                ("red".into(), Value::Int(1)),
                ("_hidden".into(), Value::Int(2)),
                ("blue".into(), Value::Int(3)),
            ],
        });
        let t = translate(Argument::new("color").annotation(ann));
        assert_eq!(
            t.options.choices,
            Some(vec!["red".to_string(), "blue".to_string()])
        );
    }

    #[test]
    fn test_list_and_tuple_nargs() {
        let list = translate(Argument::new("nums").annotation(Annotation::list(Annotation::Int)));
        assert_eq!(list.options.nargs, Some(Nargs::ZeroOrMore));

        let fixed = translate(
            Argument::new("pair").annotation(Annotation::tuple(vec![Annotation::Str, Annotation::Int])),
        );
        assert_eq!(fixed.options.nargs, Some(Nargs::Exact(2)));

        let open = translate(Argument::new("rest").annotation(Annotation::open_tuple(Annotation::Int)));
        assert_eq!(open.options.nargs, Some(Nargs::ZeroOrMore));

        let bare = translate(Argument::new("bare").annotation(Annotation::tuple(vec![])));
        assert_eq!(bare.options.nargs, Some(Nargs::ZeroOrMore));
    }

    #[test]
    fn test_variadic_positional() {
        let t = translate(Argument::new("words").index(1).vararg().annotation(Annotation::Str));
        assert_eq!(t.tokens, vec!["words"]);
        assert_eq!(t.options.nargs, Some(Nargs::ZeroOrMore));
    }

    #[test]
    fn test_keyword_collector_stores_marker() {
        let t = translate(Argument::new("extra_opts").vararg());
        assert_eq!(t.tokens, vec!["--extra-opts"]);
        assert_eq!(t.options.action, Some(Action::StoreConst));
        assert_eq!(t.options.constant, Some(Value::from(KWARG_MARKER)));
    }

    #[test]
    fn test_union_merges_members() {
        let ann = Annotation::union(vec![
            Annotation::list(Annotation::Int),
            Annotation::literal(["a", "b"]),
            Annotation::NoneType,
        ]);
        let t = translate(Argument::new("value").annotation(ann).default(Value::None));
        assert_eq!(t.options.nargs, Some(Nargs::ZeroOrMore));
        assert_eq!(t.options.choices, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(t.tokens, vec!["--value"]);
    }

    #[test]
    fn test_later_union_member_wins() {
        let ann = Annotation::union(vec![
            Annotation::tuple(vec![Annotation::Int, Annotation::Int]),
            Annotation::list(Annotation::Int),
        ]);
        let t = translate(Argument::new("value").annotation(ann));
        assert_eq!(t.options.nargs, Some(Nargs::ZeroOrMore));
    }

    #[test]
    fn test_custom_base_handler() {
        let mut translator = Translator::new();
        translator.register(Origin::Custom("Path".into()), |_, _, _, _, ctx| {
            ctx.options.metavar = Some("PATH".into());
            Ok(())
        });
        let file = Annotation::custom("File", vec![Origin::Custom("Path".into())]);
        let t = translator.translate(&Argument::new("input").annotation(file)).unwrap();
        assert_eq!(t.options.metavar.as_deref(), Some("PATH"));

        let plain = Annotation::custom("Opaque", vec![]);
        let t = translator.translate(&Argument::new("blob").annotation(plain)).unwrap();
        assert_eq!(t.options, ParserOptions::default());
    }

    #[test]
    fn test_forced_flag_for_effects() {
        let t = Translator::new()
            .translate_flag(&Argument::new("token").index(0))
            .unwrap();
        assert_eq!(t.tokens, vec!["--token"]);
    }

    #[test]
    fn test_merge_overwrites_only_set_fields() {
        let mut base = ParserOptions {
            help: Some("h".into()),
            nargs: Some(Nargs::Exact(2)),
            ..ParserOptions::default()
        };
        base.merge(ParserOptions {
            nargs: Some(Nargs::ZeroOrMore),
            ..ParserOptions::default()
        });
        assert_eq!(base.help.as_deref(), Some("h"));
        assert_eq!(base.nargs, Some(Nargs::ZeroOrMore));
    }
}
