//! Type shapes and the origin/argument resolver.
//!
//! An [`Annotation`] describes what a parameter accepts. [`resolve`] splits it
//! into an [`Origin`] (the key used to pick a conversion or translation
//! strategy) and its ordered [`TypeArg`]s, e.g. `list[int]` resolves to
//! `(List, [int])` and `Literal["a", "b"]` to `(Literal, ["a", "b"])`.
//!
//! Strategy lookup never walks runtime inheritance. Instead each shape
//! carries an explicit, ordered list of base origins (nearest first) that
//! registries try after the exact origin.

use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// A user-supplied conversion function for [`Annotation::Function`] and
/// [`Annotation::Custom`] shapes.
pub type ConvertFn = Rc<dyn Fn(&Value) -> anyhow::Result<Value>>;

/// A named converter function.
#[derive(Clone)]
pub struct NamedFn {
    pub name: String,
    pub func: ConvertFn,
}

impl fmt::Debug for NamedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFn").field("name", &self.name).finish()
    }
}

impl PartialEq for NamedFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Rc::ptr_eq(&self.func, &other.func)
    }
}

/// An enumeration: a named, ordered set of members.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumShape {
    pub name: String,
    /// `(member name, member value)` in declaration order.
    pub members: Vec<(String, Value)>,
}

impl EnumShape {
    /// Member names usable as CLI choices; names starting with `_` are private.
    pub fn public_names(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !name.starts_with('_'))
            .cloned()
            .collect()
    }
}

/// An application-defined type identified by a stable id.
#[derive(Clone)]
pub struct CustomType {
    pub id: String,
    /// Origins tried, in order, when no strategy is registered for `id`.
    pub bases: Vec<Origin>,
    /// Constructor used by the default conversion strategy.
    pub construct: Option<ConvertFn>,
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType")
            .field("id", &self.id)
            .field("bases", &self.bases)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.bases == other.bases
    }
}

/// The declared shape of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Accepts anything; values pass through untouched.
    Any,
    /// The null type. Converting against it passes the value through.
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    DateTime,
    /// `list` (no args) or `list[T]`.
    List(Vec<Annotation>),
    /// `tuple` (no items), `tuple[A, B]`, or `tuple[T, ...]` when `open`.
    Tuple { items: Vec<Annotation>, open: bool },
    Map,
    Union(Vec<Annotation>),
    Literal(Vec<Value>),
    Enum(EnumShape),
    /// A plain converter function applied directly to the raw value.
    Function(NamedFn),
    Custom(CustomType),
}

impl Annotation {
    /// `list[T]`.
    pub fn list(item: Annotation) -> Self {
        Annotation::List(vec![item])
    }

    /// `tuple[A, B, ...]` with a fixed arity.
    pub fn tuple(items: Vec<Annotation>) -> Self {
        Annotation::Tuple { items, open: false }
    }

    /// `tuple[T, ...]`.
    pub fn open_tuple(item: Annotation) -> Self {
        Annotation::Tuple {
            items: vec![item],
            open: true,
        }
    }

    /// `T | None`.
    pub fn optional(inner: Annotation) -> Self {
        Annotation::Union(vec![inner, Annotation::NoneType])
    }

    pub fn union(members: Vec<Annotation>) -> Self {
        Annotation::Union(members)
    }

    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Annotation::Literal(values.into_iter().map(Into::into).collect())
    }

    /// An enumeration whose member values equal their names.
    pub fn enumeration<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Annotation::Enum(EnumShape {
            name: name.into(),
            members: members
                .into_iter()
                .map(|m| {
                    let m = m.into();
                    (m.clone(), Value::Str(m))
                })
                .collect(),
        })
    }

    pub fn function<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + 'static,
    {
        Annotation::Function(NamedFn {
            name: name.into(),
            func: Rc::new(func),
        })
    }

    pub fn custom(id: impl Into<String>, bases: Vec<Origin>) -> Self {
        Annotation::Custom(CustomType {
            id: id.into(),
            bases,
            construct: None,
        })
    }

    /// Infers an annotation from a default value's runtime type.
    ///
    /// `None` defaults carry no type information and yield `None`.
    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::None => None,
            Value::Bool(_) => Some(Annotation::Bool),
            Value::Int(_) => Some(Annotation::Int),
            Value::Float(_) => Some(Annotation::Float),
            Value::Str(_) => Some(Annotation::Str),
            Value::DateTime(_) => Some(Annotation::DateTime),
            Value::List(_) => Some(Annotation::List(vec![])),
            Value::Tuple(_) => Some(Annotation::Tuple {
                items: vec![],
                open: false,
            }),
            Value::Map(_) => Some(Annotation::Map),
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            Annotation::Any => Origin::Any,
            Annotation::NoneType => Origin::NoneType,
            Annotation::Bool => Origin::Bool,
            Annotation::Int => Origin::Int,
            Annotation::Float => Origin::Float,
            Annotation::Str => Origin::Str,
            Annotation::DateTime => Origin::DateTime,
            Annotation::List(_) => Origin::List,
            Annotation::Tuple { .. } => Origin::Tuple,
            Annotation::Map => Origin::Map,
            Annotation::Union(_) => Origin::Union,
            Annotation::Literal(_) => Origin::Literal,
            Annotation::Enum(_) => Origin::Enum,
            Annotation::Function(_) => Origin::Function,
            Annotation::Custom(custom) => Origin::Custom(custom.id.clone()),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Annotation], sep: &str) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, "{}", sep)?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match self {
            Annotation::Any => write!(f, "Any"),
            Annotation::NoneType => write!(f, "None"),
            Annotation::Bool => write!(f, "bool"),
            Annotation::Int => write!(f, "int"),
            Annotation::Float => write!(f, "float"),
            Annotation::Str => write!(f, "str"),
            Annotation::DateTime => write!(f, "datetime"),
            Annotation::List(args) if args.is_empty() => write!(f, "list"),
            Annotation::List(args) => {
                write!(f, "list[")?;
                join(f, args, ", ")?;
                write!(f, "]")
            }
            Annotation::Tuple { items, open } => {
                if items.is_empty() {
                    return write!(f, "tuple");
                }
                write!(f, "tuple[")?;
                join(f, items, ", ")?;
                if *open {
                    write!(f, ", ...")?;
                }
                write!(f, "]")
            }
            Annotation::Map => write!(f, "dict"),
            Annotation::Union(members) => join(f, members, " | "),
            Annotation::Literal(values) => {
                write!(f, "Literal[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", v.to_string())?;
                }
                write!(f, "]")
            }
            Annotation::Enum(shape) => write!(f, "{}", shape.name),
            Annotation::Function(func) => write!(f, "{}", func.name),
            Annotation::Custom(custom) => write!(f, "{}", custom.id),
        }
    }
}

/// Stable strategy key for an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Any,
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    DateTime,
    List,
    Tuple,
    Map,
    Union,
    Literal,
    Enum,
    Function,
    Custom(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Custom(id) => write!(f, "{}", id),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

/// One resolved type parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeArg {
    Type(Annotation),
    Value(Value),
    /// Open-ended marker closing `tuple[T, ...]`.
    Ellipsis,
}

/// The result of [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub origin: Origin,
    pub args: Vec<TypeArg>,
    /// Fallback origins, nearest first.
    pub bases: Vec<Origin>,
}

impl Shape {
    /// The type arguments, skipping values and the ellipsis marker.
    pub fn type_args(&self) -> Vec<&Annotation> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                TypeArg::Type(ann) => Some(ann),
                _ => None,
            })
            .collect()
    }

    /// The value arguments of a literal.
    pub fn value_args(&self) -> Vec<&Value> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                TypeArg::Value(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// True when the arguments end with the open-ended marker.
    pub fn is_open(&self) -> bool {
        matches!(self.args.last(), Some(TypeArg::Ellipsis))
    }

    /// True when the null type is one of the type arguments.
    pub fn admits_none(&self) -> bool {
        self.type_args()
            .iter()
            .any(|ann| matches!(ann, Annotation::NoneType))
    }
}

/// Splits an annotation into its origin, type arguments and base origins.
///
/// Never fails: every annotation resolves to some shape.
pub fn resolve(annotation: &Annotation) -> Shape {
    let types = |items: &[Annotation]| items.iter().cloned().map(TypeArg::Type).collect();

    let args = match annotation {
        Annotation::List(items) | Annotation::Union(items) => types(items),
        Annotation::Tuple { items, open } => {
            let mut args: Vec<TypeArg> = types(items);
            if *open && !items.is_empty() {
                args.push(TypeArg::Ellipsis);
            }
            args
        }
        Annotation::Literal(values) => values.iter().cloned().map(TypeArg::Value).collect(),
        _ => Vec::new(),
    };

    let bases = match annotation {
        Annotation::Bool => vec![Origin::Int],
        Annotation::Custom(custom) => custom.bases.clone(),
        _ => Vec::new(),
    };

    Shape {
        origin: annotation.origin(),
        args,
        bases,
    }
}
