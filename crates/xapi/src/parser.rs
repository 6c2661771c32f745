//! clap adaptation.
//!
//! Builds a [`clap::Command`] tree from the entrypoint tree, parses argv
//! (leniently when some entrypoint collects arbitrary keywords) and reads
//! parsed values back out per argument.
//!
//! Every subcommand carries a hidden `--__entrypoint__` argument whose
//! default is the node's id, so the deepest matches name the selected
//! entrypoint directly.

use crate::argument::Argument;
use crate::entrypoint::Entrypoint;
use crate::error::XapiError;
use crate::translate::{Action, Nargs, Translation, Translator};
use crate::value::Value;
use clap::builder::PossibleValuesParser;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Id of the hidden argument recording the selected entrypoint.
pub const ENTRYPOINT_ID: &str = "__entrypoint__";

/// Presentation settings for the root command.
#[derive(Debug, Clone, Default)]
pub struct ProgramInfo {
    pub name: String,
    pub about: Option<String>,
    pub version: Option<String>,
}

/// The translations of one node's arguments, parallel to its descriptors.
#[derive(Debug, Clone)]
pub struct NodeBindings {
    /// Child indexes from the root list down to this node.
    pub path: Vec<usize>,
    pub translations: Vec<Translation>,
}

/// A clap command tree plus what is needed to map matches back.
#[derive(Debug, Clone)]
pub struct CommandTree {
    pub command: Command,
    pub nodes: HashMap<String, NodeBindings>,
    pub effects: Vec<Vec<Translation>>,
    /// Unknown `--key value` tokens are captured instead of rejected.
    pub lenient: bool,
}

/// Joins a command path into a node id, e.g. `stats.mean`.
pub fn path_to_string(path: &[String]) -> String {
    path.join(".")
}

/// Builds the command tree for the registered entrypoints and effects.
pub fn build(
    program: &ProgramInfo,
    entrypoints: &[Entrypoint],
    effects: &[Entrypoint],
    translator: &Translator,
) -> Result<CommandTree, XapiError> {
    let mut command = Command::new(program.name.clone()).args_override_self(true);
    if let Some(about) = &program.about {
        command = command.about(about.clone());
    }
    if let Some(version) = &program.version {
        command = command.version(version.clone());
    }

    let mut effect_bindings = Vec::with_capacity(effects.len());
    for effect in effects {
        if effect.name.is_empty() {
            return Err(XapiError::MissingName);
        }
        let mut translations = Vec::with_capacity(effect.arguments.len());
        for argument in &effect.arguments {
            let translation = translator.translate_flag(argument)?;
            let id = effect_arg_id(effect, translation.dest(argument));
            command = command.arg(build_arg(&id, &translation).global(true));
            translations.push(translation);
        }
        effect_bindings.push(translations);
    }

    let mut nodes = HashMap::new();
    command = add_subcommands(command, entrypoints, &[], &[], translator, &mut nodes)?;

    let lenient = effects.iter().any(Entrypoint::has_keyword_collector)
        || entrypoints.iter().any(Entrypoint::tolerates_extra_kwargs);

    debug!(nodes = nodes.len(), lenient, "command tree built");

    Ok(CommandTree {
        command,
        nodes,
        effects: effect_bindings,
        lenient,
    })
}

fn effect_arg_id(effect: &Entrypoint, dest: &str) -> String {
    format!("{}.{}", effect.name, dest)
}

fn add_subcommands(
    mut parent: Command,
    entrypoints: &[Entrypoint],
    names: &[String],
    indexes: &[usize],
    translator: &Translator,
    nodes: &mut HashMap<String, NodeBindings>,
) -> Result<Command, XapiError> {
    for (index, entrypoint) in entrypoints.iter().enumerate() {
        if entrypoint.name.is_empty() {
            return Err(XapiError::MissingName);
        }

        let mut names = names.to_vec();
        names.push(entrypoint.name.clone());
        let mut path = indexes.to_vec();
        path.push(index);
        let id = path_to_string(&names);

        let mut command = Command::new(entrypoint.name.clone())
            .args_override_self(true)
            .visible_aliases(entrypoint.aliases.clone())
            .arg(
                Arg::new(ENTRYPOINT_ID)
                    .long(ENTRYPOINT_ID)
                    .hide(true)
                    .default_value(id.clone())
                    .value_parser(PossibleValuesParser::new([id.clone()])),
            );

        if let Some(help) = &entrypoint.help {
            command = command.about(help.clone());
        }
        if let Some(description) = &entrypoint.description {
            command = command.long_about(description.clone());
        }
        if let Some(usage) = &entrypoint.usage {
            command = command.override_usage(usage.clone());
        }
        if let Some(after) = after_help(entrypoint) {
            command = command.after_help(after);
        }

        let translations = entrypoint
            .arguments
            .iter()
            .map(|argument| translator.translate(argument))
            .collect::<Result<Vec<_>, _>>()?;
        let after_separator = positional_layout(entrypoint, &translations)?;
        for (position, (argument, translation)) in
            entrypoint.arguments.iter().zip(&translations).enumerate()
        {
            let arg = build_arg(translation.dest(argument), translation);
            command = command.arg(if after_separator == Some(position) {
                arg.last(true)
            } else {
                arg
            });
        }
        if optional_before_required(&translations) {
            command = command.allow_missing_positional(true);
        }

        command = add_subcommands(command, &entrypoint.entrypoints, &names, &path, translator, nodes)?;

        trace!(node = %id, "added subcommand");
        nodes.insert(id, NodeBindings { path, translations });
        parent = parent.subcommand(command);
    }
    Ok(parent)
}

fn takes_several(translation: &Translation) -> bool {
    match translation.options.nargs {
        Some(Nargs::ZeroOrMore) => true,
        Some(Nargs::Exact(n)) => n > 1,
        None => false,
    }
}

/// Checks positionals against what clap can tell apart.
///
/// Only the last two positionals may take several values. An optional
/// positional right after a multi-value one is only reachable after `--`;
/// its argument position is returned.
fn positional_layout(
    entrypoint: &Entrypoint,
    translations: &[Translation],
) -> Result<Option<usize>, XapiError> {
    let positionals: Vec<(usize, &Translation)> = translations
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_flag())
        .collect();

    let count = positionals.len();
    for (slot, (position, translation)) in positionals.iter().enumerate() {
        if takes_several(translation) && slot + 2 < count {
            return Err(XapiError::translation(
                entrypoint.arguments[*position].name.clone(),
                format!(
                    "entrypoint '{}' has more positional arguments after this multi-value one than the parser can separate",
                    entrypoint.name
                ),
            ));
        }
    }

    match positionals.as_slice() {
        [.., (_, before), (position, last)]
            if takes_several(before) && last.options.nargs == Some(Nargs::ZeroOrMore) =>
        {
            Ok(Some(*position))
        }
        _ => Ok(None),
    }
}

/// clap rejects an optional positional ahead of a required one unless
/// missing positionals are allowed.
fn optional_before_required(translations: &[Translation]) -> bool {
    let mut optional_seen = false;
    for translation in translations.iter().filter(|t| !t.is_flag()) {
        let required = translation.options.nargs != Some(Nargs::ZeroOrMore);
        if required && optional_seen {
            return true;
        }
        optional_seen |= !required;
    }
    false
}

fn after_help(entrypoint: &Entrypoint) -> Option<String> {
    let deprecated = entrypoint
        .deprecated
        .then(|| "This command is deprecated.".to_string());
    match (entrypoint.epilog.clone(), deprecated) {
        (Some(epilog), Some(note)) => Some(format!("{}\n\n{}", epilog, note)),
        (epilog, note) => epilog.or(note),
    }
}

/// Turns a translation into a clap argument with the given id.
pub fn build_arg(id: &str, translation: &Translation) -> Arg {
    let options = &translation.options;
    let mut arg = Arg::new(id.to_string());
    let mut tokens = translation.tokens.iter();

    let positional = match tokens.next() {
        Some(primary) if primary.starts_with("--") => {
            arg = arg.long(primary.trim_start_matches('-').to_string());
            false
        }
        Some(primary) if primary.starts_with('-') => {
            if let Some(c) = primary.chars().nth(1) {
                arg = arg.short(c);
            }
            false
        }
        _ => true,
    };

    for alias in tokens {
        if let Some(long) = alias.strip_prefix("--") {
            arg = arg.visible_alias(long.to_string());
        } else if let Some(short) = alias.strip_prefix('-') {
            if let Some(c) = short.chars().next() {
                arg = arg.visible_short_alias(c);
            }
        } else {
            trace!(argument = %id, alias = %alias, "positional arguments cannot take aliases");
        }
    }

    if let Some(help) = &options.help {
        arg = arg.help(help.clone());
    }
    if let Some(metavar) = &options.metavar {
        arg = arg.value_name(metavar.clone());
    }

    arg = match options.action {
        Some(Action::StoreTrue) | Some(Action::StoreConst) => arg.action(ArgAction::SetTrue),
        Some(Action::StoreFalse) => arg.action(ArgAction::SetFalse),
        None => {
            let arg = arg.action(ArgAction::Set).allow_negative_numbers(true);
            match options.nargs {
                Some(Nargs::ZeroOrMore) if positional => arg.num_args(1..),
                Some(Nargs::ZeroOrMore) => arg.num_args(0..),
                Some(Nargs::Exact(n)) => arg.num_args(n),
                None => arg,
            }
        }
    };

    if let Some(choices) = &options.choices {
        arg = arg.value_parser(PossibleValuesParser::new(choices.clone()));
    }

    if options.action.is_none() && options.nargs.is_none() {
        if let Some(default) = displayable_default(options.default.as_ref(), options.choices.as_deref()) {
            arg = arg.default_value(default);
        }
    }

    if positional {
        arg = arg.required(options.nargs != Some(Nargs::ZeroOrMore));
    }

    arg
}

/// Scalar defaults are shown in help; others stay with the descriptor.
fn displayable_default(default: Option<&Value>, choices: Option<&[String]>) -> Option<String> {
    let text = match default? {
        Value::Int(_) | Value::Float(_) | Value::Str(_) => default?.to_string(),
        _ => return None,
    };
    match choices {
        Some(choices) if !choices.contains(&text) => None,
        _ => Some(text),
    }
}

/// Parsed matches plus captured unknown keyword tokens.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub matches: ArgMatches,
    pub extras: Vec<String>,
}

/// Parses argv (program name first).
///
/// In lenient mode an unknown `--key`, `--key=value` or `--key value` is
/// moved into `extras` and parsing retried. A bare `--key` always takes the
/// next token as its value when that token is not itself an option, so
/// `--dry-run main` binds `main` to `dry_run` while a trailing `--dry-run`
/// binds `""`.
pub fn parse(tree: &CommandTree, argv: Vec<String>) -> Result<Parsed, XapiError> {
    let mut argv = argv;
    let mut extras = Vec::new();

    loop {
        let err = match tree.command.clone().try_get_matches_from(&argv) {
            Ok(matches) => return Ok(Parsed { matches, extras }),
            Err(err) => err,
        };

        if err.kind() != ErrorKind::UnknownArgument {
            return Err(err.into());
        }
        let invalid = match err.get(ContextKind::InvalidArg) {
            Some(ContextValue::String(invalid)) if invalid.starts_with("--") => invalid.clone(),
            _ => return Err(err.into()),
        };
        if !tree.lenient {
            return Err(XapiError::UnrecognizedArguments(vec![invalid]));
        }

        let key = flag_key(&invalid);
        let Some(position) = argv
            .iter()
            .skip(1)
            .position(|token| token.starts_with("--") && flag_key(token) == key)
            .map(|p| p + 1)
        else {
            return Err(err.into());
        };

        let token = argv.remove(position);
        let takes_value = !token.contains('=')
            && argv
                .get(position)
                .is_some_and(|next| !next.starts_with('-') || next.parse::<f64>().is_ok());
        extras.push(token);
        if takes_value {
            extras.push(argv.remove(position));
        }
        trace!(extras = ?extras, "captured unrecognized keyword tokens");
    }
}

fn flag_key(token: &str) -> &str {
    token.split_once('=').map_or(token, |(key, _)| key)
}

/// Turns captured tokens into a keyword mapping.
///
/// Keys lose their dashes and use underscores. A key with no value maps to
/// `""`. A repeated key collects its values into a list. Pairing is
/// positional: a bare key followed by a non-option token takes that token,
/// so the same flag reads differently at the end of the line.
pub fn harvest(extras: &[String]) -> BTreeMap<String, Value> {
    let mut harvested: BTreeMap<String, Value> = BTreeMap::new();
    let mut tokens = extras.iter().peekable();

    while let Some(token) = tokens.next() {
        let Some(flag) = token.strip_prefix("--") else {
            trace!(token = %token, "ignoring stray token");
            continue;
        };
        let (key, value) = match flag.split_once('=') {
            Some((key, value)) => (key, value.to_string()),
            None => {
                let value = tokens.next_if(|next| !next.starts_with("--"));
                (flag, value.cloned().unwrap_or_default())
            }
        };
        let key = key.replace('-', "_");
        let value = Value::Str(value);

        match harvested.remove(&key) {
            None => {
                harvested.insert(key, value);
            }
            Some(Value::List(mut items)) => {
                items.push(value);
                harvested.insert(key, Value::List(items));
            }
            Some(previous) => {
                harvested.insert(key, Value::List(vec![previous, value]));
            }
        }
    }

    harvested
}

/// The matches for each level: the root first, then each subcommand.
pub fn matches_chain(matches: &ArgMatches) -> Vec<&ArgMatches> {
    let mut chain = vec![matches];
    let mut current = matches;
    while let Some((_, sub)) = current.subcommand() {
        chain.push(sub);
        current = sub;
    }
    chain
}

/// The selected entrypoint chain with each node's matches.
#[derive(Debug)]
pub struct Resolved<'a> {
    pub levels: Vec<Level<'a>>,
    /// Matches of the deepest command, where global effect flags land.
    pub deepest: &'a ArgMatches,
}

/// One node in the selected chain.
#[derive(Debug)]
pub struct Level<'a> {
    pub entrypoint: &'a Entrypoint,
    pub translations: &'a [Translation],
    pub matches: &'a ArgMatches,
}

impl Resolved<'_> {
    pub fn leaf(&self) -> Option<&Entrypoint> {
        self.levels.last().map(|level| level.entrypoint)
    }
}

/// Identifies the selected entrypoint from the hidden id argument.
pub fn resolve<'a>(
    tree: &'a CommandTree,
    entrypoints: &'a [Entrypoint],
    parsed: &'a Parsed,
) -> Result<Resolved<'a>, XapiError> {
    let chain = matches_chain(&parsed.matches);
    let deepest = chain.last().copied().unwrap_or(&parsed.matches);

    let id = deepest
        .try_get_one::<String>(ENTRYPOINT_ID)
        .ok()
        .flatten()
        .ok_or(XapiError::EntrypointNotFound)?;
    let node = tree.nodes.get(id).ok_or(XapiError::EntrypointNotFound)?;

    let mut levels = Vec::with_capacity(node.path.len());
    let mut siblings = entrypoints;
    let mut names = Vec::with_capacity(node.path.len());
    for (depth, &index) in node.path.iter().enumerate() {
        let entrypoint = siblings.get(index).ok_or(XapiError::EntrypointNotFound)?;
        names.push(entrypoint.name.clone());
        let bindings = tree
            .nodes
            .get(&path_to_string(&names))
            .ok_or(XapiError::EntrypointNotFound)?;
        let matches = chain.get(depth + 1).copied().ok_or(XapiError::EntrypointNotFound)?;
        levels.push(Level {
            entrypoint,
            translations: &bindings.translations,
            matches,
        });
        siblings = &entrypoint.entrypoints;
    }

    debug!(entrypoint = %id, depth = levels.len(), "resolved entrypoint");
    Ok(Resolved { levels, deepest })
}

/// Reads one node's parameters from its matches.
pub fn extract_params(
    matches: &ArgMatches,
    arguments: &[Argument],
    translations: &[Translation],
    id_of: impl Fn(&str) -> String,
) -> BTreeMap<String, Value> {
    arguments
        .iter()
        .zip(translations)
        .map(|(argument, translation)| {
            let id = id_of(translation.dest(argument));
            let value = extract_value(matches, &id, argument, translation);
            trace!(argument = %argument.name, value = %value, "extracted value");
            (argument.name.clone(), value)
        })
        .collect()
}

/// Parameters of an effect, read from the deepest matches.
pub fn extract_effect_params(
    matches: &ArgMatches,
    effect: &Entrypoint,
    translations: &[Translation],
) -> BTreeMap<String, Value> {
    extract_params(matches, &effect.arguments, translations, |dest| {
        effect_arg_id(effect, dest)
    })
}

fn extract_value(matches: &ArgMatches, id: &str, argument: &Argument, translation: &Translation) -> Value {
    let options = &translation.options;
    let source = matches.value_source(id);

    match options.action {
        Some(Action::StoreTrue) | Some(Action::StoreFalse) => {
            return match matches.try_get_one::<bool>(id).ok().flatten() {
                Some(flag) => Value::Bool(*flag),
                None => argument.missing_value(),
            };
        }
        Some(Action::StoreConst) => {
            let set = matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false);
            return match (&options.constant, set) {
                (Some(constant), true) => constant.clone(),
                _ => argument.missing_value(),
            };
        }
        None => {}
    }

    if options.nargs.is_some() {
        return match matches.try_get_many::<String>(id).ok().flatten() {
            Some(values) => Value::str_list(values.cloned()),
            None if source == Some(ValueSource::CommandLine)
                || (!translation.is_flag() && options.nargs == Some(Nargs::ZeroOrMore)) =>
            {
                Value::List(Vec::new())
            }
            None => argument.missing_value(),
        };
    }

    if source == Some(ValueSource::DefaultValue) {
        return argument.missing_value();
    }
    match matches.try_get_one::<String>(id).ok().flatten() {
        Some(value) => Value::Str(value.clone()),
        None => argument.missing_value(),
    }
}

/// Usage text of the most specific command named in `argv`.
pub fn usage_for(command: &Command, argv: &[String]) -> String {
    let mut root = command.clone();
    root.build();

    let mut current = &root;
    for token in argv.iter().skip(1) {
        if let Some(sub) = current.find_subcommand(token) {
            current = sub;
        }
    }
    current.clone().render_usage().to_string()
}
