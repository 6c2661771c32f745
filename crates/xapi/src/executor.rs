//! Dispatch: parse, resolve, then run effects and the selected chain.
//!
//! A [`CommandTree`] is the built state. [`Executor::execute`] carries it
//! through parsing ([`Parsed`]) and resolution ([`Resolved`]) to dispatch.

use crate::convert::Converter;
use crate::entrypoint::Entrypoint;
use crate::error::XapiError;
use crate::parser::{
    extract_effect_params, extract_params, harvest, parse, resolve, CommandTree, Parsed, Resolved,
};
use crate::value::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Runs one invocation against a built command tree.
#[derive(Debug)]
pub struct Executor<'a> {
    pub tree: &'a CommandTree,
    pub entrypoints: &'a [Entrypoint],
    pub effects: &'a [Entrypoint],
    pub converter: &'a Converter,
}

impl<'a> Executor<'a> {
    /// Parses `argv` (program name first) and dispatches it.
    pub fn execute(&self, argv: Vec<String>) -> Result<Value, XapiError> {
        let parsed = parse(self.tree, argv)?;
        let resolved = resolve(self.tree, self.entrypoints, &parsed)?;
        self.dispatch(&parsed, &resolved)
    }

    /// Runs effects in registration order, then the resolved chain from the
    /// outermost node in. Ancestors without a callable are skipped; the
    /// leaf must have one. Returns the leaf's result.
    pub fn dispatch(&self, parsed: &Parsed, resolved: &Resolved<'_>) -> Result<Value, XapiError> {
        let harvested = harvest(&parsed.extras);
        let tolerant = self.effects.iter().any(Entrypoint::has_keyword_collector)
            || resolved
                .levels
                .iter()
                .any(|level| level.entrypoint.has_keyword_collector());
        if !parsed.extras.is_empty() && !tolerant {
            return Err(XapiError::UnrecognizedArguments(parsed.extras.clone()));
        }

        for (effect, translations) in self.effects.iter().zip(&self.tree.effects) {
            let mut params = extract_effect_params(resolved.deepest, effect, translations);
            fill_collectors(effect, &mut params, &harvested);
            debug!(effect = %effect.name, "running effect");
            effect.execute(self.converter, &params)?;
        }

        let mut result = Value::None;
        let depth = resolved.levels.len();
        for (position, level) in resolved.levels.iter().enumerate() {
            let is_leaf = position + 1 == depth;
            if !is_leaf && level.entrypoint.is_group() {
                continue;
            }
            let mut params = extract_params(
                level.matches,
                &level.entrypoint.arguments,
                level.translations,
                str::to_string,
            );
            fill_collectors(level.entrypoint, &mut params, &harvested);
            let value = level.entrypoint.execute(self.converter, &params)?;
            if is_leaf {
                result = value;
            }
        }

        Ok(result)
    }
}

/// Replaces keyword collectors' marker values with the harvested mapping.
fn fill_collectors(
    entrypoint: &Entrypoint,
    params: &mut BTreeMap<String, Value>,
    harvested: &BTreeMap<String, Value>,
) {
    for argument in entrypoint.arguments.iter().filter(|a| a.is_keyword_collector()) {
        params.insert(argument.name.clone(), Value::Map(harvested.clone()));
    }
}
