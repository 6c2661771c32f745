//! `xmath`: a small math toolbox built with xapi.
//!
//! Shows plain entrypoints, a hand-configured entrypoint with an alias, a
//! varargs command, a command group and a logging effect.

use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xapi::{entrypoint, Annotation, Entrypoint, Value, Xapi, XapiError};

/// Configures logging for the run.
///
/// :param log_level: verbosity passed to the log filter
#[entrypoint]
pub fn setup_logging(
    #[arg(
        default = "warn".to_string(),
        annotation = Annotation::literal(["error", "warn", "info", "debug", "trace"])
    )]
    log_level: String,
) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_level))
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_ok() {
        debug!(level = %log_level, "logging configured");
    }
}

fn round(value: f64, precision: i64) -> f64 {
    let scale = 10f64.powi(precision.clamp(0, 15) as i32);
    (value * scale).round() / scale
}

/// Adds the two input numbers together.
///
/// :param float addend1: The first addend
/// :param float addend2: The second addend
/// :param int precision: Digits kept after the decimal point
#[entrypoint]
pub fn add(addend1: f64, addend2: f64, #[arg(default = 1)] precision: i64) -> f64 {
    round(addend1 + addend2, precision)
}

#[entrypoint(name = "subtract")]
pub fn sub(
    minuend: f64,
    subtrahend: f64,
    #[varargs] subtrahends: Vec<f64>,
    #[arg(default = 2)] precision: i64,
) -> f64 {
    round(minuend - subtrahend - subtrahends.iter().sum::<f64>(), precision)
}

/// Picks words from a list, cycling through it.
#[entrypoint]
pub fn pick(count: i64, #[varargs] words: Vec<String>, #[arg(default = true)] upper: bool) -> Vec<String> {
    words
        .iter()
        .cycle()
        .take(usize::try_from(count).unwrap_or(0))
        .map(|word| if upper { word.to_uppercase() } else { word.clone() })
        .collect()
}

/// Sums the provided input numbers.
#[entrypoint]
pub fn summ(#[varargs] numbers: Vec<f64>, #[arg(default = 2)] precision: i64) -> f64 {
    round(numbers.iter().sum(), precision)
}

/// Whole days between two dates.
///
/// :param start: RFC 3339 timestamp or YYYY-MM-DD
/// :param end: RFC 3339 timestamp or YYYY-MM-DD
#[entrypoint]
pub fn days(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> i64 {
    (end - start).num_days()
}

/// Echoes arbitrary `--key value` options back as a mapping.
#[entrypoint]
pub fn echo(#[kwargs] options: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    options
}

/// Arithmetic mean.
#[entrypoint]
pub fn mean(#[varargs] numbers: Vec<f64>) -> anyhow::Result<f64> {
    if numbers.is_empty() {
        anyhow::bail!("mean of no numbers");
    }
    Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// Middle value.
#[entrypoint]
pub fn median(#[varargs] numbers: Vec<f64>) -> anyhow::Result<f64> {
    let mut sorted = numbers;
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => anyhow::bail!("median of no numbers"),
        n if n % 2 == 0 => Ok((sorted[mid - 1] + sorted[mid]) / 2.0),
        _ => Ok(sorted[mid]),
    }
}

/// Builds the `xmath` application.
pub fn app() -> Result<Xapi, XapiError> {
    let subtract = Entrypoint::from_function(sub__function())?
        .alias("sub")
        .help("Subtracts the second number from the first.")
        .configure_argument("minuend", |a| a.help("The minuend to be subtracted from."))?
        .configure_argument("subtrahend", |a| {
            a.help("The subtrahend to subtract from the minuend.")
        })?
        .configure_argument("precision", |a| {
            a.help("The precision the result is displayed with.").alias("-p")
        })?;

    let pick = Entrypoint::from_function(pick__function())?
        .configure_argument("count", |a| a.help("The number of words to pick"))?
        .configure_argument("words", |a| a.help("The words to pick from"))?
        .configure_argument("upper", |a| {
            a.help("Keep the words as typed instead of capitalizing them.")
        })?;

    let stats = Entrypoint::group("stats")
        .help("Descriptive statistics.")
        .subentrypoint(Entrypoint::from_function(mean__function())?)?
        .subentrypoint(Entrypoint::from_function(median__function())?)?;

    Ok(Xapi::new("xmath")
        .about("A small math toolbox.")
        .version(env!("CARGO_PKG_VERSION"))
        .effect(Entrypoint::from_function(setup_logging__function())?)
        .entrypoint(Entrypoint::from_function(add__function())?)
        .entrypoint(subtract)
        .entrypoint(pick)
        .entrypoint(Entrypoint::from_function(summ__function())?)
        .entrypoint(Entrypoint::from_function(days__function())?)
        .entrypoint(Entrypoint::from_function(echo__function())?)
        .entrypoint(stats))
}
