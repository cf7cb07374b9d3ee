//! Environment-sourced engine configuration.
//!
//! The engine core consumes an already-validated [`RunConfig`]; this module
//! is the configuration surface that produces one from process environment
//! variables (with `.env` support via dotenvy). Every knob has a default,
//! and invalid values fail loudly before any run starts.
//!
//! Recognized variables:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `REAGENT_MAX_ITERATIONS` | `8` | action-step budget per run (> 0) |
//! | `REAGENT_STEP_TIMEOUT_MS` | `30000` | per-dispatch time budget |
//! | `REAGENT_REASONER_TIMEOUT_MS` | `60000` | backend call deadline |
//! | `REAGENT_INVALID_STREAK_LIMIT` | `2` | unparsable-decision tolerance (> 0) |
//! | `REAGENT_MAX_PROMPT_CHARS` | `12000` | prompt truncation budget |
//! | `REAGENT_MAX_TOKENS` | `512` | backend generation budget |
//! | `REAGENT_BACKEND_ENDPOINT` | — | completion endpoint base URL |
//! | `REAGENT_BACKEND_MODEL` | — | model name passed to the backend |
//! | `REAGENT_BACKEND_API_KEY` | — | bearer token, if the endpoint needs one |

use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

use crate::engine::RunConfig;
use crate::reasoner::ReasonerConfig;
use crate::router::DEFAULT_INVALID_STREAK_LIMIT;

/// Validated engine settings, one step removed from [`RunConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_iterations: u32,
    pub per_step_timeout: Duration,
    pub reasoner_timeout: Duration,
    pub invalid_streak_limit: u32,
    pub max_prompt_chars: usize,
    pub max_tokens: u32,
    /// Completion endpoint base URL, when an HTTP backend is in use.
    pub backend_endpoint: Option<String>,
    /// Model name forwarded to the backend.
    pub backend_model: Option<String>,
    /// Bearer token for the endpoint, if required.
    pub backend_api_key: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            per_step_timeout: Duration::from_millis(30_000),
            reasoner_timeout: Duration::from_millis(60_000),
            invalid_streak_limit: DEFAULT_INVALID_STREAK_LIMIT,
            max_prompt_chars: 12_000,
            max_tokens: 512,
            backend_endpoint: None,
            backend_model: None,
            backend_api_key: None,
        }
    }
}

/// Configuration errors, raised before any run is constructed.
#[derive(Debug, Error, Diagnostic)]
pub enum SettingsError {
    /// A variable was set but could not be parsed or failed validation.
    #[error("invalid value for {key}: {value:?} ({problem})")]
    #[diagnostic(
        code(reagent::settings::invalid_value),
        help("Unset the variable to fall back to its default, or fix the value.")
    )]
    InvalidValue {
        key: &'static str,
        value: String,
        problem: String,
    },
}

impl EngineSettings {
    /// Resolve settings from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary lookup function. The seam exists
    /// so tests can drive resolution without mutating the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_iterations = parse_with(
            &lookup,
            "REAGENT_MAX_ITERATIONS",
            defaults.max_iterations,
            positive_u32,
        )?;
        let per_step_timeout = parse_with(
            &lookup,
            "REAGENT_STEP_TIMEOUT_MS",
            defaults.per_step_timeout,
            positive_millis,
        )?;
        let reasoner_timeout = parse_with(
            &lookup,
            "REAGENT_REASONER_TIMEOUT_MS",
            defaults.reasoner_timeout,
            positive_millis,
        )?;
        let invalid_streak_limit = parse_with(
            &lookup,
            "REAGENT_INVALID_STREAK_LIMIT",
            defaults.invalid_streak_limit,
            positive_u32,
        )?;
        let max_prompt_chars = parse_with(
            &lookup,
            "REAGENT_MAX_PROMPT_CHARS",
            defaults.max_prompt_chars,
            positive_usize,
        )?;
        let max_tokens = parse_with(
            &lookup,
            "REAGENT_MAX_TOKENS",
            defaults.max_tokens,
            positive_u32,
        )?;

        Ok(Self {
            max_iterations,
            per_step_timeout,
            reasoner_timeout,
            invalid_streak_limit,
            max_prompt_chars,
            max_tokens,
            backend_endpoint: lookup("REAGENT_BACKEND_ENDPOINT"),
            backend_model: lookup("REAGENT_BACKEND_MODEL"),
            backend_api_key: lookup("REAGENT_BACKEND_API_KEY"),
        })
    }

    /// Lower these settings into the engine's per-run configuration.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            max_iterations: self.max_iterations,
            per_step_timeout: self.per_step_timeout,
            invalid_streak_limit: self.invalid_streak_limit,
            reasoner: ReasonerConfig {
                max_prompt_chars: self.max_prompt_chars,
                max_tokens: self.max_tokens,
                stop_sequences: Vec::new(),
                timeout: self.reasoner_timeout,
            },
        }
    }
}

fn parse_with<T, F, P>(
    lookup: &F,
    key: &'static str,
    default: T,
    parse: P,
) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).map_err(|problem| SettingsError::InvalidValue {
            key,
            value: raw,
            problem,
        }),
    }
}

fn positive_u32(raw: &str) -> Result<u32, String> {
    let parsed: u32 = raw.parse().map_err(|e| format!("not an integer: {e}"))?;
    if parsed == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn positive_usize(raw: &str) -> Result<usize, String> {
    let parsed: usize = raw.parse().map_err(|e| format!("not an integer: {e}"))?;
    if parsed == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn positive_millis(raw: &str) -> Result<Duration, String> {
    positive_u32(raw).map(|ms| Duration::from_millis(u64::from(ms)))
}
