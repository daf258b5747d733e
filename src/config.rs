//! Engine configuration.
//!
//! Everything the engine reads from the environment is collected here once,
//! at startup, into an explicit [`EngineConfig`] that is handed to the
//! services. The services never read environment variables themselves.

use std::path::PathBuf;

use crate::adapters::logistic::manifest::{verifying_key_from_b64, ModelLoadOptions};
use crate::domain::Language;
use crate::{HemoscanError, Result};

pub const MODEL_DIR_ENV: &str = "HEMOSCAN_MODEL_DIR";
pub const ALLOW_UNSIGNED_MODELS_ENV: &str = "HEMOSCAN_ALLOW_UNSIGNED_MODELS";
pub const PUBKEY_B64_ENV: &str = "HEMOSCAN_MODEL_SIGNING_PUBKEY_B64";
pub const PUBKEY_FILE_ENV: &str = "HEMOSCAN_MODEL_SIGNING_PUBKEY_B64_FILE";
pub const MIN_SERIAL_ENV: &str = "HEMOSCAN_MODEL_MIN_SERIAL";
pub const MAX_AGE_ENV: &str = "HEMOSCAN_MODEL_MAX_AGE_SECS";
pub const KNOWLEDGE_BASE_ENV: &str = "HEMOSCAN_KNOWLEDGE_BASE";
pub const DEFAULT_LANGUAGE_ENV: &str = "HEMOSCAN_DEFAULT_LANGUAGE";
pub const LOG_MODE_ENV: &str = "HEMOSCAN_LOG_MODE";
pub const LOG_FILE_ENV: &str = "HEMOSCAN_LOG_FILE";

const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_LOG_FILE: &str = "hemoscan.log";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stderr,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_dir: PathBuf,
    pub model_options: ModelLoadOptions,
    /// Replacement knowledge base; the built-in one when `None`
    pub knowledge_base: Option<PathBuf>,
    pub default_language: Language,
    pub log_sink: LogSink,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            model_options: ModelLoadOptions::default(),
            knowledge_base: None,
            default_language: Language::En,
            log_sink: LogSink::Stderr,
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

impl EngineConfig {
    /// Build the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns `HemoscanError::Validation` for malformed values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `HemoscanError::Validation` for malformed values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let trusted_key = match (get(PUBKEY_B64_ENV), get(PUBKEY_FILE_ENV)) {
            (Some(b64), _) => Some(verifying_key_from_b64(&b64)?),
            (None, Some(path)) => {
                let b64 = std::fs::read_to_string(path.trim()).map_err(|e| {
                    HemoscanError::Validation(format!("{PUBKEY_FILE_ENV}: {e}"))
                })?;
                Some(verifying_key_from_b64(&b64)?)
            }
            (None, None) => None,
        };

        let parse_num = |name: &str| -> Result<Option<i64>> {
            get(name)
                .map(|v| {
                    v.trim().parse::<i64>().map_err(|_| {
                        HemoscanError::Validation(format!("{name} must be an integer, got '{v}'"))
                    })
                })
                .transpose()
        };
        let min_serial = parse_num(MIN_SERIAL_ENV)?
            .map(|v| {
                u64::try_from(v).map_err(|_| {
                    HemoscanError::Validation(format!("{MIN_SERIAL_ENV} must not be negative"))
                })
            })
            .transpose()?;
        let max_age_secs = parse_num(MAX_AGE_ENV)?;

        let default_language = match get(DEFAULT_LANGUAGE_ENV) {
            Some(code) => Language::from_code(&code).ok_or_else(|| {
                HemoscanError::Validation(format!("{DEFAULT_LANGUAGE_ENV}: unknown language '{code}'"))
            })?,
            None => defaults.default_language,
        };

        let log_sink = match get(LOG_MODE_ENV).map(|m| m.trim().to_ascii_lowercase()) {
            Some(mode) if mode == "file" => LogSink::File(
                get(LOG_FILE_ENV).map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
            ),
            Some(mode) if mode == "stderr" => LogSink::Stderr,
            Some(other) => {
                return Err(HemoscanError::Validation(format!(
                    "{LOG_MODE_ENV} must be 'stderr' or 'file', got '{other}'"
                )))
            }
            None => LogSink::Stderr,
        };

        Ok(Self {
            model_dir: get(MODEL_DIR_ENV).map_or(defaults.model_dir, PathBuf::from),
            model_options: ModelLoadOptions {
                allow_unsigned: get(ALLOW_UNSIGNED_MODELS_ENV).is_some_and(|v| parse_bool(&v)),
                trusted_key,
                min_serial,
                max_age_secs,
            },
            knowledge_base: get(KNOWLEDGE_BASE_ENV).map(PathBuf::from),
            default_language,
            log_sink,
        })
    }
}
