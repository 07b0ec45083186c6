use crate::models::CandidateList;
use crate::services::dispatcher::SuccessPolicy;
use crate::services::providers::GenerationParams;
use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Gemini API base URL.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Candidate models, most preferred first.
pub const DEFAULT_GEMINI_MODELS: &str =
    "gemini-2.0-flash-exp,gemini-2.5-flash,gemini-1.5-flash-latest,gemini-pro";

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 200;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ROUTE: &str = "/api/gemini";
const DEFAULT_STATIC_DIR: &str = "public";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub gemini: GeminiConfig,
    pub relay: RelaySettings,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Shared credential. Absence is reported per request, not at startup.
    pub api_key: Option<Secret<String>>,
    pub api_base: String,
    pub models: CandidateList,
    pub generation: GenerationParams,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub route: String,
    pub static_dir: Option<String>,
    pub success_policy: SuccessPolicy,
}

impl GeminiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// True when a non-blank credential is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the relay configuration from an arbitrary variable source.
    pub fn from_lookup<F>(mut common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            common.port = parse_value("PORT", &port)?;
        }

        let models = CandidateList::new(parse_models(
            &lookup("GEMINI_MODELS").unwrap_or_else(|| DEFAULT_GEMINI_MODELS.to_string()),
        ))
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("GEMINI_MODELS: {}", e)))?;

        let generation = GenerationParams {
            temperature: get_parsed(&lookup, "GEMINI_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE),
            max_output_tokens: get_parsed(&lookup, "GEMINI_MAX_OUTPUT_TOKENS")?
                .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            top_p: get_parsed(&lookup, "GEMINI_TOP_P")?,
            stop_sequences: lookup("GEMINI_STOP_SEQUENCES")
                .map(|raw| parse_models(&raw))
                .unwrap_or_default(),
        };

        let request_timeout_secs = get_parsed(&lookup, "GEMINI_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GEMINI_REQUEST_TIMEOUT_SECS must be greater than zero"
            )));
        }

        let route = lookup("RELAY_ROUTE").unwrap_or_else(|| DEFAULT_ROUTE.to_string());
        if !route.starts_with('/') {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RELAY_ROUTE must start with '/', got '{}'",
                route
            )));
        }

        let static_dir = match lookup("RELAY_STATIC_DIR") {
            Some(dir) if dir.trim().is_empty() => None,
            Some(dir) => Some(dir),
            None => Some(DEFAULT_STATIC_DIR.to_string()),
        };

        let success_policy = match lookup("RELAY_SUCCESS_POLICY") {
            Some(raw) => SuccessPolicy::from_str(&raw).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("RELAY_SUCCESS_POLICY: {}", e))
            })?,
            None => SuccessPolicy::default(),
        };

        Ok(RelayConfig {
            common,
            gemini: GeminiConfig {
                api_key: lookup("GEMINI_API_KEY")
                    .filter(|key| !key.trim().is_empty())
                    .map(Secret::new),
                api_base: lookup("GEMINI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                models,
                generation,
                request_timeout_secs,
            },
            relay: RelaySettings {
                route,
                static_dir,
                success_policy,
            },
        })
    }
}

/// Split a comma-separated list, dropping blank entries.
pub fn parse_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse_value(key, &raw).map(Some),
        _ => Ok(None),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}
