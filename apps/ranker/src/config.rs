use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::report::ReportFormat;

/// Hard ceiling on criteria per scoring request.
pub const MAX_CRITERIA: usize = 15;
/// Hard ceiling on resume files per scoring request.
pub const MAX_RESUME_FILES: usize = 20;
/// Longest accepted criterion, in characters.
pub const MAX_CRITERION_CHARS: usize = 200;

/// Application configuration loaded from environment variables.
/// Built once at startup and shared read-only with every handler.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub model: ModelSettings,
    pub limits: Limits,
    pub default_report_format: ReportFormat,
}

/// Knobs for outbound language-model calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub temperature: f32,
    /// In-flight scoring calls allowed per request.
    pub scoring_concurrency: usize,
}

/// Input size limits enforced before any extraction or model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_upload_bytes: usize,
    pub max_jd_chars: usize,
    pub max_resume_chars: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(15),
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            temperature: 0.0,
            scoring_concurrency: 5,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_jd_chars: 12_000,
            max_resume_chars: 20_000,
        }
    }
}

const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

impl Limits {
    /// Request body ceiling for `/score-resumes`: every file at its maximum plus form overhead.
    pub fn max_request_bytes(&self) -> usize {
        self.max_upload_bytes
            .saturating_mul(MAX_RESUME_FILES)
            .saturating_add(FORM_OVERHEAD_BYTES)
    }

    /// Request body ceiling for `/extract-criteria`, which takes a single document.
    pub fn max_single_upload_request_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES)
    }
}

impl Config {
    /// Fails at startup if `ANTHROPIC_API_KEY` is missing or any optional value is malformed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_defaults = ModelSettings::default();
        let limit_defaults = Limits::default();

        let model = ModelSettings {
            attempt_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MODEL_TIMEOUT_SECS",
                model_defaults.attempt_timeout.as_secs(),
            )?),
            max_attempts: parse_or(&lookup, "MODEL_MAX_ATTEMPTS", model_defaults.max_attempts)?,
            retry_delay: Duration::from_millis(parse_or(
                &lookup,
                "MODEL_RETRY_DELAY_MS",
                model_defaults.retry_delay.as_millis() as u64,
            )?),
            temperature: parse_or(&lookup, "MODEL_TEMPERATURE", model_defaults.temperature)?,
            scoring_concurrency: parse_or(
                &lookup,
                "SCORING_CONCURRENCY",
                model_defaults.scoring_concurrency,
            )?,
        };

        if model.max_attempts == 0 {
            return Err(anyhow!("MODEL_MAX_ATTEMPTS must be at least 1"));
        }
        if model.attempt_timeout.is_zero() {
            return Err(anyhow!("MODEL_TIMEOUT_SECS must be at least 1"));
        }
        if model.scoring_concurrency == 0 {
            return Err(anyhow!("SCORING_CONCURRENCY must be at least 1"));
        }
        if !(0.0..=1.0).contains(&model.temperature) {
            return Err(anyhow!("MODEL_TEMPERATURE must be between 0.0 and 1.0"));
        }

        let limits = Limits {
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", limit_defaults.max_upload_bytes)?,
            max_jd_chars: parse_or(&lookup, "MAX_JD_CHARS", limit_defaults.max_jd_chars)?,
            max_resume_chars: parse_or(
                &lookup,
                "MAX_RESUME_CHARS",
                limit_defaults.max_resume_chars,
            )?,
        };

        Ok(Config {
            anthropic_api_key: require(&lookup, "ANTHROPIC_API_KEY")?,
            port: parse_or(&lookup, "PORT", 8080u16)
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            model,
            limits,
            default_report_format: parse_or(&lookup, "REPORT_FORMAT", ReportFormat::Xlsx)?,
        })
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Environment variable '{key}' has invalid value '{raw}': {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_is_fatal() {
        let result = Config::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "   ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.model, ModelSettings::default());
        assert_eq!(config.model.attempt_timeout, Duration::from_secs(15));
        assert_eq!(config.model.max_attempts, 3);
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.default_report_format, ReportFormat::Xlsx);
    }

    #[test]
    fn test_overrides_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("PORT", "9000"),
            ("MODEL_TIMEOUT_SECS", "5"),
            ("MODEL_MAX_ATTEMPTS", "2"),
            ("SCORING_CONCURRENCY", "8"),
            ("REPORT_FORMAT", "csv"),
            ("MAX_JD_CHARS", "500"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.model.attempt_timeout, Duration::from_secs(5));
        assert_eq!(config.model.max_attempts, 2);
        assert_eq!(config.model.scoring_concurrency, 8);
        assert_eq!(config.default_report_format, ReportFormat::Csv);
        assert_eq!(config.limits.max_jd_chars, 500);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("PORT", "not-a-port"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("MODEL_MAX_ATTEMPTS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_report_format_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("REPORT_FORMAT", "pdf"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_request_body_limit_covers_all_files() {
        let limits = Limits::default();
        assert!(limits.max_request_bytes() > limits.max_upload_bytes * MAX_RESUME_FILES);
    }

    #[test]
    fn test_single_upload_body_limit_covers_one_file_only() {
        let limits = Limits::default();
        assert!(limits.max_single_upload_request_bytes() > limits.max_upload_bytes);
        assert!(limits.max_single_upload_request_bytes() < limits.max_upload_bytes * 2);
    }
}
