use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thryve_core::recognition::RecognitionConfig;

use crate::gemini::DEFAULT_MODEL;

pub struct Config {
    pub db_path: PathBuf,
    pub recognition: RecognitionConfig,
    pub gemini_model: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "thryve").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("thryve.db");
        let lookup = |name: &str| std::env::var(name).ok();
        let recognition = recognition_from_env(lookup)?;
        let gemini_model = lookup("THRYVE_GEMINI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Config {
            db_path,
            recognition,
            gemini_model,
        })
    }
}

/// Build the recognition settings from environment-style lookups. Unset
/// variables fall back to the defaults; set but unparseable ones are errors.
pub fn recognition_from_env<F>(lookup: F) -> Result<RecognitionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RecognitionConfig::default();
    let api_key = lookup("GEMINI_API_KEY")
        .or_else(|| lookup("THRYVE_API_KEY"))
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());

    let millis = |name: &str, default: Duration| -> Result<Duration> {
        Ok(parse_var::<u64>(&lookup, name)?.map_or(default, Duration::from_millis))
    };

    Ok(RecognitionConfig {
        api_key,
        max_requests_per_window: parse_var(&lookup, "THRYVE_RATE_LIMIT_MAX")?
            .unwrap_or(defaults.max_requests_per_window),
        window: millis("THRYVE_RATE_LIMIT_WINDOW_MS", defaults.window)?,
        timeout: millis("THRYVE_TIMEOUT_MS", defaults.timeout)?,
        max_retries: parse_var(&lookup, "THRYVE_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
        retry_base_delay: millis("THRYVE_RETRY_BASE_DELAY_MS", defaults.retry_base_delay)?,
    })
}

fn parse_var<T>(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {name}: '{raw}'")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = recognition_from_env(env(&[])).unwrap();
        assert_eq!(cfg, RecognitionConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = recognition_from_env(env(&[
            ("GEMINI_API_KEY", " secret "),
            ("THRYVE_RATE_LIMIT_MAX", "10"),
            ("THRYVE_RATE_LIMIT_WINDOW_MS", "1000"),
            ("THRYVE_TIMEOUT_MS", "5000"),
            ("THRYVE_MAX_RETRIES", "0"),
            ("THRYVE_RETRY_BASE_DELAY_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.max_requests_per_window, 10);
        assert_eq!(cfg.window, Duration::from_secs(1));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_retries, 0);
        assert_eq!(cfg.retry_base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_fallback_api_key_var() {
        let cfg = recognition_from_env(env(&[("THRYVE_API_KEY", "k2")])).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("k2"));

        let cfg =
            recognition_from_env(env(&[("GEMINI_API_KEY", "k1"), ("THRYVE_API_KEY", "k2")])).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("k1"));
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let cfg = recognition_from_env(env(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = recognition_from_env(env(&[("THRYVE_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("THRYVE_TIMEOUT_MS"));

        let err = recognition_from_env(env(&[("THRYVE_MAX_RETRIES", "-1")])).unwrap_err();
        assert!(err.to_string().contains("THRYVE_MAX_RETRIES"));
    }
}
