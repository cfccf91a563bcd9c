//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;

use personnel_core::Credentials;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub session_path: PathBuf,
    pub log_level: Level,
    pub request_timeout: Duration,
    /// Credentials for signing in without a prompt.
    pub login: Option<Credentials>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080/api/v1".to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let session_path = lookup("SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.personnel/session.json"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let timeout_str = lookup("REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "30".to_string());
        let request_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        // Both halves of the login are needed once either is given.
        let login = match (lookup("PERSONNEL_REGIMENTAL_NO"), lookup("PERSONNEL_PASSWORD")) {
            (Some(regimental_no), Some(password)) => Some(Credentials::new(regimental_no, password)),
            (Some(_), None) => return Err(ConfigError::MissingVar("PERSONNEL_PASSWORD".to_string())),
            (None, Some(_)) => {
                return Err(ConfigError::MissingVar("PERSONNEL_REGIMENTAL_NO".to_string()))
            }
            (None, None) => None,
        };

        Ok(Self {
            api_base_url,
            session_path,
            log_level,
            request_timeout,
            login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/api/v1");
        assert_eq!(config.session_path, PathBuf::from("./.personnel/session.json"));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.login.is_none());
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = Config::from_lookup(lookup(&[("RUST_LOG", "chatty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "RUST_LOG"));

        let err = Config::from_lookup(lookup(&[("REQUEST_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "REQUEST_TIMEOUT_SECS"));

        let err = Config::from_lookup(lookup(&[("API_BASE_URL", "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "API_BASE_URL"));
    }

    #[test]
    fn login_needs_both_halves() {
        let err = Config::from_lookup(lookup(&[("PERSONNEL_REGIMENTAL_NO", "R-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref var) if var == "PERSONNEL_PASSWORD"));

        let config = Config::from_lookup(lookup(&[
            ("PERSONNEL_REGIMENTAL_NO", "R-1"),
            ("PERSONNEL_PASSWORD", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.login, Some(Credentials::new("R-1", "secret")));
    }
}
