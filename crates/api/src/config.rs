//! Layered settings: built-in defaults, then an optional `stockledger.toml`, then
//! `STOCKLEDGER__*` environment variables (`STOCKLEDGER__BIND_ADDRESS=0.0.0.0:9000`).
//!
//! `main` loads `.env` with `dotenvy` before calling [`Settings::load`].

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use stockledger_observability::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub bind_address: String,
    /// Postgres event store; in-memory when absent.
    #[serde(default)]
    pub database_url: Option<String>,
    pub log_filter: String,
    /// `json` or `pretty`.
    pub log_format: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("STOCKLEDGER").separator("__"))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("bind_address", "0.0.0.0:8080")?
            .set_default("log_filter", "info")?
            .set_default("log_format", "json")?
            .add_source(File::with_name("stockledger").required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "bind_address",
                message: "must not be empty".into(),
            });
        }
        if let Some(url) = &self.database_url
            && !(url.starts_with("postgres://") || url.starts_with("postgresql://"))
        {
            return Err(ConfigError::Invalid {
                key: "database_url",
                message: "expected a postgres:// url".into(),
            });
        }
        Ok(())
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.log_format)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix("STOCKLEDGER").separator("__").source(Some(source))
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let s = Settings::load_from(env(&[])).unwrap();
        assert_eq!(s.bind_address, "0.0.0.0:8080");
        assert_eq!(s.database_url, None);
        assert_eq!(s.log_format(), LogFormat::Json);
    }

    #[test]
    fn environment_overrides_defaults() {
        let s = Settings::load_from(env(&[
            ("STOCKLEDGER__BIND_ADDRESS", "127.0.0.1:9000"),
            ("STOCKLEDGER__DATABASE_URL", "postgres://localhost/stock"),
            ("STOCKLEDGER__LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(s.bind_address, "127.0.0.1:9000");
        assert_eq!(s.database_url.as_deref(), Some("postgres://localhost/stock"));
        assert_eq!(s.log_format(), LogFormat::Pretty);
    }

    #[test]
    fn rejects_non_postgres_urls() {
        let err = Settings::load_from(env(&[("STOCKLEDGER__DATABASE_URL", "mysql://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "database_url", .. }));
    }
}
