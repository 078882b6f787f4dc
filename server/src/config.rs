//! Environment-driven configuration, loaded once at startup.
//!
//! Mirrors the `config` crate + `dotenvy` combination used elsewhere, but
//! sources values from the process environment instead of a TOML file, per
//! the variable list the server is required to read.

use std::time::Duration;

use serde::Deserialize;

use crate::error::GameError;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_idle_timeout_sec")]
    pub idle_timeout_sec: u64,
    #[serde(default = "default_combat_timeout_sec")]
    pub combat_timeout_sec: u64,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite://mud.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_secret_key() -> String {
    "dev-secret-change-me".to_string()
}

fn default_locale() -> String {
    common::DEFAULT_LOCALE.to_string()
}

fn default_idle_timeout_sec() -> u64 {
    30 * 60
}

fn default_combat_timeout_sec() -> u64 {
    60
}

fn default_templates_dir() -> String {
    "./templates".to_string()
}

impl ServerConfig {
    /// Loads configuration from the process environment, after first letting
    /// `dotenvy` populate any variables from a local `.env` file if present.
    pub fn load() -> Result<Self, GameError> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("database_url", default_database_url())?
            .set_default("log_level", default_log_level())?
            .set_default("secret_key", default_secret_key())?
            .set_default("default_locale", default_locale())?
            .set_default("idle_timeout_sec", default_idle_timeout_sec() as i64)?
            .set_default("combat_timeout_sec", default_combat_timeout_sec() as i64)?
            .set_default("templates_dir", default_templates_dir())?
            .add_source(config::Environment::default())
            .build()
            .map_err(|e| GameError::Internal(e.into()))?;

        cfg.try_deserialize()
            .map_err(|e| GameError::Internal(e.into()))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_sec)
    }

    pub fn combat_timeout(&self) -> Duration {
        Duration::from_secs(self.combat_timeout_sec)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<config::ConfigError> for GameError {
    fn from(err: config::ConfigError) -> Self {
        GameError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_when_environment_is_empty() {
        // set_default-only build path, no env::set_var to avoid cross-test races.
        let cfg = config::Config::builder()
            .set_default("host", default_host())
            .unwrap()
            .set_default("port", default_port() as i64)
            .unwrap()
            .set_default("database_url", default_database_url())
            .unwrap()
            .set_default("log_level", default_log_level())
            .unwrap()
            .set_default("secret_key", default_secret_key())
            .unwrap()
            .set_default("default_locale", default_locale())
            .unwrap()
            .set_default("idle_timeout_sec", default_idle_timeout_sec() as i64)
            .unwrap()
            .set_default("combat_timeout_sec", default_combat_timeout_sec() as i64)
            .unwrap()
            .set_default("templates_dir", default_templates_dir())
            .unwrap()
            .build()
            .unwrap();

        let parsed: ServerConfig = cfg.try_deserialize().unwrap();
        assert_eq!(parsed.port, 4000);
        assert_eq!(parsed.idle_timeout(), Duration::from_secs(1800));
        assert_eq!(parsed.combat_timeout(), Duration::from_secs(60));
        assert_eq!(parsed.bind_addr(), "0.0.0.0:4000");
    }
}
