//! Server configuration.
//!
//! Sources, later ones winning:
//! 1. `config/default.toml` (or the file passed with `--config`)
//! 2. `TURNSTILE__*` environment variables, `__` separating sections
//!    (e.g. `TURNSTILE__QUEUE__MAX_CONNECTED=20`)
//! 3. the flat variables `DRAFT_DURATION`, `SESSION_DURATION`,
//!    `MAX_ACTIVE_USERS` and `PERSIST_PREFIX` understood by older
//!    deployments

use std::path::Path;

use config::{Config, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};
use turnstile::{PersistenceConfig, QueueConfig};

const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format: `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl ServerConfig {
    /// Load from `path` (or the default file if present) and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(path, std::env::vars().collect())
    }

    /// Load from `path` and an explicit set of environment variables.
    pub fn load_from(path: Option<&Path>, env: Map<String, String>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("TURNSTILE")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env.clone())),
            );

        for (var, key) in [
            ("DRAFT_DURATION", "queue.draft_timeout_seconds"),
            ("SESSION_DURATION", "queue.session_timeout_seconds"),
            ("MAX_ACTIVE_USERS", "queue.max_connected"),
        ] {
            builder = builder.set_override_option(key, legacy_number(&env, var)?)?;
        }
        if let Some(prefix) = env.get("PERSIST_PREFIX").filter(|p| !p.is_empty()) {
            builder = builder
                .set_override("persistence.backend", "snapshot")?
                .set_override("persistence.prefix", prefix.as_str())?;
        }

        builder.build()?.try_deserialize()
    }
}

fn legacy_number(env: &Map<String, String>, var: &str) -> Result<Option<i64>, ConfigError> {
    env.get(var)
        .map(|value| {
            value
                .trim()
                .parse::<i64>()
                .map_err(|e| ConfigError::Message(format!("{var}={value:?}: {e}")))
        })
        .transpose()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use turnstile::SweepMode;

    fn env(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ServerConfig::load_from(None, Map::new()).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.queue.max_connected, 50);
        assert_eq!(config.logging.format, "pretty");
        assert!(matches!(config.persistence, PersistenceConfig::Memory));
    }

    #[test]
    fn test_file_then_env_layering() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
bind_address = "127.0.0.1:9000"

[queue]
max_connected = 5
sweep_mode = "periodic"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = ServerConfig::load_from(
            Some(file.path()),
            env(&[("TURNSTILE__QUEUE__MAX_CONNECTED", "7")]),
        )
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.queue.max_connected, 7);
        assert_eq!(config.queue.sweep_mode, SweepMode::Periodic);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_legacy_variables_override() {
        let config = ServerConfig::load_from(
            None,
            env(&[
                ("TURNSTILE__QUEUE__MAX_CONNECTED", "7"),
                ("DRAFT_DURATION", "30"),
                ("SESSION_DURATION", "600"),
                ("MAX_ACTIVE_USERS", "3"),
                ("PERSIST_PREFIX", "/var/lib/turnstile/queue"),
            ]),
        )
        .unwrap();

        assert_eq!(config.queue.draft_timeout_seconds, 30);
        assert_eq!(config.queue.session_timeout_seconds, 600);
        assert_eq!(config.queue.max_connected, 3);
        match config.persistence {
            PersistenceConfig::Snapshot { prefix, .. } => {
                assert_eq!(prefix, Path::new("/var/lib/turnstile/queue"))
            }
            other => panic!("expected snapshot backend, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_legacy_variable_is_rejected() {
        let err = ServerConfig::load_from(None, env(&[("MAX_ACTIVE_USERS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_ACTIVE_USERS"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result =
            ServerConfig::load_from(Some(Path::new("/nonexistent/turnstile.toml")), Map::new());
        assert!(result.is_err());
    }
}
