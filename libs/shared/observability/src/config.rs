// [libs/shared/observability/src/config.rs]
//! Typed configuration loading shared by the orchestrator and the
//! provider agent: a `.env` file, an optional config file, and
//! environment variables layered in that order, deserialized into a
//! caller-supplied struct.

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to build configuration layers: {0}")]
    Build(#[from] config::ConfigError),

    #[error("configuration did not deserialize into the expected shape: {0}")]
    Shape(String),
}

/// Loads a typed configuration value.
///
/// Layering, lowest to highest precedence:
/// 1. `.env` in the current directory (via `dotenvy`, ignored if absent)
/// 2. `{config_file_stem}.toml` if present in the current directory
/// 3. environment variables prefixed with `env_prefix`, with `__` as the
///    nesting separator (e.g. `NEBULA__SERVER__PORT=9000` maps to
///    `server.port`)
///
/// `env_prefix` is typically the service name, upper-cased.
pub fn load_config<T: DeserializeOwned>(
    config_file_stem: &str,
    env_prefix: &str,
) -> Result<T, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name(config_file_stem).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );

    let raw = builder.build()?;
    raw.try_deserialize().map_err(|err| ConfigError::Shape(err.to_string()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default = "default_port")]
        port: u16,
    }

    fn default_port() -> u16 {
        8080
    }

    #[test]
    fn missing_file_and_env_falls_back_to_serde_defaults() {
        let loaded: Sample = load_config("nonexistent_config_file_marker", "NEBULA_TEST_UNSET_PREFIX")
            .expect("layered config with no sources still deserializes via defaults");
        assert_eq!(loaded.port, 8080);
    }

    #[test]
    fn environment_override_wins_over_default() {
        std::env::set_var("NEBULA_CFG_TEST__PORT", "9999");
        let loaded: Sample = load_config("nonexistent_config_file_marker", "NEBULA_CFG_TEST")
            .expect("environment source should be readable");
        std::env::remove_var("NEBULA_CFG_TEST__PORT");
        assert_eq!(loaded.port, 9999);
    }
}
