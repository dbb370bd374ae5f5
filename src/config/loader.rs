//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Explicit backend host override.
pub const ENV_API_HOST: &str = "API_HOST";
/// Explicit backend port override.
pub const ENV_API_PORT: &str = "API_PORT";
/// Container deployment flag.
pub const ENV_DOCKER: &str = "DOCKER";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var} has invalid value `{value}`")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, overlay the process
/// environment, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay backend location variables onto `config`.
///
/// `lookup` stands in for the environment so the overlay can be exercised
/// without touching process state. Empty values count as unset.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(host) = get(ENV_API_HOST) {
        config.backend.host = Some(host.trim().to_string());
    }

    if let Some(port) = get(ENV_API_PORT) {
        let parsed = port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnv {
            var: ENV_API_PORT,
            value: port.clone(),
        })?;
        config.backend.port = Some(parsed);
    }

    if let Some(flag) = get(ENV_DOCKER) {
        config.backend.docker = flag.trim().eq_ignore_ascii_case("true");
    }

    Ok(())
}
