//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::SearchError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Environment variables consulted, in order, when no key is configured.
pub const FALLBACK_API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<OmniConfig, SearchError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            SearchError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load the file when it exists, otherwise start from defaults.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<OmniConfig, SearchError> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Loading configuration from file: {}", path.display());
            Self::from_file(path).await
        } else {
            log::info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Self::from_config(OmniConfig::default())
        }
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<OmniConfig, SearchError> {
        let config: OmniConfig = if content.trim().is_empty() {
            OmniConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| SearchError::Config(format!("Failed to parse YAML config: {}", e)))?
        };

        Self::from_config(config)
    }

    fn from_config(mut config: OmniConfig) -> Result<OmniConfig, SearchError> {
        Self::resolve_environment(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Resolve environment variables in the configuration
    fn resolve_environment(config: &mut OmniConfig) {
        config.llm.base_url = expand_env(&config.llm.base_url);
        if let Some(player) = config.audio.player.take() {
            config.audio.player = Some(expand_env(&player)).filter(|p| !p.is_empty());
        }
        Self::resolve_llm_auth(&mut config.llm.auth);
    }

    /// Resolve LLM authentication from environment
    fn resolve_llm_auth(auth: &mut LlmAuth) {
        if let Some(key) = auth.api_key.take() {
            auth.api_key = Some(expand_env(&key)).filter(|k| !k.is_empty());
        }

        if auth.api_key.is_none() {
            if let Some(env_var) = &auth.api_key_env {
                if let Ok(api_key) = env::var(env_var) {
                    auth.api_key = Some(api_key);
                } else {
                    log::warn!("Environment variable {} is not set", env_var);
                }
            }
        }

        // If no API key is set, try common environment variables
        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            auth.api_key = FALLBACK_API_KEY_VARS
                .iter()
                .find_map(|var| env::var(var).ok())
                .filter(|k| !k.is_empty());
        }
    }
}

/// Expands a whole-value `${VAR}` reference; anything else is returned as is.
fn expand_env(val: &str) -> String {
    match val.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => env::var(var_name).unwrap_or_default(),
        None => val.to_string(),
    }
}
