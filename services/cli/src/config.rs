//! Configuration for the terminal interview runtime, loaded from the
//! environment the same way the API service does it.

use secrecy::SecretString;
use std::env;
use tracing::Level;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

/// Holds all configuration loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub provider: Provider,
    pub openai_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub chat_model: String,
    pub gemini_model: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `PROVIDER`: Primary inference backend, "openai" or "gemini". Defaults to "openai".
    /// *   `OPENAI_API_KEY`: Required if provider is "openai".
    /// *   `GEMINI_API_KEY`: Required if provider is "gemini".
    /// *   `CHAT_MODEL`: (Optional) OpenAI chat model. Defaults to "gpt-4o".
    /// *   `GEMINI_MODEL`: (Optional) Gemini model. Defaults to "gemini-1.5-flash".
    /// *   `RUST_LOG`: (Optional) Logging level. Defaults to "WARN" so the
    ///     interview transcript stays readable.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let provider_str = env::var("PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            _ => Provider::OpenAI,
        };

        let openai_api_key = env::var("OPENAI_API_KEY").ok().map(SecretString::from);
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().map(SecretString::from);

        let chat_model = env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let config = Self {
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            gemini_model,
            log_level,
        };

        match config.provider {
            Provider::OpenAI => {
                if config.openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if config.gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(config)
    }
}
