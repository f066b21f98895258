// Service configuration from the environment (and `.env` via dotenv)

use std::path::PathBuf;
use std::str::FromStr;

use crate::agents::errors::{AgentError, AgentResult};
use crate::agents::llm::AnthropicSettings;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub output_dir: PathBuf,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub history_window: usize,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> AgentResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys take their default
    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: parse_or(&get, "PORT", 3001)?,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://agency.db".to_string()),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output")),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            anthropic_base_url: get("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model: get("AGENCY_MODEL").unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
            max_tokens: parse_or(&get, "MAX_TOKENS", 4096)?,
            history_window: parse_or(&get, "HISTORY_WINDOW", 40)?,
        })
    }

    /// Settings for the model client; the API key is required here
    pub fn anthropic_settings(&self) -> AgentResult<AnthropicSettings> {
        let api_key = self
            .anthropic_api_key
            .clone()
            .ok_or_else(|| AgentError::ConfigError("ANTHROPIC_API_KEY is not set".to_string()))?;

        Ok(AnthropicSettings {
            api_key,
            base_url: self.anthropic_base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> AgentResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AgentError::ConfigError(format!("{} must be a number, got {:?}: {}", key, raw, e))),
    }
}
