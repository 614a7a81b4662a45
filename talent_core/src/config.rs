//! Engine configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes. The narrative service credential never lives in the file; it is
//! read from `OPENAI_API_KEY` (a `.env` file is honored by the binary).

use crate::error::{QueryError, Result};
use crate::resolver::{PHRASE_THRESHOLD, TOKEN_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_VAR: &str = "OPENAI_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub phrase_threshold: f64,
    pub token_threshold: f64,
    pub pie_top_n: usize,
    pub bar_top_n: usize,
    /// Cap on data/document text injected into a narrative prompt
    pub prompt_char_budget: usize,
    pub preview_rows: usize,
    /// Chat turns forwarded to the narrative service
    pub history_turns: usize,
    /// JSON rule table replacing the built-in rules
    pub rules_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub narrative: NarrativeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phrase_threshold: PHRASE_THRESHOLD,
            token_threshold: TOKEN_THRESHOLD,
            pie_top_n: 10,
            bar_top_n: 20,
            prompt_char_budget: 18_000,
            preview_rows: 20,
            history_turns: 6,
            rules_path: None,
            log_path: Some(PathBuf::from("chat_log.txt")),
            store_path: Some(PathBuf::from("talent.db")),
            narrative: NarrativeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Config file if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("phrase_threshold", self.phrase_threshold),
            ("token_threshold", self.token_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(QueryError::Config(format!(
                    "{} must be within 0.0..=1.0, got {}",
                    name, value
                )));
            }
        }
        if self.pie_top_n == 0 || self.bar_top_n == 0 {
            return Err(QueryError::Config("chart top-N must be positive".to_string()));
        }
        if self.prompt_char_budget == 0 {
            return Err(QueryError::Config("prompt_char_budget must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            temperature: 0.2,
            max_tokens: 800,
        }
    }
}

impl NarrativeConfig {
    /// Apply `OPENAI_BASE_URL` / `OPENAI_MODEL` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_VAR) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        if let Ok(model) = std::env::var(MODEL_VAR) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        self
    }
}

/// The service credential; its absence is a startup error.
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(QueryError::Config(format!(
            "{} is not set; the narrative service needs an API key",
            API_KEY_VAR
        ))),
    }
}
