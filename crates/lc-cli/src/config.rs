use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `LOCALCHAT_OLLAMA__BASE_URL`.
pub const ENV_PREFIX: &str = "LOCALCHAT_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub chat: ChatConfig,
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Timeout for listing and deleting models. Downloads are not bounded.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: lc_client::ollama::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    /// Sent when the server has no models installed.
    pub default_model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: lc_client::chat::DEFAULT_BASE_URL.to_string(),
            default_model: "llama3.2:latest".to_string(),
        }
    }
}

/// External dictation program. It must print the cumulative transcript,
/// one line per update, and exit when the utterance ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub args: Vec<String>,
}

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ollama_url: Option<String>,
    pub chat_url: Option<String>,
    pub model: Option<String>,
}

impl Config {
    /// Load defaults, then the config file, then the environment, then
    /// the command-line overrides.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let path = Self::config_path()?;
        let config: Config = Self::figment(Some(&path))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        Ok(config.with_overrides(overrides))
    }

    /// The layered sources. A missing file contributes nothing.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(url) = &overrides.ollama_url {
            self.ollama.base_url = url.clone();
        }
        if let Some(url) = &overrides.chat_url {
            self.chat.base_url = url.clone();
        }
        if let Some(model) = &overrides.model {
            self.chat.default_model = model.clone();
        }
        self
    }

    pub fn ollama_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.timeout_secs.max(1))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("localchat"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
