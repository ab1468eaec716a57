//! Layered runtime configuration: built-in defaults, then `lineq.toml`, then
//! `LINEQ_*` environment variables (`__` separates sections, e.g.
//! `LINEQ_SERVER__PORT=8080`).

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use lineq_tutor::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use lineq_tutor::{GeminiConfig, RoomConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "lineq.toml";
pub const ENV_PREFIX: &str = "LINEQ_";

#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(#[from] Box<figment::Error>);

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineqConfig {
    pub server: ServerSettings,
    pub gemini: GeminiSettings,
    pub investigation: InvestigationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// Without a key every request is served from static content.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestigationSettings {
    pub max_provider_attempts: usize,
}

impl Default for InvestigationSettings {
    fn default() -> Self {
        Self {
            max_provider_attempts: RoomConfig::default().max_provider_attempts,
        }
    }
}

impl LineqConfig {
    /// Defaults, then `lineq.toml` in the working directory, then the environment.
    pub fn figment() -> Figment {
        Self::figment_with_file(CONFIG_FILE)
    }

    pub fn figment_with_file(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(LineqConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::figment().extract()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment_with_file(path).extract()?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// `None` when no API key is configured.
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let api_key = self.gemini.api_key.as_deref().map(str::trim)?;
        if api_key.is_empty() {
            return None;
        }
        Some(GeminiConfig {
            api_key: api_key.to_string(),
            model: self.gemini.model.clone(),
            base_url: self.gemini.base_url.clone(),
            timeout: Duration::from_secs(self.gemini.timeout_secs),
        })
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_provider_attempts: self.investigation.max_provider_attempts,
        }
    }
}
