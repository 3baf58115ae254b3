use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use tracing::warn;

pub const DEFAULT_ENDPOINT: &str = "https://fime.ici-labs.com/api/chat";
pub const DEFAULT_USER_ID_HEADER: &str = "X-User-Id";
pub const DEFAULT_ERROR_MESSAGE: &str = "Lo siento, hubo un error de conexión. Intenta de nuevo.";
pub const DEFAULT_PLACEHOLDER: &str = "...";

/// Environment variable that overrides the configured endpoint
pub const ENDPOINT_ENV: &str = "SITECHAT_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Chat proxy URL that receives the POST
    pub endpoint: String,
    /// Header carrying the per-profile user id
    pub user_id_header: String,
    /// Text shown in the bot bubble when an exchange fails
    pub error_message: String,
    /// Typing placeholder shown until the first delta arrives
    pub placeholder: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_id_header: DEFAULT_USER_ID_HEADER.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    /// Load from the user config dir, then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_at(&Self::get_config_path()?)
    }

    /// Like [`Config::load_from`], but on first run writes the defaults out
    /// so there is a file to edit. Failing to write them is not fatal.
    pub fn load_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Err(e) = Self::new().save_to(path) {
                warn!(error = %e, path = %path.display(), "could not write default config");
            }
        }

        let mut config = Self::load_from(path)?;
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint;
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sitechat").join("config.json"))
    }
}
