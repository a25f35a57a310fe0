use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PaperError, Result};

pub const ENV_CONFIG: &str = "GETPAPER_CONFIG";
pub const ENV_INSPIRE_URL: &str = "GETPAPER_INSPIRE_URL";
pub const ENV_ARXIV_PDF_URL: &str = "GETPAPER_ARXIV_PDF_URL";

/// Runtime configuration, loaded from `~/.config/getpaper/config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base of the INSPIRE REST API, without a trailing slash.
    pub inspire_api_url: String,
    /// Prefix that an arXiv identifier is appended to for the preprint PDF.
    pub arxiv_pdf_url: String,
    pub user_agent: String,
    /// Minimum delay between two requests to the same client.
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Reject downloads whose body does not start with `%PDF`.
    pub require_pdf_magic: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inspire_api_url: "https://inspirehep.net/api".to_string(),
            arxiv_pdf_url: "https://arxiv.org/pdf".to_string(),
            user_agent: format!("getpaper/{}", env!("CARGO_PKG_VERSION")),
            min_interval_ms: 350,
            max_retries: 3,
            timeout_secs: 60,
            require_pdf_magic: true,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl Config {
    /// Standard config file path, overridable with `GETPAPER_CONFIG`.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("getpaper")
            .join("config.toml")
    }

    /// Load from the standard path and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| PaperError::fs(path, e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| PaperError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(url) = env_var_non_empty(ENV_INSPIRE_URL) {
            self.inspire_api_url = url;
        }
        if let Some(url) = env_var_non_empty(ENV_ARXIV_PDF_URL) {
            self.arxiv_pdf_url = url;
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
}
