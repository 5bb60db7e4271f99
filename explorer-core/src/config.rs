use crate::error::{ConfigError, CoreError};
use crate::types::MAX_POSTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "reddit_explorer.toml";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REDDIT_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
const ENV_MODEL: &str = "OPENAI_MODEL";
const ENV_DATA_DIR: &str = "REDDIT_EXPLORER_DATA_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub reddit: RedditConfig,
    pub ai: AiConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the database, image cache and suggestions file.
    pub data_dir: Option<PathBuf>,
    pub database_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    pub base_url: String,
    pub requests_per_minute: u32,
    pub burst: u32,
    pub max_posts: usize,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: DEFAULT_REDDIT_BASE_URL.to_string(),
            requests_per_minute: 60,
            burst: 5,
            max_posts: MAX_POSTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Ask the model for new category names while categorizing.
    pub suggest_categories: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            suggest_categories: false,
        }
    }
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub interval_minutes: u64,
    /// Subreddits to poll; empty means every followed subreddit.
    pub subreddits: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            subreddits: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, or from the first default location that
    /// exists, then applies `.env` and environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                Self::from_file(path)?
            }
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(found) => Self::from_file(&found)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        if let Ok(env_path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_path.display());
        }
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        toml::from_str(raw).map_err(|e| CoreError::Config(ConfigError::Parse(e)))
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("reddit-explorer").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.ai.api_key = Some(key);
        }
        if let Some(base_url) = non_empty(ENV_BASE_URL) {
            self.ai.base_url = base_url;
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.ai.model = model;
        }
        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reddit.requests_per_minute".to_string(),
                value: "0".to_string(),
            });
        }
        if self.reddit.burst == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reddit.burst".to_string(),
                value: "0".to_string(),
            });
        }
        if self.reddit.max_posts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reddit.max_posts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.watch.interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watch.interval_minutes".to_string(),
                value: "0".to_string(),
            });
        }
        if url_scheme_missing(&self.reddit.base_url) {
            return Err(ConfigError::ValidationFailed {
                reason: format!("reddit.base_url '{}' is not an http(s) URL", self.reddit.base_url),
            });
        }
        if url_scheme_missing(&self.ai.base_url) {
            return Err(ConfigError::ValidationFailed {
                reason: format!("ai.base_url '{}' is not an http(s) URL", self.ai.base_url),
            });
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reddit-explorer")
        })
    }

    pub fn database_path(&self) -> PathBuf {
        let file = self
            .storage
            .database_file
            .as_deref()
            .unwrap_or("reddit_explorer.db");
        self.data_dir().join(file)
    }

    /// sqlx connection string; `mode=rwc` creates the file on first use.
    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path().display())
    }

    pub fn image_cache_dir(&self) -> PathBuf {
        self.data_dir().join("image_cache")
    }

    pub fn suggestions_path(&self) -> PathBuf {
        self.data_dir().join("suggested_categories.txt")
    }

    /// Returns the API key or `LlmError::NotConfigured`.
    pub fn require_api_key(&self) -> Result<&str, CoreError> {
        match self.ai.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(CoreError::Llm(crate::error::LlmError::NotConfigured)),
        }
    }
}

fn url_scheme_missing(url: &str) -> bool {
    !(url.starts_with("http://") || url.starts_with("https://"))
}
