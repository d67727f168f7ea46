//! Configuration management for NewsBite.
//!
//! Configuration is read from `~/.config/newsbite/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! `NEWS_API_KEY` and `GEMINI_API_KEY` override the keys found in the file.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;

use crate::domain::CachePolicy;
use crate::paging::PagingConfig;

pub const NEWS_API_KEY_ENV: &str = "NEWS_API_KEY";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub paging: PagingSettings,
    pub cache: CacheSettings,
    pub ai: AiConfig,
    /// Overrides the default database location under the data directory.
    pub database_path: Option<PathBuf>,
}

/// Remote news API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org/v2/".to_string(),
            api_key: String::new(),
            language: "en".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PagingSettings {
    pub page_size: usize,
    pub prefetch_distance: usize,
    pub initial_load_size: usize,
}

impl Default for PagingSettings {
    fn default() -> Self {
        let defaults = PagingConfig::default();
        Self {
            page_size: defaults.page_size,
            prefetch_distance: defaults.prefetch_distance,
            initial_load_size: defaults.initial_load_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Minutes after which a cached partition is refreshed on open.
    pub freshness_minutes: i64,
    /// Hours after which cached rows are swept.
    pub retention_hours: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness_minutes: crate::domain::cache_policy::DEFAULT_FRESHNESS_MINUTES,
            retention_hours: crate::domain::cache_policy::DEFAULT_RETENTION_HOURS,
        }
    }
}

/// Generative summarization backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 500,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from the default path, then apply environment overrides.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            Self::create_default_config(&config_path)?;
            Self::default()
        };

        config.apply_overrides(
            std::env::var(NEWS_API_KEY_ENV).ok(),
            std::env::var(GEMINI_API_KEY_ENV).ok(),
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/newsbite/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("newsbite").join("config.toml"))
    }

    /// Non-blank values replace the configured API keys.
    pub fn apply_overrides(&mut self, news_api_key: Option<String>, gemini_api_key: Option<String>) {
        if let Some(key) = news_api_key.filter(|k| !k.trim().is_empty()) {
            self.api.api_key = key;
        }
        if let Some(key) = gemini_api_key.filter(|k| !k.trim().is_empty()) {
            self.ai.api_key = key;
        }
    }

    pub fn paging_config(&self) -> PagingConfig {
        PagingConfig {
            page_size: self.paging.page_size.max(1),
            prefetch_distance: self.paging.prefetch_distance,
            initial_load_size: self.paging.initial_load_size.max(self.paging.page_size),
            ..PagingConfig::default()
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            freshness: TimeDelta::minutes(self.cache.freshness_minutes),
            retention: TimeDelta::hours(self.cache.retention_hours),
        }
    }

    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# NewsBite Configuration
#
# API keys may be left empty here and supplied through the
# NEWS_API_KEY and GEMINI_API_KEY environment variables instead.

# database_path = "/path/to/newsbite.db"

[api]
base_url = "https://newsapi.org/v2/"
api_key = ""
language = "en"
timeout_secs = 10

[paging]
# Articles requested per remote page
page_size = 20
# Load the next page when the reader is this close to an edge
prefetch_distance = 5
# Rows read from the cache when a listing is (re)built
initial_load_size = 60

[cache]
# A category older than this is refreshed when opened
freshness_minutes = 15
# Cached articles older than this are swept after each refresh
retention_hours = 24

[ai]
base_url = "https://generativelanguage.googleapis.com/v1beta/"
api_key = ""
model = "gemini-1.5-flash"
temperature = 0.7
max_output_tokens = 500
timeout_secs = 30
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.api.language, "en");
        assert_eq!(config.paging.page_size, 20);
        assert_eq!(config.cache.freshness_minutes, 15);
        assert_eq!(config.ai.model, "gemini-1.5-flash");
        assert_eq!(config.ai.max_output_tokens, 500);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[paging]
page_size = 50
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.paging.page_size, 50);
        assert_eq!(config.paging.prefetch_distance, 5);
        assert_eq!(config.api.base_url, "https://newsapi.org/v2/");
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.cache.retention_hours, 24);
        assert!(config.api.api_key.is_empty());
    }

    #[test]
    fn test_env_overrides_replace_keys() {
        let mut config = Config::default();
        config.api.api_key = "from-file".into();

        config.apply_overrides(Some("from-env".into()), Some("  ".into()));
        assert_eq!(config.api.api_key, "from-env");
        assert!(config.ai.api_key.is_empty());
    }

    #[test]
    fn test_derived_paging_and_cache_settings() {
        let content = r##"
[paging]
page_size = 10
initial_load_size = 5

[cache]
freshness_minutes = 30
"##;
        let config: Config = toml::from_str(content).unwrap();

        let paging = config.paging_config();
        assert_eq!(paging.page_size, 10);
        assert_eq!(paging.initial_load_size, 10);

        let policy = config.cache_policy();
        assert_eq!(policy.freshness, TimeDelta::minutes(30));
        assert_eq!(policy.retention, TimeDelta::hours(24));
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[paging]\npage_size = \"many\"\n").unwrap();

        match Config::load_from(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
