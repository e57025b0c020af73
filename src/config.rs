use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completion endpoint URL
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Output token budget per reply
    pub max_tokens: u32,

    /// Request timeout; the HTTP client default applies when unset
    pub timeout_secs: Option<u64>,

    /// API key; takes precedence over `api_key_env`
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Chatwin home directory
    #[serde(skip)]
    pub chatwin_home: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
    pub show_timestamps: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            show_timestamps: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: None,
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            chatwin_home: default_home(),
            ui: UiConfig::default(),
        }
    }
}

/// Everything the completion client needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
    pub api_key: Option<String>,
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chatwin")
}

impl Config {
    /// Load configuration from `path`, or from `~/.chatwin/config.toml`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = default_home();
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (home.join("config.toml"), false),
        };

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else if required {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            Config::default()
        };

        config.chatwin_home = home;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Default log file location
    pub fn log_path(&self) -> PathBuf {
        self.chatwin_home.join("chatwin.log")
    }

    /// Get API key from config or the configured environment variable
    pub fn get_api_key(&self) -> Option<String> {
        self.resolve_api_key(|name| std::env::var(name).ok())
    }

    fn resolve_api_key(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| lookup(&self.api_key_env))
            .filter(|key| !key.trim().is_empty())
    }

    /// Build the client configuration, reading the credential exactly once.
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: self.timeout_secs.map(Duration::from_secs),
            api_key: self.get_api_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_hosted_endpoint() {
        let config = Config::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.max_tokens, 150);
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn partial_file_only_overrides_named_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model = \"gpt-4o-mini\"\n[ui]\ntick_rate_ms = 100").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.ui.tick_rate_ms, 100);
        assert!(config.ui.show_timestamps);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_tokens = \"many\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn file_key_wins_over_environment() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            ..Config::default()
        };
        let key = config.resolve_api_key(|_| Some("from-env".to_string()));
        assert_eq!(key.as_deref(), Some("from-file"));
    }

    #[test]
    fn environment_is_read_by_configured_name() {
        let config = Config {
            api_key_env: "MY_KEY".to_string(),
            ..Config::default()
        };
        let key = config.resolve_api_key(|name| (name == "MY_KEY").then(|| "sk-1".to_string()));
        assert_eq!(key.as_deref(), Some("sk-1"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.resolve_api_key(|_| None).is_none());
    }

    #[test]
    fn completion_config_carries_timeout() {
        let config = Config {
            timeout_secs: Some(30),
            api_key: Some("k".to_string()),
            ..Config::default()
        };
        let completion = config.completion();
        assert_eq!(completion.timeout, Some(Duration::from_secs(30)));
        assert_eq!(completion.api_key.as_deref(), Some("k"));
    }
}
