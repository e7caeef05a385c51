//! Configuration management for LaunchAgent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stream_protocol::{EventOrder, StreamParser, StreamSession};

use crate::core::agent::{AnthropicProvider, LlmProvider};
use crate::core::director::{DEFAULT_CARD_ORDER, Director};

/// Environment variable that overrides `api.token`.
pub const API_TOKEN_ENV: &str = "LAUNCHAGENT_API_TOKEN";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markup parser configuration.
    pub parser: ParserConfig,

    /// LLM configuration.
    pub agent: AgentConfig,

    /// Director state configuration.
    pub director: DirectorConfig,

    /// API configuration.
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from the default paths.
    ///
    /// Loads global config first, then merges project-local config if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let global_path = Self::config_path()?;
        let project_path = Self::project_config_path().ok();
        Self::load_from(&global_path, project_path.as_deref())
    }

    /// Load configuration from explicit paths. Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read or parsed.
    pub fn load_from(global_path: &Path, project_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = if global_path.exists() {
            let contents = std::fs::read_to_string(global_path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Some(project_path) = project_path.filter(|p| p.exists()) {
            let contents = std::fs::read_to_string(project_path)?;
            let project_config: Self = toml::from_str(&contents)?;
            tracing::debug!(path = %project_path.display(), "merging project config");
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Get the project-local configuration file path.
    ///
    /// Looks for `.launchagent/config.toml` in the current directory.
    pub fn project_config_path() -> anyhow::Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(cwd.join(".launchagent").join("config.toml"))
    }

    /// Merge another config into this one (project overrides global).
    ///
    /// A field is taken from `other` only when it differs from the default.
    fn merge(&mut self, other: Self) {
        let parser = ParserConfig::default();
        if other.parser.order != parser.order {
            self.parser.order = other.parser.order;
        }
        if other.parser.max_pending_bytes != parser.max_pending_bytes {
            self.parser.max_pending_bytes = other.parser.max_pending_bytes;
        }

        let agent = AgentConfig::default();
        if other.agent.model != agent.model {
            self.agent.model = other.agent.model;
        }
        if other.agent.max_tokens != agent.max_tokens {
            self.agent.max_tokens = other.agent.max_tokens;
        }
        if other.agent.api_key_env != agent.api_key_env {
            self.agent.api_key_env = other.agent.api_key_env;
        }
        if other.agent.base_url.is_some() {
            self.agent.base_url = other.agent.base_url;
        }
        if other.agent.system_prompt.is_some() {
            self.agent.system_prompt = other.agent.system_prompt;
        }

        if other.director.card_order != DirectorConfig::default().card_order {
            self.director.card_order = other.director.card_order;
        }

        let api = ApiConfig::default();
        if other.api.port != api.port {
            self.api.port = other.api.port;
        }
        if other.api.host != api.host {
            self.api.host = other.api.host;
        }
        if other.api.token.is_some() {
            self.api.token = other.api.token;
        }
    }

    /// Get the configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the config directory path (`~/.config/launchagent/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config_home).join("launchagent"));
        }

        if cfg!(target_os = "macos") {
            if let Ok(home) = std::env::var("HOME") {
                return Ok(PathBuf::from(home).join(".config").join("launchagent"));
            }
        }

        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

        Ok(base.config_dir().join("launchagent"))
    }

    /// Store an API token in the config file, keeping everything else.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or written.
    pub fn save_token_to_path(token: &str, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut config_value = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<toml::Value>(&contents)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let config_table = config_value
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("config root must be a table"))?;

        let api_table = config_table
            .entry("api")
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("api section must be a table"))?;

        api_table.insert("token".to_string(), toml::Value::String(token.to_string()));

        std::fs::write(path, toml::to_string_pretty(&config_value)?)?;
        Ok(())
    }

    /// Render the effective configuration with secrets masked.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_display_toml(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if shown.api.token.is_some() {
            shown.api.token = Some("********".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// Markup parser configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Event order within one parser call.
    pub order: EventOrder,

    /// Cap on text held back for an unclosed tag. Zero disables the cap.
    pub max_pending_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            order: EventOrder::default(),
            max_pending_bytes: stream_protocol::DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

impl ParserConfig {
    /// Build a fresh session for one turn.
    #[must_use]
    pub fn session(&self) -> StreamSession {
        let limit = (self.max_pending_bytes > 0).then_some(self.max_pending_bytes);
        StreamSession::new(StreamParser::new(self.order)).with_max_pending_bytes(limit)
    }
}

/// LLM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model to use.
    pub model: String,

    /// Maximum tokens to generate per turn.
    pub max_tokens: u32,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Override for the Messages API endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// File with the director system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    pub(crate) fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    /// Create the configured LLM provider.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing.
    pub fn create_provider(&self) -> anyhow::Result<Box<dyn LlmProvider>> {
        let key = self.resolve_api_key().ok_or_else(|| {
            anyhow::anyhow!(
                "No API key configured.\n\nSet the {} environment variable.",
                self.api_key_env
            )
        })?;

        let mut provider = AnthropicProvider::new(key)?;
        if let Some(url) = &self.base_url {
            provider = provider.with_url(url);
        }
        Ok(Box::new(provider))
    }
}

/// Director state configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Card types in display order. Unlisted types follow in arrival order.
    pub card_order: Vec<String>,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            card_order: DEFAULT_CARD_ORDER.iter().map(ToString::to_string).collect(),
        }
    }
}

impl DirectorConfig {
    /// Build an empty director.
    #[must_use]
    pub fn director(&self) -> Director {
        Director::new(self.card_order.clone())
    }
}

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// API token for authentication (optional, but required for remote access).
    /// Can also be set via `LAUNCHAGENT_API_TOKEN` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
            token: None,
        }
    }
}

impl ApiConfig {
    /// Get the API token, preferring env var over config file.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var(API_TOKEN_ENV)
            .ok()
            .or_else(|| self.token.clone())
    }

    /// Generate a new random API token.
    #[must_use]
    pub fn generate_token() -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        let bytes: [u8; 32] = rng.random();
        format!("la_{}", hex::encode(bytes))
    }
}
