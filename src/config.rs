use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.changelly.com";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub listen_host: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8085,
        }
    }
}

#[derive(Deserialize, Serialize, Clone)]
pub struct ChangellyConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for ChangellyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangellyConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Default for ChangellyConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QuoteConfig {
    /// Quiet period before a quote request reaches the exchange.
    pub debounce_ms: u64,
    pub default_from: String,
    pub default_to: String,
}

impl QuoteConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            default_from: "btc".to_string(),
            default_to: "eth".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub changelly: ChangellyConfig,
    pub quote: QuoteConfig,
}

impl AppConfig {
    pub fn new<P>(config_file_name: Option<P>) -> Result<Self, ConfigError>
    where
        P: Into<PathBuf>,
    {
        let config_path: PathBuf = match config_file_name {
            Some(value) => value.into(),
            None => Self::default_dir()?.join("config.toml"),
        };

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::Message(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        // Create example config if no config file exists
        if !config_path.exists() {
            let example_path = config_path.with_file_name("example.config.toml");
            if !example_path.exists() {
                let example_content = include_str!("../example.config.toml");
                std::fs::write(&example_path, example_content).map_err(|e| {
                    ConfigError::Message(format!("Failed to write example config: {}", e))
                })?;

                tracing::info!(
                    "Created example configuration at: {}",
                    example_path.display()
                );
                tracing::info!("Copy and modify this file to: {}", config_path.display());
            }
        }

        let default = &AppConfig::default();

        let builder = Config::builder();
        let config: Config = builder
            // use defaults
            .add_source(Config::try_from(default)?)
            // override with file contents
            .add_source(File::from(config_path).required(false))
            // credentials usually come from the environment
            .add_source(Environment::with_prefix("COIN_SWAP").separator("__"))
            .build()?;
        let settings: AppConfig = config.try_deserialize()?;

        Ok(settings)
    }

    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        Ok(home::home_dir()
            .ok_or(ConfigError::NotFound("Config Path".to_string()))?
            .join(".coin-swap"))
    }
}
