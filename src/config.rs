use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6868,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpstreamConfig {
    /// Catalog site serving the episode/server listings.
    pub catalog: String,
    /// Embedded video host the catalog links out to.
    pub embed: String,
    /// Overrides the built-in desktop user agent for all upstream calls.
    pub user_agent: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            catalog: "https://aniwatchtv.to".to_string(),
            embed: "https://megacloud.blog".to_string(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Config {
    /// Reads `config.toml` from the working directory. A missing or empty
    /// file yields the default configuration; a malformed one is an error.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_str = std::fs::read_to_string("config.toml").unwrap_or_else(|_| "".to_string());
        if config_str.is_empty() {
            return Ok(Self::default());
        }
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}
