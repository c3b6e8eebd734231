//! Configuration file support

use memora_client::backend::http::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for memora
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL
    pub server_url: Option<String>,
    /// Username offered at the register prompt
    pub username: Option<String>,
    /// Email offered at the sign-in prompt
    pub email: Option<String>,
    /// Stream replies as they are generated (true by default)
    pub stream: Option<bool>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memora")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MEMORA_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            server_url: Some(DEFAULT_BASE_URL.to_string()),
            username: None,
            email: None,
            stream: Some(true),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Server URL: flag, then `MEMORA_SERVER_URL`, then config, then the default
    pub fn resolve_server_url(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| std::env::var("MEMORA_SERVER_URL").ok())
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn streaming(&self) -> bool {
        self.stream.unwrap_or(true)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# memora configuration file
# Place at ~/.config/memora/config.toml (Linux/Mac) or %APPDATA%\memora\config.toml (Windows)

# Backend base URL
server_url = "http://localhost:8000"

# Pre-filled at the sign-in prompts (optional)
# username = "alice"
# email = "alice@example.com"

# Stream replies as they are generated (true by default)
# Set to false to wait for the whole reply
stream = true
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.username, None);
        assert!(config.streaming());
    }

    #[test]
    fn test_missing_keys_default() {
        let config = Config::parse("stream = false").unwrap();
        assert_eq!(config.server_url, None);
        assert!(!config.streaming());
        assert!(Config::default().streaming());
    }

    #[test]
    fn test_flag_wins_over_config() {
        let config = Config {
            server_url: Some("http://config:8000".into()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_server_url(Some("http://flag:9000")),
            "http://flag:9000"
        );
    }
}
