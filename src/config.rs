use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ai_model: AiModelConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiModelConfig {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    /// Longest chat message accepted from a client.
    pub max_message_chars: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 4000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context("Failed to read config file. Make sure config.toml exists.")?;

        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Environment variables win over the file.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("PLANNER_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(addr) = var("PLANNER_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(host) = var("OLLAMA_HOST") {
            self.ai_model.endpoint = host;
        }
        if let Some(model) = var("PLANNER_MODEL") {
            self.ai_model.model = model;
        }
    }

    /// Create the database directory if it doesn't exist
    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        bind_addr = "127.0.0.1:8000"

        [database]
        path = "./data/planner.db"

        [ai_model]
        provider = "ollama"
        model = "llama3.1"
        endpoint = "http://localhost:11434"
        temperature = 0.4

        [logging]
        level = "info"
    "#;

    #[test]
    fn test_config_parsing() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.ai_model.provider, "ollama");
        assert_eq!(config.assistant.max_message_chars, 4000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.apply_env_overrides(|key| match key {
            "OLLAMA_HOST" => Some("http://gpu-box:11434".to_string()),
            "PLANNER_DATABASE_PATH" => Some("/tmp/other.db".to_string()),
            _ => None,
        });
        assert_eq!(config.ai_model.endpoint, "http://gpu-box:11434");
        assert_eq!(config.database.path, "/tmp/other.db");
        assert_eq!(config.ai_model.model, "llama3.1");
    }

    #[test]
    fn test_missing_section_is_an_error() {
        assert!(Config::from_toml("[server]\nbind_addr = \"x\"").is_err());
    }
}
