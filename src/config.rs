use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Message-search collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub bearer_token: String,
    pub keyword: String,
    pub language: String,
    pub exclude_reshares: bool,
    pub max_results: u32,
    pub timeout_secs: u64,
}

/// Classifier collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Locations of the two tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub messages_path: String,
    pub locations_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig {
                endpoint: "https://api.twitter.com".to_string(),
                bearer_token: String::new(),
                keyword: "enchente".to_string(),
                language: "pt".to_string(),
                exclude_reshares: true,
                max_results: 10,
                timeout_secs: 30,
            },
            classifier: ClassifierConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4".to_string(),
                temperature: 0.0,
                timeout_secs: 60,
            },
            storage: StorageConfig {
                messages_path: "data/itens_importados.csv".to_string(),
                locations_path: "data/locais_enchentes.csv".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("flood-monitor").required(false))
            // FLOOD_MONITOR__SEARCH__KEYWORD=cheia
            .add_source(Environment::with_prefix("FLOOD_MONITOR").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate search config
        InputValidator::validate_endpoint(&self.search.endpoint)?;
        InputValidator::validate_keyword(&self.search.keyword)?;
        InputValidator::validate_language(&self.search.language)?;
        InputValidator::validate_page_size(self.search.max_results)?;
        InputValidator::validate_timeout(self.search.timeout_secs)?;

        // Validate classifier config
        InputValidator::validate_endpoint(&self.classifier.endpoint)?;
        if self.classifier.model.trim().is_empty() {
            return Err(anyhow::anyhow!("classifier model cannot be empty"));
        }
        InputValidator::validate_temperature(self.classifier.temperature)?;
        InputValidator::validate_timeout(self.classifier.timeout_secs)?;

        // Validate storage config
        InputValidator::validate_file_path(self.messages_path().as_path())?;
        InputValidator::validate_file_path(self.locations_path().as_path())?;
        if self.messages_path() == self.locations_path() {
            return Err(anyhow::anyhow!("messages_path and locations_path must differ"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get the search bearer token from config or the `BEARER_TOKEN` environment variable
    pub fn get_bearer_token(&self) -> Option<String> {
        non_empty(&self.search.bearer_token).or_else(|| std::env::var("BEARER_TOKEN").ok().and_then(|v| non_empty(&v)))
    }

    /// Get the classifier API key from config or the `OPENAI_API_KEY` environment variable
    pub fn get_classifier_api_key(&self) -> Option<String> {
        non_empty(&self.classifier.api_key).or_else(|| std::env::var("OPENAI_API_KEY").ok().and_then(|v| non_empty(&v)))
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Path of the message table
    pub fn messages_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.messages_path)
    }

    /// Path of the location aggregate table
    pub fn locations_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.locations_path)
    }
}

impl SearchConfig {
    /// Search query: the keyword plus re-share and language filters
    pub fn query(&self) -> String {
        let mut query = self.keyword.trim().to_string();
        if self.exclude_reshares {
            query.push_str(" -is:retweet");
        }
        query.push_str(" lang:");
        query.push_str(&self.language);
        query
    }

    /// Request timeout
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClassifierConfig {
    /// Request timeout
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.search.keyword, "enchente");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.search.max_results, 10);
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.search.max_results = 0;
        assert!(config.validate().is_err());
    }
}
