//! Process-level configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Process-level configuration (environment, logging, instance identity)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Environment name
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name of this process, used as the broker consumer name when none is set
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

/// Application environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Validate server configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.log_level.trim().is_empty() {
            return Err(ValidationError::EmptyLogLevel);
        }
        if self.instance_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("SERVER__INSTANCE_ID"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            instance_id: default_instance_id(),
        }
    }
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_log_level() -> String {
    "info,tunewave=debug,sqlx=warn".to_string()
}

fn default_instance_id() -> String {
    "tunewave-1".to_string()
}
