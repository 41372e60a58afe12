//! Application settings and configuration
//!
//! This module provides configuration management for the gateway, loading
//! settings from environment variables with sensible defaults.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

use crate::db::models::DEFAULT_RATE_LIMIT;
use crate::services::usage_tracker::DEFAULT_QUEUE_CAPACITY;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!(
                "Invalid environment: {}. Expected: development, staging, or production",
                s
            ),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Fallback per-key limit when a key record carries none
    pub default_requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_requests_per_minute: DEFAULT_RATE_LIMIT,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    /// The agent/service instance this gateway protects; keys are only valid
    /// for this id
    pub service_id: String,

    // AWS settings
    pub aws_region: String,
    pub dynamodb_endpoint_url: Option<String>,

    // DynamoDB table names
    pub dynamodb_api_keys_table: String,
    pub dynamodb_usage_logs_table: String,
    pub dynamodb_usage_summary_table: String,

    // Rate limiting
    pub rate_limit: RateLimitConfig,

    /// Bound on the accounting queue between middleware and worker
    pub usage_queue_capacity: usize,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let settings = Self {
            app_name: env_or_default("APP_NAME", "agent-key-gateway"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: env_or_default("LOG_LEVEL", "info"),

            host: env_or_default("HOST", "0.0.0.0"),
            port: env_or_default("PORT", "8000")
                .parse()
                .context("Invalid PORT value")?,

            service_id: env_or_default("SERVICE_ID", "default-agent"),

            aws_region: env_or_default("AWS_REGION", "us-east-1"),
            dynamodb_endpoint_url: env::var("DYNAMODB_ENDPOINT_URL").ok(),

            dynamodb_api_keys_table: env_or_default(
                "DYNAMODB_API_KEYS_TABLE",
                "agent-gateway-api-keys",
            ),
            dynamodb_usage_logs_table: env_or_default(
                "DYNAMODB_USAGE_LOGS_TABLE",
                "agent-gateway-usage-logs",
            ),
            dynamodb_usage_summary_table: env_or_default(
                "DYNAMODB_USAGE_SUMMARY_TABLE",
                "agent-gateway-usage-summary",
            ),

            rate_limit: RateLimitConfig {
                enabled: env_or_default("RATE_LIMIT_ENABLED", "true")
                    .parse()
                    .unwrap_or(true),
                default_requests_per_minute: env::var("RATE_LIMIT_DEFAULT_RPM")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RATE_LIMIT),
            },

            usage_queue_capacity: env::var("USAGE_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.service_id.is_empty() {
            anyhow::bail!("SERVICE_ID cannot be empty");
        }

        if self.rate_limit.enabled && self.rate_limit.default_requests_per_minute == 0 {
            anyhow::bail!("Rate limit default_requests_per_minute must be > 0");
        }

        if self.usage_queue_capacity == 0 {
            anyhow::bail!("Usage queue capacity must be > 0");
        }

        Ok(())
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "agent-key-gateway".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            service_id: "default-agent".to_string(),
            aws_region: "us-east-1".to_string(),
            dynamodb_endpoint_url: None,
            dynamodb_api_keys_table: "agent-gateway-api-keys".to_string(),
            dynamodb_usage_logs_table: "agent-gateway-usage-logs".to_string(),
            dynamodb_usage_summary_table: "agent-gateway-usage-summary".to_string(),
            rate_limit: RateLimitConfig::default(),
            usage_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "agent-key-gateway");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.service_id, "default-agent");
        assert!(settings.rate_limit.enabled);
        // One source of truth for these defaults
        assert_eq!(
            settings.rate_limit.default_requests_per_minute,
            DEFAULT_RATE_LIMIT
        );
        assert_eq!(settings.usage_queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("other".parse::<Environment>().is_err());
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_validate_rejects_empty_service_id() {
        let mut settings = Settings::default();
        settings.service_id = String::new();
        assert!(settings.validate().is_err());
    }
}
