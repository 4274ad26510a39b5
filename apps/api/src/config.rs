//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! `main` loads a `.env` file first when one exists.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use bistro_core::DEFAULT_BRANCH;

/// Deployment environment, from `APP_ENV` (falls back to `NODE_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub environment: Environment,

    /// Bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// PostgreSQL connection string. Without it every data route answers
    /// `db_not_configured`.
    #[serde(skip_serializing)]
    pub database_url: Option<String>,

    /// Require TLS to the database (certificates not verified)
    pub database_ssl: bool,

    pub database_max_connections: u32,

    /// JWT secret key for signing tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// Requests allowed per client within one window
    pub rate_limit_max_requests: u32,

    pub rate_limit_window: Duration,

    /// Upper bound on distinct clients tracked by the limiter
    pub rate_limit_max_keys: usize,

    /// Take the client address from `X-Forwarded-For` / `X-Forwarded-Proto`
    pub trust_proxy: bool,

    pub default_branch: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            database_ssl: false,
            database_max_connections: 10,
            jwt_secret: "bistro-dev-secret-change-in-production".to_string(),
            jwt_access_lifetime_secs: 43200, // 12 hours, one shift
            rate_limit_max_requests: 300,
            rate_limit_window: Duration::from_millis(900_000),
            rate_limit_max_keys: 10_000,
            trust_proxy: false,
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let environment = match env::var("APP_ENV").or_else(|_| env::var("NODE_ENV")) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("APP_ENV".to_string()))?,
            Err(_) => defaults.environment,
        };

        let config = ApiConfig {
            environment,

            host: env::var("HOST").unwrap_or(defaults.host),

            port: parse_var("PORT", defaults.port)?,

            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),

            database_ssl: parse_var("DATABASE_SSL", defaults.database_ssl)?,

            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,

            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),

            jwt_access_lifetime_secs: parse_var(
                "JWT_ACCESS_LIFETIME_SECS",
                defaults.jwt_access_lifetime_secs,
            )?,

            rate_limit_max_requests: parse_var(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,

            rate_limit_window: Duration::from_millis(parse_var(
                "RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window.as_millis() as u64,
            )?),

            rate_limit_max_keys: parse_var("RATE_LIMIT_MAX_KEYS", defaults.rate_limit_max_keys)?,

            trust_proxy: parse_var("TRUST_PROXY", defaults.trust_proxy)?,

            default_branch: env::var("DEFAULT_BRANCH").unwrap_or(defaults.default_branch),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // The development secret must never sign production tokens
        if self.environment.is_production() && self.jwt_secret == ApiConfig::default().jwt_secret {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.jwt_access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()));
        }
        if self.rate_limit_max_requests == 0 {
            return Err(ConfigError::InvalidValue("RATE_LIMIT_MAX_REQUESTS".to_string()));
        }
        if self.rate_limit_window.is_zero() {
            return Err(ConfigError::InvalidValue("RATE_LIMIT_WINDOW_MS".to_string()));
        }
        if self.rate_limit_max_keys == 0 {
            return Err(ConfigError::InvalidValue("RATE_LIMIT_MAX_KEYS".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
