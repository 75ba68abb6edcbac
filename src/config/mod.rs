//! Configuration management
//!
//! This module handles loading and parsing configuration for Bude Finder.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// OAuth identity provider configuration
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Session lifetimes
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Public origin of this service, used to build OAuth redirect URIs
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            public_url: default_public_url(),
        }
    }
}

impl ServerConfig {
    /// Public origin without a trailing slash
    pub fn origin(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/budefinder.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Server-side TTL for cached Bude lists and vote tallies
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// `max-age` sent with evaluation reads
    #[serde(default = "default_evaluation_max_age")]
    pub evaluation_max_age: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            evaluation_max_age: default_evaluation_max_age(),
        }
    }
}

fn default_ttl() -> u64 {
    60
}

fn default_evaluation_max_age() -> u32 {
    30
}

/// OAuth2 identity provider configuration (Google by default)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
        }
    }
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

/// Session lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a user session in days
    #[serde(default = "default_user_days")]
    pub user_days: i64,
    /// Lifetime of an admin session in hours
    #[serde(default = "default_admin_hours")]
    pub admin_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_days: default_user_days(),
            admin_hours: default_admin_hours(),
        }
    }
}

fn default_user_days() -> i64 {
    7
}

fn default_admin_hours() -> i64 {
    24
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - BUDEFINDER_SERVER_HOST
    /// - BUDEFINDER_SERVER_PORT
    /// - BUDEFINDER_SERVER_CORS_ORIGIN
    /// - BUDEFINDER_SERVER_PUBLIC_URL
    /// - BUDEFINDER_DATABASE_DRIVER
    /// - BUDEFINDER_DATABASE_URL
    /// - BUDEFINDER_CACHE_TTL_SECONDS
    /// - BUDEFINDER_CACHE_EVALUATION_MAX_AGE
    /// - BUDEFINDER_OAUTH_CLIENT_ID (or GOOGLE_CLIENT_ID)
    /// - BUDEFINDER_OAUTH_CLIENT_SECRET (or GOOGLE_CLIENT_SECRET)
    /// - BUDEFINDER_SESSION_USER_DAYS
    /// - BUDEFINDER_SESSION_ADMIN_HOURS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BUDEFINDER_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("BUDEFINDER_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("BUDEFINDER_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(public_url) = std::env::var("BUDEFINDER_SERVER_PUBLIC_URL") {
            self.server.public_url = public_url;
        }

        if let Ok(driver) = std::env::var("BUDEFINDER_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("BUDEFINDER_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(ttl) = env_parse::<u64>("BUDEFINDER_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(max_age) = env_parse::<u32>("BUDEFINDER_CACHE_EVALUATION_MAX_AGE") {
            self.cache.evaluation_max_age = max_age;
        }

        if let Ok(id) = std::env::var("BUDEFINDER_OAUTH_CLIENT_ID")
            .or_else(|_| std::env::var("GOOGLE_CLIENT_ID"))
        {
            self.oauth.client_id = id;
        }
        if let Ok(secret) = std::env::var("BUDEFINDER_OAUTH_CLIENT_SECRET")
            .or_else(|_| std::env::var("GOOGLE_CLIENT_SECRET"))
        {
            self.oauth.client_secret = secret;
        }

        if let Some(days) = env_parse::<i64>("BUDEFINDER_SESSION_USER_DAYS") {
            self.session.user_days = days;
        }
        if let Some(hours) = env_parse::<i64>("BUDEFINDER_SESSION_ADMIN_HOURS") {
            self.session.admin_hours = hours;
        }
    }
}

/// Read and parse an environment variable, ignoring unparsable values
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
