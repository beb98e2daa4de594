//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Default replay window for webhook signatures, in seconds.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

/// Which storage backend the service opens at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store; state is lost on restart.
    Memory,
    /// Embedded `RocksDB` under `data_dir`.
    Rocksdb,
    /// PostgreSQL at `database_url`.
    Postgres,
}

impl StorageBackend {
    /// Lowercase name, as accepted by `STORAGE_BACKEND`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Rocksdb => "rocksdb",
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::Rocksdb),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Storage backend (default: memory).
    pub storage_backend: StorageBackend,

    /// Path to `RocksDB` data directory (default: "/data/tally").
    pub data_dir: String,

    /// PostgreSQL connection string, required for the postgres backend.
    pub database_url: Option<String>,

    /// HS256 secret shared with the authentication provider.
    /// Without it every bearer token is rejected.
    pub auth_jwt_secret: Option<String>,

    /// Expected `iss` claim, if enforced.
    pub auth_issuer: Option<String>,

    /// Expected `aud` claim, if enforced.
    pub auth_audience: Option<String>,

    /// Admin API key for operator endpoints.
    pub admin_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Maximum age of a signed webhook, in seconds.
    pub webhook_tolerance_seconds: i64,

    /// Credits given to a newly registered user.
    pub signup_credits: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    webhook_secret: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let storage_backend = match std::env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Falling back to memory storage backend");
                StorageBackend::Memory
            }),
            Err(_) => defaults.storage_backend,
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            storage_backend,
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            database_url: std::env::var("DATABASE_URL").ok(),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_issuer: std::env::var("AUTH_ISSUER").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            stripe_webhook_secret: load_stripe_webhook_secret(),
            webhook_tolerance_seconds: env_parse("WEBHOOK_TOLERANCE_SECONDS")
                .unwrap_or(defaults.webhook_tolerance_seconds),
            signup_credits: env_parse("SIGNUP_CREDITS").unwrap_or(defaults.signup_credits),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Load the Stripe webhook secret from file or environment.
fn load_stripe_webhook_secret() -> Option<String> {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return Some(secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    std::env::var("STRIPE_WEBHOOK_SECRET").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            storage_backend: StorageBackend::Memory,
            data_dir: "/data/tally".into(),
            database_url: None,
            auth_jwt_secret: None,
            auth_issuer: None,
            auth_audience: None,
            admin_api_key: None,
            stripe_webhook_secret: None,
            webhook_tolerance_seconds: DEFAULT_WEBHOOK_TOLERANCE_SECONDS,
            signup_credits: 0,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parsing() {
        assert_eq!("memory".parse(), Ok(StorageBackend::Memory));
        assert_eq!("RocksDB".parse(), Ok(StorageBackend::Rocksdb));
        assert_eq!(" postgres ".parse(), Ok(StorageBackend::Postgres));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn origins_are_trimmed() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,,"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn missing_secrets_file_is_not_found() {
        let err = load_secrets_file::<StripeSecrets>("/nonexistent/stripe.json").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
