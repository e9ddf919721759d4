//! Application configuration loaded from environment variables.

use std::path::{Path, PathBuf};

use domain::{
    AssignmentPolicy, DEFAULT_RETRY_LIMIT, DirectoryError, InMemoryMerchantDirectory,
    InMemorySettings, PricingError,
};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while loading configuration files at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Pricing(#[from] PricingError),

    #[error("{0}")]
    Directory(#[from] DirectoryError),
}

/// Server configuration with defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory
/// - `PRICING_CONFIG_PATH`: JSON pricing config; unset means built-in defaults
/// - `MERCHANT_DIRECTORY_PATH`: JSON array of directory listings
/// - `MAX_DELIVERY_DISTANCE_KM`: auto-assign radius (default `25`)
/// - `CLAIM_RETRY_LIMIT`: append attempts per command (default `10`)
///
/// Unparseable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub pricing_config_path: Option<PathBuf>,
    pub merchant_directory_path: Option<PathBuf>,
    pub max_delivery_distance_km: Decimal,
    pub claim_retry_limit: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            pricing_config_path: non_empty("PRICING_CONFIG_PATH").map(PathBuf::from),
            merchant_directory_path: non_empty("MERCHANT_DIRECTORY_PATH").map(PathBuf::from),
            max_delivery_distance_km: non_empty("MAX_DELIVERY_DISTANCE_KM")
                .and_then(|d| d.trim().parse::<Decimal>().ok())
                .filter(|d| !d.is_sign_negative())
                .unwrap_or(defaults.max_delivery_distance_km),
            claim_retry_limit: non_empty("CLAIM_RETRY_LIMIT")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.claim_retry_limit),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn assignment_policy(&self) -> AssignmentPolicy {
        AssignmentPolicy {
            max_delivery_distance_km: self.max_delivery_distance_km,
        }
    }

    /// Pricing settings from `PRICING_CONFIG_PATH`, or the defaults.
    pub fn load_settings(&self) -> Result<InMemorySettings, ConfigError> {
        match &self.pricing_config_path {
            Some(path) => Ok(InMemorySettings::from_json(&read(path)?)?),
            None => Ok(InMemorySettings::default()),
        }
    }

    /// Merchant directory seeded from `MERCHANT_DIRECTORY_PATH`, or empty.
    pub fn load_directory(&self) -> Result<InMemoryMerchantDirectory, ConfigError> {
        match &self.merchant_directory_path {
            Some(path) => Ok(InMemoryMerchantDirectory::from_json(&read(path)?)?),
            None => Ok(InMemoryMerchantDirectory::new()),
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            pricing_config_path: None,
            merchant_directory_path: None,
            max_delivery_distance_km: AssignmentPolicy::default().max_delivery_distance_km,
            claim_retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}
