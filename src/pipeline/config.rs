//! Runtime settings from environment variables
//!
//! Settings are read once at startup. Required values are kept as `Option`
//! and only checked when the collaborator that needs them is built, so a
//! missing variable surfaces as a `ConfigError` for that run instead of
//! taking the process down.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Connection details for the remote channel
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub channel_id: String,
    pub read_api_key: String,
    pub results: usize,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// `<base>/channels/{channel_id}/feeds.json`
    pub fn feeds_url(&self) -> String {
        format!(
            "{}/channels/{}/feeds.json",
            self.base_url.trim_end_matches('/'),
            self.channel_id
        )
    }
}

/// Location of the record collection
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub uri: String,
    pub db_name: String,
    pub collection: String,
}

impl StoreConfig {
    /// Database file: `<uri>/<db_name>.sqlite3`
    pub fn db_file(&self) -> PathBuf {
        PathBuf::from(&self.uri).join(format!("{}.sqlite3", self.db_name))
    }
}

/// All process settings
///
/// Environment variables:
/// - `THINGSPEAK_CHANNEL_ID` (required)
/// - `THINGSPEAK_READ_API_KEY` (required)
/// - `THINGSPEAK_BASE_URL` (default: https://api.thingspeak.com)
/// - `THINGSPEAK_RESULTS` (default: 10)
/// - `THINGSPEAK_TIMEOUT_SECS` (default: 10)
/// - `STORE_URI` (required)
/// - `STORE_DB_NAME` (required)
/// - `STORE_COLLECTION_NAME` (required)
/// - `FETCH_INTERVAL_SECS` (default: 300)
/// - `HOST` (default: 0.0.0.0)
/// - `PORT` (default: 8000)
#[derive(Debug, Clone)]
pub struct Settings {
    pub channel_id: Option<String>,
    pub read_api_key: Option<String>,
    pub base_url: String,
    pub results: usize,
    pub fetch_timeout_secs: u64,
    pub store_uri: Option<String>,
    pub store_db_name: Option<String>,
    pub store_collection: Option<String>,
    pub fetch_interval_secs: u64,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_id: None,
            read_api_key: None,
            base_url: "https://api.thingspeak.com".to_string(),
            results: 10,
            fetch_timeout_secs: 10,
            store_uri: None,
            store_db_name: None,
            store_collection: None,
            fetch_interval_secs: 300,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            channel_id: var("THINGSPEAK_CHANNEL_ID"),
            read_api_key: var("THINGSPEAK_READ_API_KEY"),
            base_url: var("THINGSPEAK_BASE_URL").unwrap_or(defaults.base_url),

            results: var("THINGSPEAK_RESULTS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.results),

            fetch_timeout_secs: var("THINGSPEAK_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fetch_timeout_secs),

            store_uri: var("STORE_URI"),
            store_db_name: var("STORE_DB_NAME"),
            store_collection: var("STORE_COLLECTION_NAME"),

            fetch_interval_secs: var("FETCH_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fetch_interval_secs),

            host: var("HOST").unwrap_or(defaults.host),

            port: var("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    pub fn remote(&self) -> Result<RemoteConfig, ConfigError> {
        let channel_id = required(&self.channel_id, "THINGSPEAK_CHANNEL_ID")?;
        let read_api_key = required(&self.read_api_key, "THINGSPEAK_READ_API_KEY")?;

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "THINGSPEAK_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(RemoteConfig {
            base_url: self.base_url.clone(),
            channel_id,
            read_api_key,
            results: self.results,
            timeout: Duration::from_secs(self.fetch_timeout_secs),
        })
    }

    pub fn store(&self) -> Result<StoreConfig, ConfigError> {
        let uri = required(&self.store_uri, "STORE_URI")?;
        let db_name = required(&self.store_db_name, "STORE_DB_NAME")?;
        let collection = required(&self.store_collection, "STORE_COLLECTION_NAME")?;

        // The collection name ends up in SQL text as a table name
        if !is_identifier(&collection) {
            return Err(ConfigError::InvalidValue(format!(
                "STORE_COLLECTION_NAME must be alphanumeric/underscore, got '{}'",
                collection
            )));
        }

        Ok(StoreConfig {
            uri,
            db_name,
            collection,
        })
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
