//! # Bridge Configuration
//!
//! Shard count, instance-name prefix, mailbox capacity and the deployment every shard
//! connects to, with defaults and environment overrides:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DOCBRIDGE_SHARD_COUNT` | `2` |
//! | `DOCBRIDGE_SHARD_PREFIX` | `mongo_shard_` |
//! | `DOCBRIDGE_MAILBOX_CAPACITY` | `32` |
//! | `DOCBRIDGE_MONGODB_URI` | `mongodb://localhost:27017` |
//! | `DOCBRIDGE_DEFAULT_DATABASE` | `test` |
//!
//! The router receives a [`BridgeConfig`] explicitly, so routing can be tested with any shard
//! count.

use thiserror::Error;

pub const SHARD_COUNT_VAR: &str = "DOCBRIDGE_SHARD_COUNT";
pub const SHARD_PREFIX_VAR: &str = "DOCBRIDGE_SHARD_PREFIX";
pub const MAILBOX_CAPACITY_VAR: &str = "DOCBRIDGE_MAILBOX_CAPACITY";
pub const MONGODB_URI_VAR: &str = "DOCBRIDGE_MONGODB_URI";
pub const DEFAULT_DATABASE_VAR: &str = "DOCBRIDGE_DEFAULT_DATABASE";

pub const DEFAULT_SHARD_COUNT: usize = 2;
pub const DEFAULT_SHARD_PREFIX: &str = "mongo_shard_";
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "test";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// The registry has no binding for a shard name.
    #[error("Shard registry unbound: {0}")]
    Unbound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub shard_count: usize,
    pub shard_prefix: String,
    pub mailbox_capacity: usize,
    pub mongodb_uri: String,
    /// Database used by envelopes that name none.
    pub default_database: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            shard_prefix: DEFAULT_SHARD_PREFIX.to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            mongodb_uri: DEFAULT_MONGODB_URI.to_string(),
            default_database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by the `DOCBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(SHARD_COUNT_VAR) {
            config.shard_count = positive(SHARD_COUNT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(SHARD_PREFIX_VAR) {
            if raw.is_empty() {
                return Err(ConfigError::Empty(SHARD_PREFIX_VAR));
            }
            config.shard_prefix = raw;
        }
        if let Some(raw) = lookup(MAILBOX_CAPACITY_VAR) {
            config.mailbox_capacity = positive(MAILBOX_CAPACITY_VAR, &raw)?;
        }
        if let Some(raw) = lookup(MONGODB_URI_VAR) {
            config.mongodb_uri = raw;
        }
        if let Some(raw) = lookup(DEFAULT_DATABASE_VAR) {
            config.default_database = raw;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn with_shard_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shard_prefix = prefix.into();
        self
    }

    pub fn with_mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = uri.into();
        self
    }

    pub fn with_default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = name.into();
        self
    }

    /// Checks invariants of a hand-built config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0 {
            return Err(ConfigError::InvalidNumber {
                key: SHARD_COUNT_VAR,
                value: "0".into(),
            });
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::InvalidNumber {
                key: MAILBOX_CAPACITY_VAR,
                value: "0".into(),
            });
        }
        if self.shard_prefix.is_empty() {
            return Err(ConfigError::Empty(SHARD_PREFIX_VAR));
        }
        if self.mongodb_uri.is_empty() {
            return Err(ConfigError::Empty(MONGODB_URI_VAR));
        }
        if self.default_database.is_empty() {
            return Err(ConfigError::Empty(DEFAULT_DATABASE_VAR));
        }
        Ok(())
    }

    /// The registry name of shard `index`.
    pub fn instance_name(&self, index: usize) -> String {
        format!("{}{}", self.shard_prefix, index)
    }
}

fn positive(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}
