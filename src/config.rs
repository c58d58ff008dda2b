use crate::error::ConfigError;
use std::env;

/// Default number of records committed per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Default capacity of the reader → writer channel, in rows.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Default cap on row failures kept in an import result.
pub const DEFAULT_MAX_RECORDED_FAILURES: usize = 1_000;

pub const DEFAULT_TABLE: &str = "customers";

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Returns true for plain or schema-qualified SQL identifiers such as
/// `customers` or `crm.customers`.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        })
}

/// Runtime configuration for a single import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub batch_size: usize,
    /// Abort the whole import on the first invalid row instead of skipping it.
    pub strict: bool,
    pub channel_capacity: usize,
    pub max_recorded_failures: usize,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self {
            batch_size: env_usize("IMPORT_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            strict: env_bool("IMPORT_STRICT", false),
            channel_capacity: env_usize("IMPORT_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY),
            max_recorded_failures: env_usize(
                "IMPORT_MAX_RECORDED_FAILURES",
                DEFAULT_MAX_RECORDED_FAILURES,
            ),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            strict: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_recorded_failures: DEFAULT_MAX_RECORDED_FAILURES,
        }
    }
}

/// Connection settings for the PostgreSQL store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Destination table for imported customers, optionally schema-qualified.
    pub table: String,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        Ok(Self {
            url,
            max_connections: env_u32("DATABASE_MAX_CONNECTIONS", 5),
            table: env_string("IMPORT_TABLE", DEFAULT_TABLE),
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// The table name is interpolated into SQL, so it must be a plain identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_table_name(&self.table) {
            return Err(ConfigError::InvalidTable(self.table.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ImportConfig::default();
        assert_eq!(config.batch_size, 5_000);
        assert!(!config.strict);
        assert!(config.validate().is_ok());

        let database = DatabaseConfig::new("postgres://localhost/crm");
        assert_eq!(database.table, "customers");
        assert!(database.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let config = ImportConfig::default().with_batch_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));

        let config = ImportConfig::default().with_channel_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroChannelCapacity));
    }

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(is_valid_table_name("customers"));
        assert!(is_valid_table_name("crm.customers_2024"));
        assert!(is_valid_table_name("_staging"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("1customers"));
        assert!(!is_valid_table_name("customers; DROP TABLE x"));
        assert!(!is_valid_table_name("a.b.c"));

        let database = DatabaseConfig::new("postgres://localhost/crm").with_table("bad name");
        assert_eq!(
            database.validate(),
            Err(ConfigError::InvalidTable("bad name".to_string()))
        );
    }
}
