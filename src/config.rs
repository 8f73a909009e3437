//! Offline queue configuration
//!
//! Provides configuration for the local database location, the outbox
//! collection name, and the schema version, with a builder and optional
//! TOML loading for host applications.

use crate::error::{OfflineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default database file name (without extension)
const DEFAULT_DATABASE_NAME: &str = "apiary-offline";

/// Default outbox collection name
const DEFAULT_COLLECTION: &str = "outbox";

/// Default schema version
const DEFAULT_SCHEMA_VERSION: i64 = 1;

/// Configuration for an offline queue instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Directory holding the SQLite database file
    pub data_dir: PathBuf,
    /// Database file name (".db" is appended)
    pub database_name: String,
    /// Name of the outbox collection
    pub collection: String,
    /// Schema version recorded on open
    pub schema_version: i64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        // Env override first, then the platform data directory
        let data_dir = std::env::var("APIARY_OFFLINE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
                path.push("apiary");
                path
            });

        Self {
            data_dir,
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION,
        }
    }
}

impl OfflineConfig {
    /// Create a new OfflineConfigBuilder
    pub fn builder() -> OfflineConfigBuilder {
        OfflineConfigBuilder::default()
    }

    /// Parse a configuration from a TOML document
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| OfflineError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_name.is_empty() {
            return Err(OfflineError::config("database_name must not be empty"));
        }
        if self.collection.is_empty() {
            return Err(OfflineError::config("collection must not be empty"));
        }
        if self.schema_version < 1 {
            return Err(OfflineError::config("schema_version must be >= 1"));
        }
        Ok(())
    }

    /// Full path of the database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.database_name))
    }
}

/// Builder for OfflineConfig
#[derive(Debug, Default)]
pub struct OfflineConfigBuilder {
    data_dir: Option<PathBuf>,
    database_name: Option<String>,
    collection: Option<String>,
    schema_version: Option<i64>,
}

impl OfflineConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the database file name
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Set the outbox collection name
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Set the schema version
    pub fn schema_version(mut self, version: i64) -> Self {
        self.schema_version = Some(version);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<OfflineConfig> {
        let defaults = OfflineConfig::default();
        let config = OfflineConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            database_name: self.database_name.unwrap_or(defaults.database_name),
            collection: self.collection.unwrap_or(defaults.collection),
            schema_version: self.schema_version.unwrap_or(defaults.schema_version),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OfflineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection, "outbox");
        assert!(config
            .database_path()
            .to_string_lossy()
            .ends_with("apiary-offline.db"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = OfflineConfig::builder()
            .data_dir("/tmp/hives")
            .database_name("hive-7")
            .collection("pending_writes")
            .schema_version(2)
            .build()
            .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/hives/hive-7.db"));
        assert_eq!(config.collection, "pending_writes");
        assert_eq!(config.schema_version, 2);
    }

    #[test]
    fn test_builder_rejects_empty_collection() {
        let result = OfflineConfig::builder().collection("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = OfflineConfig::from_toml(
            r#"
            data_dir = "/tmp/apiary"
            database_name = "offline"
            collection = "outbox"
            schema_version = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.database_name, "offline");
    }

    #[test]
    fn test_from_toml_rejects_bad_version() {
        let result = OfflineConfig::from_toml(
            r#"
            data_dir = "/tmp/apiary"
            database_name = "offline"
            collection = "outbox"
            schema_version = 0
            "#,
        );
        assert!(result.is_err());
    }
}
