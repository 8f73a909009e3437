//! # Local Persistent Store
//!
//! Generic asynchronous key-value storage over a local SQLite database.
//! The store is organized as named, independent collections; every row is
//! auto-keyed by a monotonically increasing local identifier and holds one
//! JSON-serialized value.
//!
//! ## Features
//!
//! - **Durable Storage**: Rows survive application restarts
//! - **Named Collections**: Independent auto-keyed tables in one database
//! - **Idempotent Open**: Opening an existing database is a no-op beyond
//!   connecting
//! - **Ordered Reads**: `get_all` returns rows in ascending key order
//!
//! ## Usage
//!
//! ```rust,no_run
//! use apiary_offline::config::OfflineConfig;
//! use apiary_offline::store::LocalStore;
//!
//! # async fn example() -> apiary_offline::error::Result<()> {
//! let store = LocalStore::open(&OfflineConfig::default()).await?;
//! store.ensure_collection("outbox").await?;
//!
//! let id = store.add("outbox", &serde_json::json!({"temp_c": 34.5})).await?;
//! let rows: Vec<(i64, serde_json::Value)> = store.get_all("outbox").await?;
//! store.delete("outbox", id).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::OfflineConfig;
use crate::error::{OfflineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

/// Local database connection manager
///
/// Manages the SQLite connection pool and provides generic collection
/// operations. Each call runs a short-lived statement scoped to one
/// collection; no cross-collection atomicity is provided.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open or create the local database
    ///
    /// Creates the database file if it doesn't exist, applies connection
    /// PRAGMAs, and records the schema version. Safe to call repeatedly
    /// with the same configuration.
    pub async fn open(config: &OfflineConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let options = SqliteConnectOptions::new()
            .filename(config.database_path())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        // Enable WAL mode and other optimizations
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        sqlx::query("PRAGMA temp_store=MEMORY").execute(&pool).await?;

        let store = Self { pool };
        store.record_version(config.schema_version).await?;

        Ok(store)
    }

    /// Record the schema version
    ///
    /// Keeps a migrations table with one row per applied version.
    /// Re-opening with an already-recorded version is a no-op.
    async fn record_version(&self, version: i64) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current: (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM store_migrations")
                .fetch_one(&self.pool)
                .await?;

        if current.0 < version {
            sqlx::query("INSERT INTO store_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Ensure a collection exists
    ///
    /// Creates the backing table with an auto-incrementing integer key if it
    /// is not already present. Idempotent.
    pub async fn ensure_collection(&self, collection: &str) -> Result<()> {
        validate_collection_name(collection)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {collection} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                value TEXT NOT NULL
            )"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a value as a new row, returning its assigned key
    pub async fn add<T: Serialize>(&self, collection: &str, value: &T) -> Result<i64> {
        validate_collection_name(collection)?;
        let json = serde_json::to_string(value)?;
        let result = sqlx::query(&format!("INSERT INTO {collection} (value) VALUES (?)"))
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Fetch all rows of a collection in ascending key order
    ///
    /// Returns an empty vector, never an error, for an empty collection.
    pub async fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<(i64, T)>> {
        validate_collection_name(collection)?;
        let rows = sqlx::query(&format!(
            "SELECT id, value FROM {collection} ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let json: String = row.try_get("value")?;
            values.push((id, serde_json::from_str(&json)?));
        }
        Ok(values)
    }

    /// Remove the row with the given key
    ///
    /// A missing key is not an error.
    pub async fn delete(&self, collection: &str, id: i64) -> Result<()> {
        validate_collection_name(collection)?;
        sqlx::query(&format!("DELETE FROM {collection} WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove all rows of a collection
    pub async fn clear(&self, collection: &str) -> Result<()> {
        validate_collection_name(collection)?;
        sqlx::query(&format!("DELETE FROM {collection}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count the rows of a collection
    pub async fn count(&self, collection: &str) -> Result<u64> {
        validate_collection_name(collection)?;
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {collection}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 as u64)
    }
}

/// Validate a collection name before interpolating it into SQL
///
/// Collection names double as table names, so only identifier characters
/// are accepted.
fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(OfflineError::config(format!(
            "invalid collection name: {name:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = OfflineConfig::builder()
            .data_dir(dir.path())
            .build()
            .unwrap();
        let store = LocalStore::open(&config).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = OfflineConfig::builder()
            .data_dir(dir.path())
            .build()
            .unwrap();
        let first = LocalStore::open(&config).await.unwrap();
        first.ensure_collection("outbox").await.unwrap();
        first.add("outbox", &json!({"n": 1})).await.unwrap();
        drop(first);

        let second = LocalStore::open(&config).await.unwrap();
        second.ensure_collection("outbox").await.unwrap();
        let rows: Vec<(i64, serde_json::Value)> = second.get_all("outbox").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_add_assigns_ascending_keys() {
        let (_dir, store) = temp_store().await;
        store.ensure_collection("outbox").await.unwrap();

        let a = store.add("outbox", &json!({"n": 1})).await.unwrap();
        let b = store.add("outbox", &json!({"n": 2})).await.unwrap();
        let c = store.add("outbox", &json!({"n": 3})).await.unwrap();
        assert!(a < b && b < c);

        let rows: Vec<(i64, serde_json::Value)> = store.get_all("outbox").await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_get_all_empty_collection() {
        let (_dir, store) = temp_store().await;
        store.ensure_collection("outbox").await.unwrap();
        let rows: Vec<(i64, serde_json::Value)> = store.get_all("outbox").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let (_dir, store) = temp_store().await;
        store.ensure_collection("outbox").await.unwrap();
        store.delete("outbox", 12345).await.unwrap();
        assert_eq!(store.count("outbox").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_and_count() {
        let (_dir, store) = temp_store().await;
        store.ensure_collection("outbox").await.unwrap();
        store.add("outbox", &json!({"n": 1})).await.unwrap();
        store.add("outbox", &json!({"n": 2})).await.unwrap();
        assert_eq!(store.count("outbox").await.unwrap(), 2);

        store.clear("outbox").await.unwrap();
        assert_eq!(store.count("outbox").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let (_dir, store) = temp_store().await;
        store.ensure_collection("outbox").await.unwrap();
        store.ensure_collection("history_cache").await.unwrap();
        store.add("outbox", &json!({"n": 1})).await.unwrap();
        assert_eq!(store.count("outbox").await.unwrap(), 1);
        assert_eq!(store.count("history_cache").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_collection_name() {
        let (_dir, store) = temp_store().await;
        assert!(store.ensure_collection("out box; DROP").await.is_err());
        assert!(store.ensure_collection("1outbox").await.is_err());
        assert!(store.ensure_collection("").await.is_err());
    }
}
