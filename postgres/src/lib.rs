//! `PostgreSQL` document store implementation for Pointkeeper.
//!
//! This crate provides a [`DocumentStore`] that keeps every document as a
//! `JSONB` value in a single table:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     data JSONB NOT NULL DEFAULT '{}'::jsonb,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! Partial updates use the `jsonb || jsonb` operator inside one `UPDATE`
//! statement, so merging the named fields is atomic and leaves every other
//! field on the document untouched.
//!
//! # Example
//!
//! ```ignore
//! use pointkeeper_postgres::{PoolConfig, PostgresDocumentStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresDocumentStore::connect(
//!         "postgres://localhost/pointkeeper",
//!         &PoolConfig::default(),
//!     )
//!     .await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use metrics::histogram;
use pointkeeper_core::store::{Document, DocumentStore, StoreError};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Default table name.
pub const DEFAULT_TABLE: &str = "documents";

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    ///
    /// Default: 10
    pub max_connections: u32,

    /// Minimum number of idle connections kept open.
    ///
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a connection before giving up.
    ///
    /// Default: 30 seconds
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// PostgreSQL-backed document store.
#[derive(Clone, Debug)]
pub struct PostgresDocumentStore {
    pool: PgPool,
    table_name: String,
}

impl PostgresDocumentStore {
    /// Create a store on an existing connection pool, using the default table.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: DEFAULT_TABLE.to_string(),
        }
    }

    /// Connect to `database_url` with the given pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot be established.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to document database"
        );
        Ok(Self::from_pool(pool))
    }

    /// Use a different table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] unless `table_name` is a plain SQL
    /// identifier (ASCII letters, digits and underscores, not starting with
    /// a digit). The name is interpolated into SQL, so nothing else is accepted.
    pub fn with_table(mut self, table_name: impl Into<String>) -> Result<Self, StoreError> {
        let table_name = table_name.into();
        if !is_plain_identifier(&table_name) {
            return Err(StoreError::Database(format!(
                "Invalid table name: {table_name:?}"
            )));
        }
        self.table_name = table_name;
        Ok(self)
    }

    /// The table documents are stored in.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the documents table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the DDL fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let ddl = format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            )
            ",
            self.table_name
        );

        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Create a new document.
    ///
    /// Record creation belongs to registration, not to the reset logic; this
    /// exists for provisioning tools and tests.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyExists`] if the id is taken
    /// - [`StoreError::Database`] / [`StoreError::Connection`] on backend failure
    pub async fn insert(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (collection, id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO NOTHING",
            self.table_name
        );

        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(Json(Value::Object(document)))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug", name = "document_get")]
    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let started = Instant::now();
        let sql = format!(
            "SELECT data FROM {} WHERE collection = $1 AND id = $2",
            self.table_name
        );

        let row: Option<Json<Value>> = sqlx::query_scalar(&sql)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        histogram!("document_store_duration_seconds", "op" => "get")
            .record(started.elapsed().as_secs_f64());

        match row {
            None => Ok(None),
            Some(Json(Value::Object(document))) => Ok(Some(document)),
            Some(Json(other)) => Err(StoreError::Serialization(format!(
                "Document {collection}/{id} is not an object: {other}"
            ))),
        }
    }

    #[tracing::instrument(skip(self, fields), level = "debug", name = "document_update")]
    async fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let started = Instant::now();
        let sql = format!(
            "UPDATE {} SET data = data || $3, updated_at = now() \
             WHERE collection = $1 AND id = $2",
            self.table_name
        );

        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(Json(Value::Object(fields)))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        histogram!("document_store_duration_seconds", "op" => "update")
            .record(started.elapsed().as_secs_f64());

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

impl DocumentStore for PostgresDocumentStore {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, StoreError>> + Send + 'a>> {
        Box::pin(self.fetch(collection, id))
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Document,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.merge(collection, id, fields))
    }
}

/// Connection-level failures are reported separately from query failures.
fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Connection(error.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers() {
        assert!(is_plain_identifier("documents"));
        assert!(is_plain_identifier("_user_docs2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2docs"));
        assert!(!is_plain_identifier("docs; DROP TABLE users"));
        assert!(!is_plain_identifier("public.docs"));
    }

    #[test]
    fn test_connection_errors_are_classified() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Connection(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }
}
