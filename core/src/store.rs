//! Document store trait and related types.
//!
//! The reset logic keeps its state in a remote document store: a collection
//! of JSON objects addressed by `(collection, id)`. This module defines the
//! two operations it relies on.
//!
//! # Contract
//!
//! - `get` returns the document if it exists, `None` otherwise
//! - `update` merges the given fields into an existing document in one atomic
//!   step. Fields that are not named are left untouched, and no prior read or
//!   transaction is required.
//!
//! # Implementations
//!
//! - `PostgresDocumentStore` (in `pointkeeper-postgres`): `JSONB` rows
//! - `InMemoryDocumentStore` (in `pointkeeper-testing`): deterministic tests
//!
//! # Example
//!
//! ```no_run
//! use pointkeeper_core::store::{Document, DocumentStore, StoreError};
//! use serde_json::json;
//!
//! async fn zero_points<S: DocumentStore>(store: &S) -> Result<(), StoreError> {
//!     if store.get("Users", "uid-1").await?.is_some() {
//!         let mut fields = Document::new();
//!         fields.insert("contributionPoints".to_string(), json!(0));
//!         store.update("Users", "uid-1", fields).await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The document to update does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was addressed.
        collection: String,
        /// Document id that was addressed.
        id: String,
    },

    /// A document with this id already exists.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists {
        /// Collection that was addressed.
        collection: String,
        /// Document id that was addressed.
        id: String,
    },

    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query or command failed inside the backend.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be converted to or from a document.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Remote document store capability.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single store can be shared by
/// every session of the application.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn DocumentStore>`).
pub trait DocumentStore: Send + Sync {
    /// Fetch a document.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend fails. A missing document is
    /// `Ok(None)`, not an error.
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, StoreError>> + Send + 'a>>;

    /// Merge `fields` into an existing document.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the document does not exist
    /// - Any other [`StoreError`] if the backend fails
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Document,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, StoreError>> + Send + 'a>> {
        (**self).get(collection, id)
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Document,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        (**self).update(collection, id, fields)
    }
}
