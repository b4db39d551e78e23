//! In-memory document store for fast, deterministic testing.
//!
//! [`InMemoryDocumentStore`] follows the same merge semantics as the
//! PostgreSQL store and additionally counts every call, so tests can assert
//! how often the backend was contacted. Read and write failures can be
//! injected independently.

use pointkeeper_core::store::{Document, DocumentStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Key = (String, String);

/// `HashMap`-backed document store.
///
/// Clones share storage, counters and injected failures.
///
/// # Example
///
/// ```
/// use pointkeeper_testing::InMemoryDocumentStore;
/// use pointkeeper_core::store::{Document, DocumentStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// store.insert_json("Users", "uid-1", json!({ "contributionPoints": 7, "name": "ada" }));
///
/// let mut fields = Document::new();
/// fields.insert("contributionPoints".to_string(), json!(0));
/// store.update("Users", "uid-1", fields).await?;
///
/// let doc = store.document("Users", "uid-1").unwrap();
/// assert_eq!(doc["contributionPoints"], json!(0));
/// assert_eq!(doc["name"], json!("ada"));
/// assert_eq!(store.write_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Key, Document>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    read_failure: Arc<Mutex<Option<StoreError>>>,
    write_failure: Arc<Mutex<Option<StoreError>>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, replacing any existing one. Not counted as a write.
    pub fn insert(&self, collection: &str, id: &str, document: Document) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), id.to_string()), document);
    }

    /// Seed a document from a JSON value. Non-object values seed an empty document.
    pub fn insert_json(&self, collection: &str, id: &str, value: Value) {
        let document = match value {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        self.insert(collection, id, document);
    }

    /// Snapshot of a stored document. Not counted as a read.
    #[must_use]
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `get` calls made so far, including failed ones.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `update` calls made so far, including failed ones.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `get` fail with `error`.
    pub fn fail_reads_with(&self, error: StoreError) {
        *self
            .read_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Make every subsequent `update` fail with `error`.
    pub fn fail_writes_with(&self, error: StoreError) {
        *self
            .write_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Clear injected failures.
    pub fn heal(&self) {
        *self
            .read_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .write_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn read(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self
            .read_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        Ok(self.document(collection, id))
    }

    fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self
            .write_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let document = documents
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (field, value) in fields {
            document.insert(field, value);
        }
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, StoreError>> + Send + 'a>> {
        let result = self.read(collection, id);
        Box::pin(async move { result })
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Document,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        let result = self.merge(collection, id, fields);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.get("Users", "nobody").await.unwrap(), None);
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_named_fields_only() {
        let store = InMemoryDocumentStore::new();
        store.insert_json("Users", "u1", json!({ "a": 1, "b": 2 }));

        store
            .update("Users", "u1", fields(json!({ "b": 20, "c": 30 })))
            .await
            .unwrap();

        let doc = store.document("Users", "u1").unwrap();
        assert_eq!(Value::Object(doc), json!({ "a": 1, "b": 20, "c": 30 }));
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store.update("Users", "ghost", Document::new()).await;

        assert_eq!(
            result,
            Err(StoreError::NotFound {
                collection: "Users".to_string(),
                id: "ghost".to_string(),
            })
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = InMemoryDocumentStore::new();
        store.insert_json("Users", "u1", json!({ "x": 1 }));

        assert!(store.get("Admins", "u1").await.unwrap().is_none());
        assert!(store.get("Users", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_injected_failures_and_heal() {
        let store = InMemoryDocumentStore::new();
        store.insert_json("Users", "u1", json!({}));
        store.fail_reads_with(StoreError::Connection("offline".to_string()));
        store.fail_writes_with(StoreError::Database("read-only".to_string()));

        assert!(matches!(
            store.get("Users", "u1").await,
            Err(StoreError::Connection(_))
        ));
        assert!(matches!(
            store.update("Users", "u1", Document::new()).await,
            Err(StoreError::Database(_))
        ));
        assert_eq!(store.read_count(), 1);
        assert_eq!(store.write_count(), 1);

        store.heal();
        assert!(store.get("Users", "u1").await.is_ok());
    }
}
