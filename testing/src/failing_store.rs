//! Fault-injecting document store wrapper.
//!
//! Wraps any [`DocumentStore`] and fails configured (operation, collection)
//! pairs with a backend error, for exercising the failure paths the remote
//! store can produce.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use turnstile_core::store::{
    Document, DocumentStore, DocumentStoreError, DocumentSubscription, Filter,
};

/// A store operation that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureOp {
    /// Point reads
    Get,
    /// Client-keyed writes
    Insert,
    /// Partial-field updates
    Update,
    /// Filtered queries
    Query,
}

/// Document store wrapper that injects backend failures.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use turnstile_testing::{FailingDocumentStore, FailureOp, MemoryDocumentStore};
///
/// let flaky = FailingDocumentStore::wrapping(Arc::new(MemoryDocumentStore::new()));
/// flaky.fail(FailureOp::Update, "registrations", "connection reset");
/// ```
#[derive(Clone)]
pub struct FailingDocumentStore {
    inner: Arc<dyn DocumentStore>,
    failures: Arc<RwLock<HashMap<(FailureOp, &'static str), String>>>,
}

impl FailingDocumentStore {
    /// Wrap an existing store
    #[must_use]
    pub fn wrapping(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Make `op` on `collection` fail with a backend error carrying `message`
    pub fn fail(&self, op: FailureOp, collection: &'static str, message: &str) {
        self.failures
            .write()
            .unwrap()
            .insert((op, collection), message.to_string());
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.failures.write().unwrap().clear();
    }

    fn injected(&self, op: FailureOp, collection: &'static str) -> Option<DocumentStoreError> {
        self.failures
            .read()
            .unwrap()
            .get(&(op, collection))
            .map(|message| DocumentStoreError::Backend(message.clone()))
    }
}

impl std::fmt::Debug for FailingDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingDocumentStore")
            .field("failures", &self.failures.read().unwrap().len())
            .finish()
    }
}

impl DocumentStore for FailingDocumentStore {
    fn get(
        &self,
        collection: &'static str,
        id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, DocumentStoreError>> + Send + '_>>
    {
        if let Some(error) = self.injected(FailureOp::Get, collection) {
            return Box::pin(async move { Err(error) });
        }
        self.inner.get(collection, id)
    }

    fn insert(
        &self,
        collection: &'static str,
        id: String,
        data: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>> {
        if let Some(error) = self.injected(FailureOp::Insert, collection) {
            return Box::pin(async move { Err(error) });
        }
        self.inner.insert(collection, id, data)
    }

    fn update(
        &self,
        collection: &'static str,
        id: String,
        patch: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>> {
        if let Some(error) = self.injected(FailureOp::Update, collection) {
            return Box::pin(async move { Err(error) });
        }
        self.inner.update(collection, id, patch)
    }

    fn query(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Document>, DocumentStoreError>> + Send + '_>> {
        if let Some(error) = self.injected(FailureOp::Query, collection) {
            return Box::pin(async move { Err(error) });
        }
        self.inner.query(collection, filter)
    }

    fn subscribe(&self, collection: &'static str, filter: Filter) -> DocumentSubscription {
        self.inner.subscribe(collection, filter)
    }
}
