//! In-memory document store for fast, deterministic testing.
//!
//! Implements the full [`DocumentStore`] contract, including live
//! subscriptions: every mutation re-evaluates open subscriptions on the
//! touched collection and pushes a fresh snapshot to each.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use turnstile_core::store::{
    Document, DocumentStore, DocumentStoreError, DocumentSubscription, Filter,
};

type Snapshot = Result<Vec<Document>, DocumentStoreError>;

struct Subscriber {
    id: u64,
    collection: &'static str,
    filter: Filter,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<&'static str, BTreeMap<String, serde_json::Value>>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
}

/// In-memory document store with working live subscriptions.
///
/// Documents are held per collection in a `BTreeMap`, so queries and
/// snapshots come back in a deterministic id order.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use turnstile_core::store::DocumentStore;
/// use turnstile_testing::MemoryDocumentStore;
///
/// # async fn example() -> Result<(), turnstile_core::store::DocumentStoreError> {
/// let store = MemoryDocumentStore::new();
/// store.insert("registrations", "reg-1".into(), json!({"name": "A"})).await?;
///
/// let doc = store.get("registrations", "reg-1".into()).await?;
/// assert!(doc.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDocumentStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all documents and drop all subscriptions (for test isolation)
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.collections.clear();
        inner.subscribers.clear();
    }

    /// Number of documents in a collection
    ///
    /// Useful for assertions in tests.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Whether a collection holds no documents
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Whether a document exists
    #[must_use]
    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id))
    }

    /// Number of open subscriptions (across all collections)
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().unwrap().subscribers.len()
    }

    fn matching_documents(
        collections: &HashMap<&'static str, BTreeMap<String, serde_json::Value>>,
        collection: &str,
        filter: &Filter,
    ) -> Vec<Document> {
        collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .filter(|doc| filter.matches(doc))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push a fresh snapshot to every live subscriber of `collection`,
    /// dropping subscribers whose receivers are gone.
    fn broadcast_snapshots(inner: &mut Inner, collection: &'static str) {
        let collections = &inner.collections;
        inner.subscribers.retain(|sub| {
            if sub.collection != collection {
                return true;
            }
            let snapshot = Self::matching_documents(collections, collection, &sub.filter);
            sub.tx.send(Ok(snapshot)).is_ok()
        });
    }
}

impl std::fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("MemoryDocumentStore")
            .field("collections", &inner.collections.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(
        &self,
        collection: &'static str,
        id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, DocumentStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            Ok(inner
                .collections
                .get(collection)
                .and_then(|docs| docs.get(&id))
                .map(|data| Document::new(id, data.clone())))
        })
    }

    fn insert(
        &self,
        collection: &'static str,
        id: String,
        data: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().unwrap();
            inner
                .collections
                .entry(collection)
                .or_default()
                .insert(id, data);
            Self::broadcast_snapshots(&mut inner, collection);
            Ok(())
        })
    }

    fn update(
        &self,
        collection: &'static str,
        id: String,
        patch: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>> {
        Box::pin(async move {
            let serde_json::Value::Object(patch) = patch else {
                return Err(DocumentStoreError::Serialization(
                    "update patch must be a JSON object".to_string(),
                ));
            };

            let mut inner = self.inner.write().unwrap();

            let Some(data) = inner
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(&id))
            else {
                return Err(DocumentStoreError::NotFound {
                    collection: collection.to_string(),
                    id,
                });
            };

            let serde_json::Value::Object(target) = data else {
                return Err(DocumentStoreError::Serialization(format!(
                    "document {collection}/{id} is not a JSON object"
                )));
            };

            for (key, value) in patch {
                target.insert(key, value);
            }

            Self::broadcast_snapshots(&mut inner, collection);
            Ok(())
        })
    }

    fn query(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Document>, DocumentStoreError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            Ok(Self::matching_documents(
                &inner.collections,
                collection,
                &filter,
            ))
        })
    }

    fn subscribe(&self, collection: &'static str, filter: Filter) -> DocumentSubscription {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscriber_id = {
            let mut inner = self.inner.write().unwrap();
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;

            // Initial snapshot, then one per matching mutation.
            let snapshot = Self::matching_documents(&inner.collections, collection, &filter);
            let _ = tx.send(Ok(snapshot));

            inner.subscribers.push(Subscriber {
                id,
                collection,
                filter,
                tx,
            });
            id
        };

        let stream = Box::pin(async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        });

        let inner = Arc::clone(&self.inner);
        let canceller = Box::new(move || {
            inner
                .write()
                .unwrap()
                .subscribers
                .retain(|sub| sub.id != subscriber_id);
        });

        DocumentSubscription::new(stream, canceller)
    }
}
