//! Document-store collaborator interface.
//!
//! The remote store is an external collaborator: a generic key-document
//! store with query and live-subscription capabilities. This module defines
//! the minimal, object-safe trait the check-in flow consumes, plus the
//! document, filter, and subscription types that cross the boundary.
//!
//! # Design
//!
//! The trait is deliberately minimal and focused. It provides exactly what
//! the registration and attendance paths need:
//!
//! - Point reads and client-keyed writes
//! - Partial-field updates (the committer's `hasAttended` flip)
//! - Filtered queries and live snapshot subscriptions
//!
//! # Implementations
//!
//! - A production store client (HTTP/gRPC/vendor SDK) is out of scope for
//!   this workspace and lives with the embedding application.
//! - `MemoryDocumentStore` (in `turnstile-testing`): fast, deterministic
//!   in-memory implementation with working subscriptions.
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn DocumentStore>`). This
//! is required for the effect system where reducers create effects that
//! capture the store.

use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// Collection holding [`Registration`](crate::types::Registration) documents
pub const REGISTRATIONS: &str = "registrations";

/// Collection holding [`AttendanceRecord`](crate::types::AttendanceRecord) documents
pub const ATTENDANCE: &str = "attendance";

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    /// The referenced document does not exist.
    ///
    /// Only raised by operations that require an existing document
    /// (`update`); `get` reports absence as `Ok(None)`.
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection the lookup ran against
        collection: String,
        /// Document id that was not found
        id: String,
    },

    /// Transport or backend failure, wrapping the underlying detail.
    #[error("backend error: {0}")]
    Backend(String),

    /// A document payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A document as it crosses the store boundary: an id plus a JSON payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, unique within its collection
    pub id: String,
    /// The document body
    pub data: serde_json::Value,
}

impl Document {
    /// Create a document from an id and payload.
    #[must_use]
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Deserialize the payload into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] when the payload does
    /// not match the target type.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DocumentStoreError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| DocumentStoreError::Serialization(e.to_string()))
    }
}

/// Predicate for queries and subscriptions.
///
/// Field-equality on a top-level field is the only shape the check-in flows
/// need (registrations for an event, attendance for an event).
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Match every document in the collection
    All,
    /// Match documents whose top-level `field` equals `value`
    FieldEq {
        /// Top-level field name
        field: String,
        /// Value the field must equal
        value: serde_json::Value,
    },
}

impl Filter {
    /// Build a field-equality filter.
    pub fn field_eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a document satisfies this filter.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::FieldEq { field, value } => document.data.get(field) == Some(value),
        }
    }
}

/// A snapshot stream: the current matching document set, re-emitted after
/// every matching mutation.
pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<Vec<Document>, DocumentStoreError>> + Send>>;

/// A live subscription to a filtered collection.
///
/// Yields an initial snapshot, then one snapshot per matching mutation.
/// The subscription is cancelled by calling [`cancel`](Self::cancel) or by
/// dropping the handle; a cancelled subscription yields nothing further.
pub struct DocumentSubscription {
    stream: SnapshotStream,
    canceller: Option<Box<dyn FnOnce() + Send>>,
}

impl DocumentSubscription {
    /// Create a subscription from a snapshot stream and a cancel hook.
    #[must_use]
    pub fn new(stream: SnapshotStream, canceller: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            stream,
            canceller: Some(canceller),
        }
    }

    /// Explicitly cancel the subscription.
    ///
    /// Equivalent to dropping the handle; provided for session teardown
    /// paths that want the unsubscribe to be visible in the code.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl Stream for DocumentSubscription {
    type Item = Result<Vec<Document>, DocumentStoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().stream.as_mut().poll_next(cx)
    }
}

impl Drop for DocumentSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for DocumentSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSubscription")
            .field("cancelled", &self.canceller.is_none())
            .finish()
    }
}

/// The remote document store, as consumed by the check-in flow.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be safely captured by effects
/// and shared across tasks.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    ///
    /// Absence is not an error: a missing document is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Backend`]: transport or backend failure
    fn get(
        &self,
        collection: &'static str,
        id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Document>, DocumentStoreError>> + Send + '_>>;

    /// Write a document under a client-chosen id, overwriting any existing
    /// document with that id.
    ///
    /// Registration creation and audit-record writes both key their
    /// documents client-side, so overwrite-on-retry is the deduplication
    /// mechanism rather than a hazard.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Backend`]: transport or backend failure
    fn insert(
        &self,
        collection: &'static str,
        id: String,
        data: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>>;

    /// Merge the top-level fields of `patch` into an existing document.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::NotFound`]: the document does not exist
    /// - [`DocumentStoreError::Backend`]: transport or backend failure
    fn update(
        &self,
        collection: &'static str,
        id: String,
        patch: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>>;

    /// Fetch every document in a collection matching a filter.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Backend`]: transport or backend failure
    fn query(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Document>, DocumentStoreError>> + Send + '_>>;

    /// Open a live subscription to a filtered collection.
    ///
    /// The returned stream is lazy: nothing is computed until it is polled,
    /// and the first poll yields the current snapshot.
    fn subscribe(&self, collection: &'static str, filter: Filter) -> DocumentSubscription;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_all_matches_everything() {
        let doc = Document::new("a", json!({"x": 1}));
        assert!(Filter::All.matches(&doc));
    }

    #[test]
    fn filter_field_eq_matches_on_value() {
        let doc = Document::new("a", json!({"eventId": "EVT1", "n": 2}));
        assert!(Filter::field_eq("eventId", "EVT1").matches(&doc));
        assert!(!Filter::field_eq("eventId", "EVT2").matches(&doc));
        assert!(!Filter::field_eq("missing", "EVT1").matches(&doc));
    }

    #[test]
    fn document_parse_reports_shape_mismatch() {
        let doc = Document::new("a", json!({"unexpected": true}));
        let result = doc.parse::<crate::types::AttendanceRecord>();
        assert!(matches!(
            result,
            Err(DocumentStoreError::Serialization(_))
        ));
    }

    #[test]
    fn not_found_error_display() {
        let error = DocumentStoreError::NotFound {
            collection: REGISTRATIONS.to_string(),
            id: "reg-1".to_string(),
        };
        assert_eq!(
            format!("{error}"),
            "document not found: registrations/reg-1"
        );
    }
}
