//! Typed adapters over the raw document store.
//!
//! The store collaborator speaks ids and JSON; these adapters speak
//! [`Registration`] and [`AttendanceRecord`]. They are thin: every method is
//! one store call plus (de)serialization, and nothing here owns state.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use turnstile_core::DateTime;
use turnstile_core::Utc;
use turnstile_core::store::{
    ATTENDANCE, DocumentStore, DocumentStoreError, DocumentSubscription, Filter, REGISTRATIONS,
};
use turnstile_core::types::{
    AttendanceRecord, EventId, Registration, RegistrationId, StudentId,
};

fn serialize<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DocumentStoreError> {
    serde_json::to_value(value).map_err(|e| DocumentStoreError::Serialization(e.to_string()))
}

/// Typed access to the registrations collection.
#[derive(Clone)]
pub struct Registrations {
    store: Arc<dyn DocumentStore>,
}

impl Registrations {
    /// Create an adapter over a store handle
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn event_filter(event_id: &EventId) -> Filter {
        Filter::field_eq("eventId", event_id.as_str())
    }

    /// Fetch a registration by id
    ///
    /// # Errors
    ///
    /// Propagates store failures; a malformed stored document surfaces as
    /// [`DocumentStoreError::Serialization`].
    pub async fn get(
        &self,
        id: &RegistrationId,
    ) -> Result<Option<Registration>, DocumentStoreError> {
        match self.store.get(REGISTRATIONS, id.to_string()).await? {
            Some(document) => Ok(Some(document.parse()?)),
            None => Ok(None),
        }
    }

    /// Write a registration under its own id
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn insert(&self, registration: &Registration) -> Result<(), DocumentStoreError> {
        let data = serialize(registration)?;
        self.store
            .insert(REGISTRATIONS, registration.id.to_string(), data)
            .await
    }

    /// Flip the attendance guard: set `hasAttended` and stamp `attendedAt`.
    ///
    /// A partial update touching exactly those two fields; everything else
    /// on the document is left alone.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotFound`] if the registration is gone;
    /// otherwise propagates store failures.
    pub async fn mark_attended(
        &self,
        id: &RegistrationId,
        attended_at: DateTime<Utc>,
    ) -> Result<(), DocumentStoreError> {
        let patch = serde_json::json!({
            "hasAttended": true,
            "attendedAt": attended_at,
        });
        self.store.update(REGISTRATIONS, id.to_string(), patch).await
    }

    /// All registrations for an event, in id order
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn for_event(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<Registration>, DocumentStoreError> {
        let documents = self
            .store
            .query(REGISTRATIONS, Self::event_filter(event_id))
            .await?;
        documents.iter().map(|doc| doc.parse()).collect()
    }

    /// Find an event registration by student id, if one exists
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn find_by_student(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
    ) -> Result<Option<Registration>, DocumentStoreError> {
        Ok(self
            .for_event(event_id)
            .await?
            .into_iter()
            .find(|registration| &registration.student_id == student_id))
    }

    /// Open a live snapshot stream of an event's registrations
    #[must_use]
    pub fn watch_event(&self, event_id: &EventId) -> RegistrationWatch {
        RegistrationWatch {
            inner: self
                .store
                .subscribe(REGISTRATIONS, Self::event_filter(event_id)),
        }
    }
}

impl std::fmt::Debug for Registrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrations").finish_non_exhaustive()
    }
}

/// Live stream of registration snapshots for one event.
///
/// Cancel explicitly on session teardown, or drop the handle; either
/// unsubscribes from the underlying store.
pub struct RegistrationWatch {
    inner: DocumentSubscription,
}

impl RegistrationWatch {
    /// Explicitly unsubscribe
    pub fn cancel(self) {
        self.inner.cancel();
    }
}

impl Stream for RegistrationWatch {
    type Item = Result<Vec<Registration>, DocumentStoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.get_mut().inner).poll_next(cx) {
            Poll::Ready(Some(Ok(documents))) => {
                Poll::Ready(Some(documents.iter().map(|doc| doc.parse()).collect()))
            },
            Poll::Ready(Some(Err(error))) => Poll::Ready(Some(Err(error))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for RegistrationWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationWatch").finish_non_exhaustive()
    }
}

/// Typed access to the attendance audit collection.
///
/// Audit rows are keyed by registration id (one-to-one), so a retried write
/// overwrites identical content rather than duplicating.
#[derive(Clone)]
pub struct AttendanceLog {
    store: Arc<dyn DocumentStore>,
}

impl AttendanceLog {
    /// Create an adapter over a store handle
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write an audit row under the registration's id
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn record(&self, record: &AttendanceRecord) -> Result<(), DocumentStoreError> {
        let data = serialize(record)?;
        self.store
            .insert(ATTENDANCE, record.registration_id.to_string(), data)
            .await
    }

    /// Fetch the audit row for a registration, if one exists
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<Option<AttendanceRecord>, DocumentStoreError> {
        match self.store.get(ATTENDANCE, registration_id.to_string()).await? {
            Some(document) => Ok(Some(document.parse()?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for AttendanceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceLog").finish_non_exhaustive()
    }
}
