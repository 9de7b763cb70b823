//! Registration creation.
//!
//! Issues the QR token exactly once: the token is encoded from the freshly
//! minted registration id and the creation instant, stored as
//! `qrCodeData`, and never recomputed afterwards.

use crate::registry::Registrations;
use thiserror::Error;
use turnstile_core::environment::{Clock, IdGenerator};
use turnstile_core::store::DocumentStoreError;
use turnstile_core::token;
use turnstile_core::types::{EventId, Registration, RegistrationId, StudentId};

/// Why a signup was refused.
#[derive(Error, Debug)]
pub enum RegisterError {
    /// The student already holds a registration for this event.
    ///
    /// One registration means one token and one admission; allowing
    /// duplicates would hand the same attendee two valid tokens.
    #[error("already registered for this event")]
    AlreadyRegistered,

    /// Transport or backend failure.
    #[error(transparent)]
    Store(#[from] DocumentStoreError),
}

/// Signup details supplied by the attendee.
#[derive(Clone, Debug)]
pub struct NewRegistration {
    /// The event being signed up for
    pub event_id: EventId,
    /// Attendee display name
    pub name: String,
    /// Attendee contact email
    pub email: String,
    /// Attendee student number
    pub student_id: StudentId,
}

/// Create a registration and issue its token.
///
/// The registration id is minted client-side and doubles as the document
/// id; the token binds (event, registration, creation instant) and is
/// stored verbatim for later byte-for-byte validation.
///
/// # Errors
///
/// - [`RegisterError::AlreadyRegistered`] for a duplicate
///   (event, student) pair
/// - [`RegisterError::Store`] on any store failure
pub async fn register(
    registrations: &Registrations,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    input: NewRegistration,
) -> Result<Registration, RegisterError> {
    if registrations
        .find_by_student(&input.event_id, &input.student_id)
        .await?
        .is_some()
    {
        tracing::debug!(
            event_id = %input.event_id,
            student_id = %input.student_id,
            "refusing duplicate signup"
        );
        return Err(RegisterError::AlreadyRegistered);
    }

    let id = RegistrationId::new(ids.new_id());
    let created_at = clock.now();
    let qr_code_data = token::encode(&input.event_id, &id, created_at);

    let registration = Registration {
        id,
        event_id: input.event_id,
        name: input.name,
        email: input.email,
        student_id: input.student_id,
        qr_code_data,
        has_attended: false,
        created_at,
        attended_at: None,
    };

    registrations.insert(&registration).await?;

    tracing::info!(
        registration_id = %registration.id,
        event_id = %registration.event_id,
        "registration created"
    );

    Ok(registration)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use turnstile_core::environment::Clock;
    use turnstile_testing::{MemoryDocumentStore, SequentialIdGenerator, test_clock};

    fn signup(event: &str, student: &str) -> NewRegistration {
        NewRegistration {
            event_id: EventId::new(event),
            name: "Sam Nkosi".to_string(),
            email: "sam@example.com".to_string(),
            student_id: StudentId::new(student),
        }
    }

    #[tokio::test]
    async fn register_issues_token_in_wire_format() {
        let registrations = Registrations::new(Arc::new(MemoryDocumentStore::new()));
        let ids = SequentialIdGenerator::default();
        let clock = test_clock();

        let registration = register(&registrations, &ids, &clock, signup("EVT1", "S42"))
            .await
            .unwrap();

        let millis = clock.now().timestamp_millis();
        assert_eq!(
            registration.qr_code_data,
            format!("event:EVT1|reg:reg-1|{millis}")
        );
        assert!(!registration.has_attended);
        assert!(registration.attended_at.is_none());

        // Stored verbatim under its own id.
        let stored = registrations.get(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored, registration);
    }

    #[tokio::test]
    async fn duplicate_signup_is_refused() {
        let registrations = Registrations::new(Arc::new(MemoryDocumentStore::new()));
        let ids = SequentialIdGenerator::default();
        let clock = test_clock();

        register(&registrations, &ids, &clock, signup("EVT1", "S42"))
            .await
            .unwrap();

        let second = register(&registrations, &ids, &clock, signup("EVT1", "S42")).await;
        assert!(matches!(second, Err(RegisterError::AlreadyRegistered)));

        // Same student, different event, is a fresh signup.
        register(&registrations, &ids, &clock, signup("EVT2", "S42"))
            .await
            .unwrap();
    }
}
