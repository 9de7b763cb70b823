//! Domain records for event registration and attendance.
//!
//! This module defines strong identifier types and the two store-owned
//! records the check-in flow revolves around: [`Registration`] and
//! [`AttendanceRecord`]. The client only ever holds transient,
//! non-authoritative copies of these; the remote document store owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an event.
///
/// Event ids are assigned by the store and are opaque strings
/// (e.g. `"EVT1"`, `"spring-gala-2025"`).
///
/// # Examples
///
/// ```
/// use turnstile_core::types::EventId;
///
/// let id = EventId::new("EVT1");
/// assert_eq!(id.as_str(), "EVT1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Create a new `EventId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the event id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `EventId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a registration.
///
/// Registration ids double as document ids in the store and as the value
/// carried in the second field of the QR token. They are minted client-side
/// via [`IdGenerator`](crate::environment::IdGenerator) at creation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Create a new `RegistrationId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the registration id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `RegistrationId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RegistrationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RegistrationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RegistrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a student within the registering institution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(String);

impl StudentId {
    /// Create a new `StudentId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the student id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One attendee's signup for one event.
///
/// Field names serialize in camelCase, matching the wire format of the
/// remote document store.
///
/// # Invariants
///
/// - `qr_code_data` is set exactly once at creation and never recomputed;
///   it uniquely encodes (event id, registration id, creation instant).
/// - `has_attended` is monotonic: it only ever transitions false → true.
/// - `attended_at` is set exactly once, at the instant `has_attended`
///   transitions to true.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Document id (unique within the registrations collection)
    pub id: RegistrationId,
    /// The event this registration belongs to
    pub event_id: EventId,
    /// Attendee display name
    pub name: String,
    /// Attendee contact email
    pub email: String,
    /// Attendee student number
    pub student_id: StudentId,
    /// The QR token issued at creation, stored verbatim
    pub qr_code_data: String,
    /// Whether this registration has been scanned in
    pub has_attended: bool,
    /// When the registration was created
    pub created_at: DateTime<Utc>,
    /// When the registration was scanned in, if it has been
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attended_at: Option<DateTime<Utc>>,
}

/// Audit row recording a single check-in.
///
/// The record's document id equals the registration id (one-to-one), which
/// makes retried writes naturally deduplicating. It exists independently of
/// the mutable `has_attended` flag on [`Registration`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// The registration that was checked in
    pub registration_id: RegistrationId,
    /// When the check-in was committed
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_registration() -> Registration {
        Registration {
            id: RegistrationId::new("reg-1"),
            event_id: EventId::new("EVT1"),
            name: "Thandi M".to_string(),
            email: "thandi@example.com".to_string(),
            student_id: StudentId::new("S42"),
            qr_code_data: "event:EVT1|reg:reg-1|100".to_string(),
            has_attended: false,
            created_at: Utc.timestamp_millis_opt(100).unwrap(),
            attended_at: None,
        }
    }

    #[test]
    fn registration_serializes_camel_case() {
        let json = serde_json::to_value(sample_registration()).unwrap();
        assert_eq!(json["eventId"], "EVT1");
        assert_eq!(json["studentId"], "S42");
        assert_eq!(json["qrCodeData"], "event:EVT1|reg:reg-1|100");
        assert_eq!(json["hasAttended"], false);
        assert!(json.get("attendedAt").is_none());
    }

    #[test]
    fn registration_round_trips() {
        let registration = sample_registration();
        let json = serde_json::to_value(&registration).unwrap();
        let back: Registration = serde_json::from_value(json).unwrap();
        assert_eq!(back, registration);
    }

    #[test]
    fn attendance_record_serializes_camel_case() {
        let record = AttendanceRecord {
            registration_id: RegistrationId::new("reg-1"),
            timestamp: Utc.timestamp_millis_opt(200).unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["registrationId"], "reg-1");
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn ids_display_as_inner_string() {
        assert_eq!(format!("{}", EventId::new("EVT1")), "EVT1");
        assert_eq!(format!("{}", RegistrationId::new("reg-9")), "reg-9");
        assert_eq!(format!("{}", StudentId::new("S42")), "S42");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_value(EventId::new("EVT1")).unwrap();
        assert_eq!(json, serde_json::Value::String("EVT1".to_string()));
    }
}
