//! The QR payload codec.
//!
//! A token is the pipe-delimited string encoded into the QR code, binding an
//! event, a registration, and a creation instant:
//!
//! ```text
//! event:<eventId>|reg:<registrationId>|<creationEpochMillis>
//! ```
//!
//! Decoding is a pure parse - it never touches the store. The codec is
//! deliberately lenient about the first field: only the field count and the
//! `reg:` tag on the second field are checked here, while the `event:` tag is
//! the validator's first concern. That split keeps the codec a format parser
//! and leaves semantic shape to validation.

use crate::types::{EventId, RegistrationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal tag prefixing the event field
pub const EVENT_TAG: &str = "event:";

/// Literal tag prefixing the registration field
pub const REGISTRATION_TAG: &str = "reg:";

const FIELD_SEPARATOR: char = '|';

/// Error type for token decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenFormatError {
    /// The payload did not split into exactly three `|`-separated fields.
    #[error("expected 3 '|'-separated fields, found {0}")]
    FieldCount(usize),

    /// The second field did not carry the `reg:` tag.
    #[error("second field must start with '{REGISTRATION_TAG}'")]
    MissingRegistrationTag,

    /// The first field did not carry the `event:` tag.
    ///
    /// Never produced by [`decode`] - the validator raises it when it
    /// checks the event field of an otherwise well-formed token.
    #[error("first field must start with '{EVENT_TAG}'")]
    MissingEventTag,
}

/// A token split into its three raw fields.
///
/// The third field is opaque to the codec: it is carried through for
/// byte-for-byte comparison against the stored token, never interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedToken {
    /// First field, expected (but not required here) to be `event:<id>`
    pub event_field: String,
    /// Second field, guaranteed to start with `reg:`
    pub registration_field: String,
    /// Third field, opaque (the creation instant in practice)
    pub rest: String,
}

impl DecodedToken {
    /// The registration id carried after the `reg:` tag.
    #[must_use]
    pub fn registration_id(&self) -> RegistrationId {
        RegistrationId::new(
            self.registration_field
                .strip_prefix(REGISTRATION_TAG)
                .unwrap_or_default(),
        )
    }

    /// Whether the first field carries the `event:` tag.
    #[must_use]
    pub fn has_event_tag(&self) -> bool {
        self.event_field.starts_with(EVENT_TAG)
    }

    /// The event id carried after the `event:` tag, if the tag is present.
    #[must_use]
    pub fn event_id(&self) -> Option<EventId> {
        self.event_field
            .strip_prefix(EVENT_TAG)
            .map(EventId::new)
    }
}

/// Encode a registration into its QR payload.
///
/// Called exactly once per registration, at creation time; the result is
/// stored as `qr_code_data` and never recomputed.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use turnstile_core::token::encode;
/// use turnstile_core::types::{EventId, RegistrationId};
///
/// let token = encode(
///     &EventId::new("EVT1"),
///     &RegistrationId::new("reg-7"),
///     Utc.timestamp_millis_opt(1700000000000).unwrap(),
/// );
/// assert_eq!(token, "event:EVT1|reg:reg-7|1700000000000");
/// ```
#[must_use]
pub fn encode(
    event_id: &EventId,
    registration_id: &RegistrationId,
    created_at: DateTime<Utc>,
) -> String {
    format!(
        "{EVENT_TAG}{event_id}{FIELD_SEPARATOR}{REGISTRATION_TAG}{registration_id}{FIELD_SEPARATOR}{}",
        created_at.timestamp_millis()
    )
}

/// Decode a raw scanned payload into its three fields.
///
/// # Errors
///
/// - [`TokenFormatError::FieldCount`] when the payload does not split into
///   exactly three fields
/// - [`TokenFormatError::MissingRegistrationTag`] when the second field
///   lacks the `reg:` tag
pub fn decode(raw: &str) -> Result<DecodedToken, TokenFormatError> {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();

    let [event_field, registration_field, rest] = fields.as_slice() else {
        return Err(TokenFormatError::FieldCount(fields.len()));
    };

    if !registration_field.starts_with(REGISTRATION_TAG) {
        return Err(TokenFormatError::MissingRegistrationTag);
    }

    Ok(DecodedToken {
        event_field: (*event_field).to_string(),
        registration_field: (*registration_field).to_string(),
        rest: (*rest).to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encode_produces_wire_format() {
        let token = encode(
            &EventId::new("EVT1"),
            &RegistrationId::new("abc"),
            Utc.timestamp_millis_opt(100).unwrap(),
        );
        assert_eq!(token, "event:EVT1|reg:abc|100");
    }

    #[test]
    fn decode_round_trips_encode() {
        let event_id = EventId::new("EVT1");
        let registration_id = RegistrationId::new("reg-42");
        let created_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let decoded = decode(&encode(&event_id, &registration_id, created_at)).unwrap();

        assert_eq!(decoded.event_id(), Some(event_id));
        assert_eq!(decoded.registration_id(), registration_id);
        assert_eq!(decoded.rest, "1700000000000");
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        assert_eq!(decode("garbage"), Err(TokenFormatError::FieldCount(1)));
        assert_eq!(
            decode("event:E|reg:R"),
            Err(TokenFormatError::FieldCount(2))
        );
        assert_eq!(
            decode("event:E|reg:R|100|extra"),
            Err(TokenFormatError::FieldCount(4))
        );
    }

    #[test]
    fn decode_rejects_missing_registration_tag() {
        assert_eq!(
            decode("event:E|registration:R|100"),
            Err(TokenFormatError::MissingRegistrationTag)
        );
        assert_eq!(
            decode("event:E||100"),
            Err(TokenFormatError::MissingRegistrationTag)
        );
    }

    #[test]
    fn decode_is_lenient_about_event_tag() {
        // The event: tag is checked at validation time, not here.
        let decoded = decode("evnt:E|reg:R|100").unwrap();
        assert!(!decoded.has_event_tag());
        assert_eq!(decoded.event_id(), None);
        assert_eq!(decoded.registration_id(), RegistrationId::new("R"));
    }

    #[test]
    fn decode_treats_rest_as_opaque() {
        // Non-numeric third field still decodes; only validation compares
        // the full token against the stored one.
        let decoded = decode("event:E|reg:R|not-a-timestamp").unwrap();
        assert_eq!(decoded.rest, "not-a-timestamp");
    }

    #[test]
    fn empty_payload_is_one_empty_field() {
        assert_eq!(decode(""), Err(TokenFormatError::FieldCount(1)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip(
                event in "[A-Za-z0-9_-]{1,24}",
                registration in "[A-Za-z0-9_-]{1,36}",
                millis in 0_i64..4_102_444_800_000,
            ) {
                let event_id = EventId::new(event);
                let registration_id = RegistrationId::new(registration);
                let created_at = Utc.timestamp_millis_opt(millis).unwrap();

                let decoded =
                    decode(&encode(&event_id, &registration_id, created_at)).unwrap();

                prop_assert_eq!(decoded.event_id(), Some(event_id));
                prop_assert_eq!(decoded.registration_id(), registration_id);
                prop_assert_eq!(decoded.rest, millis.to_string());
            }
        }
    }
}
