//! The attendance validator.
//!
//! Decides whether a scanned token admits its registration. The check
//! ordering is load-bearing: replay is detected before content equality so
//! that a replayed *valid* token reads as "already scanned" rather than a
//! generic mismatch.

use crate::registry::Registrations;
use turnstile_core::error::ScanError;
use turnstile_core::token::{self, TokenFormatError};
use turnstile_core::types::Registration;

/// Validate a scanned token against stored registration state.
///
/// Steps, in order:
/// 1. Decode the payload (field count, `reg:` tag) - no store access
/// 2. Check the `event:` tag the codec deliberately leaves to us - still
///    no store access
/// 3. Fetch the registration named by the second field
/// 4. Reject if already attended (anti-replay, before equality)
/// 5. Reject if the presented token is not byte-for-byte the stored one
///
/// Returns the registration so the caller can commit without a second
/// fetch.
///
/// # Errors
///
/// One [`ScanError`] per rejection reason; see the ordering above.
pub async fn validate(
    registrations: &Registrations,
    raw: &str,
) -> Result<Registration, ScanError> {
    let decoded = token::decode(raw)?;

    if !decoded.has_event_tag() {
        tracing::debug!("rejecting token without event tag");
        return Err(TokenFormatError::MissingEventTag.into());
    }

    let registration_id = decoded.registration_id();

    let Some(registration) = registrations.get(&registration_id).await? else {
        tracing::debug!(%registration_id, "registration not found");
        return Err(ScanError::NotFound);
    };

    if registration.has_attended {
        tracing::debug!(%registration_id, "replay detected");
        return Err(ScanError::Replay);
    }

    if registration.qr_code_data != raw {
        tracing::debug!(%registration_id, "presented token does not match stored token");
        return Err(ScanError::Mismatch);
    }

    Ok(registration)
}
