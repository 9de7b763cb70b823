//! The attendance committer.
//!
//! Performs the one-time transition to "attended": two writes, applied in a
//! fixed order because the store gives no cross-write atomicity. The
//! registration flag goes first - it is the authoritative guard the
//! validator reads - and the audit row second, keyed by the registration id
//! so a retried write overwrites identical content instead of duplicating.
//!
//! The committer does not re-validate: callers must hold a fresh `Valid`
//! result from the same logical scan.

use crate::registry::{AttendanceLog, Registrations};
use turnstile_core::environment::Clock;
use turnstile_core::error::ScanError;
use turnstile_core::types::{AttendanceRecord, RegistrationId};
use turnstile_core::{DateTime, Utc};

/// Proof of a completed commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReceipt {
    /// The registration that was checked in
    pub registration_id: RegistrationId,
    /// The instant stamped on both writes
    pub attended_at: DateTime<Utc>,
}

/// Mark a registration attended and write its audit row.
///
/// No partial state is reported as success: the receipt is only returned
/// once both writes have landed. If the audit write fails after the flag
/// update, the error surfaces and the flag stays set - the flag is the
/// guard the validator consults, and the audit write converges on retry.
///
/// # Errors
///
/// [`ScanError::Store`] on any store failure, wrapping the underlying
/// detail.
pub async fn commit(
    registrations: &Registrations,
    attendance: &AttendanceLog,
    clock: &dyn Clock,
    registration_id: &RegistrationId,
) -> Result<CommitReceipt, ScanError> {
    let attended_at = clock.now();

    // Authoritative guard first: if this write fails, nothing observable
    // has changed and the scan can simply be retried.
    registrations
        .mark_attended(registration_id, attended_at)
        .await?;

    let record = AttendanceRecord {
        registration_id: registration_id.clone(),
        timestamp: attended_at,
    };

    if let Err(error) = attendance.record(&record).await {
        tracing::warn!(
            %registration_id,
            %error,
            "audit write failed after flag update; retry will converge"
        );
        return Err(error.into());
    }

    tracing::info!(%registration_id, "attendance committed");

    Ok(CommitReceipt {
        registration_id: registration_id.clone(),
        attended_at,
    })
}
