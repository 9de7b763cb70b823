//! Live read streams for attendance dashboards.
//!
//! These are independent long-lived observers over the store's
//! subscriptions. They feed downstream display only and have no interaction
//! with the commit path's correctness.

use crate::registry::{RegistrationWatch, Registrations};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use turnstile_core::store::DocumentStoreError;
use turnstile_core::types::{EventId, Registration};

/// Headcount for one event at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttendanceSummary {
    /// Registrations for the event
    pub total: usize,
    /// Registrations already scanned in
    pub attended: usize,
}

impl AttendanceSummary {
    /// Derive the summary from a registration snapshot.
    #[must_use]
    pub fn of(registrations: &[Registration]) -> Self {
        Self {
            total: registrations.len(),
            attended: registrations.iter().filter(|r| r.has_attended).count(),
        }
    }

    /// Whether everyone registered has been scanned in
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.attended == self.total
    }
}

/// Live stream of [`AttendanceSummary`] values for one event.
///
/// Yields an initial summary, then one per matching store mutation.
pub struct AttendanceSummaryWatch {
    inner: RegistrationWatch,
}

impl AttendanceSummaryWatch {
    /// Explicitly unsubscribe
    pub fn cancel(self) {
        self.inner.cancel();
    }
}

impl Stream for AttendanceSummaryWatch {
    type Item = Result<AttendanceSummary, DocumentStoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.get_mut().inner).poll_next(cx) {
            Poll::Ready(Some(Ok(registrations))) => {
                Poll::Ready(Some(Ok(AttendanceSummary::of(&registrations))))
            },
            Poll::Ready(Some(Err(error))) => Poll::Ready(Some(Err(error))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for AttendanceSummaryWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceSummaryWatch").finish_non_exhaustive()
    }
}

/// Open a live headcount stream for an event.
#[must_use]
pub fn watch_attendance_summary(
    registrations: &Registrations,
    event_id: &EventId,
) -> AttendanceSummaryWatch {
    AttendanceSummaryWatch {
        inner: registrations.watch_event(event_id),
    }
}
