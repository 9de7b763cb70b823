//! The scan session state machine.
//!
//! Drives the user-facing scan flow: `Idle → Validating → Success/Failed`,
//! with every failure recoverable via reset. The reducer is a pure
//! transition function; the validator and committer run as effects and feed
//! their completions back as actions.
//!
//! ## Supersession
//!
//! The session is single-flight: a new scan while one is validating
//! restarts processing and the last scan wins. In-flight store calls are
//! not cancelled; instead every effect carries the `generation` it was
//! started under, and completions from a stale generation are discarded
//! without touching state. Both a new scan and a reset advance the
//! generation, so a late result can never land in a session that has moved
//! on.

use crate::commit::commit;
use crate::registry::{AttendanceLog, Registrations};
use crate::validate::validate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use turnstile_core::environment::Clock;
use turnstile_core::store::DocumentStore;
use turnstile_core::types::RegistrationId;
use turnstile_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use turnstile_runtime::{EffectHandle, Store, StoreError};

// ============================================================================
// State
// ============================================================================

/// Where the session currently is in the scan flow.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ScanPhase {
    /// Waiting for a scan
    #[default]
    Idle,
    /// A scan is being validated (or committed)
    Validating,
    /// The last scan was admitted and committed
    Success,
    /// The last scan was rejected, with the single reason shown to the user
    Failed(String),
}

impl ScanPhase {
    /// Waiting for a scan
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Processing a scan
    #[must_use]
    pub const fn is_validating(&self) -> bool {
        matches!(self, Self::Validating)
    }

    /// Terminal for the current scan (success or failure)
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Failed(_))
    }
}

/// Transient, client-side session state.
///
/// Created on scanner screen entry, mutated per scan, reset on explicit
/// user reset or when the screen is left. Owned exclusively by the session
/// store; the UI observes snapshots.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ScanSessionState {
    /// Current phase of the flow
    pub phase: ScanPhase,
    /// Raw payload of the most recent scan
    pub last_scanned: Option<String>,
    /// Reason for the most recent failure, if any
    pub last_error: Option<String>,
    /// Whether the most recent scan succeeded
    pub success: bool,
    /// Supersession counter; advanced by every scan and every reset
    pub generation: u64,
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the scan session.
///
/// Commands come from the UI surface; completions are fed back by the
/// validate and commit effects, tagged with the generation they were
/// started under.
#[derive(Clone, Debug)]
pub enum ScanAction {
    /// A raw payload was scanned
    TokenScanned {
        /// The raw scanned string
        raw: String,
    },

    /// Return to `Idle`, clearing error and success state
    Reset,

    /// The validator admitted the scan
    ValidationPassed {
        /// Generation the validate effect was started under
        generation: u64,
        /// The registration to commit
        registration_id: RegistrationId,
    },

    /// The validator rejected the scan
    ValidationFailed {
        /// Generation the validate effect was started under
        generation: u64,
        /// The single human-readable reason
        reason: String,
    },

    /// The committer finished the one-time transition
    CommitSucceeded {
        /// Generation the commit effect was started under
        generation: u64,
        /// The registration that was checked in
        registration_id: RegistrationId,
    },

    /// The committer failed; nothing was reported as success
    CommitFailed {
        /// Generation the commit effect was started under
        generation: u64,
        /// The single human-readable reason
        reason: String,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies for the scan session.
#[derive(Clone)]
pub struct ScanEnvironment {
    /// Typed access to the registrations collection
    pub registrations: Registrations,
    /// Typed access to the attendance audit collection
    pub attendance: AttendanceLog,
    /// Clock stamping the commit instant
    pub clock: Arc<dyn Clock>,
}

impl ScanEnvironment {
    /// Build an environment over one store handle.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registrations: Registrations::new(Arc::clone(&store)),
            attendance: AttendanceLog::new(store),
            clock,
        }
    }
}

impl std::fmt::Debug for ScanEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEnvironment").finish_non_exhaustive()
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the scan session.
///
/// Pure transitions only: validation and commit run as [`Effect::Future`]s
/// whose completions re-enter `reduce` as actions. Within one scan the
/// validator always completes and is observed before the commit effect is
/// even created - the sequencing lives in the feedback loop, not in any
/// await.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanReducer;

impl ScanReducer {
    /// Creates a new `ScanReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Drop a completion whose generation is no longer current.
    fn discard_stale(
        completion: &str,
        generation: u64,
        current: u64,
    ) -> SmallVec<[Effect<ScanAction>; 4]> {
        tracing::debug!(
            completion,
            generation,
            current,
            "discarding completion from superseded scan"
        );
        metrics::counter!("scan.completions.stale").increment(1);
        SmallVec::new()
    }
}

impl Reducer for ScanReducer {
    type State = ScanSessionState;
    type Action = ScanAction;
    type Environment = ScanEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Scan (from any phase; last scan wins) ==========
            ScanAction::TokenScanned { raw } => {
                state.generation += 1;
                state.phase = ScanPhase::Validating;
                state.last_scanned = Some(raw.clone());
                state.last_error = None;
                state.success = false;

                let generation = state.generation;
                let registrations = env.registrations.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    Some(match validate(&registrations, &raw).await {
                        Ok(registration) => ScanAction::ValidationPassed {
                            generation,
                            registration_id: registration.id,
                        },
                        Err(error) => ScanAction::ValidationFailed {
                            generation,
                            reason: error.reason(),
                        },
                    })
                }))]
            },

            // ========== Validation admitted: dispatch the commit ==========
            ScanAction::ValidationPassed {
                generation,
                registration_id,
            } => {
                if generation != state.generation {
                    return Self::discard_stale("validation", generation, state.generation);
                }

                // Phase stays Validating while the commit is in flight.
                let registrations = env.registrations.clone();
                let attendance = env.attendance.clone();
                let clock = Arc::clone(&env.clock);

                smallvec![Effect::Future(Box::pin(async move {
                    Some(
                        match commit(&registrations, &attendance, clock.as_ref(), &registration_id)
                            .await
                        {
                            Ok(receipt) => ScanAction::CommitSucceeded {
                                generation,
                                registration_id: receipt.registration_id,
                            },
                            Err(error) => ScanAction::CommitFailed {
                                generation,
                                reason: error.reason(),
                            },
                        },
                    )
                }))]
            },

            // ========== Rejections (validator or committer) ==========
            ScanAction::ValidationFailed { generation, reason }
            | ScanAction::CommitFailed { generation, reason } => {
                if generation != state.generation {
                    return Self::discard_stale("failure", generation, state.generation);
                }

                state.phase = ScanPhase::Failed(reason.clone());
                state.last_error = Some(reason);
                state.success = false;
                SmallVec::new()
            },

            // ========== Committed ==========
            ScanAction::CommitSucceeded { generation, .. } => {
                if generation != state.generation {
                    return Self::discard_stale("commit", generation, state.generation);
                }

                state.phase = ScanPhase::Success;
                state.last_error = None;
                state.success = true;
                SmallVec::new()
            },

            // ========== Reset (from any phase) ==========
            ScanAction::Reset => {
                *state = ScanSessionState {
                    generation: state.generation + 1,
                    ..ScanSessionState::default()
                };
                SmallVec::new()
            },
        }
    }
}

// ============================================================================
// Session facade
// ============================================================================

/// The session store type driving one scan screen.
pub type ScanStore = Store<ScanSessionState, ScanAction, ScanEnvironment, ScanReducer>;

/// UI-facing handle to a scan session.
///
/// Exposes exactly the surface the scan screen needs: feed it raw scans,
/// reset it, and observe the session value stream.
pub struct ScanSessionHandle {
    store: ScanStore,
}

impl ScanSessionHandle {
    /// Create a session in `Idle`
    #[must_use]
    pub fn new(env: ScanEnvironment) -> Self {
        Self {
            store: Store::new(ScanSessionState::default(), ScanReducer::new(), env),
        }
    }

    /// Feed a raw scanned payload into the session
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn on_token_scanned(
        &self,
        raw: impl Into<String>,
    ) -> Result<EffectHandle, StoreError> {
        self.store
            .send(ScanAction::TokenScanned { raw: raw.into() })
            .await
    }

    /// Reset the session to `Idle`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn reset_session(&self) -> Result<EffectHandle, StoreError> {
        self.store.send(ScanAction::Reset).await
    }

    /// Snapshot of the current session state
    pub async fn session(&self) -> ScanSessionState {
        self.store.state(|state| state.clone()).await
    }

    /// Observe session snapshots, one per processed action
    #[must_use]
    pub fn watch_sessions(&self) -> watch::Receiver<ScanSessionState> {
        self.store.watch_states()
    }

    /// Scan and wait until the session settles (success or failure).
    ///
    /// Convenience for tests and tools; interactive UIs observe
    /// [`watch_sessions`](Self::watch_sessions) instead.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: the scan did not settle in time
    /// - [`StoreError::ChannelClosed`]: the session store went away
    /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
    pub async fn scan_to_completion(
        &self,
        raw: impl Into<String>,
        timeout: Duration,
    ) -> Result<ScanSessionState, StoreError> {
        let _handle = self
            .store
            .send(ScanAction::TokenScanned { raw: raw.into() })
            .await?;

        // Subscribe after the send: the watch holds the latest snapshot,
        // which at this point is the Validating state of this scan (or
        // already its terminal state).
        let mut states = self.store.watch_states();

        let wait = async move {
            loop {
                {
                    let state = states.borrow_and_update();
                    if state.phase.is_settled() {
                        return Ok(state.clone());
                    }
                }
                if states.changed().await.is_err() {
                    return Err(StoreError::ChannelClosed);
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Tear the session down, waiting for in-flight effects
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects outlive the
    /// timeout.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }

    /// The underlying session store, for advanced wiring
    #[must_use]
    pub const fn store(&self) -> &ScanStore {
        &self.store
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use turnstile_testing::{MemoryDocumentStore, ReducerTest, assertions, test_clock};

    fn test_env() -> ScanEnvironment {
        ScanEnvironment::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(test_clock()),
        )
    }

    fn validating_state(generation: u64, raw: &str) -> ScanSessionState {
        ScanSessionState {
            phase: ScanPhase::Validating,
            last_scanned: Some(raw.to_string()),
            last_error: None,
            success: false,
            generation,
        }
    }

    #[test]
    fn scan_enters_validating_and_spawns_validation() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(ScanSessionState::default())
            .when_action(ScanAction::TokenScanned {
                raw: "event:E|reg:R|1".to_string(),
            })
            .then_state(|state| {
                assert!(state.phase.is_validating());
                assert_eq!(state.last_scanned.as_deref(), Some("event:E|reg:R|1"));
                assert_eq!(state.last_error, None);
                assert!(!state.success);
                assert_eq!(state.generation, 1);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn scan_clears_previous_failure_state() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(ScanSessionState {
                phase: ScanPhase::Failed("already scanned".to_string()),
                last_scanned: Some("old".to_string()),
                last_error: Some("already scanned".to_string()),
                success: false,
                generation: 3,
            })
            .when_action(ScanAction::TokenScanned {
                raw: "new".to_string(),
            })
            .then_state(|state| {
                assert!(state.phase.is_validating());
                assert_eq!(state.last_scanned.as_deref(), Some("new"));
                assert_eq!(state.last_error, None);
                assert_eq!(state.generation, 4);
            })
            .run();
    }

    #[test]
    fn rescan_while_validating_restarts_with_new_token() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(1, "first"))
            .when_action(ScanAction::TokenScanned {
                raw: "second".to_string(),
            })
            .then_state(|state| {
                // Last scan wins; the in-flight first scan is now stale.
                assert!(state.phase.is_validating());
                assert_eq!(state.last_scanned.as_deref(), Some("second"));
                assert_eq!(state.generation, 2);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn validation_passed_dispatches_commit() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(1, "tok"))
            .when_action(ScanAction::ValidationPassed {
                generation: 1,
                registration_id: turnstile_core::types::RegistrationId::new("reg-1"),
            })
            .then_state(|state| {
                // Still validating from the UI's perspective until the
                // commit lands.
                assert!(state.phase.is_validating());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn stale_validation_pass_is_discarded_without_commit() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(2, "second"))
            .when_action(ScanAction::ValidationPassed {
                generation: 1,
                registration_id: turnstile_core::types::RegistrationId::new("reg-1"),
            })
            .then_state(|state| {
                assert_eq!(state, &validating_state(2, "second"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn validation_failure_reports_the_reason() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(1, "tok"))
            .when_action(ScanAction::ValidationFailed {
                generation: 1,
                reason: "malformed token".to_string(),
            })
            .then_state(|state| {
                assert_eq!(
                    state.phase,
                    ScanPhase::Failed("malformed token".to_string())
                );
                assert_eq!(state.last_error.as_deref(), Some("malformed token"));
                assert!(!state.success);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn stale_validation_failure_is_discarded() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(5, "current"))
            .when_action(ScanAction::ValidationFailed {
                generation: 4,
                reason: "registration not found".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state, &validating_state(5, "current"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn commit_success_settles_the_session() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(1, "tok"))
            .when_action(ScanAction::CommitSucceeded {
                generation: 1,
                registration_id: turnstile_core::types::RegistrationId::new("reg-1"),
            })
            .then_state(|state| {
                assert_eq!(state.phase, ScanPhase::Success);
                assert!(state.success);
                assert_eq!(state.last_error, None);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn commit_failure_settles_with_the_store_reason() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(validating_state(1, "tok"))
            .when_action(ScanAction::CommitFailed {
                generation: 1,
                reason: "store failure: backend error: offline".to_string(),
            })
            .then_state(|state| {
                assert_eq!(
                    state.phase,
                    ScanPhase::Failed("store failure: backend error: offline".to_string())
                );
                assert!(!state.success);
            })
            .run();
    }

    #[test]
    fn stale_commit_result_cannot_touch_a_reset_session() {
        // A reset advanced the generation while a commit was in flight;
        // its late success must not resurrect the old scan.
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(ScanSessionState {
                generation: 2,
                ..ScanSessionState::default()
            })
            .when_action(ScanAction::CommitSucceeded {
                generation: 1,
                registration_id: turnstile_core::types::RegistrationId::new("reg-1"),
            })
            .then_state(|state| {
                assert!(state.phase.is_idle());
                assert!(!state.success);
                assert_eq!(state.generation, 2);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn reset_returns_to_idle_and_advances_generation() {
        ReducerTest::new(ScanReducer::new())
            .with_env(test_env())
            .given_state(ScanSessionState {
                phase: ScanPhase::Failed("token mismatch".to_string()),
                last_scanned: Some("tok".to_string()),
                last_error: Some("token mismatch".to_string()),
                success: false,
                generation: 7,
            })
            .when_action(ScanAction::Reset)
            .then_state(|state| {
                assert!(state.phase.is_idle());
                assert_eq!(state.last_scanned, None);
                assert_eq!(state.last_error, None);
                assert!(!state.success);
                assert_eq!(state.generation, 8);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
