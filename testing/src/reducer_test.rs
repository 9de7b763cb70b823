//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable
//! Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use turnstile_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use turnstile_testing::ReducerTest;
///
/// ReducerTest::new(ScanReducer)
///     .with_env(test_environment())
///     .given_state(ScanSessionState::default())
///     .when_action(ScanAction::Reset)
///     .then_state(|state| {
///         assert!(state.phase.is_idle());
///     })
///     .then_effects(|effects| {
///         assert!(effects.is_empty());
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        // Execute reducer
        let effects = self.reducer.reduce(&mut state, action, &env);

        // Run state assertions
        for assertion in self.state_assertions {
            assertion(&state);
        }

        // Run effect assertions
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use turnstile_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::environment::Clock;
    use turnstile_core::types::RegistrationId;
    use turnstile_core::{DateTime, SmallVec, Utc, smallvec};

    /// A door tally: the minimal turnstile-shaped reducer, enough to
    /// exercise the harness without pulling in the full scan session
    /// (which lives above this crate and tests itself with this harness).
    #[derive(Clone, Debug, Default)]
    struct TallyState {
        admitted: Vec<RegistrationId>,
        rejected: u32,
        last_admitted_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug)]
    enum TallyAction {
        Admitted { registration_id: RegistrationId },
        Rejected,
    }

    struct TallyReducer;

    struct TallyEnvironment {
        clock: crate::FixedClock,
    }

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Action = TallyAction;
        type Environment = TallyEnvironment;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TallyAction::Admitted { registration_id } => {
                    state.admitted.push(registration_id);
                    state.last_admitted_at = Some(env.clock.now());
                    smallvec![Effect::None]
                },
                TallyAction::Rejected => {
                    state.rejected += 1;
                    smallvec![Effect::None]
                },
            }
        }
    }

    fn tally_env() -> TallyEnvironment {
        TallyEnvironment {
            clock: crate::test_clock(),
        }
    }

    #[test]
    fn admission_is_recorded_with_the_clock_instant() {
        ReducerTest::new(TallyReducer)
            .with_env(tally_env())
            .given_state(TallyState::default())
            .when_action(TallyAction::Admitted {
                registration_id: RegistrationId::new("reg-1"),
            })
            .then_state(|state| {
                assert_eq!(state.admitted, vec![RegistrationId::new("reg-1")]);
                assert_eq!(state.last_admitted_at, Some(crate::test_clock().now()));
                assert_eq!(state.rejected, 0);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn rejection_only_bumps_the_counter() {
        ReducerTest::new(TallyReducer)
            .with_env(tally_env())
            .given_state(TallyState {
                rejected: 2,
                ..TallyState::default()
            })
            .when_action(TallyAction::Rejected)
            .then_state(|state| {
                assert_eq!(state.rejected, 3);
                assert!(state.admitted.is_empty());
                assert_eq!(state.last_admitted_at, None);
            })
            .run();
    }

    #[test]
    fn no_effects_assertion_accepts_empty_and_noop() {
        assertions::assert_no_effects::<TallyAction>(&[Effect::None]);
        assertions::assert_no_effects::<TallyAction>(&[]);
    }

    #[test]
    fn effects_count_assertion_counts_the_slice() {
        assertions::assert_effects_count(&[Effect::<TallyAction>::None], 1);
        assertions::assert_effects_count::<TallyAction>(&[], 0);
    }
}
