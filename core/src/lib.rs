//! # Turnstile Core
//!
//! Core types and abstractions for the Turnstile check-in flow.
//!
//! Turnstile is the attendance-validation core of an event check-in client:
//! attendees register for an event and receive a QR token; at the door the
//! token is scanned, validated against the remote document store, and the
//! registration is transitioned from "registered" to "attended" exactly once.
//!
//! ## Core Concepts
//!
//! - **State**: the transient scan-session state owned by the client
//! - **Action**: all possible inputs to a reducer (UI commands, completions)
//! - **Reducer**: pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: side effect descriptions (not execution)
//! - **Environment**: injected dependencies via traits
//!
//! ## Modules
//!
//! - [`token`]: the QR payload codec
//! - [`types`]: registration and attendance records
//! - [`store`]: the remote document-store collaborator interface
//! - [`error`]: the scan error taxonomy
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use turnstile_core::{effect::Effect, reducer::Reducer};
//!
//! impl Reducer for ScanReducer {
//!     type State = ScanSessionState;
//!     type Action = ScanAction;
//!     type Environment = ScanEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut ScanSessionState,
//!         action: ScanAction,
//!         env: &ScanEnvironment,
//!     ) -> SmallVec<[Effect<ScanAction>; 4]> {
//!         // Business logic goes here
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod error;
pub mod store;
pub mod token;
pub mod types;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable; all
/// I/O is described by the returned effects and executed by the store runtime.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for ScanReducer {
    ///     type State = ScanSessionState;
    ///     type Action = ScanAction;
    ///     type Environment = ScanEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut ScanSessionState,
    ///         action: ScanAction,
    ///         env: &ScanEnvironment,
    ///     ) -> SmallVec<[Effect<ScanAction>; 4]> {
    ///         match action {
    ///             ScanAction::Reset => {
    ///                 // Business logic here
    ///                 SmallVec::new()
    ///             }
    ///             _ => SmallVec::new(),
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime. Most reductions produce
        /// zero or one effect; the inline capacity of four avoids allocation
        /// for every realistic fan-out.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the store
    /// runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into
        /// the reducer. This is how a validate completion triggers the
        /// commit step without the reducer ever awaiting anything itself.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially, each waiting for the previous to finish
        Sequential(Vec<Effect<Action>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter. Production implementations live next to
/// the traits; deterministic test doubles live in `turnstile-testing`.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let now = clock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Identifier generation for newly created documents
    ///
    /// The remote store treats client-generated document ids as
    /// authoritative, so registration ids are minted locally before the
    /// record is written.
    pub trait IdGenerator: Send + Sync {
        /// Mint a fresh document id
        fn new_id(&self) -> String;
    }

    /// Production id generator producing random v4 UUIDs
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidGenerator;

    impl IdGenerator for UuidGenerator {
        fn new_id(&self) -> String {
            uuid::Uuid::new_v4().to_string()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn system_clock_advances() {
            let clock = SystemClock;
            let a = clock.now();
            let b = clock.now();
            assert!(b >= a);
        }

        #[test]
        fn uuid_generator_produces_unique_ids() {
            let ids = UuidGenerator;
            assert_ne!(ids.new_id(), ids.new_id());
        }
    }
}
