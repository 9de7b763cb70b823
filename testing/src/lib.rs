//! # Turnstile Testing
//!
//! Testing utilities and helpers for the Turnstile check-in flow.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - An in-memory document store with working live subscriptions
//! - A fault-injecting store wrapper for failure-path tests
//! - A fluent Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use turnstile_testing::{MemoryDocumentStore, test_clock};
//!
//! #[tokio::test]
//! async fn test_scan_flow() {
//!     let store = MemoryDocumentStore::new();
//!     let env = scan_environment(store, test_clock());
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use turnstile_core::environment::{Clock, IdGenerator};

pub mod memory_store;
pub mod reducer_test;

mod failing_store;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use turnstile_testing::mocks::FixedClock;
    /// use turnstile_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now()); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable id generator for tests (`reg-1`, `reg-2`, ...)
    ///
    /// Clones share the counter, so an environment and a test can mint
    /// from the same sequence.
    #[derive(Debug, Clone)]
    pub struct SequentialIdGenerator {
        prefix: String,
        counter: Arc<AtomicU64>,
    }

    impl SequentialIdGenerator {
        /// Create a generator with the given id prefix
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                counter: Arc::new(AtomicU64::new(0)),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("reg")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn new_id(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}-{n}", self.prefix)
        }
    }
}

// Re-export commonly used items
pub use failing_store::{FailingDocumentStore, FailureOp};
pub use memory_store::MemoryDocumentStore;
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock};
pub use reducer_test::{ReducerTest, assertions};
