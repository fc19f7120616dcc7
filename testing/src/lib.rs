//! # Effect Chain Testing
//!
//! Testing utilities and helpers for the Effect Chain pipeline.
//!
//! This crate provides:
//! - Mock implementations of ambient inputs (a fixed clock)
//! - Recorders that capture debug output and custom effects
//! - A Given-When-Then builder for stores
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use effect_chain_testing::{StoreTest, assertions};
//!
//! #[test]
//! fn adds_a_todo() {
//!     StoreTest::new(TodoState::default())
//!         .given(|store| register_todo_handlers(store))
//!         .when(AddTodo { name: "Buy milk".into() })
//!         .then_state(|state| assert_eq!(state.todos, vec!["Buy milk"]))
//!         .run();
//! }
//! ```

use chrono::{DateTime, Utc};
use effect_chain_core::environment::Clock;


pub use store_test::{StoreTest, assertions};

/// Mock implementations of ambient inputs
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use effect_chain_runtime::store::Store;

    /// Coeffect key [`install_clock`] registers under
    pub const NOW: &str = "now";

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use effect_chain_testing::mocks::FixedClock;
    /// use effect_chain_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
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

    /// Register `clock` as the [`NOW`] coeffect, injected as a `DateTime<Utc>`
    pub fn install_clock<S, C>(store: &Store<S>, clock: C)
    where
        S: Clone + PartialEq + 'static,
        C: Clock + 'static,
    {
        store.register_coeffect_value(NOW, move || clock.now());
    }
}

/// Recorders and setup helpers
pub mod helpers {
    use effect_chain_core::error::PipelineError;
    use effect_chain_runtime::store::Store;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Collects the lines written by a `debug_with` interceptor
    ///
    /// # Example
    ///
    /// ```ignore
    /// let log = LogRecorder::new();
    /// let debug = store.debug_with(log.sink());
    /// store.register_event_state([debug], handler);
    /// store.dispatch(DoNothing)?;
    /// assert_eq!(log.lines()[0], "\nHandling action: DoNothing:");
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct LogRecorder {
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl LogRecorder {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A log function that appends to this recorder
        #[must_use]
        pub fn sink(&self) -> impl Fn(String) + 'static {
            let lines = Rc::clone(&self.lines);
            move |line| lines.borrow_mut().push(line)
        }

        /// Everything recorded so far
        #[must_use]
        pub fn lines(&self) -> Vec<String> {
            self.lines.borrow().clone()
        }

        /// Discard everything recorded so far
        pub fn clear(&self) {
            self.lines.borrow_mut().clear();
        }
    }

    /// Captures the payloads of one custom effect key
    ///
    /// Installing the recorder replaces whatever handler the key had, so the
    /// effect is observed instead of performed.
    #[derive(Debug)]
    pub struct EffectRecorder<T> {
        entries: Rc<RefCell<Vec<T>>>,
    }

    impl<T> Clone for EffectRecorder<T> {
        fn clone(&self) -> Self {
            Self {
                entries: Rc::clone(&self.entries),
            }
        }
    }

    impl<T> Default for EffectRecorder<T> {
        fn default() -> Self {
            Self {
                entries: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl<T: 'static> EffectRecorder<T> {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register as the handler for the custom effect `key` on `store`
        pub fn install<S>(&self, store: &Store<S>, key: &'static str)
        where
            S: Clone + PartialEq + 'static,
        {
            let entries = Rc::clone(&self.entries);
            store.register_custom_effect(key, move |payload: T| {
                entries.borrow_mut().push(payload);
                Ok::<(), PipelineError>(())
            });
        }

        /// Number of payloads captured
        #[must_use]
        pub fn len(&self) -> usize {
            self.entries.borrow().len()
        }

        /// Whether nothing has been captured
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.entries.borrow().is_empty()
        }

        /// Take the captured payloads, leaving the recorder empty
        #[must_use]
        pub fn take(&self) -> Vec<T> {
            std::mem::take(&mut *self.entries.borrow_mut())
        }
    }

    impl<T: Clone + 'static> EffectRecorder<T> {
        /// The captured payloads, oldest first
        #[must_use]
        pub fn entries(&self) -> Vec<T> {
            self.entries.borrow().clone()
        }
    }

    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Honors `RUST_LOG`. Safe to call from every test; only the first call
    /// installs anything.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities
///
/// Strategies for generating interceptor chain shapes.
pub mod properties {
    use proptest::prelude::*;

    /// Which phases one generated interceptor implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Shape {
        /// Has a `before` function
        pub before: bool,
        /// Has an `after` function
        pub after: bool,
    }

    /// A chain of up to `max_len` interceptor shapes
    pub fn chain_shapes(max_len: usize) -> impl Strategy<Value = Vec<Shape>> {
        prop::collection::vec(
            (any::<bool>(), any::<bool>()).prop_map(|(before, after)| Shape { before, after }),
            0..=max_len,
        )
    }

    /// The trace a chain of `shapes` must produce, as `"before i"` / `"after i"`
    #[must_use]
    pub fn expected_trace(shapes: &[Shape]) -> Vec<String> {
        let before = shapes
            .iter()
            .enumerate()
            .filter(|(_, shape)| shape.before)
            .map(|(i, _)| format!("before {i}"));
        let after = shapes
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, shape)| shape.after)
            .map(|(i, _)| format!("after {i}"));
        before.chain(after).collect()
    }
}

// Re-export commonly used items
pub use helpers::{EffectRecorder, LogRecorder, init_tracing};
pub use mocks::{FixedClock, install_clock, test_clock};
