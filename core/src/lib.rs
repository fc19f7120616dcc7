//! # Effect Chain Core
//!
//! Core types for the Effect Chain interceptor pipeline.
//!
//! This crate provides the building blocks that the runtime `Store` is made of.
//! Nothing in here owns state or schedules work: it only describes actions,
//! the per-dispatch [`Context`](context::Context), the interceptors that
//! transform it, and the traversal that runs them.
//!
//! ## Core Concepts
//!
//! - **Action**: A tagged, immutable value describing "something happened"
//! - **Coeffect**: A named input made available to a handler (current state, clock reading)
//! - **Effect**: A named output produced by a handler (new state, re-dispatch)
//! - **Interceptor**: A named pair of optional `before`/`after` context transformers
//! - **Chain**: The ordered interceptors registered for one action tag
//!
//! ## Traversal
//!
//! [`execute`](interceptor::execute) runs every `before` function in chain order,
//! then every `after` function in exactly the reverse order:
//!
//! ```text
//! before:  i1 -> i2 -> ... -> in
//! after:   in -> ... -> i2 -> i1
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use effect_chain_core::*;
//!
//! let log = Interceptor::before("log", |ctx| {
//!     tracing::info!(action = ?ctx.coeffects.action()?, "handling");
//!     Ok(ctx)
//! });
//!
//! execute(Box::new(Ping), &[log])?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Ordered containers (FIFO queue, LIFO stack) used by the traversal
pub mod queue;

/// Per-dispatch context: coeffect map, effect map, traversal bookkeeping
pub mod context;

/// Interceptors and the two-phase traversal
pub mod interceptor;

/// Handler registry keyed by action tag, effect key and coeffect key
pub mod registry;

/// Error types shared by every stage of the pipeline
pub mod error;

/// Declarative macros for building effect maps
pub mod effect_macros;

pub use context::{Coeffect, CoeffectMap, Context, DispatchAfter, Effect, EffectMap, keys};
pub use error::PipelineError;
pub use interceptor::{ContextFn, Interceptor, Phase, execute, traverse};
pub use registry::{Chain, CoeffectHandler, EffectHandler, Registry};

/// Action module - the unit of dispatch
///
/// Actions are plain values. The only thing the pipeline needs from them is a
/// stable routing tag and the ability to be downcast back to their concrete
/// type inside a handler. Implement it with `#[derive(Action)]` from
/// `effect-chain-macros`, or by hand:
///
/// ```
/// use effect_chain_core::action::Action;
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct Ping;
///
/// impl Action for Ping {
///     fn tag() -> &'static str {
///         "Ping"
///     }
///
///     fn type_name(&self) -> &'static str {
///         Self::tag()
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// assert_eq!(Ping.type_name(), "Ping");
/// ```
pub mod action {
    use std::any::Any;
    use std::fmt::Debug;

    /// A tagged, immutable value routed through the pipeline
    ///
    /// Two values whose `type_name` agree are routed to the same chain, so the
    /// tag must be stable for a type and unique across the action types
    /// registered on one store.
    pub trait Action: Any + Debug {
        /// Routing tag for this action type, used at registration
        fn tag() -> &'static str
        where
            Self: Sized;

        /// Routing tag of this value, used at dispatch
        ///
        /// Must return the same string as [`Action::tag`].
        fn type_name(&self) -> &'static str;

        /// Upcast for downcasting back to the concrete action type
        fn as_any(&self) -> &dyn Any;
    }

    /// An owned, type-erased action
    pub type BoxedAction = Box<dyn Action>;

    impl dyn Action {
        /// Downcast to a concrete action type
        #[must_use]
        pub fn downcast_ref<A: Action>(&self) -> Option<&A> {
            self.as_any().downcast_ref::<A>()
        }

        /// Check whether this action is of type `A`
        #[must_use]
        pub fn is<A: Action>(&self) -> bool {
            self.as_any().is::<A>()
        }
    }
}

/// Environment module - injectable ambient inputs
///
/// Ambient inputs such as the current time reach handlers as coeffects. The
/// traits here let the value behind a coeffect be swapped in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock {
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
}

pub use action::{Action, BoxedAction};
