//! Pipeline errors.
//!
//! Every failure here is a contract violation (misconfiguration or a value of
//! the wrong type under a key), not a transient fault. None of them is
//! retried: the traversal that hit it stops at once and the error travels up
//! to the outermost `dispatch`.

use thiserror::Error;

/// Errors raised while registering, injecting or applying pipeline values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No chain is registered for the dispatched action's tag
    #[error("Could not find an event handler for key {tag}")]
    UnregisteredAction {
        /// Routing tag of the action
        tag: String,
    },

    /// An effect was produced for a key with no registered handler
    #[error("Could not find an effect handler for key {key}")]
    UnregisteredEffect {
        /// Effect key
        key: String,
    },

    /// A coeffect was injected for a key with no registered handler
    #[error("Could not find a coeffect handler for key {key}")]
    UnregisteredCoeffect {
        /// Coeffect key
        key: String,
    },

    /// A handler required a coeffect that is not in the coeffect map
    ///
    /// Typically `inject_state` was left out of a hand-built chain.
    #[error("Coeffect {key} is missing from the coeffect map")]
    MissingCoeffect {
        /// Coeffect key
        key: String,
    },

    /// An interceptor required an effect that is not in the effect map
    #[error("Effect {key} is missing from the effect map")]
    MissingEffect {
        /// Effect key
        key: String,
    },

    /// The value stored under a key is not of the type expected at its point of use
    #[error("Value under {key} is not of the expected type {expected}")]
    TypeMismatch {
        /// Coeffect or effect key
        key: String,
        /// Name of the expected type
        expected: &'static str,
    },

    /// Nested dispatch went deeper than the configured ceiling
    #[error("Dispatch of {tag} exceeded the maximum dispatch depth of {limit}")]
    DispatchDepthExceeded {
        /// Tag of the action that would have exceeded the limit
        tag: String,
        /// Configured ceiling
        limit: usize,
    },

    /// A built-in handler outlived the store it belongs to
    #[error("Store was dropped while one of its handlers was still running")]
    StoreDropped,

    /// A user handler reported a failure
    #[error("Handler failed: {0}")]
    HandlerFailed(String),
}

impl PipelineError {
    /// Shorthand for [`PipelineError::TypeMismatch`] naming `T` as the expected type
    #[must_use]
    pub fn type_mismatch<T: ?Sized>(key: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: std::any::type_name::<T>(),
        }
    }
}
