//! Metrics emitted by the store.
//!
//! The store only records through the `metrics` facade; nothing is exported
//! unless the application installs a recorder.
//!
//! # Example
//!
//! ```rust,ignore
//! use effect_chain_runtime::telemetry;
//!
//! // After installing a recorder
//! telemetry::register_metrics();
//! ```

use metrics::{describe_counter, describe_gauge};

/// Actions dispatched, labelled by `action`
pub const DISPATCH_TOTAL: &str = "effect_chain.dispatch.total";

/// Top-level dispatches that returned an error, labelled by `action`
pub const DISPATCH_FAILED: &str = "effect_chain.dispatch.failed";

/// Delayed dispatches scheduled through `dispatchAfter`, labelled by `action`
pub const DISPATCH_SCHEDULED: &str = "effect_chain.dispatch.scheduled";

/// Current synchronous dispatch nesting
pub const DISPATCH_DEPTH: &str = "effect_chain.dispatch.depth";

/// Effects applied by `do_effects`, labelled by `key`
pub const EFFECTS_APPLIED: &str = "effect_chain.effects.applied";

/// Register all metric descriptions with the installed recorder.
pub fn register_metrics() {
    describe_counter!(DISPATCH_TOTAL, "Total number of actions dispatched");
    describe_counter!(DISPATCH_FAILED, "Total number of dispatches that failed");
    describe_counter!(
        DISPATCH_SCHEDULED,
        "Total number of delayed dispatches scheduled"
    );
    describe_gauge!(DISPATCH_DEPTH, "Current nesting of synchronous dispatches");
    describe_counter!(EFFECTS_APPLIED, "Total number of effects applied");
}
