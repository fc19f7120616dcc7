//! # Effect Chain Runtime
//!
//! The [`Store`](store::Store) that owns application state, the handler
//! registry and the built-in effects and coeffects.
//!
//! ## Core Components
//!
//! - **Store**: Holds the state, looks up the chain registered for an
//!   action's tag and runs it
//! - **Built-ins**: The `state` coeffect and the `state`, `dispatch`,
//!   `dispatchAfter` and `dispatchMultiple` effects, installed by every store
//! - **Interceptor factories**: `inject_coeffect`, `inject_state`,
//!   `do_effects`, `debug`, `enrich` and `after`
//!
//! ## Example
//!
//! ```ignore
//! use effect_chain_runtime::store::Store;
//!
//! let store = Store::new(TodoState::default());
//!
//! store.register_event_state([], |state: &TodoState, action: &AddTodo| {
//!     let mut next = state.clone();
//!     next.todos.push(action.name.clone());
//!     next
//! });
//!
//! store.dispatch(AddTodo { name: "Buy milk".into() })?;
//! assert_eq!(store.with_state(|s| s.todos.len()), 1);
//! ```
//!
//! The store is single-threaded: it is `Clone` but not `Send`. Delayed
//! dispatches are spawned with [`tokio::task::spawn_local`], so a store that
//! uses `dispatchAfter` must live inside a [`tokio::task::LocalSet`].

use std::cell::Cell;

/// Built-in coeffect and effect handlers
mod builtins;

/// Interceptor factories bound to a store
pub mod interceptors;

/// Metric names and descriptions
pub mod telemetry;

/// Error types for the Store runtime
pub mod error {
    /// Every fallible store operation reports a [`PipelineError`]
    pub use effect_chain_core::error::PipelineError;
}

pub use error::PipelineError;

/// Configuration for Store instances
///
/// # Example
///
/// ```ignore
/// let config = StoreConfig::default()
///     .with_max_dispatch_depth(16)
///     .with_log_overwrites(false);
///
/// let store = Store::with_config(TodoState::default(), config);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Deepest allowed nesting of synchronous dispatches
    ///
    /// A `dispatch` effect runs the next action before the current dispatch
    /// returns. An action that re-dispatches itself unconditionally would
    /// recurse forever; past this depth the dispatch fails with
    /// [`PipelineError::DispatchDepthExceeded`].
    pub max_dispatch_depth: usize,
    /// Log (at debug level) when a registration replaces an existing entry
    pub log_overwrites: bool,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(max_dispatch_depth: usize, log_overwrites: bool) -> Self {
        Self {
            max_dispatch_depth,
            log_overwrites,
        }
    }

    /// Set the maximum dispatch depth
    #[must_use]
    pub const fn with_max_dispatch_depth(mut self, depth: usize) -> Self {
        self.max_dispatch_depth = depth;
        self
    }

    /// Enable or disable overwrite logging
    #[must_use]
    pub const fn with_log_overwrites(mut self, enabled: bool) -> Self {
        self.log_overwrites = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 64,
            log_overwrites: true,
        }
    }
}

/// RAII guard that tracks the current dispatch depth
///
/// Decrements on drop, so the depth is restored even when the chain fails.
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>, limit: usize, tag: &str) -> Result<Self, PipelineError> {
        let current = depth.get();
        if current >= limit {
            tracing::warn!(action = tag, limit, "Dispatch depth exceeded");
            return Err(PipelineError::DispatchDepthExceeded {
                tag: tag.to_string(),
                limit,
            });
        }
        depth.set(current + 1);
        #[allow(clippy::cast_precision_loss)] // depth is bounded by the config
        metrics::gauge!(telemetry::DISPATCH_DEPTH).set((current + 1) as f64);
        Ok(Self { depth })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Store runtime: state, registry and dispatch.
pub mod store {
    use super::{DepthGuard, PipelineError, StoreConfig};
    use crate::builtins;
    use crate::telemetry;
    use effect_chain_core::action::{Action, BoxedAction};
    use effect_chain_core::context::{CoeffectMap, Context, DispatchAfter, Effect, EffectMap};
    use effect_chain_core::interceptor::{Interceptor, execute};
    use effect_chain_core::registry::{Chain, CoeffectHandler, EffectHandler, Registry};
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::rc::{Rc, Weak};
    use std::task::{Context as TaskContext, Poll, Waker};
    use tokio::sync::watch;
    use tokio::task::{JoinError, JoinHandle};

    /// Names of the interceptors wrapping the three kinds of event handler
    pub const STATE_HANDLER: &str = "state_handler";
    /// See [`STATE_HANDLER`]
    pub const EFFECTS_HANDLER: &str = "effects_handler";
    /// See [`STATE_HANDLER`]
    pub const CONTEXT_HANDLER: &str = "context_handler";

    struct Inner<S> {
        /// Current state; also the observation channel
        state: watch::Sender<S>,
        registry: RefCell<Registry<S>>,
        config: StoreConfig,
        depth: Cell<usize>,
        /// Delayed dispatches that have not been awaited by `settle`
        scheduled: RefCell<Vec<JoinHandle<Result<(), PipelineError>>>>,
        /// First failure among finished dispatches pruned before `settle`
        scheduled_failure: RefCell<Option<PipelineError>>,
    }

    /// The Store - owns the state and the handler registry
    ///
    /// Cloning is cheap and yields another handle to the same store.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type. `PartialEq` is used to decide whether observers
    ///   are notified and by the `debug` interceptor.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = Store::new(0_u32);
    /// store.register_event_state([], |count: &u32, _: &Increment| count + 1);
    /// store.dispatch(Increment)?;
    /// assert_eq!(store.state(), 1);
    /// ```
    pub struct Store<S> {
        inner: Rc<Inner<S>>,
    }

    /// A non-owning handle to a [`Store`]
    ///
    /// Held by the built-in handlers so the registry does not keep its own
    /// store alive.
    pub struct WeakStore<S> {
        inner: Weak<Inner<S>>,
    }

    impl<S> WeakStore<S> {
        /// Upgrade to a full handle
        ///
        /// # Errors
        ///
        /// [`PipelineError::StoreDropped`] once every [`Store`] handle is gone.
        pub fn upgrade(&self) -> Result<Store<S>, PipelineError> {
            self.inner
                .upgrade()
                .map(|inner| Store { inner })
                .ok_or(PipelineError::StoreDropped)
        }
    }

    impl<S> Clone for WeakStore<S> {
        fn clone(&self) -> Self {
            Self {
                inner: Weak::clone(&self.inner),
            }
        }
    }

    impl<S> Clone for Store<S> {
        fn clone(&self) -> Self {
            Self {
                inner: Rc::clone(&self.inner),
            }
        }
    }

    impl<S: fmt::Debug> fmt::Debug for Store<S> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Store")
                .field("state", &*self.inner.state.borrow())
                .field("registry", &*self.inner.registry.borrow())
                .field("config", &self.inner.config)
                .field("depth", &self.inner.depth.get())
                .finish_non_exhaustive()
        }
    }

    impl<S> Store<S>
    where
        S: Clone + PartialEq + 'static,
    {
        /// Create a new store with the default configuration
        ///
        /// The built-in `state` coeffect and the `state`, `dispatch`,
        /// `dispatchAfter` and `dispatchMultiple` effects are registered
        /// before this returns.
        #[must_use]
        pub fn new(initial_state: S) -> Self {
            Self::with_config(initial_state, StoreConfig::default())
        }

        /// Create a new store with a custom configuration
        #[must_use]
        pub fn with_config(initial_state: S, config: StoreConfig) -> Self {
            let (state, _) = watch::channel(initial_state);
            let store = Self {
                inner: Rc::new(Inner {
                    state,
                    registry: RefCell::new(Registry::new()),
                    config,
                    depth: Cell::new(0),
                    scheduled: RefCell::new(Vec::new()),
                    scheduled_failure: RefCell::new(None),
                }),
            };
            builtins::register(&store);
            tracing::debug!(?config, "Store created");
            store
        }

        /// A handle that does not keep the store alive
        #[must_use]
        pub fn downgrade(&self) -> WeakStore<S> {
            WeakStore {
                inner: Rc::downgrade(&self.inner),
            }
        }

        /// This store's configuration
        #[must_use]
        pub fn config(&self) -> StoreConfig {
            self.inner.config
        }

        // ===== Dispatch =====

        /// Handle one action synchronously
        ///
        /// Looks up the chain registered for the action's tag and runs it.
        /// Everything the chain requests (state replacement, re-dispatch,
        /// custom effects) has been applied when this returns, except
        /// `dispatchAfter`, which is scheduled.
        ///
        /// # Errors
        ///
        /// - [`PipelineError::UnregisteredAction`] if no chain is registered
        /// - [`PipelineError::DispatchDepthExceeded`] on runaway re-dispatch
        /// - Any error raised inside the chain, including by nested dispatches
        ///
        /// Failures are not retried. Effects applied before the failure stay
        /// applied.
        ///
        /// # Panics
        ///
        /// Panics if the chain produces a `dispatchAfter` effect while the
        /// store is not driven from a [`tokio::task::LocalSet`]. See
        /// [`Store::dispatch_after`].
        pub fn dispatch<A: Action>(&self, action: A) -> Result<(), PipelineError> {
            self.dispatch_boxed(Box::new(action))
        }

        /// [`Store::dispatch`] for an already boxed action
        ///
        /// # Errors
        ///
        /// See [`Store::dispatch`].
        ///
        /// # Panics
        ///
        /// As [`Store::dispatch`], on a `dispatchAfter` effect outside a
        /// [`tokio::task::LocalSet`].
        #[tracing::instrument(skip(self, action), fields(action = action.type_name()), name = "store_dispatch")]
        pub fn dispatch_boxed(&self, action: BoxedAction) -> Result<(), PipelineError> {
            let tag = action.type_name();
            let result = self.run(action, tag);

            // Nested failures propagate; report once at the top.
            if self.inner.depth.get() == 0 {
                if let Err(error) = &result {
                    tracing::error!(%error, "Dispatch failed");
                    metrics::counter!(telemetry::DISPATCH_FAILED, "action" => tag).increment(1);
                }
            }
            result
        }

        fn run(&self, action: BoxedAction, tag: &'static str) -> Result<(), PipelineError> {
            let chain = self
                .event_handler(tag)
                .ok_or_else(|| PipelineError::UnregisteredAction {
                    tag: tag.to_string(),
                })?;
            let _depth = DepthGuard::enter(&self.inner.depth, self.inner.config.max_dispatch_depth, tag)?;

            tracing::debug!(depth = self.inner.depth.get(), "Dispatching action");
            metrics::counter!(telemetry::DISPATCH_TOTAL, "action" => tag).increment(1);
            execute(action, &chain)
        }

        /// Schedule `action` to be dispatched after `delay`
        ///
        /// The delayed dispatch is not cancellable and runs with a fresh
        /// depth. Its result is reported by [`Store::settle`].
        ///
        /// # Panics
        ///
        /// Panics if called outside a [`tokio::task::LocalSet`].
        pub fn dispatch_after(&self, after: DispatchAfter) {
            let DispatchAfter { delay, action } = after;
            tracing::debug!(
                action = action.type_name(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Scheduling delayed dispatch"
            );
            metrics::counter!(telemetry::DISPATCH_SCHEDULED, "action" => action.type_name()).increment(1);

            let store = self.clone();
            let handle = tokio::task::spawn_local(async move {
                tokio::time::sleep(delay).await;
                store.dispatch_boxed(action)
            });

            self.prune_scheduled();
            self.inner.scheduled.borrow_mut().push(handle);
        }

        /// Drop finished handles, keeping the first failure for `settle`
        fn prune_scheduled(&self) {
            let mut cx = TaskContext::from_waker(Waker::noop());
            self.inner.scheduled.borrow_mut().retain_mut(|handle| {
                if !handle.is_finished() {
                    return true;
                }
                match Pin::new(handle).poll(&mut cx) {
                    Poll::Ready(outcome) => {
                        self.record_scheduled(outcome);
                        false
                    }
                    Poll::Pending => true,
                }
            });
        }

        fn record_scheduled(&self, outcome: Result<Result<(), PipelineError>, JoinError>) {
            let outcome = outcome.unwrap_or_else(|join_error| Err(PipelineError::HandlerFailed(join_error.to_string())));
            if let Err(error) = outcome {
                self.inner.scheduled_failure.borrow_mut().get_or_insert(error);
            }
        }

        /// Wait for every scheduled dispatch, including ones scheduled while waiting
        ///
        /// # Errors
        ///
        /// The first error any delayed dispatch returned since the last
        /// `settle`, including dispatches that finished before this call.
        /// All scheduled dispatches are awaited regardless.
        pub async fn settle(&self) -> Result<(), PipelineError> {
            loop {
                let pending = std::mem::take(&mut *self.inner.scheduled.borrow_mut());
                if pending.is_empty() {
                    break;
                }
                tracing::trace!(count = pending.len(), "Awaiting scheduled dispatches");
                for handle in pending {
                    let outcome = handle.await;
                    self.record_scheduled(outcome);
                }
            }
            self.inner.scheduled_failure.take().map_or(Ok(()), Err)
        }

        /// Number of delayed dispatches that have not fired yet
        #[must_use]
        pub fn pending_dispatches(&self) -> usize {
            self.inner
                .scheduled
                .borrow()
                .iter()
                .filter(|pending| !pending.is_finished())
                .count()
        }

        // ===== State =====

        /// A copy of the current state
        #[must_use]
        pub fn state(&self) -> S {
            self.inner.state.borrow().clone()
        }

        /// Read the current state without copying it
        ///
        /// `f` must not dispatch.
        pub fn with_state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            f(&self.inner.state.borrow())
        }

        /// Observe state changes
        ///
        /// The receiver is notified only when a `state` effect installs a
        /// value different from the current one.
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<S> {
            self.inner.state.subscribe()
        }

        /// Replace the state; the only writer is the built-in `state` effect
        pub(crate) fn replace_state(&self, next: S) {
            let changed = self.inner.state.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
            tracing::trace!(changed, "State effect applied");
        }

        // ===== Registration =====

        /// Register a pure state handler for `A`
        ///
        /// Installs `[inject_state, do_effects, ..interceptors, handler]`. The
        /// handler reads the injected state and the action and its result is
        /// written to the `state` effect.
        pub fn register_event_state<A, F>(
            &self,
            interceptors: impl IntoIterator<Item = Interceptor<S>>,
            handler: F,
        ) where
            A: Action,
            F: Fn(&S, &A) -> S + 'static,
        {
            let handler = Interceptor::before(STATE_HANDLER, move |mut ctx: Context<S>| {
                let next = handler(ctx.coeffects.state()?, ctx.coeffects.action_as::<A>()?);
                ctx.effects.set_state(next);
                Ok(ctx)
            });
            self.install(A::tag(), interceptors, handler);
        }

        /// Register an effects handler for `A`
        ///
        /// The returned effect map replaces the context's effects wholesale.
        pub fn register_event_effects<A, F>(
            &self,
            interceptors: impl IntoIterator<Item = Interceptor<S>>,
            handler: F,
        ) where
            A: Action,
            F: Fn(&CoeffectMap<S>, &A) -> EffectMap<S> + 'static,
        {
            let handler = Interceptor::before(EFFECTS_HANDLER, move |mut ctx: Context<S>| {
                let effects = handler(&ctx.coeffects, ctx.coeffects.action_as::<A>()?);
                ctx.effects = effects;
                Ok(ctx)
            });
            self.install(A::tag(), interceptors, handler);
        }

        /// Register a full context transformer for `A`
        ///
        /// `A` cannot be inferred from the handler, so name it:
        /// `store.register_event_context::<Tick, _>([], |ctx| Ok(ctx))`.
        pub fn register_event_context<A, F>(
            &self,
            interceptors: impl IntoIterator<Item = Interceptor<S>>,
            handler: F,
        ) where
            A: Action,
            F: Fn(Context<S>) -> Result<Context<S>, PipelineError> + 'static,
        {
            self.install(A::tag(), interceptors, Interceptor::before(CONTEXT_HANDLER, handler));
        }

        fn install(
            &self,
            tag: &'static str,
            interceptors: impl IntoIterator<Item = Interceptor<S>>,
            handler: Interceptor<S>,
        ) {
            let chain: Vec<_> = [self.inject_state(), self.do_effects()]
                .into_iter()
                .chain(interceptors)
                .chain(std::iter::once(handler))
                .collect();
            self.register_chain(tag, chain);
        }

        /// Install a raw chain for `tag`, returning the chain it replaced
        ///
        /// Nothing is prepended: a chain without `do_effects` applies no
        /// effects.
        pub fn register_chain(&self, tag: &str, chain: impl Into<Chain<S>>) -> Option<Chain<S>> {
            let chain = chain.into();
            tracing::debug!(action = tag, len = chain.len(), "Registering event handler");
            let replaced = self.inner.registry.borrow_mut().register_event_handler(tag, chain);
            if replaced.is_some() && self.inner.config.log_overwrites {
                tracing::debug!(action = tag, "Replaced existing event handler");
            }
            replaced
        }

        /// Install the handler applied to the `key` effect
        pub fn register_effect<F>(&self, key: &str, handler: F) -> Option<EffectHandler<S>>
        where
            F: Fn(Effect<S>) -> Result<(), PipelineError> + 'static,
        {
            self.register_effect_handler(key, Rc::new(handler))
        }

        /// Install a handler for a custom effect carrying a `T`
        ///
        /// The payload is downcast before `handler` sees it; a value of any
        /// other type fails with [`PipelineError::TypeMismatch`].
        pub fn register_custom_effect<T, F>(&self, key: &'static str, handler: F) -> Option<EffectHandler<S>>
        where
            T: Any,
            F: Fn(T) -> Result<(), PipelineError> + 'static,
        {
            self.register_effect(key, move |effect: Effect<S>| handler(effect.into_custom::<T>(key)?))
        }

        pub(crate) fn register_effect_handler(
            &self,
            key: &str,
            handler: EffectHandler<S>,
        ) -> Option<EffectHandler<S>> {
            tracing::debug!(key, "Registering effect handler");
            let replaced = self.inner.registry.borrow_mut().register_effect_handler(key, handler);
            if replaced.is_some() && self.inner.config.log_overwrites {
                tracing::debug!(key, "Replaced existing effect handler");
            }
            replaced
        }

        /// Install the handler that injects the `key` coeffect
        pub fn register_coeffect<F>(&self, key: &str, handler: F) -> Option<CoeffectHandler<S>>
        where
            F: Fn(CoeffectMap<S>) -> Result<CoeffectMap<S>, PipelineError> + 'static,
        {
            tracing::debug!(key, "Registering coeffect handler");
            let replaced = self
                .inner
                .registry
                .borrow_mut()
                .register_coeffect_handler(key, Rc::new(handler));
            if replaced.is_some() && self.inner.config.log_overwrites {
                tracing::debug!(key, "Replaced existing coeffect handler");
            }
            replaced
        }

        /// Install a coeffect handler that inserts `value()` under `key`
        pub fn register_coeffect_value<T, F>(&self, key: &'static str, value: F) -> Option<CoeffectHandler<S>>
        where
            T: Any,
            F: Fn() -> T + 'static,
        {
            self.register_coeffect(key, move |mut coeffects: CoeffectMap<S>| {
                coeffects.insert(key, value());
                Ok(coeffects)
            })
        }

        // ===== Lookup =====

        /// The chain registered for `tag`
        #[must_use]
        pub fn event_handler(&self, tag: &str) -> Option<Chain<S>> {
            self.inner.registry.borrow().event_handler(tag)
        }

        /// The effect handler registered for `key`
        #[must_use]
        pub fn effect_handler(&self, key: &str) -> Option<EffectHandler<S>> {
            self.inner.registry.borrow().effect_handler(key)
        }

        /// The coeffect handler registered for `key`
        #[must_use]
        pub fn coeffect_handler(&self, key: &str) -> Option<CoeffectHandler<S>> {
            self.inner.registry.borrow().coeffect_handler(key)
        }

        /// Whether a chain is registered for `A`
        #[must_use]
        pub fn handles<A: Action>(&self) -> bool {
            self.inner.registry.borrow().event_handler(A::tag()).is_some()
        }
    }

}
