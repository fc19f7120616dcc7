//! Interceptors and the two-phase traversal.

use crate::action::BoxedAction;
use crate::context::Context;
use crate::error::PipelineError;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

/// A context transformer run in one phase of the traversal
pub type ContextFn<S> = Rc<dyn Fn(Context<S>) -> Result<Context<S>, PipelineError>>;

/// A named pair of optional `before` / `after` context transformers
///
/// Immutable once built. Cloning shares the underlying functions, so the same
/// interceptor can be installed in several chains.
pub struct Interceptor<S> {
    name: Cow<'static, str>,
    before: Option<ContextFn<S>>,
    after: Option<ContextFn<S>>,
}

impl<S> Interceptor<S> {
    /// Build an interceptor from its parts
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        before: Option<ContextFn<S>>,
        after: Option<ContextFn<S>>,
    ) -> Self {
        Self {
            name: name.into(),
            before,
            after,
        }
    }

    /// An interceptor with only a `before` function
    #[must_use]
    pub fn before<F>(name: impl Into<Cow<'static, str>>, before: F) -> Self
    where
        F: Fn(Context<S>) -> Result<Context<S>, PipelineError> + 'static,
    {
        Self::new(name, Some(Rc::new(before)), None)
    }

    /// An interceptor with only an `after` function
    #[must_use]
    pub fn after<F>(name: impl Into<Cow<'static, str>>, after: F) -> Self
    where
        F: Fn(Context<S>) -> Result<Context<S>, PipelineError> + 'static,
    {
        Self::new(name, None, Some(Rc::new(after)))
    }

    /// An interceptor with both functions
    #[must_use]
    pub fn around<B, A>(name: impl Into<Cow<'static, str>>, before: B, after: A) -> Self
    where
        B: Fn(Context<S>) -> Result<Context<S>, PipelineError> + 'static,
        A: Fn(Context<S>) -> Result<Context<S>, PipelineError> + 'static,
    {
        Self::new(name, Some(Rc::new(before)), Some(Rc::new(after)))
    }

    /// An interceptor with neither function; passes the context through
    #[must_use]
    pub fn noop(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, None, None)
    }

    /// Diagnostic name (not unique)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `before` function, if any
    #[must_use]
    pub const fn before_fn(&self) -> Option<&ContextFn<S>> {
        self.before.as_ref()
    }

    /// The `after` function, if any
    #[must_use]
    pub const fn after_fn(&self) -> Option<&ContextFn<S>> {
        self.after.as_ref()
    }

    /// The function for `phase`, if any
    #[must_use]
    pub const fn phase_fn(&self, phase: Phase) -> Option<&ContextFn<S>> {
        match phase {
            Phase::Before => self.before_fn(),
            Phase::After => self.after_fn(),
        }
    }
}

impl<S> Clone for Interceptor<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<S> fmt::Debug for Interceptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// One of the two traversal phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Chain order, before the handler's outputs are applied
    Before,
    /// Reverse chain order
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Execute an interceptor chain for `action`
///
/// 1. Seeds a fresh context with `{"action": action}` and the chain queued
/// 2. Runs the `before` functions in chain order
/// 3. Runs the `after` functions in the reverse order
///
/// The context is discarded afterwards: everything observable happens through
/// effect handlers invoked by some interceptor, conventionally `do_effects`.
///
/// # Errors
///
/// Returns the first error raised by an interceptor. The traversal stops
/// there; no later interceptor runs.
pub fn execute<S: 'static>(action: BoxedAction, chain: &[Interceptor<S>]) -> Result<(), PipelineError> {
    traverse(Context::new(action, chain)).map(drop)
}

/// Run both phases over a prepared context and return the final context
///
/// # Errors
///
/// Returns the first error raised by an interceptor.
pub fn traverse<S: 'static>(context: Context<S>) -> Result<Context<S>, PipelineError> {
    let context = invoke(context, Phase::Before)?;
    invoke(context.reversed(), Phase::After)
}

/// Drain the queue, moving each interceptor onto the stack before running it
///
/// The queue is re-read on every step, so a `before` function may enqueue or
/// drop interceptors still pending.
fn invoke<S: 'static>(mut context: Context<S>, phase: Phase) -> Result<Context<S>, PipelineError> {
    while let Some(interceptor) = context.queue.dequeue() {
        let step = interceptor.phase_fn(phase).cloned();
        tracing::trace!(
            interceptor = interceptor.name(),
            %phase,
            skipped = step.is_none(),
            "Invoking interceptor"
        );
        context.stack.push(interceptor);

        if let Some(step) = step {
            context = step(context)?;
        }
    }
    Ok(context)
}
