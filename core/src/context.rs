//! The record threaded through one pipeline run.
//!
//! Coeffects and effects are string-keyed, but the values are a closed set of
//! variants per store state type `S`. The built-in keys (`action`, `state`,
//! `dispatch`, `dispatchAfter`, `dispatchMultiple`) can only be written
//! through typed setters that pair the key with the right variant, so a
//! mistyped built-in value is a compile error. Only the open `insert` /
//! `insert_custom` paths carry arbitrary payloads and are checked at the
//! point of use.

use crate::action::{Action, BoxedAction};
use crate::error::PipelineError;
use crate::interceptor::Interceptor;
use crate::queue::{Queue, Stack};
use smallvec::SmallVec;
use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Well-known coeffect and effect keys
pub mod keys {
    /// Coeffect holding the action being handled
    pub const ACTION: &str = "action";
    /// Coeffect holding the state snapshot / effect replacing the state
    pub const STATE: &str = "state";
    /// Effect re-dispatching one action synchronously
    pub const DISPATCH: &str = "dispatch";
    /// Effect dispatching one action after a delay
    pub const DISPATCH_AFTER: &str = "dispatchAfter";
    /// Effect dispatching several actions in order
    pub const DISPATCH_MULTIPLE: &str = "dispatchMultiple";
}

/// Coeffect / effect map key
pub type Key = Cow<'static, str>;

/// A value in the coeffect map
pub enum Coeffect<S> {
    /// The action being handled
    Action(BoxedAction),
    /// A snapshot of the store state
    State(S),
    /// Any other injected value
    Value(Box<dyn Any>),
}

impl<S: 'static> Coeffect<S> {
    fn as_any(&self) -> &dyn Any {
        match self {
            Self::Action(action) => action.as_any(),
            Self::State(state) => state,
            Self::Value(value) => &**value,
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Coeffect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(action) => f.debug_tuple("Coeffect::Action").field(action).finish(),
            Self::State(state) => f.debug_tuple("Coeffect::State").field(state).finish(),
            Self::Value(_) => write!(f, "Coeffect::Value(<value>)"),
        }
    }
}

/// Inputs available to handlers, keyed by name
pub struct CoeffectMap<S> {
    entries: HashMap<Key, Coeffect<S>>,
}

impl<S> Default for CoeffectMap<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for CoeffectMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<S: 'static> CoeffectMap<S> {
    /// Create an empty coeffect map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coeffect map seeded with the action being handled
    #[must_use]
    pub fn with_action(action: BoxedAction) -> Self {
        let mut map = Self::new();
        map.insert_action(action);
        map
    }

    /// The action being handled
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingCoeffect`] if no action is present,
    /// [`PipelineError::TypeMismatch`] if the `action` key holds something else.
    pub fn action(&self) -> Result<&dyn Action, PipelineError> {
        match self.entries.get(keys::ACTION) {
            Some(Coeffect::Action(action)) => Ok(action.as_ref()),
            Some(_) => Err(PipelineError::type_mismatch::<BoxedAction>(keys::ACTION)),
            None => Err(missing(keys::ACTION)),
        }
    }

    /// The action being handled, downcast to `A`
    ///
    /// # Errors
    ///
    /// As [`CoeffectMap::action`], plus [`PipelineError::TypeMismatch`] if the
    /// action is not an `A`.
    pub fn action_as<A: Action>(&self) -> Result<&A, PipelineError> {
        self.action()?
            .downcast_ref::<A>()
            .ok_or_else(|| PipelineError::type_mismatch::<A>(keys::ACTION))
    }

    /// The state snapshot
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingCoeffect`] if `inject_state` did not run,
    /// [`PipelineError::TypeMismatch`] if the `state` key holds something else.
    pub fn state(&self) -> Result<&S, PipelineError> {
        match self.entries.get(keys::STATE) {
            Some(Coeffect::State(state)) => Ok(state),
            Some(_) => Err(PipelineError::type_mismatch::<S>(keys::STATE)),
            None => Err(missing(keys::STATE)),
        }
    }

    /// Look up any coeffect as a `T`
    ///
    /// Works for built-in keys too: `get::<S>("state")` returns the snapshot.
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingCoeffect`] or [`PipelineError::TypeMismatch`].
    pub fn get<T: Any>(&self, key: &str) -> Result<&T, PipelineError> {
        self.entries
            .get(key)
            .ok_or_else(|| missing(key))?
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| PipelineError::type_mismatch::<T>(key))
    }

    /// Store the action being handled
    pub fn insert_action(&mut self, action: BoxedAction) -> Option<Coeffect<S>> {
        self.entries
            .insert(Cow::Borrowed(keys::ACTION), Coeffect::Action(action))
    }

    /// Store a state snapshot
    pub fn insert_state(&mut self, state: S) -> Option<Coeffect<S>> {
        self.entries
            .insert(Cow::Borrowed(keys::STATE), Coeffect::State(state))
    }

    /// Store an arbitrary value under `key`
    ///
    /// A value of type `S` under `state` is stored as [`Coeffect::State`].
    pub fn insert<T: Any>(&mut self, key: impl Into<Key>, value: T) -> Option<Coeffect<S>> {
        self.insert_coeffect(key, Coeffect::Value(Box::new(value)))
    }

    /// Store a prepared coeffect under `key`
    pub fn insert_coeffect(&mut self, key: impl Into<Key>, coeffect: Coeffect<S>) -> Option<Coeffect<S>> {
        let key = key.into();
        let coeffect = match coeffect {
            Coeffect::Value(value) if key == keys::STATE => match value.downcast::<S>() {
                Ok(state) => Coeffect::State(*state),
                Err(value) => Coeffect::Value(value),
            },
            coeffect => coeffect,
        };
        self.entries.insert(key, coeffect)
    }

    /// Remove the value under `key`
    pub fn remove(&mut self, key: &str) -> Option<Coeffect<S>> {
        self.entries.remove(key)
    }

    /// Whether a value is present under `key`
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of coeffects
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| &**key)
    }
}

/// Payload of the `dispatchAfter` effect
#[derive(Debug)]
pub struct DispatchAfter {
    /// How long to wait before dispatching
    pub delay: Duration,
    /// The action to dispatch once the delay has elapsed
    pub action: BoxedAction,
}

impl DispatchAfter {
    /// Schedule `action` after `delay`
    #[must_use]
    pub fn new(delay: Duration, action: impl Action) -> Self {
        Self {
            delay,
            action: Box::new(action),
        }
    }
}

/// A value in the effect map
pub enum Effect<S> {
    /// Replace the store state
    State(S),
    /// Re-dispatch one action before the current dispatch returns
    Dispatch(BoxedAction),
    /// Dispatch one action after a delay
    DispatchAfter(DispatchAfter),
    /// Dispatch several actions in order
    DispatchMultiple(SmallVec<[BoxedAction; 4]>),
    /// Payload for a user-registered effect handler
    Custom(Box<dyn Any>),
}

impl<S> Effect<S> {
    /// Name of the variant, for diagnostics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::State(_) => keys::STATE,
            Self::Dispatch(_) => keys::DISPATCH,
            Self::DispatchAfter(_) => keys::DISPATCH_AFTER,
            Self::DispatchMultiple(_) => keys::DISPATCH_MULTIPLE,
            Self::Custom(_) => "custom",
        }
    }

    /// Unwrap a custom payload as a `T`
    ///
    /// # Errors
    ///
    /// [`PipelineError::TypeMismatch`] if this is not a custom `T`.
    pub fn into_custom<T: Any>(self, key: &str) -> Result<T, PipelineError> {
        match self {
            Self::Custom(value) => value
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| PipelineError::type_mismatch::<T>(key)),
            _ => Err(PipelineError::type_mismatch::<T>(key)),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Effect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(state) => f.debug_tuple("Effect::State").field(state).finish(),
            Self::Dispatch(action) => f.debug_tuple("Effect::Dispatch").field(action).finish(),
            Self::DispatchAfter(after) => f.debug_tuple("Effect::DispatchAfter").field(after).finish(),
            Self::DispatchMultiple(actions) => {
                f.debug_tuple("Effect::DispatchMultiple").field(actions).finish()
            },
            Self::Custom(_) => write!(f, "Effect::Custom(<value>)"),
        }
    }
}

/// Outputs requested by handlers, keyed by name
pub struct EffectMap<S> {
    entries: HashMap<Key, Effect<S>>,
}

impl<S> Default for EffectMap<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for EffectMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<S: 'static> EffectMap<S> {
    /// Create an empty effect map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a state replacement
    #[must_use]
    pub fn with_state(mut self, state: S) -> Self {
        self.set_state(state);
        self
    }

    /// Request a synchronous re-dispatch
    #[must_use]
    pub fn with_dispatch(mut self, action: impl Action) -> Self {
        self.set_dispatch(action);
        self
    }

    /// Request a delayed dispatch
    #[must_use]
    pub fn with_dispatch_after(mut self, delay: Duration, action: impl Action) -> Self {
        self.set_dispatch_after(DispatchAfter::new(delay, action));
        self
    }

    /// Request several dispatches, run in order
    #[must_use]
    pub fn with_dispatch_multiple<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = BoxedAction>,
    {
        self.set_dispatch_multiple(actions);
        self
    }

    /// Add a payload for a user-registered effect handler
    #[must_use]
    pub fn with_custom<T: Any>(mut self, key: impl Into<Key>, value: T) -> Self {
        self.insert_custom(key, value);
        self
    }

    /// Set the `state` effect
    pub fn set_state(&mut self, state: S) -> Option<Effect<S>> {
        self.entries
            .insert(Cow::Borrowed(keys::STATE), Effect::State(state))
    }

    /// Set the `dispatch` effect
    pub fn set_dispatch(&mut self, action: impl Action) -> Option<Effect<S>> {
        self.entries
            .insert(Cow::Borrowed(keys::DISPATCH), Effect::Dispatch(Box::new(action)))
    }

    /// Set the `dispatchAfter` effect
    pub fn set_dispatch_after(&mut self, after: DispatchAfter) -> Option<Effect<S>> {
        self.entries
            .insert(Cow::Borrowed(keys::DISPATCH_AFTER), Effect::DispatchAfter(after))
    }

    /// Set the `dispatchMultiple` effect
    pub fn set_dispatch_multiple<I>(&mut self, actions: I) -> Option<Effect<S>>
    where
        I: IntoIterator<Item = BoxedAction>,
    {
        self.entries.insert(
            Cow::Borrowed(keys::DISPATCH_MULTIPLE),
            Effect::DispatchMultiple(actions.into_iter().collect()),
        )
    }

    /// Set a custom effect under `key`
    ///
    /// A value of type `S` under `state` is stored as [`Effect::State`].
    pub fn insert_custom<T: Any>(&mut self, key: impl Into<Key>, value: T) -> Option<Effect<S>> {
        self.insert(key, Effect::Custom(Box::new(value)))
    }

    /// Set a prepared effect under `key`
    ///
    /// A custom payload of type `S` under `state` is stored as
    /// [`Effect::State`]; any other payload there is kept as is and fails
    /// with a type mismatch when read or applied.
    pub fn insert(&mut self, key: impl Into<Key>, effect: Effect<S>) -> Option<Effect<S>> {
        let key = key.into();
        let effect = match effect {
            Effect::Custom(value) if key == keys::STATE => match value.downcast::<S>() {
                Ok(state) => Effect::State(*state),
                Err(value) => Effect::Custom(value),
            },
            effect => effect,
        };
        self.entries.insert(key, effect)
    }

    /// The requested state replacement, if any
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingEffect`] if no state effect is present,
    /// [`PipelineError::TypeMismatch`] if the `state` key holds something else.
    pub fn state(&self) -> Result<&S, PipelineError> {
        match self.entries.get(keys::STATE) {
            Some(Effect::State(state)) => Ok(state),
            Some(_) => Err(PipelineError::type_mismatch::<S>(keys::STATE)),
            None => Err(PipelineError::MissingEffect {
                key: keys::STATE.to_string(),
            }),
        }
    }

    /// Remove and return the requested state replacement
    ///
    /// # Errors
    ///
    /// Same as [`EffectMap::state`]. A mismatched value is left in place.
    pub fn take_state(&mut self) -> Result<S, PipelineError> {
        match self.entries.remove(keys::STATE) {
            Some(Effect::State(state)) => Ok(state),
            Some(other) => {
                self.entries.insert(Cow::Borrowed(keys::STATE), other);
                Err(PipelineError::type_mismatch::<S>(keys::STATE))
            }
            None => Err(PipelineError::MissingEffect {
                key: keys::STATE.to_string(),
            }),
        }
    }

    /// The effect under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Effect<S>> {
        self.entries.get(key)
    }

    /// Remove the effect under `key`
    pub fn remove(&mut self, key: &str) -> Option<Effect<S>> {
        self.entries.remove(key)
    }

    /// Whether an effect is present under `key`
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of effects
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| &**key)
    }

    /// Consume the map in application order
    ///
    /// The `state` effect comes first so that re-dispatched actions observe
    /// the new state; the remaining keys follow in unspecified order.
    #[must_use]
    pub fn into_ordered(mut self) -> Vec<(Key, Effect<S>)> {
        let mut ordered = Vec::with_capacity(self.entries.len());
        if let Some(state) = self.entries.remove(keys::STATE) {
            ordered.push((Cow::Borrowed(keys::STATE), state));
        }
        ordered.extend(self.entries);
        ordered
    }
}

impl<S> IntoIterator for EffectMap<S> {
    type Item = (Key, Effect<S>);
    type IntoIter = std::collections::hash_map::IntoIter<Key, Effect<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The mutable record threaded through one traversal
///
/// Created fresh for each dispatch and discarded when the traversal ends.
/// During a phase `queue` and `stack` together hold the whole chain: `queue`
/// what is still to run, `stack` what already ran.
pub struct Context<S> {
    /// Inputs available to handlers
    pub coeffects: CoeffectMap<S>,
    /// Outputs produced by handlers
    pub effects: EffectMap<S>,
    /// Interceptors still to run in the current phase
    pub queue: Queue<Interceptor<S>>,
    /// Interceptors already run in the current phase
    pub stack: Stack<Interceptor<S>>,
}

impl<S: 'static> Context<S> {
    /// Seed a context for `action` with the full chain queued
    #[must_use]
    pub fn new(action: BoxedAction, chain: &[Interceptor<S>]) -> Self {
        Self {
            coeffects: CoeffectMap::with_action(action),
            effects: EffectMap::new(),
            queue: chain.iter().cloned().collect(),
            stack: Stack::new(),
        }
    }

    /// Queue the processed interceptors again, most recent first
    ///
    /// Called between the two phases so the `after` functions run in the
    /// exact reverse of the `before` order.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            queue: self.stack.into_reversed_queue(),
            stack: Stack::new(),
            ..self
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Context<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("coeffects", &self.coeffects)
            .field("effects", &self.effects)
            .field("queue", &self.queue.iter().map(Interceptor::name).collect::<Vec<_>>())
            .field("stack", &self.stack.iter().map(Interceptor::name).collect::<Vec<_>>())
            .finish()
    }
}

fn missing(key: &str) -> PipelineError {
    PipelineError::MissingCoeffect {
        key: key.to_string(),
    }
}
