//! Handler registry.
//!
//! Three independent maps: event chains by action tag, effect handlers by
//! effect key, coeffect handlers by coeffect key. Registering under an
//! existing key replaces the previous entry (last registration wins, no
//! merge); the replaced entry is handed back so callers can tell.

use crate::context::{CoeffectMap, Effect};
use crate::error::PipelineError;
use crate::interceptor::Interceptor;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The ordered interceptors registered for one action tag
pub type Chain<S> = Rc<[Interceptor<S>]>;

/// Applies the value of one effect key
pub type EffectHandler<S> = Rc<dyn Fn(Effect<S>) -> Result<(), PipelineError>>;

/// Produces an updated coeffect map with one key injected
pub type CoeffectHandler<S> = Rc<dyn Fn(CoeffectMap<S>) -> Result<CoeffectMap<S>, PipelineError>>;

/// Event chains, effect handlers and coeffect handlers for one store
pub struct Registry<S> {
    event_handlers: HashMap<String, Chain<S>>,
    effect_handlers: HashMap<String, EffectHandler<S>>,
    coeffect_handlers: HashMap<String, CoeffectHandler<S>>,
}

impl<S> Registry<S> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            event_handlers: HashMap::new(),
            effect_handlers: HashMap::new(),
            coeffect_handlers: HashMap::new(),
        }
    }

    /// Install `chain` for `tag`, returning the chain it replaced
    ///
    /// The chain is not validated here; a malformed chain fails when executed.
    pub fn register_event_handler(
        &mut self,
        tag: impl Into<String>,
        chain: impl Into<Chain<S>>,
    ) -> Option<Chain<S>> {
        self.event_handlers.insert(tag.into(), chain.into())
    }

    /// The chain registered for `tag`
    #[must_use]
    pub fn event_handler(&self, tag: &str) -> Option<Chain<S>> {
        self.event_handlers.get(tag).cloned()
    }

    /// Install an effect handler for `key`, returning the handler it replaced
    pub fn register_effect_handler(
        &mut self,
        key: impl Into<String>,
        handler: EffectHandler<S>,
    ) -> Option<EffectHandler<S>> {
        self.effect_handlers.insert(key.into(), handler)
    }

    /// The effect handler registered for `key`
    #[must_use]
    pub fn effect_handler(&self, key: &str) -> Option<EffectHandler<S>> {
        self.effect_handlers.get(key).cloned()
    }

    /// Install a coeffect handler for `key`, returning the handler it replaced
    pub fn register_coeffect_handler(
        &mut self,
        key: impl Into<String>,
        handler: CoeffectHandler<S>,
    ) -> Option<CoeffectHandler<S>> {
        self.coeffect_handlers.insert(key.into(), handler)
    }

    /// The coeffect handler registered for `key`
    #[must_use]
    pub fn coeffect_handler(&self, key: &str) -> Option<CoeffectHandler<S>> {
        self.coeffect_handlers.get(key).cloned()
    }

    /// Tags that have a chain installed
    pub fn event_tags(&self) -> impl Iterator<Item = &str> {
        self.event_handlers.keys().map(String::as_str)
    }

    /// Keys that have an effect handler installed
    pub fn effect_keys(&self) -> impl Iterator<Item = &str> {
        self.effect_handlers.keys().map(String::as_str)
    }

    /// Keys that have a coeffect handler installed
    pub fn coeffect_keys(&self) -> impl Iterator<Item = &str> {
        self.coeffect_handlers.keys().map(String::as_str)
    }
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("event_handlers", &self.event_handlers)
            .field("effect_handlers", &self.effect_handlers.keys().collect::<Vec<_>>())
            .field("coeffect_handlers", &self.coeffect_handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
