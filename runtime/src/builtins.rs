//! Handlers every store installs at construction.
//!
//! Each one holds a [`WeakStore`] rather than a `Store`, otherwise the
//! registry would keep its own store alive.

use crate::store::{Store, WeakStore};
use effect_chain_core::context::{CoeffectMap, Effect, keys};
use effect_chain_core::error::PipelineError;

pub(crate) fn register<S>(store: &Store<S>)
where
    S: Clone + PartialEq + 'static,
{
    let weak = store.downgrade();
    store.register_coeffect(keys::STATE, state_coeffect(weak.clone()));

    let handle = weak.clone();
    store.register_effect(keys::STATE, move |effect: Effect<S>| match effect {
        Effect::State(next) => {
            handle.upgrade()?.replace_state(next);
            Ok(())
        }
        _ => Err(PipelineError::type_mismatch::<S>(keys::STATE)),
    });

    let handle = weak.clone();
    store.register_effect(keys::DISPATCH, move |effect: Effect<S>| match effect {
        Effect::Dispatch(action) => handle.upgrade()?.dispatch_boxed(action),
        _ => Err(PipelineError::type_mismatch::<dyn effect_chain_core::Action>(keys::DISPATCH)),
    });

    let handle = weak.clone();
    store.register_effect(keys::DISPATCH_AFTER, move |effect: Effect<S>| match effect {
        Effect::DispatchAfter(after) => {
            handle.upgrade()?.dispatch_after(after);
            Ok(())
        }
        _ => Err(PipelineError::type_mismatch::<effect_chain_core::DispatchAfter>(
            keys::DISPATCH_AFTER,
        )),
    });

    store.register_effect(keys::DISPATCH_MULTIPLE, move |effect: Effect<S>| match effect {
        Effect::DispatchMultiple(actions) => {
            let store = weak.upgrade()?;
            actions
                .into_iter()
                .try_for_each(|action| store.dispatch_boxed(action))
        }
        _ => Err(PipelineError::type_mismatch::<[effect_chain_core::BoxedAction]>(
            keys::DISPATCH_MULTIPLE,
        )),
    });
}

/// Injects a snapshot of the current state under `state`
pub(crate) fn state_coeffect<S>(
    store: WeakStore<S>,
) -> impl Fn(CoeffectMap<S>) -> Result<CoeffectMap<S>, PipelineError>
where
    S: Clone + PartialEq + 'static,
{
    move |mut coeffects: CoeffectMap<S>| {
        coeffects.insert_state(store.upgrade()?.state());
        Ok(coeffects)
    }
}
