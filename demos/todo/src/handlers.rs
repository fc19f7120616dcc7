//! Handler registrations for the todo example.

use crate::types::{AddTodo, AddTodoLater, AddTodos, ClearTodos, DoNothing, PreAddTodo, TodoState};
use effect_chain_core::environment::Clock;
use effect_chain_core::{BoxedAction, CoeffectMap, DateTime, EffectMap, PipelineError, Utc, effects};
use effect_chain_runtime::store::Store;

/// Coeffect carrying the current time
pub const NOW: &str = "now";

/// Custom effect that logs a message
pub const ANNOUNCE: &str = "announce";

/// Register every todo handler on `store`
///
/// `clock` backs the [`NOW`] coeffect.
///
/// # Errors
///
/// Fails if a coeffect the handlers inject is not registered, which would be
/// a bug in this function.
pub fn register<C>(store: &Store<TodoState>, clock: C) -> Result<(), PipelineError>
where
    C: Clock + 'static,
{
    store.register_coeffect_value(NOW, move || clock.now());
    store.register_custom_effect(ANNOUNCE, |message: String| {
        tracing::info!(%message, "Announcement");
        Ok(())
    });

    let dedup = store.enrich(|mut state: TodoState, _: &AddTodo| {
        let mut seen = std::collections::HashSet::new();
        state.todos.retain(|todo| seen.insert(todo.clone()));
        state
    });
    let audit = store.after(|state: &TodoState, action: &AddTodo| {
        tracing::debug!(todo = %action.name, count = state.count(), "Todo added");
    });
    store.register_event_effects([store.inject_coeffect(NOW)?, audit, dedup], add_todo);

    store.register_event_effects([], pre_add_todo);

    store.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &AddTodoLater| {
        EffectMap::new().with_dispatch_after(action.delay, AddTodo::new(action.name.clone()))
    });

    store.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &AddTodos| {
        EffectMap::new().with_dispatch_multiple(
            action
                .names
                .iter()
                .map(|name| Box::new(AddTodo::new(name.clone())) as BoxedAction),
        )
    });

    store.register_event_state([store.debug()], |state: &TodoState, _: &ClearTodos| TodoState {
        todos: Vec::new(),
        updated_at: state.updated_at,
    });

    store.register_event_state([store.debug()], |state: &TodoState, _: &DoNothing| state.clone());

    Ok(())
}

/// Append the todo, stamp the change and announce it
fn add_todo(coeffects: &CoeffectMap<TodoState>, action: &AddTodo) -> EffectMap<TodoState> {
    let mut next = coeffects.state().cloned().unwrap_or_default();
    next.todos.push(action.name.clone());
    next.updated_at = coeffects.get::<DateTime<Utc>>(NOW).ok().copied();

    EffectMap::new()
        .with_state(next)
        .with_custom(ANNOUNCE, format!("added {:?}", action.name))
}

/// Trim the name and forward it; blank names are dropped
fn pre_add_todo(_: &CoeffectMap<TodoState>, action: &PreAddTodo) -> EffectMap<TodoState> {
    let name = action.name.trim();
    if name.is_empty() {
        tracing::debug!("Ignoring blank todo");
        return EffectMap::new();
    }
    effects! { dispatch: AddTodo::new(name) }
}
