//! Integration tests for the Store pipeline
//!
//! Covers registration, re-entrant dispatch, delayed dispatch, the debug
//! interceptor's output and the error surface.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use effect_chain_core::context::{CoeffectMap, Context, EffectMap};
use effect_chain_core::interceptor::Interceptor;
use effect_chain_core::{DateTime, DispatchAfter, PipelineError, Utc, effects};
use effect_chain_macros::Action;
use effect_chain_runtime::store::Store;
use effect_chain_testing::{EffectRecorder, LogRecorder, StoreTest, init_tracing, install_clock, test_clock};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
struct TodoState {
    todos: Vec<String>,
}

#[derive(Action, Debug)]
struct AddTodo {
    name: String,
}

#[derive(Action, Debug)]
struct PreAdd {
    name: String,
}

#[derive(Action, Debug)]
struct AddTodoLater {
    name: String,
    delay: Duration,
}

#[derive(Action, Debug)]
struct AddMany {
    names: Vec<&'static str>,
}

#[derive(Action, Debug)]
struct DoNothing;

#[derive(Action, Debug)]
struct Count;

fn add_todo(state: &TodoState, action: &AddTodo) -> TodoState {
    let mut next = state.clone();
    next.todos.push(action.name.clone());
    next
}

fn todo_store() -> Store<TodoState> {
    init_tracing();
    let store = Store::new(TodoState::default());
    store.register_event_state([], add_todo);
    store
}

fn add(name: &str) -> AddTodo {
    AddTodo {
        name: name.to_string(),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_state_handler_appends_in_dispatch_order() {
    StoreTest::new(TodoState::default())
        .given(|store| store.register_event_state([], add_todo))
        .when(add("x"))
        .when(add("y"))
        .then_state(|state| assert_eq!(state.todos, vec!["x", "y"]))
        .run();
}

#[test]
fn test_dispatch_effect_matches_direct_dispatch() -> Result<(), PipelineError> {
    let direct = todo_store();
    direct.dispatch(add("x"))?;

    let indirect = todo_store();
    indirect.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &PreAdd| {
        effects! { dispatch: AddTodo { name: action.name.clone() } }
    });
    indirect.dispatch(PreAdd {
        name: "x".to_string(),
    })?;

    assert_eq!(indirect.state(), direct.state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_after_applies_only_after_delay() -> Result<(), PipelineError> {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let store = todo_store();
            store.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &AddTodoLater| {
                EffectMap::new().with_dispatch_after(
                    action.delay,
                    AddTodo {
                        name: action.name.clone(),
                    },
                )
            });

            store.dispatch(AddTodoLater {
                name: "later".to_string(),
                delay: Duration::from_millis(100),
            })?;
            assert!(store.state().todos.is_empty());

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(store.state().todos.is_empty());

            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(store.state().todos, vec!["later"]);

            store.settle().await
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn test_settle_reports_failure_of_already_finished_dispatch() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let store = todo_store();

            store.dispatch_after(DispatchAfter::new(Duration::from_millis(10), DoNothing));
            tokio::time::sleep(Duration::from_millis(20)).await;

            // Scheduling again prunes the finished, failed dispatch
            store.dispatch_after(DispatchAfter::new(Duration::from_millis(10), add("x")));

            assert_eq!(
                store.settle().await,
                Err(PipelineError::UnregisteredAction {
                    tag: "DoNothing".to_string(),
                })
            );
            assert_eq!(store.state().todos, vec!["x"]);

            // The failure is reported once
            tokio_test::assert_ok!(store.settle().await);
        })
        .await;
}

#[test]
#[should_panic(expected = "LocalSet")]
fn test_dispatch_after_outside_local_set_panics() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|error| panic!("runtime: {error}"));
    let _guard = runtime.enter();

    let store = todo_store();
    store.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &AddTodoLater| {
        EffectMap::new().with_dispatch_after(action.delay, add(&action.name))
    });
    let _ = store.dispatch(AddTodoLater {
        name: "later".to_string(),
        delay: Duration::from_millis(1),
    });
}

#[test]
fn test_debug_output_format() -> Result<(), PipelineError> {
    let store = todo_store();
    let log = LogRecorder::new();

    store.register_event_state([store.debug_with(log.sink())], |state: &TodoState, _: &DoNothing| {
        state.clone()
    });
    store.register_event_state([store.debug_with(log.sink())], add_todo);

    store.dispatch(DoNothing)?;
    assert_eq!(
        log.lines(),
        vec![
            "\nHandling action: DoNothing:",
            "  No state changes made by event handler for action: DoNothing",
            "  ",
        ]
    );

    log.clear();
    store.dispatch(add("x"))?;
    assert_eq!(
        log.lines(),
        vec![
            "\nHandling action: AddTodo { name: \"x\" }:",
            "  Old State: TodoState { todos: [] }",
            "  New State: TodoState { todos: [\"x\"] }",
            "  ",
        ]
    );
    Ok(())
}

// ============================================================================
// Effects
// ============================================================================

#[test]
fn test_custom_effect_counter() -> Result<(), PipelineError> {
    let store = todo_store();
    let counter = Rc::new(RefCell::new(0_u32));
    let sink = Rc::clone(&counter);
    store.register_custom_effect("counter", move |step: u32| {
        *sink.borrow_mut() += step;
        Ok(())
    });
    store.register_event_effects([], |_: &CoeffectMap<TodoState>, _: &Count| {
        effects! { "counter" => 1_u32 }
    });

    store.dispatch(Count)?;
    store.dispatch(Count)?;

    assert_eq!(*counter.borrow(), 2);
    Ok(())
}

#[test]
fn test_effect_recorder_observes_instead_of_performing() -> Result<(), PipelineError> {
    let store = todo_store();
    let recorder = EffectRecorder::<String>::new();
    recorder.install(&store, "notify");
    store.register_event_effects([], |coeffects: &CoeffectMap<TodoState>, action: &PreAdd| {
        let count = coeffects.state().map_or(0, |state| state.todos.len());
        effects! { "notify" => format!("{} after {count}", action.name) }
    });

    store.dispatch(PreAdd {
        name: "a".to_string(),
    })?;

    assert_eq!(recorder.entries(), vec!["a after 0".to_string()]);
    Ok(())
}

#[test]
fn test_dispatch_multiple_runs_in_order() -> Result<(), PipelineError> {
    let store = todo_store();
    store.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &AddMany| {
        EffectMap::new().with_dispatch_multiple(
            action
                .names
                .iter()
                .map(|name| Box::new(add(name)) as effect_chain_core::BoxedAction),
        )
    });

    store.dispatch(AddMany {
        names: vec!["a", "b", "c"],
    })?;

    assert_eq!(store.state().todos, vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn test_state_and_dispatch_effects_compose() -> Result<(), PipelineError> {
    let store = todo_store();
    store.register_event_effects([], |coeffects: &CoeffectMap<TodoState>, action: &PreAdd| {
        let mut next = coeffects.state().cloned().unwrap_or_default();
        next.todos.push(format!("pre-{}", action.name));
        effects! {
            state: next,
            dispatch: AddTodo { name: action.name.clone() },
        }
    });

    store.dispatch(PreAdd {
        name: "x".to_string(),
    })?;

    // the state effect lands before the re-dispatch reads it
    assert_eq!(store.state().todos, vec!["pre-x", "x"]);
    Ok(())
}

#[test]
fn test_state_under_literal_key_is_applied() -> Result<(), PipelineError> {
    let store = todo_store();
    store.register_event_effects([], |_: &CoeffectMap<TodoState>, action: &PreAdd| {
        effects! {
            "state" => TodoState { todos: vec![action.name.clone()] },
        }
    });

    store.dispatch(PreAdd {
        name: "literal".to_string(),
    })?;

    assert_eq!(store.state().todos, vec!["literal"]);
    Ok(())
}

#[test]
fn test_injected_clock_coeffect() -> Result<(), PipelineError> {
    let store = todo_store();
    install_clock(&store, test_clock());
    let now = store.inject_coeffect("now")?;
    store.register_event_effects([now], |coeffects: &CoeffectMap<TodoState>, _: &DoNothing| {
        let stamp = coeffects
            .get::<DateTime<Utc>>("now")
            .map(|now| now.to_rfc3339())
            .unwrap_or_default();
        EffectMap::new().with_state(TodoState { todos: vec![stamp] })
    });

    store.dispatch(DoNothing)?;

    assert_eq!(store.state().todos, vec!["2025-01-01T00:00:00+00:00"]);
    Ok(())
}

// ============================================================================
// Interceptors
// ============================================================================

#[test]
fn test_enrich_deduplicates() -> Result<(), PipelineError> {
    let store = todo_store();
    let dedup = store.enrich(|mut state: TodoState, _: &AddTodo| {
        state.todos.dedup();
        state
    });
    store.register_event_state([dedup], add_todo);

    store.dispatch(add("x"))?;
    store.dispatch(add("x"))?;
    store.dispatch(add("y"))?;

    assert_eq!(store.state().todos, vec!["x", "y"]);
    Ok(())
}

#[test]
fn test_after_counts_dispatches() -> Result<(), PipelineError> {
    let store = todo_store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let audit = store.after(move |state: &TodoState, action: &AddTodo| {
        sink.borrow_mut().push((action.name.clone(), state.todos.len()));
    });
    store.register_event_state([audit], add_todo);

    store.dispatch(add("a"))?;
    store.dispatch(add("b"))?;

    assert_eq!(*seen.borrow(), vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    Ok(())
}

#[test]
fn test_after_without_state_effect_fails() {
    let store = todo_store();
    let audit = store.after(|_: &TodoState, _: &DoNothing| {});
    store.register_event_effects([audit], |_: &CoeffectMap<TodoState>, _: &DoNothing| EffectMap::new());

    assert_eq!(
        store.dispatch(DoNothing),
        Err(PipelineError::MissingEffect {
            key: "state".to_string()
        })
    );
}

#[test]
fn test_user_interceptors_run_in_chain_order() -> Result<(), PipelineError> {
    let store = todo_store();
    let trace = Rc::new(RefCell::new(Vec::new()));
    let tracer = |name: &'static str| {
        let before = Rc::clone(&trace);
        let after = Rc::clone(&trace);
        Interceptor::around(
            name,
            move |ctx: Context<TodoState>| {
                before.borrow_mut().push(format!("before {name}"));
                Ok(ctx)
            },
            move |ctx: Context<TodoState>| {
                after.borrow_mut().push(format!("after {name}"));
                Ok(ctx)
            },
        )
    };
    store.register_event_state([tracer("outer"), tracer("inner")], add_todo);

    store.dispatch(add("x"))?;

    assert_eq!(
        *trace.borrow(),
        vec!["before outer", "before inner", "after inner", "after outer"]
    );
    Ok(())
}

#[test]
fn test_effects_from_interceptors_are_not_lost() -> Result<(), PipelineError> {
    let store = todo_store();
    let counter = Rc::new(RefCell::new(0_u32));
    let sink = Rc::clone(&counter);
    store.register_custom_effect("counter", move |step: u32| {
        *sink.borrow_mut() += step;
        Ok(())
    });
    let bump = Interceptor::after("bump", |mut ctx: Context<TodoState>| {
        ctx.effects.insert_custom("counter", 5_u32);
        Ok(ctx)
    });
    store.register_event_state([bump], add_todo);

    store.dispatch(add("x"))?;

    assert_eq!(*counter.borrow(), 5);
    assert_eq!(store.state().todos, vec!["x"]);
    Ok(())
}

#[test]
fn test_state_coeffect_is_a_snapshot() -> Result<(), PipelineError> {
    let store = todo_store();
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let inspect = Interceptor::after("inspect", move |ctx: Context<TodoState>| {
        *sink.borrow_mut() = Some(ctx.coeffects.state()?.clone());
        Ok(ctx)
    });
    store.register_event_effects([inspect], |_: &CoeffectMap<TodoState>, action: &PreAdd| {
        effects! { dispatch: AddTodo { name: action.name.clone() } }
    });

    store.dispatch(add("first"))?;
    store.dispatch(PreAdd {
        name: "second".to_string(),
    })?;

    assert_eq!(
        *seen.borrow(),
        Some(TodoState {
            todos: vec!["first".to_string()]
        })
    );
    assert_eq!(store.state().todos, vec!["first", "second"]);
    Ok(())
}

// ============================================================================
// Observation
// ============================================================================

#[test]
fn test_unchanged_state_is_not_notified() -> Result<(), PipelineError> {
    let store = todo_store();
    store.register_event_state([], |state: &TodoState, _: &DoNothing| state.clone());
    let mut observer = store.subscribe();

    store.dispatch(DoNothing)?;
    assert!(!observer.has_changed().expect("store alive"));

    store.dispatch(add("x"))?;
    assert!(observer.has_changed().expect("store alive"));
    assert_eq!(observer.borrow_and_update().todos, vec!["x"]);
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unregistered_action() {
    StoreTest::new(TodoState::default())
        .when(DoNothing)
        .then_error(PipelineError::UnregisteredAction {
            tag: "DoNothing".to_string(),
        })
        .run();
}

#[test]
fn test_unregistered_effect() {
    StoreTest::new(TodoState::default())
        .given(|store| {
            store.register_event_effects([], |_: &CoeffectMap<TodoState>, _: &Count| {
                effects! { "missing" => () }
            });
        })
        .when(Count)
        .then_error(PipelineError::UnregisteredEffect {
            key: "missing".to_string(),
        })
        .run();
}

#[test]
fn test_nested_unregistered_action_propagates() {
    StoreTest::new(TodoState::default())
        .given(|store| {
            store.register_event_effects([], |_: &CoeffectMap<TodoState>, _: &Count| {
                effects! { dispatch: DoNothing }
            });
        })
        .when(Count)
        .then_error(PipelineError::UnregisteredAction {
            tag: "DoNothing".to_string(),
        })
        .run();
}

#[test]
fn test_missing_state_coeffect() {
    let store = todo_store();
    // a raw chain without inject_state
    let handler = Interceptor::before("handler", |mut ctx: Context<TodoState>| {
        let next = ctx.coeffects.state()?.clone();
        ctx.effects.set_state(next);
        Ok(ctx)
    });
    store.register_chain("DoNothing", vec![store.do_effects(), handler]);

    assert_eq!(
        store.dispatch(DoNothing),
        Err(PipelineError::MissingCoeffect {
            key: "state".to_string()
        })
    );
}

#[test]
fn test_cyclic_dispatch_is_bounded() {
    StoreTest::new(TodoState::default())
        .given(|store| {
            store.register_event_effects([], |_: &CoeffectMap<TodoState>, _: &Count| {
                effects! { dispatch: Count }
            });
        })
        .when(Count)
        .then_error(PipelineError::DispatchDepthExceeded {
            tag: "Count".to_string(),
            limit: 64,
        })
        .run();
}

#[test]
fn test_settle_with_nothing_scheduled() {
    let store = todo_store();
    store.dispatch(add("x")).expect("dispatch");

    assert_eq!(store.pending_dispatches(), 0);
    tokio_test::assert_ok!(tokio_test::block_on(store.settle()));
}

#[test]
fn test_store_handles_are_shared() {
    let store = todo_store();
    let other = store.clone();

    tokio_test::assert_ok!(other.dispatch(add("shared")));

    assert_eq!(store.state().todos, vec!["shared"]);
    tokio_test::assert_err!(store.dispatch(Count));
}
