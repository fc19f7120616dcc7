//! Simple CLI demo for the todo example.
//!
//! Run with `RUST_LOG=debug` to see the `debug` interceptor's output.

use effect_chain_core::environment::SystemClock;
use effect_chain_runtime::store::Store;
use std::time::Duration;
use todo::{AddTodo, AddTodoLater, AddTodos, ClearTodos, DoNothing, PreAddTodo, TodoState, handlers};
use tracing_subscriber::EnvFilter;

fn print_todos(state: &TodoState) {
    for todo in &state.todos {
        println!("  - {todo}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Todo Example ===\n");

    // Delayed dispatches run on the LocalSet that owns the store
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let store = Store::new(TodoState::new());
            handlers::register(&store, SystemClock)?;

            let mut changes = store.subscribe();

            println!("Creating todos...");
            store.dispatch(AddTodo::new("Buy milk"))?;
            store.dispatch(PreAddTodo {
                name: "  Write documentation  ".to_string(),
            })?;
            store.dispatch(AddTodos {
                names: vec!["Deploy".to_string(), "Buy milk".to_string()],
            })?;
            store.dispatch(DoNothing)?;

            store.with_state(|state| {
                println!("\nTodos: {}", state.count());
                print_todos(state);
            });

            println!("\nScheduling 'Celebrate' in 200ms...");
            store.dispatch(AddTodoLater {
                name: "Celebrate".to_string(),
                delay: Duration::from_millis(200),
            })?;
            println!("Pending dispatches: {}", store.pending_dispatches());

            drop(changes.borrow_and_update());
            changes.changed().await?;
            println!("\nState changed:");
            print_todos(&changes.borrow_and_update());

            store.settle().await?;

            println!("\nClearing...");
            store.dispatch(ClearTodos)?;
            println!("Final todos: {}", store.with_state(TodoState::count));

            Ok::<(), Box<dyn std::error::Error>>(())
        })
        .await?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
