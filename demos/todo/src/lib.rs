//! Todo example demonstrating the interceptor pipeline end to end.
//!
//! It demonstrates:
//!
//! - Pure state handlers and effects handlers
//! - Re-dispatch through `dispatch`, `dispatchMultiple` and `dispatchAfter`
//! - An injected `now` coeffect and a custom `announce` effect
//! - The `debug`, `enrich` and `after` interceptors
//! - `#[derive(Action)]`
//! - Testing with `StoreTest`
//!
//! # Quick Start
//!
//! ```no_run
//! use todo::{AddTodo, TodoState, handlers};
//! use effect_chain_core::environment::SystemClock;
//! use effect_chain_runtime::store::Store;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new(TodoState::new());
//! handlers::register(&store, SystemClock)?;
//!
//! store.dispatch(AddTodo::new("Buy milk"))?;
//! println!("Total todos: {}", store.with_state(TodoState::count));
//! # Ok(())
//! # }
//! ```

pub mod handlers;
pub mod types;

// Re-export commonly used types
pub use types::{AddTodo, AddTodoLater, AddTodos, ClearTodos, DoNothing, PreAddTodo, TodoState};
