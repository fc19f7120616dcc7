//! Domain types for the todo example.

use effect_chain_core::DateTime;
use effect_chain_core::Utc;
use effect_chain_macros::Action;
use std::time::Duration;

/// State of the todo list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoState {
    /// Todo names in insertion order
    pub todos: Vec<String>,
    /// When the list last changed, from the `now` coeffect
    pub updated_at: Option<DateTime<Utc>>,
}

impl TodoState {
    /// Create an empty todo list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of todos
    #[must_use]
    pub fn count(&self) -> usize {
        self.todos.len()
    }

    /// Whether `name` is on the list
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.todos.iter().any(|todo| todo == name)
    }
}

/// Append a todo
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub struct AddTodo {
    /// Todo text
    pub name: String,
}

impl AddTodo {
    /// Create the action
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Validate and normalise a name, then re-dispatch as [`AddTodo`]
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub struct PreAddTodo {
    /// Raw todo text
    pub name: String,
}

/// Append a todo after a delay
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub struct AddTodoLater {
    /// Todo text
    pub name: String,
    /// How long to wait
    pub delay: Duration,
}

/// Append several todos in order
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub struct AddTodos {
    /// Todo texts
    pub names: Vec<String>,
}

/// Remove every todo
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub struct ClearTodos;

/// Leaves the state unchanged
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub struct DoNothing;
