//! Declarative macros for ergonomic effect map construction
//!
//! Effects handlers return an [`EffectMap`](crate::context::EffectMap). These
//! macros build one with the built-in keys spelled as fields and custom keys
//! spelled as string literals.

/// Build an `EffectMap`
///
/// Built-in keys:
///
/// - `state: <S>`
/// - `dispatch: <impl Action>`
/// - `dispatch_after: <Duration> => <impl Action>`
/// - `dispatch_multiple: [<impl Action>, ...]`
///
/// Any other key is a string literal mapped to a custom payload.
///
/// # Example
///
/// ```rust,ignore
/// use effect_chain_core::effects;
/// use std::time::Duration;
///
/// effects! {
///     state: new_state,
///     dispatch_after: Duration::from_secs(1) => AddTodo { name },
///     "counter" => CounterEffect::Increment,
/// }
/// ```
#[macro_export]
macro_rules! effects {
    (@munch $map:ident;) => {};
    (@munch $map:ident; state: $value:expr $(, $($rest:tt)*)?) => {
        $map.set_state($value);
        $crate::effects!(@munch $map; $($($rest)*)?);
    };
    (@munch $map:ident; dispatch: $action:expr $(, $($rest:tt)*)?) => {
        $map.set_dispatch($action);
        $crate::effects!(@munch $map; $($($rest)*)?);
    };
    (@munch $map:ident; dispatch_after: $delay:expr => $action:expr $(, $($rest:tt)*)?) => {
        $map.set_dispatch_after($crate::context::DispatchAfter::new($delay, $action));
        $crate::effects!(@munch $map; $($($rest)*)?);
    };
    (@munch $map:ident; dispatch_multiple: [$($action:expr),* $(,)?] $(, $($rest:tt)*)?) => {
        $map.set_dispatch_multiple([
            $(::std::boxed::Box::new($action) as $crate::action::BoxedAction),*
        ]);
        $crate::effects!(@munch $map; $($($rest)*)?);
    };
    (@munch $map:ident; $key:literal => $value:expr $(, $($rest:tt)*)?) => {
        $map.insert_custom($key, $value);
        $crate::effects!(@munch $map; $($($rest)*)?);
    };
    () => {
        $crate::context::EffectMap::new()
    };
    ($($body:tt)+) => {{
        let mut map = $crate::context::EffectMap::new();
        $crate::effects!(@munch map; $($body)+);
        map
    }};
}
