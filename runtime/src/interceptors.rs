//! Interceptor factories bound to a store.
//!
//! `inject_coeffect`, `inject_state` and `do_effects` connect a chain to the
//! store's registry; `debug`, `enrich` and `after` are general-purpose
//! interceptors users add to their own chains.

use crate::builtins;
use crate::store::Store;
use crate::telemetry;
use effect_chain_core::action::Action;
use effect_chain_core::context::{Context, keys};
use effect_chain_core::error::PipelineError;
use effect_chain_core::interceptor::Interceptor;
use effect_chain_core::registry::{CoeffectHandler, EffectHandler};
use std::fmt::Debug;
use std::rc::Rc;

/// Name of the interceptor returned by [`Store::do_effects`]
pub const DO_EFFECTS: &str = "do_effects";

/// Name of the interceptor returned by [`Store::debug`]
pub const DEBUG: &str = "debug";

/// Name of the interceptor returned by [`Store::enrich`]
pub const ENRICH: &str = "enrich";

/// Name of the interceptor returned by [`Store::after`]
pub const AFTER: &str = "after";

fn injector<S: 'static>(key: &str, handler: CoeffectHandler<S>) -> Interceptor<S> {
    Interceptor::before(format!("coeffect: {key}"), move |mut ctx: Context<S>| {
        ctx.coeffects = handler(std::mem::take(&mut ctx.coeffects))?;
        Ok(ctx)
    })
}

impl<S> Store<S>
where
    S: Clone + PartialEq + 'static,
{
    /// An interceptor whose `before` runs the coeffect handler for `key`
    ///
    /// The handler is looked up now, not when the chain runs; registering a
    /// different handler later does not affect interceptors already built.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnregisteredCoeffect`] if nothing is registered for `key`.
    pub fn inject_coeffect(&self, key: &str) -> Result<Interceptor<S>, PipelineError> {
        let handler = self
            .coeffect_handler(key)
            .ok_or_else(|| PipelineError::UnregisteredCoeffect {
                key: key.to_string(),
            })?;
        Ok(injector(key, handler))
    }

    /// [`Store::inject_coeffect`] for the built-in `state` coeffect
    #[must_use]
    pub fn inject_state(&self) -> Interceptor<S> {
        let handler = self
            .coeffect_handler(keys::STATE)
            .unwrap_or_else(|| Rc::new(builtins::state_coeffect(self.downgrade())));
        injector(keys::STATE, handler)
    }

    /// An interceptor whose `after` applies every effect in the context
    ///
    /// The `state` effect is applied first so that actions re-dispatched by
    /// other effects see the new state. Every key is resolved before any
    /// effect runs; an unknown key fails the chain with nothing applied.
    /// The effect map is consumed.
    #[must_use]
    pub fn do_effects(&self) -> Interceptor<S> {
        let store = self.downgrade();
        Interceptor::after(DO_EFFECTS, move |mut ctx: Context<S>| {
            let store = store.upgrade()?;
            let resolved = std::mem::take(&mut ctx.effects)
                .into_ordered()
                .into_iter()
                .map(|(key, effect)| match store.effect_handler(&key) {
                    Some(handler) => Ok((key, handler, effect)),
                    None => Err(PipelineError::UnregisteredEffect {
                        key: key.to_string(),
                    }),
                })
                .collect::<Result<Vec<(_, EffectHandler<S>, _)>, _>>()?;

            for (key, handler, effect) in resolved {
                tracing::trace!(key = %key, "Applying effect");
                metrics::counter!(telemetry::EFFECTS_APPLIED, "key" => key.to_string()).increment(1);
                handler(effect)?;
            }
            Ok(ctx)
        })
    }

    /// An `after`-only interceptor that rewrites the `state` effect
    ///
    /// Useful for deriving data from the new state in one place, whatever
    /// handler produced it.
    ///
    /// # Errors
    ///
    /// The interceptor fails the chain with [`PipelineError::MissingEffect`]
    /// if the context has no `state` effect when it runs.
    #[must_use]
    pub fn enrich<A, F>(&self, f: F) -> Interceptor<S>
    where
        A: Action,
        F: Fn(S, &A) -> S + 'static,
    {
        Interceptor::after(ENRICH, move |mut ctx: Context<S>| {
            let action = ctx.coeffects.action_as::<A>()?;
            let enriched = f(ctx.effects.take_state()?, action);
            ctx.effects.set_state(enriched);
            Ok(ctx)
        })
    }

    /// An `after`-only interceptor that runs a side effect on the new state
    ///
    /// The context passes through unchanged.
    ///
    /// # Errors
    ///
    /// The interceptor fails the chain with [`PipelineError::MissingEffect`]
    /// if the context has no `state` effect when it runs.
    #[must_use]
    pub fn after<A, F>(&self, f: F) -> Interceptor<S>
    where
        A: Action,
        F: Fn(&S, &A) + 'static,
    {
        Interceptor::after(AFTER, move |ctx: Context<S>| {
            f(ctx.effects.state()?, ctx.coeffects.action_as::<A>()?);
            Ok(ctx)
        })
    }
}

impl<S> Store<S>
where
    S: Clone + PartialEq + Debug + 'static,
{
    /// [`Store::debug_with`] writing to `tracing` at debug level
    #[must_use]
    pub fn debug(&self) -> Interceptor<S> {
        self.debug_with(|line: String| tracing::debug!(target: "effect_chain::debug", "{line}"))
    }

    /// An interceptor that logs the action and any state change
    ///
    /// `before` logs `"\nHandling action: <action>:"`. `after` logs the old
    /// and new state when the `state` effect differs from the injected state,
    /// a "No state changes" line otherwise, then an empty line. Every `after`
    /// line is indented by two spaces.
    #[must_use]
    pub fn debug_with<F>(&self, log: F) -> Interceptor<S>
    where
        F: Fn(String) + 'static,
    {
        let log = Rc::new(log);
        let log_before = Rc::clone(&log);

        Interceptor::around(
            DEBUG,
            move |ctx: Context<S>| {
                log_before(format!("\nHandling action: {}:", describe_action(&ctx)));
                Ok(ctx)
            },
            move |ctx: Context<S>| {
                let emit = |line: String| log(format!("  {line}"));
                match (ctx.coeffects.state(), ctx.effects.state()) {
                    (Ok(old), Ok(new)) if old != new => {
                        emit(format!("Old State: {old:?}"));
                        emit(format!("New State: {new:?}"));
                    }
                    _ => emit(format!(
                        "No state changes made by event handler for action: {}",
                        describe_action(&ctx)
                    )),
                }
                emit(String::new());
                Ok(ctx)
            },
        )
    }
}

fn describe_action<S: 'static>(ctx: &Context<S>) -> String {
    ctx.coeffects
        .action()
        .map(|action| format!("{action:?}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use effect_chain_core::context::{CoeffectMap, EffectMap};
    use std::any::Any;
    use std::cell::RefCell;

    #[derive(Debug)]
    struct Rename(&'static str);

    impl Action for Rename {
        fn tag() -> &'static str {
            "Rename"
        }

        fn type_name(&self) -> &'static str {
            Self::tag()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn unknown_coeffect_fails_at_construction() {
        let store = Store::new(String::new());
        assert_eq!(
            store.inject_coeffect("now").map(|i| i.name().to_string()),
            Err(PipelineError::UnregisteredCoeffect {
                key: "now".to_string()
            })
        );
    }

    #[test]
    fn injected_coeffect_reaches_the_handler() -> Result<(), PipelineError> {
        let store = Store::new(String::new());
        store.register_coeffect_value("greeting", || "hello");
        let inject = store.inject_coeffect("greeting")?;

        store.register_event_effects([inject], |coeffects: &CoeffectMap<String>, _: &Rename| {
            let greeting = coeffects.get::<&'static str>("greeting").map_or("", |g| *g);
            EffectMap::new().with_state(greeting.to_string())
        });
        store.dispatch(Rename("ignored"))?;

        assert_eq!(store.state(), "hello");
        Ok(())
    }

    #[test]
    fn unknown_effect_applies_nothing() {
        let store = Store::new(String::from("old"));
        store.register_event_effects([], |_: &CoeffectMap<String>, action: &Rename| {
            EffectMap::new()
                .with_state(action.0.to_string())
                .with_custom("launch", ())
        });

        let result = store.dispatch(Rename("new"));

        assert_eq!(
            result,
            Err(PipelineError::UnregisteredEffect {
                key: "launch".to_string()
            })
        );
        assert_eq!(store.state(), "old");
    }

    #[test]
    fn custom_effect_receives_payload() -> Result<(), PipelineError> {
        let store = Store::new(String::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.register_custom_effect("audit", move |entry: String| {
            sink.borrow_mut().push(entry);
            Ok(())
        });
        store.register_event_effects([], |_: &CoeffectMap<String>, action: &Rename| {
            EffectMap::new().with_custom("audit", format!("renamed to {}", action.0))
        });

        store.dispatch(Rename("b"))?;

        assert_eq!(*seen.borrow(), vec!["renamed to b".to_string()]);
        Ok(())
    }

    #[test]
    fn debug_logs_state_changes() -> Result<(), PipelineError> {
        let store = Store::new(String::from("a"));
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        let debug = store.debug_with(move |line| sink.borrow_mut().push(line));

        store.register_event_state([debug], |_: &String, action: &Rename| action.0.to_string());
        store.dispatch(Rename("b"))?;

        assert_eq!(
            *lines.borrow(),
            vec![
                "\nHandling action: Rename(\"b\"):".to_string(),
                "  Old State: \"a\"".to_string(),
                "  New State: \"b\"".to_string(),
                "  ".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn enrich_rewrites_the_state_effect() -> Result<(), PipelineError> {
        let store = Store::new(String::new());
        let shout = store.enrich(|state: String, _: &Rename| state.to_uppercase());

        store.register_event_state([shout], |_: &String, action: &Rename| action.0.to_string());
        store.dispatch(Rename("quiet"))?;

        assert_eq!(store.state(), "QUIET");
        Ok(())
    }

    #[test]
    fn enrich_without_state_effect_fails() {
        let store = Store::new(String::new());
        let shout = store.enrich(|state: String, _: &Rename| state.to_uppercase());
        store.register_event_effects([shout], |_: &CoeffectMap<String>, _: &Rename| EffectMap::new());

        assert_eq!(
            store.dispatch(Rename("x")),
            Err(PipelineError::MissingEffect {
                key: keys::STATE.to_string()
            })
        );
    }

    #[test]
    fn after_sees_the_new_state() -> Result<(), PipelineError> {
        let store = Store::new(String::new());
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let record = store.after(move |state: &String, action: &Rename| {
            *sink.borrow_mut() = Some((state.clone(), action.0));
        });

        store.register_event_state([record], |_: &String, action: &Rename| format!("{}!", action.0));
        store.dispatch(Rename("go"))?;

        assert_eq!(*seen.borrow(), Some(("go!".to_string(), "go")));
        Ok(())
    }
}
