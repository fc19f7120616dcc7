//! Property tests for interceptor ordering through a store
//!
//! Every registered chain is `[inject_state, do_effects, ..user, handler]`;
//! whatever the user interceptors look like, their `before` functions run in
//! chain order and their `after` functions in reverse.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use effect_chain_core::context::Context;
use effect_chain_core::interceptor::{ContextFn, Interceptor};
use effect_chain_macros::Action;
use effect_chain_runtime::store::Store;
use effect_chain_testing::properties::{Shape, chain_shapes, expected_trace};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Action, Debug)]
struct Tick;

type Trace = Rc<RefCell<Vec<String>>>;

fn traced(index: usize, shape: Shape, trace: &Trace) -> Interceptor<u64> {
    let before = shape.before.then(|| {
        let trace = Rc::clone(trace);
        Rc::new(move |ctx: Context<u64>| {
            trace.borrow_mut().push(format!("before {index}"));
            Ok(ctx)
        }) as ContextFn<u64>
    });
    let after = shape.after.then(|| {
        let trace = Rc::clone(trace);
        Rc::new(move |ctx: Context<u64>| {
            trace.borrow_mut().push(format!("after {index}"));
            Ok(ctx)
        }) as ContextFn<u64>
    });
    Interceptor::new(format!("traced {index}"), before, after)
}

proptest! {
    #[test]
    fn user_interceptors_obey_the_ordering_law(shapes in chain_shapes(10)) {
        let store = Store::new(0_u64);
        let trace = Trace::default();
        let interceptors: Vec<_> = shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| traced(index, *shape, &trace))
            .collect();
        store.register_event_state(interceptors, |count: &u64, _: &Tick| count + 1);

        prop_assert!(store.dispatch(Tick).is_ok());
        prop_assert_eq!(trace.borrow().clone(), expected_trace(&shapes));
        prop_assert_eq!(store.state(), 1);
    }

    #[test]
    fn repeated_dispatch_accumulates(times in 0_u64..20) {
        let store = Store::new(0_u64);
        store.register_event_state([], |count: &u64, _: &Tick| count + 1);

        for _ in 0..times {
            prop_assert!(store.dispatch(Tick).is_ok());
        }
        prop_assert_eq!(store.state(), times);
    }
}
