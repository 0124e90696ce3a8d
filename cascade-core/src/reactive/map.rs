//! Map Flows
//!
//! A map flow derives its value from the current values of one or more
//! sources through a user function. The unary, binary, ternary and N-ary
//! combinators all build this kind; they differ only in how the evaluation
//! closure reads its sources.
//!
//! A failing function (an `Err` from [`Flow::try_map`](super::Flow::try_map),
//! a panic, or a source with no value yet) is logged and leaves the previous
//! value in place. The flow then reports "unchanged", so nothing downstream
//! of it recomputes this pass. Unrelated branches are unaffected.

use tracing::error;

use super::flow::{contain, Behavior, FlowNode};
use crate::error::Result;

/// Evaluation closure. Receives the flow's own name for error reporting.
type Eval<U> = Box<dyn Fn(&str) -> Result<U>>;

pub(crate) struct MapBehavior<U> {
    eval: Eval<U>,
}

impl<U> MapBehavior<U> {
    pub(crate) fn new(eval: impl Fn(&str) -> Result<U> + 'static) -> Self {
        Self {
            eval: Box::new(eval),
        }
    }
}

impl<U: 'static> Behavior<U> for MapBehavior<U> {
    fn recompute(&self, flow: &FlowNode<U>) -> bool {
        let name = flow.name();
        match contain(&name, || (self.eval)(&name)) {
            Ok(value) => {
                flow.store(value);
                true
            }
            Err(err) => {
                error!(flow = %name, error = %err, "flow computation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::reactive::Context;

    #[test]
    fn map_follows_source() {
        let ctx = Context::new();
        let count = ctx.create_state(2);
        let doubled = count.map(|v| v * 2);
        let consumer = doubled.consume(|_| {});
        consumer.turn_on();
        ctx.run_until_stalled();
        assert_eq!(doubled.value(), Some(4));

        count.set(5);
        ctx.run_until_stalled();
        assert_eq!(doubled.value(), Some(10));
    }

    #[test]
    fn cold_map_does_not_compute() {
        let calls = Rc::new(Cell::new(0));
        let ctx = Context::new();
        let count = ctx.create_state(1);
        let calls_clone = calls.clone();
        let mapped = count.map(move |v| {
            calls_clone.set(calls_clone.get() + 1);
            v + 1
        });

        count.set(2);
        ctx.run_until_stalled();
        assert_eq!(calls.get(), 0);
        assert_eq!(mapped.value(), None);
        assert!(mapped.is_cold());
    }

    #[test]
    fn failed_map_keeps_last_value() {
        let ctx = Context::new();
        let input = ctx.create_state(1_i32);
        let checked = input.try_map(|v| {
            if *v < 0 {
                Err("negative input")
            } else {
                Ok(v * 10)
            }
        });
        let consumer = checked.consume(|_| {});
        consumer.turn_on();
        ctx.run_until_stalled();
        assert_eq!(checked.value(), Some(10));

        input.set(-1);
        ctx.run_until_stalled();
        assert_eq!(checked.value(), Some(10));

        input.set(3);
        ctx.run_until_stalled();
        assert_eq!(checked.value(), Some(30));
    }

    #[test]
    fn panicking_map_is_contained() {
        let ctx = Context::new();
        let input = ctx.create_state(1_u32);
        let fragile = input.map(|v| {
            if *v == 0 {
                panic!("zero");
            }
            100 / v
        });
        let consumer = fragile.consume(|_| {});
        consumer.turn_on();
        ctx.run_until_stalled();
        assert_eq!(fragile.value(), Some(100));

        input.set(0);
        ctx.run_until_stalled();
        assert_eq!(fragile.value(), Some(100));
    }

    #[test]
    fn n_ary_maps_combine_sources_in_order() {
        let ctx = Context::new();
        let a = ctx.create_state(1);
        let b = ctx.create_state(10);
        let c = ctx.create_state(100);

        let sum3 = a.map3(&b, &c, |x, y, z| x + y + z);
        let listed = a.map_n(&[b.flow().clone(), c.flow().clone()], |values| {
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
        });
        let pair = a.zip(&b);

        let c1 = sum3.consume(|_| {});
        let c2 = listed.consume(|_| {});
        let c3 = pair.consume(|_| {});
        c1.turn_on();
        c2.turn_on();
        c3.turn_on();
        ctx.run_until_stalled();

        assert_eq!(sum3.value(), Some(111));
        assert_eq!(listed.value().as_deref(), Some("1,10,100"));
        assert_eq!(pair.value(), Some((1, 10)));
    }
}
