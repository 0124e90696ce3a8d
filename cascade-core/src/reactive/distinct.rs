//! Distinct-until-changed flows.

use std::cell::RefCell;

use tracing::error;

use super::flow::{contain, Behavior, Flow, FlowNode};

pub(crate) struct DistinctBehavior<T> {
    source: Flow<T>,
    is_equal: Box<dyn Fn(&T, &T) -> bool>,
    /// Last value seen. `None` until the first computation.
    last: RefCell<Option<T>>,
}

impl<T: Clone + 'static> DistinctBehavior<T> {
    pub(crate) fn new(source: Flow<T>, is_equal: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            source,
            is_equal: Box::new(is_equal),
            last: RefCell::new(None),
        }
    }
}

impl<T: Clone + 'static> Behavior<T> for DistinctBehavior<T> {
    fn recompute(&self, flow: &FlowNode<T>) -> bool {
        let name = flow.name();
        let result = contain(&name, || {
            self.source.node.read(&name, |current| {
                let changed = match self.last.borrow().as_ref() {
                    Some(last) => !(self.is_equal)(current, last),
                    None => true,
                };
                *self.last.borrow_mut() = Some(current.clone());
                (changed, current.clone())
            })
        });
        match result {
            Ok((changed, value)) => {
                flow.store(value);
                changed
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
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::reactive::Context;

    #[test]
    fn repeated_values_are_suppressed() {
        let ctx = Context::new();
        let input = ctx.create_state(1);
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let emitted_clone = emitted.clone();
        let consumer = input
            .distinct()
            .consume(move |v| emitted_clone.borrow_mut().push(*v));
        consumer.turn_on();
        ctx.run_until_stalled();

        for v in [1, 2, 2, 3] {
            input.set(v);
            ctx.run_until_stalled();
        }
        assert_eq!(*emitted.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn custom_equality() {
        let ctx = Context::new();
        let input = ctx.create_state(String::from("Hello"));
        let folded = input.distinct_until_changed(|a, b| a.eq_ignore_ascii_case(b));
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let emitted_clone = emitted.clone();
        let consumer = folded.consume(move |v: &String| emitted_clone.borrow_mut().push(v.clone()));
        consumer.turn_on();
        ctx.run_until_stalled();

        input.set("HELLO".to_string());
        ctx.run_until_stalled();
        input.set("world".to_string());
        ctx.run_until_stalled();

        assert_eq!(*emitted.borrow(), vec!["Hello".to_string(), "world".to_string()]);
        // The stored value still tracks the source even when suppressed.
        assert_eq!(folded.value().as_deref(), Some("world"));
    }
}
