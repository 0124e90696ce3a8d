//! Consumer Implementation
//!
//! A Consumer is the sink of a flow graph: it has no value of its own and
//! runs a side-effecting callback with its source's value whenever that
//! value changes.
//!
//! # Activation
//!
//! Consumers are the only way to make flows hot. [`Consumer::turn_on`]
//! marks the consumer and, once the next pass runs, every flow upstream of
//! it as live. [`Consumer::turn_off`] reverses that. Both only record the
//! request; the graph changes during the next pass.
//!
//! Dropping a consumer that is still on turns it off, so the live-descendant
//! counters upstream stay balanced.
//!
//! # Failures
//!
//! A panicking callback is logged and does not stop propagation to other
//! consumers.

use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::smallvec;
use tracing::error;

use super::flow::{contain, Behavior, Flow, FlowNode};
use crate::graph::{FlowId, FlowRef, Node};

struct ConsumerBehavior<T> {
    source: Flow<T>,
    callback: Box<dyn Fn(&T)>,
}

impl<T: Clone + 'static> Behavior<()> for ConsumerBehavior<T> {
    fn recompute(&self, flow: &FlowNode<()>) -> bool {
        let name = flow.name();
        let result = contain(&name, || {
            // Snapshot first so the callback may write to its own source.
            let value = self.source.node.read(&name, T::clone)?;
            (self.callback)(&value);
            Ok(())
        });
        if let Err(err) = result {
            error!(flow = %name, error = %err, "consumer callback failed");
        }
        false
    }
}

/// A subscription to a flow's values.
pub struct Consumer<T> {
    node: Rc<FlowNode<()>>,
    _source: PhantomData<T>,
}

impl<T: Clone + 'static> Consumer<T> {
    pub(crate) fn new(source: &Flow<T>, callback: impl Fn(&T) + 'static) -> Self {
        let behavior = ConsumerBehavior {
            source: source.clone(),
            callback: Box::new(callback),
        };
        let node = FlowNode::build(
            source.node.scheduler(),
            smallvec![source.flow_ref()],
            "Consumer",
            None,
            move |_| Box::new(behavior) as Box<dyn Behavior<()>>,
        );
        Self {
            node,
            _source: PhantomData,
        }
    }

    /// Keep this consumer, and everything it depends on, up to date.
    pub fn turn_on(&self) {
        if self.node.core().replace_on(true) {
            return;
        }
        self.node.scheduler().add_recently_turned_on(self.flow_ref());
    }

    /// Stop keeping this consumer up to date.
    pub fn turn_off(&self) {
        if !self.node.core().replace_on(false) {
            return;
        }
        self.node.scheduler().add_recently_turned_off(self.flow_ref());
    }

    pub fn is_on(&self) -> bool {
        self.node.core().is_on()
    }

    pub fn is_hot(&self) -> bool {
        self.node.core().is_hot()
    }

    pub fn id(&self) -> FlowId {
        self.node.core().id()
    }

    pub fn name(&self) -> String {
        self.node.name()
    }

    pub fn with_name(self, label: &str) -> Self {
        self.node.core().set_label(label);
        self
    }

    pub fn flow_ref(&self) -> FlowRef {
        FlowRef(self.node.clone())
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        if self.node.core().replace_on(false) {
            let flow = FlowRef(self.node.clone());
            self.node.core().scheduler().add_recently_turned_off(flow);
        }
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.node.core();
        f.debug_struct("Consumer")
            .field("name", &core.name())
            .field("on", &core.is_on())
            .field("hot", &core.is_hot())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::reactive::Context;

    #[test]
    fn consumer_runs_when_turned_on() {
        let ctx = Context::new();
        let leaf = ctx.create_state(7);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let consumer = leaf.consume(move |v| seen_clone.borrow_mut().push(*v));

        ctx.run_until_stalled();
        assert!(seen.borrow().is_empty());

        consumer.turn_on();
        assert!(consumer.is_on());
        ctx.run_until_stalled();
        assert_eq!(*seen.borrow(), vec![7]);

        leaf.set(8);
        ctx.run_until_stalled();
        assert_eq!(*seen.borrow(), vec![7, 8]);
    }

    #[test]
    fn turned_off_consumer_stops_receiving() {
        let ctx = Context::new();
        let leaf = ctx.create_state(0);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let consumer = leaf.consume(move |_| runs_clone.set(runs_clone.get() + 1));
        consumer.turn_on();
        ctx.run_until_stalled();
        assert_eq!(runs.get(), 1);

        consumer.turn_off();
        ctx.run_until_stalled();
        leaf.set(1);
        ctx.run_until_stalled();

        assert_eq!(runs.get(), 1);
        assert!(leaf.is_cold());
        assert!(!consumer.is_hot());
    }

    #[test]
    fn dropping_an_active_consumer_releases_ancestors() {
        let ctx = Context::new();
        let leaf = ctx.create_state(0);
        let doubled = leaf.map(|v| v * 2);
        let consumer = doubled.consume(|_| {});
        consumer.turn_on();
        ctx.run_until_stalled();
        assert!(doubled.is_hot());

        drop(consumer);
        ctx.run_until_stalled();
        assert!(doubled.is_cold());
        assert!(leaf.is_cold());
        assert!(doubled.flow_ref().destinations().is_empty());
    }

    #[test]
    fn panicking_callback_does_not_block_siblings() {
        let ctx = Context::new();
        let leaf = ctx.create_state(1);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let failing = leaf.consume(|_| panic!("callback failed"));
        let healthy = leaf.consume(move |_| runs_clone.set(runs_clone.get() + 1));
        failing.turn_on();
        healthy.turn_on();
        ctx.run_until_stalled();

        leaf.set(2);
        ctx.run_until_stalled();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn callback_may_write_its_own_source() {
        let ctx = Context::new();
        let leaf = ctx.create_state(0);
        let writer = leaf.clone();
        let consumer = leaf.consume(move |v| {
            if *v < 3 {
                writer.set(v + 1);
            }
        });
        consumer.turn_on();
        ctx.run_until_stalled();
        assert_eq!(leaf.get(), 3);
    }

    /// Value whose clone fails for negative payloads.
    struct Brittle(i32);

    impl Clone for Brittle {
        fn clone(&self) -> Self {
            if self.0 < 0 {
                panic!("cannot clone {}", self.0);
            }
            Brittle(self.0)
        }
    }

    #[test]
    fn panicking_snapshot_is_contained() {
        let ctx = Context::new();
        let brittle = ctx.create_state(Brittle(1));
        let other = ctx.create_state(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let fragile = brittle.consume(move |b| seen_clone.borrow_mut().push(b.0));
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let steady = other.consume(move |_| runs_clone.set(runs_clone.get() + 1));
        fragile.turn_on();
        steady.turn_on();
        assert!(ctx.flush().is_ok());
        assert_eq!(runs.get(), 1);

        brittle.set(Brittle(-1));
        assert!(ctx.flush().is_ok());

        other.set(5);
        assert!(ctx.flush().is_ok());
        assert_eq!(runs.get(), 2);
        assert_eq!(*seen.borrow(), vec![1]);
    }
}
