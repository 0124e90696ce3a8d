//! Flow Context
//!
//! A [`Context`] owns a flow graph: it hands out identifiers, creates leaf
//! flows, and schedules the passes that keep hot flows current.
//!
//! # Batching
//!
//! Every mutation and every activation change requests a pass on the
//! context's executor. Requests made before that pass runs share it, so a
//! burst of writes in one turn is observed by consumers once. [`freeze`] and
//! [`thaw`] widen the batch across turns: while frozen no passes are
//! requested, and thawing requests one if anything happened meanwhile. A pass
//! already requested before freezing still runs.
//!
//! Dropping the last handle to a context detaches its graph. Pending work is
//! discarded and flows that outlive the context keep their last values
//! without propagating further.
//!
//! [`freeze`]: Context::freeze
//! [`thaw`]: Context::thaw

use std::rc::Rc;

use tracing::info;

use super::executor::{Executor, LocalExecutor};
use super::flow::{map_all, Flow, FlowNode};
use super::state::StateFlow;
use crate::config::ContextConfig;
use crate::error::Result;
use crate::graph::{GraphDump, Scheduler, Sources};

/// Scheduler and owner of a flow graph.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    scheduler: Rc<Scheduler>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.scheduler.detach();
    }
}

impl Context {
    /// Create a context driven by a [`LocalExecutor`].
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self::with_executor(config, Rc::new(LocalExecutor::new()))
    }

    pub fn with_executor(config: ContextConfig, executor: Rc<dyn Executor>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                scheduler: Scheduler::new(config, executor),
            }),
        }
    }

    pub(crate) fn scheduler(&self) -> &Rc<Scheduler> {
        &self.inner.scheduler
    }

    pub fn config(&self) -> &ContextConfig {
        self.inner.scheduler.config()
    }

    /// Create a leaf flow holding `initial`.
    pub fn create_state<T: Clone + 'static>(&self, initial: T) -> StateFlow<T> {
        let node = FlowNode::build(
            &self.inner.scheduler,
            Sources::new(),
            "StateFlow",
            Some(initial),
            |_| StateFlow::behavior(),
        );
        let flow = Flow::from_node(node);
        self.inner.scheduler.register_state(&flow.flow_ref());
        StateFlow::new(flow)
    }

    /// Concatenate the values of several list flows, in order.
    pub fn flatten<T: Clone + 'static>(&self, flows: &[Flow<Vec<T>>]) -> Flow<Vec<T>> {
        map_all(&self.inner.scheduler, flows.to_vec(), |lists| {
            lists.iter().flat_map(|list| list.iter().cloned()).collect()
        })
    }

    /// Stop requesting passes until [`thaw`](Self::thaw).
    pub fn freeze(&self) {
        self.inner.scheduler.freeze();
    }

    /// Resume requesting passes, requesting one if work is pending.
    pub fn thaw(&self) {
        self.inner.scheduler.thaw();
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.scheduler.is_frozen()
    }

    /// Run `f` with the context frozen, then thaw.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.freeze();
        let result = f();
        self.thaw();
        result
    }

    /// Run a pass synchronously, for hosts without an event loop.
    ///
    /// Fails with `AlreadyUpdating` when called from inside a pass.
    pub fn flush(&self) -> Result<()> {
        self.inner.scheduler.update()
    }

    /// Drive the executor until no queued task can make progress.
    pub fn run_until_stalled(&self) {
        let executor = Rc::clone(self.inner.scheduler.executor());
        executor.run_until_stalled();
    }

    /// Number of passes that found work to do.
    pub fn pass_count(&self) -> u64 {
        self.inner.scheduler.pass_count()
    }

    /// Snapshot of every flow reachable from a live leaf.
    pub fn graph(&self) -> Result<GraphDump> {
        self.inner.scheduler.graph()
    }

    /// Log the graph edge list at `info` level.
    pub fn print_graph(&self) -> Result<()> {
        let dump = self.graph()?;
        info!(context = %self.config().label, "flow graph\n{dump}");
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.config().label)
            .field("frozen", &self.is_frozen())
            .field("passes", &self.pass_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn frozen_context_defers_passes() {
        let ctx = Context::new();
        let leaf = ctx.create_state(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let consumer = leaf.consume(move |v| seen_clone.borrow_mut().push(*v));
        consumer.turn_on();
        ctx.run_until_stalled();

        ctx.freeze();
        leaf.set(1);
        ctx.run_until_stalled();
        leaf.set(2);
        ctx.run_until_stalled();
        assert_eq!(*seen.borrow(), vec![0]);

        ctx.thaw();
        ctx.run_until_stalled();
        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn thaw_without_work_requests_nothing() {
        let ctx = Context::new();
        ctx.freeze();
        ctx.thaw();
        ctx.run_until_stalled();
        assert_eq!(ctx.pass_count(), 0);
    }

    #[test]
    fn batch_groups_writes() {
        let ctx = Context::new();
        let a = ctx.create_state(1);
        let b = ctx.create_state(2);
        let sum = a.map2(&b, |x, y| x + y);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let consumer = sum.consume(move |v| seen_clone.borrow_mut().push(*v));
        consumer.turn_on();
        ctx.run_until_stalled();

        ctx.batch(|| {
            a.set(10);
            ctx.run_until_stalled();
            b.set(20);
        });
        ctx.run_until_stalled();
        assert_eq!(*seen.borrow(), vec![3, 30]);
    }

    #[test]
    fn flush_runs_synchronously() {
        let ctx = Context::new();
        let leaf = ctx.create_state(1);
        let doubled = leaf.map(|v| v * 2);
        let consumer = doubled.consume(|_| {});
        consumer.turn_on();
        ctx.flush().unwrap();
        assert_eq!(doubled.value(), Some(2));
    }

    #[test]
    fn flatten_concatenates_in_order() {
        let ctx = Context::new();
        let a = ctx.create_state(vec![1, 2]);
        let b = ctx.create_state(vec![3]);
        let all = ctx.flatten(&[a.flow().clone(), b.flow().clone()]);
        let consumer = all.consume(|_| {});
        consumer.turn_on();
        ctx.run_until_stalled();
        assert_eq!(all.value(), Some(vec![1, 2, 3]));

        b.set(vec![]);
        a.set(vec![0]);
        ctx.run_until_stalled();
        assert_eq!(all.value(), Some(vec![0]));
    }

    #[test]
    fn graph_dump_lists_edges_breadth_first() {
        let ctx = Context::new();
        let leaf = ctx.create_state(1).with_name("count");
        let doubled = leaf.map(|v| v * 2).with_name("doubled");
        let view = doubled.consume(|_| {}).with_name("view");
        assert_eq!(leaf.name(), format!("count#{}", leaf.id()));

        let dump = ctx.graph().unwrap();
        let text = dump.to_string();
        let expected = format!(
            "\"{l}\"\n\"{l}\" -> \"{d}\"\n\"{d}\"\n\"{d}\" -> \"{c}\"\n\"{c}\"\n",
            l = leaf.name(),
            d = doubled.name(),
            c = view.name(),
        );
        assert_eq!(text, expected);
        assert_eq!(dump.edges().count(), 2);

        let json = dump.to_json().unwrap();
        let parsed: GraphDump = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, dump);
    }

    #[test]
    #[should_panic(expected = "belongs to another context")]
    fn combining_flows_of_two_contexts_panics() {
        let ours = Context::new();
        let theirs = Context::new();
        let a = ours.create_state(1);
        let b = theirs.create_state(10);
        let _sum = a.map2(&b, |x, y| x + y);
    }

    #[test]
    #[should_panic(expected = "belongs to another context")]
    fn flattening_foreign_flows_panics() {
        let ours = Context::new();
        let theirs = Context::new();
        let list = theirs.create_state(vec![1]);
        let _all = ours.flatten(&[list.flow().clone()]);
    }

    #[test]
    fn dropping_the_context_frees_pending_work() {
        let ctx = Context::new();
        let scheduler = Rc::downgrade(ctx.scheduler());
        let leaf = ctx.create_state(1);
        let doubled = leaf.map(|v| v * 2);
        let consumer = doubled.consume(|_| {});
        consumer.turn_on();
        leaf.set(2);

        drop(ctx);
        drop(consumer);
        drop(doubled);
        drop(leaf);
        assert!(scheduler.upgrade().is_none());
    }
}
