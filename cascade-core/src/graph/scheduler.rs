//! Update Scheduler
//!
//! The scheduler owns the pending work of a context and runs the update pass
//! that keeps hot flows current.
//!
//! # Algorithm
//!
//! Mutations and activation changes only record work and request a deferred
//! pass. Requests made before the pass runs collapse into one. Each pass:
//!
//! 1. Walks backward from every flow turned on since the last pass,
//!    incrementing live-descendant counters. Flows whose counter reaches 1
//!    become hot. Flows turned off are walked the same way, decrementing;
//!    flows reaching 0 become cold.
//! 2. Walks forward from the dirtied flows plus the newly hot ones in
//!    identifier order. Cold flows are skipped. Newly hot flows and flows
//!    reached through an edge are recomputed. A dirtied flow that is not
//!    newly hot already holds its new value and counts as changed. Only
//!    changed flows continue the walk into their destinations.
//!
//! Both walks use a [`UniqueMinQueue`] ranked by identifier (negated when
//! walking backward), so a flow is visited only after every source of it
//! reachable in the same walk.
//!
//! Pending work is checked for flows of other contexts before step 1, so a
//! rejected pass leaves every counter untouched.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use indexmap::IndexSet;
use tracing::{debug, error, trace, warn};

use super::dump::GraphDump;
use super::node::{FlowRef, Node};
use super::queue::UniqueMinQueue;
use crate::config::ContextConfig;
use crate::error::{FlowError, Result};
use crate::reactive::Executor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Toward destinations.
    Forward,
    /// Toward sources.
    Backward,
}

/// Pending work and pass state of one context.
pub(crate) struct Scheduler {
    config: ContextConfig,
    executor: Rc<dyn Executor>,
    this: Weak<Scheduler>,
    needs_update: RefCell<IndexSet<FlowRef>>,
    recently_on: RefCell<IndexSet<FlowRef>>,
    recently_off: RefCell<IndexSet<FlowRef>>,
    updating: Cell<bool>,
    frozen: Cell<bool>,
    update_scheduled: Cell<bool>,
    detached: Cell<bool>,
    passes: Cell<u64>,
    state_flows: RefCell<Vec<Weak<dyn Node>>>,
}

/// Clears the `updating` flag when a pass ends, unwinding included.
struct UpdateGuard<'a>(&'a Cell<bool>);

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    pub(crate) fn new(config: ContextConfig, executor: Rc<dyn Executor>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            config,
            executor,
            this: this.clone(),
            needs_update: RefCell::new(IndexSet::new()),
            recently_on: RefCell::new(IndexSet::new()),
            recently_off: RefCell::new(IndexSet::new()),
            updating: Cell::new(false),
            frozen: Cell::new(false),
            update_scheduled: Cell::new(false),
            detached: Cell::new(false),
            passes: Cell::new(0),
            state_flows: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &Rc<dyn Executor> {
        &self.executor
    }

    /// Remember a leaf flow for graph dumps.
    pub(crate) fn register_state(&self, flow: &FlowRef) {
        let mut states = self.state_flows.borrow_mut();
        states.retain(|weak| weak.strong_count() > 0);
        states.push(Rc::downgrade(&flow.0));
    }

    pub(crate) fn add_recently_updated(&self, flow: FlowRef) {
        if self.detached.get() {
            return;
        }
        self.needs_update.borrow_mut().insert(flow);
        self.dispatch_update();
    }

    pub(crate) fn add_recently_turned_on(&self, flow: FlowRef) {
        if self.detached.get() {
            return;
        }
        // A turn-off not yet applied simply cancels out.
        if !self.recently_off.borrow_mut().shift_remove(&flow) {
            self.recently_on.borrow_mut().insert(flow);
        }
        self.dispatch_update();
    }

    pub(crate) fn add_recently_turned_off(&self, flow: FlowRef) {
        if self.detached.get() {
            return;
        }
        if !self.recently_on.borrow_mut().shift_remove(&flow) {
            self.recently_off.borrow_mut().insert(flow);
        }
        self.dispatch_update();
    }

    pub(crate) fn freeze(&self) {
        self.frozen.set(true);
    }

    pub(crate) fn thaw(&self) {
        self.frozen.set(false);
        if self.has_pending_work() {
            self.dispatch_update();
        }
    }

    /// Called when the owning context is dropped. Pending work is discarded
    /// and later requests are ignored, which releases the nodes it held.
    pub(crate) fn detach(&self) {
        self.detached.set(true);
        let discarded = self.needs_update.take().len()
            + self.recently_on.take().len()
            + self.recently_off.take().len();
        if discarded > 0 {
            debug!(context = %self.config.label, discarded, "context dropped with pending work");
        }
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub(crate) fn pass_count(&self) -> u64 {
        self.passes.get()
    }

    pub(crate) fn has_pending_work(&self) -> bool {
        !self.needs_update.borrow().is_empty()
            || !self.recently_on.borrow().is_empty()
            || !self.recently_off.borrow().is_empty()
    }

    /// Spawn a task on this context's executor.
    pub(crate) fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.executor.spawn_local(task);
    }

    /// Request one deferred pass unless frozen or one is already requested.
    fn dispatch_update(&self) {
        if self.frozen.get() || self.update_scheduled.replace(true) {
            return;
        }
        let this = self.this.clone();
        self.spawn(Box::pin(async move {
            if let Some(scheduler) = this.upgrade() {
                scheduler.run_scheduled();
            }
        }));
    }

    fn run_scheduled(&self) {
        self.update_scheduled.set(false);
        if let Err(err) = self.update() {
            error!(context = %self.config.label, error = %err, "update pass failed");
            // Work queued next to a rejected foreign flow is still valid.
            if matches!(err, FlowError::ForeignFlow { .. }) && self.has_pending_work() {
                self.dispatch_update();
            }
        }
    }

    /// Run one update pass now.
    pub(crate) fn update(&self) -> Result<()> {
        if self.updating.replace(true) {
            return Err(FlowError::AlreadyUpdating);
        }
        let _guard = UpdateGuard(&self.updating);
        self.run_pass()
    }

    fn run_pass(&self) -> Result<()> {
        if !self.has_pending_work() {
            return Ok(());
        }
        self.reject_foreign()?;
        self.passes.set(self.passes.get() + 1);

        // Step 1: liveness.
        let turned_on: Vec<FlowRef> = self.recently_on.take().into_iter().collect();
        let turned_off: Vec<FlowRef> = self.recently_off.take().into_iter().collect();

        let mut newly_hot: IndexSet<FlowRef> = IndexSet::new();
        for flow in &turned_on {
            self.walk(vec![flow.clone()], Direction::Backward, |ancestor| {
                let core = ancestor.node().core();
                let count = core.live_descendants() + 1;
                core.set_live_descendants(count);
                if count == 1 {
                    trace!(flow = %core.name(), "becoming hot");
                    newly_hot.insert(ancestor.clone());
                    ancestor.node().becoming_hot();
                }
                true
            })?;
        }
        for flow in &turned_off {
            self.walk(vec![flow.clone()], Direction::Backward, |ancestor| {
                let core = ancestor.node().core();
                let Some(count) = core.live_descendants().checked_sub(1) else {
                    warn!(flow = %core.name(), "live-descendant counter underflow");
                    return true;
                };
                core.set_live_descendants(count);
                if count == 0 {
                    trace!(flow = %core.name(), "becoming cold");
                    ancestor.node().becoming_cold();
                }
                true
            })?;
        }

        // Step 2: values.
        let dirty: IndexSet<FlowRef> = self.needs_update.take();
        let origins: Vec<FlowRef> = dirty.iter().chain(newly_hot.iter()).cloned().collect();
        let mut recomputed = 0_usize;
        self.walk(origins, Direction::Forward, |flow| {
            if flow.is_cold() {
                return false;
            }
            if dirty.contains(flow) && !newly_hot.contains(flow) {
                return true;
            }
            recomputed += 1;
            flow.node().source_changed()
        })?;

        if self.config.trace_passes {
            debug!(
                context = %self.config.label,
                pass = self.passes.get(),
                turned_on = turned_on.len(),
                turned_off = turned_off.len(),
                dirty = dirty.len(),
                newly_hot = newly_hot.len(),
                recomputed,
                "update pass"
            );
        }
        Ok(())
    }

    /// Visit every flow reachable from `origins`, in identifier order.
    ///
    /// `visit` returns whether the walk continues past the visited flow.
    fn walk<F>(&self, origins: Vec<FlowRef>, direction: Direction, mut visit: F) -> Result<()>
    where
        F: FnMut(&FlowRef) -> bool,
    {
        if origins.is_empty() {
            return Ok(());
        }
        let rank = move |flow: &FlowRef| {
            let id = flow.id().raw() as i64;
            match direction {
                Direction::Forward => id,
                Direction::Backward => -id,
            }
        };
        let mut seen: HashSet<FlowRef> = HashSet::new();
        let mut queue = UniqueMinQueue::new(rank);
        for flow in origins {
            self.check_owned(&flow)?;
            seen.insert(flow.clone());
            queue.push(flow);
        }
        while !queue.is_empty() {
            let flow = queue.pop()?;
            if !visit(&flow) {
                continue;
            }
            let neighbors = match direction {
                Direction::Forward => flow.destinations(),
                Direction::Backward => flow.sources(),
            };
            for neighbor in neighbors {
                if seen.insert(neighbor.clone()) {
                    self.check_owned(&neighbor)?;
                    queue.push(neighbor);
                }
            }
        }
        Ok(())
    }

    fn owns(&self, flow: &FlowRef) -> bool {
        std::ptr::eq(Rc::as_ptr(flow.node().core().scheduler()), self)
    }

    fn check_owned(&self, flow: &FlowRef) -> Result<()> {
        if self.owns(flow) {
            Ok(())
        } else {
            Err(FlowError::ForeignFlow { flow: flow.name() })
        }
    }

    /// Drop the first pending flow owned by another context and report it.
    fn reject_foreign(&self) -> Result<()> {
        for pending in [&self.needs_update, &self.recently_on, &self.recently_off] {
            let foreign = pending.borrow().iter().find(|flow| !self.owns(flow)).cloned();
            if let Some(flow) = foreign {
                pending.borrow_mut().shift_remove(&flow);
                return Err(FlowError::ForeignFlow { flow: flow.name() });
            }
        }
        Ok(())
    }

    /// Breadth-first dump of everything reachable from live leaf flows.
    pub(crate) fn graph(&self) -> Result<GraphDump> {
        let roots: Vec<FlowRef> = {
            let mut states = self.state_flows.borrow_mut();
            states.retain(|weak| weak.strong_count() > 0);
            states.iter().filter_map(Weak::upgrade).map(FlowRef).collect()
        };
        GraphDump::collect(roots)
    }
}
