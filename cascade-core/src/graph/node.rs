//! Graph Nodes
//!
//! Every flow in a context is a node. A node owns its sources and refers to
//! its destinations weakly, so a discarded subgraph is freed even while the
//! nodes upstream of it are still alive.
//!
//! A node is *hot* when it has been turned on explicitly or when at least one
//! turned-on node is reachable downstream of it. Only hot nodes recompute.
//!
//! The live-descendant counter is only correct if every turned-on node is
//! turned off before it is freed. [`Consumer`](crate::reactive::Consumer)
//! turns itself off on drop to keep that balance.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::scheduler::Scheduler;

/// Process-unique identifier of a flow.
///
/// Identifiers increase monotonically in creation order. Because a flow's
/// sources must exist before it does, identifier order is a topological order
/// of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId(u64);

impl FlowId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for FlowId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source list. Most flows have one or two sources.
pub(crate) type Sources = SmallVec<[FlowRef; 2]>;

/// Behavior the scheduler needs from every node kind.
pub(crate) trait Node {
    fn core(&self) -> &NodeCore;

    /// Called when a source changed or when this node just became hot.
    ///
    /// Returns whether the value changed and should propagate to destinations.
    fn source_changed(&self) -> bool;

    fn becoming_hot(&self) {}

    fn becoming_cold(&self) {}
}

/// State shared by every node kind.
pub(crate) struct NodeCore {
    id: FlowId,
    label: RefCell<String>,
    scheduler: Rc<Scheduler>,
    sources: Sources,
    destinations: RefCell<Vec<Weak<dyn Node>>>,
    on: Cell<bool>,
    live_descendants: Cell<usize>,
}

impl NodeCore {
    /// # Panics
    ///
    /// Panics if a source belongs to another context.
    pub(crate) fn new(scheduler: &Rc<Scheduler>, sources: Sources, label: &str) -> Self {
        for source in sources.iter() {
            assert!(
                Rc::ptr_eq(source.0.core().scheduler(), scheduler),
                "flow {} belongs to another context",
                source.name()
            );
        }
        Self {
            id: FlowId::next(),
            label: RefCell::new(label.to_string()),
            scheduler: Rc::clone(scheduler),
            sources,
            destinations: RefCell::new(Vec::new()),
            on: Cell::new(false),
            live_descendants: Cell::new(0),
        }
    }

    /// Register `node` as a destination of each of its sources.
    pub(crate) fn link(node: &Rc<dyn Node>) {
        for source in node.core().sources.iter() {
            source
                .0
                .core()
                .destinations
                .borrow_mut()
                .push(Rc::downgrade(node));
        }
    }

    pub(crate) fn id(&self) -> FlowId {
        self.id
    }

    pub(crate) fn name(&self) -> String {
        format!("{}#{}", self.label.borrow(), self.id)
    }

    pub(crate) fn set_label(&self, label: &str) {
        *self.label.borrow_mut() = label.to_string();
    }

    pub(crate) fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub(crate) fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Live destinations. Freed destinations are pruned as a side effect.
    pub(crate) fn destinations(&self) -> Vec<FlowRef> {
        let mut destinations = self.destinations.borrow_mut();
        destinations.retain(|weak| weak.strong_count() > 0);
        destinations
            .iter()
            .filter_map(Weak::upgrade)
            .map(FlowRef)
            .collect()
    }

    pub(crate) fn is_on(&self) -> bool {
        self.on.get()
    }

    /// Set the activation flag, returning the previous value.
    pub(crate) fn replace_on(&self, on: bool) -> bool {
        self.on.replace(on)
    }

    pub(crate) fn live_descendants(&self) -> usize {
        self.live_descendants.get()
    }

    pub(crate) fn set_live_descendants(&self, count: usize) {
        self.live_descendants.set(count);
    }

    pub(crate) fn is_hot(&self) -> bool {
        self.on.get() || self.live_descendants.get() > 0
    }
}

/// Type-erased handle to any flow in a context.
///
/// Equality and hashing follow node identity, not value.
#[derive(Clone)]
pub struct FlowRef(pub(crate) Rc<dyn Node>);

impl FlowRef {
    pub fn id(&self) -> FlowId {
        self.0.core().id()
    }

    /// Diagnostic name, `"<label>#<id>"`.
    pub fn name(&self) -> String {
        self.0.core().name()
    }

    pub fn is_hot(&self) -> bool {
        self.0.core().is_hot()
    }

    pub fn is_cold(&self) -> bool {
        !self.is_hot()
    }

    /// Whether this flow was turned on explicitly.
    pub fn is_on(&self) -> bool {
        self.0.core().is_on()
    }

    /// Number of turned-on flows reachable downstream, this one included.
    pub fn live_descendants(&self) -> usize {
        self.0.core().live_descendants()
    }

    pub fn sources(&self) -> Vec<FlowRef> {
        self.0.core().sources().to_vec()
    }

    pub fn destinations(&self) -> Vec<FlowRef> {
        self.0.core().destinations()
    }

    pub(crate) fn node(&self) -> &dyn Node {
        &*self.0
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for FlowRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for FlowRef {}

impl Hash for FlowRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for FlowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRef")
            .field("name", &self.name())
            .field("hot", &self.is_hot())
            .field("live_descendants", &self.live_descendants())
            .finish()
    }
}
