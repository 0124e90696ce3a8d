//! Flow Handles
//!
//! A [`Flow<T>`] is a cheap, clonable handle to a node that produces values
//! of type `T`. Every node kind shares one generic node type, [`FlowNode`],
//! and plugs its recomputation rule in through the [`Behavior`] trait.
//!
//! Combinators on `Flow<T>` build derived flows. A derived flow keeps its
//! sources alive; sources only hold weak references back.

use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::smallvec;

use super::consumer::Consumer;
use super::distinct::DistinctBehavior;
use super::map::MapBehavior;
use super::map_async::MapAsyncBehavior;
use crate::error::{BoxError, FlowError, Result};
use crate::graph::{FlowId, FlowRef, Node, NodeCore, Scheduler, Sources};

/// Recomputation rule of one node kind.
pub(crate) trait Behavior<T> {
    /// Returns whether `flow`'s value changed.
    fn recompute(&self, flow: &FlowNode<T>) -> bool;
}

/// A node holding the last value it produced.
pub(crate) struct FlowNode<T> {
    core: NodeCore,
    value: RefCell<Option<T>>,
    behavior: Box<dyn Behavior<T>>,
}

impl<T: 'static> FlowNode<T> {
    /// Build and link a node. `behavior` receives a weak handle to the node
    /// for kinds that need to reach themselves later.
    pub(crate) fn build<B>(
        scheduler: &Rc<Scheduler>,
        sources: Sources,
        label: &str,
        initial: Option<T>,
        behavior: B,
    ) -> Rc<Self>
    where
        B: FnOnce(&Weak<FlowNode<T>>) -> Box<dyn Behavior<T>>,
    {
        let node = Rc::new_cyclic(|this| FlowNode {
            core: NodeCore::new(scheduler, sources, label),
            value: RefCell::new(initial),
            behavior: behavior(this),
        });
        let erased: Rc<dyn Node> = node.clone();
        NodeCore::link(&erased);
        node
    }

    pub(crate) fn name(&self) -> String {
        self.core.name()
    }

    pub(crate) fn scheduler(&self) -> &Rc<Scheduler> {
        self.core.scheduler()
    }

    pub(crate) fn store(&self, value: T) {
        *self.value.borrow_mut() = Some(value);
    }

    pub(crate) fn borrow_value(&self) -> Ref<'_, Option<T>> {
        self.value.borrow()
    }

    /// Apply `f` to the current value on behalf of the flow named `reader`.
    pub(crate) fn read<R>(&self, reader: &str, f: impl FnOnce(&T) -> R) -> Result<R> {
        match self.value.borrow().as_ref() {
            Some(value) => Ok(f(value)),
            None => Err(FlowError::MissingValue {
                flow: reader.to_string(),
            }),
        }
    }
}

impl<T: 'static> Node for FlowNode<T> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn source_changed(&self) -> bool {
        self.behavior.recompute(self)
    }
}

/// Run user code for the flow named `flow`, turning panics into errors.
pub(crate) fn contain<R>(flow: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(FlowError::from_panic(flow, payload)),
    }
}

/// Handle to a flow producing values of type `T`.
pub struct Flow<T> {
    pub(crate) node: Rc<FlowNode<T>>,
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T: Clone + 'static> Flow<T> {
    pub(crate) fn from_node(node: Rc<FlowNode<T>>) -> Self {
        Self { node }
    }

    pub fn id(&self) -> FlowId {
        self.node.core().id()
    }

    /// Diagnostic name, `"<label>#<id>"`.
    pub fn name(&self) -> String {
        self.node.name()
    }

    /// Replace the label part of the diagnostic name.
    pub fn with_name(self, label: &str) -> Self {
        self.node.core().set_label(label);
        self
    }

    /// The last value this flow produced.
    ///
    /// Only current while the flow is hot, and only after the pending pass
    /// has run.
    pub fn value(&self) -> Option<T> {
        self.node.borrow_value().clone()
    }

    pub fn is_hot(&self) -> bool {
        self.node.core().is_hot()
    }

    pub fn is_cold(&self) -> bool {
        !self.is_hot()
    }

    /// Type-erased handle, for diagnostics and graph inspection.
    pub fn flow_ref(&self) -> FlowRef {
        FlowRef(self.node.clone())
    }

    fn derive<U: 'static>(
        &self,
        sources: Sources,
        label: &str,
        eval: impl Fn(&str) -> Result<U> + 'static,
    ) -> Flow<U> {
        let node = FlowNode::build(self.node.scheduler(), sources, label, None, |_| {
            Box::new(MapBehavior::new(eval)) as Box<dyn Behavior<U>>
        });
        Flow { node }
    }

    /// Derive a flow by applying `f` to each value.
    pub fn map<U, F>(&self, f: F) -> Flow<U>
    where
        U: 'static,
        F: Fn(&T) -> U + 'static,
    {
        let source = self.clone();
        self.derive(smallvec![self.flow_ref()], "MapFlow", move |name| {
            source.node.read(name, &f)
        })
    }

    /// Like [`map`](Self::map), for functions that can fail.
    ///
    /// On `Err` the error is logged and the flow keeps its previous value.
    pub fn try_map<U, E, F>(&self, f: F) -> Flow<U>
    where
        U: 'static,
        E: Into<BoxError>,
        F: Fn(&T) -> std::result::Result<U, E> + 'static,
    {
        let source = self.clone();
        self.derive(smallvec![self.flow_ref()], "MapFlow", move |name| {
            source
                .node
                .read(name, &f)?
                .map_err(|err| {
                    let err: BoxError = err.into();
                    FlowError::computation(name, err)
                })
        })
    }

    pub fn map2<A, U, F>(&self, other: &Flow<A>, f: F) -> Flow<U>
    where
        A: Clone + 'static,
        U: 'static,
        F: Fn(&T, &A) -> U + 'static,
    {
        let (a, b) = (self.clone(), other.clone());
        self.derive(
            smallvec![self.flow_ref(), other.flow_ref()],
            "MapNFlow",
            move |name| a.node.read(name, |x| b.node.read(name, |y| f(x, y)))?,
        )
    }

    pub fn map3<A, B, U, F>(&self, other: &Flow<A>, third: &Flow<B>, f: F) -> Flow<U>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        U: 'static,
        F: Fn(&T, &A, &B) -> U + 'static,
    {
        let (a, b, c) = (self.clone(), other.clone(), third.clone());
        self.derive(
            smallvec![self.flow_ref(), other.flow_ref(), third.flow_ref()],
            "MapNFlow",
            move |name| {
                a.node
                    .read(name, |x| b.node.read(name, |y| c.node.read(name, |z| f(x, y, z))))??
            },
        )
    }

    /// Apply `f` to the values of `self` followed by `others`, in order.
    pub fn map_n<U, F>(&self, others: &[Flow<T>], f: F) -> Flow<U>
    where
        U: 'static,
        F: Fn(&[&T]) -> U + 'static,
    {
        let mut flows = vec![self.clone()];
        flows.extend(others.iter().cloned());
        map_all(self.node.scheduler(), flows, f)
    }

    /// Pair this flow's value with `other`'s.
    pub fn zip<A: Clone + 'static>(&self, other: &Flow<A>) -> Flow<(T, A)> {
        self.map2(other, |x, y| (x.clone(), y.clone()))
    }

    pub fn zip3<A, B>(&self, other: &Flow<A>, third: &Flow<B>) -> Flow<(T, A, B)>
    where
        A: Clone + 'static,
        B: Clone + 'static,
    {
        self.map3(other, third, |x, y, z| (x.clone(), y.clone(), z.clone()))
    }

    /// Derive a flow resolved asynchronously.
    ///
    /// Holds `initial` until the first result arrives. A result is applied
    /// only if no newer computation started after it was issued; older
    /// results are dropped, not aborted.
    pub fn map_async<U, Fut, F>(&self, f: F, initial: U) -> Flow<U>
    where
        U: Clone + 'static,
        Fut: Future<Output = U> + 'static,
        F: Fn(&T) -> Fut + 'static,
    {
        let source = self.clone();
        let node = FlowNode::build(
            self.node.scheduler(),
            smallvec![self.flow_ref()],
            "MapAsyncFlow",
            Some(initial),
            move |this| {
                Box::new(MapAsyncBehavior::new(this.clone(), source, f)) as Box<dyn Behavior<U>>
            },
        );
        Flow { node }
    }

    /// Forward values only when `is_equal` says they differ from the last
    /// one forwarded. The first value is always forwarded.
    pub fn distinct_until_changed<F>(&self, is_equal: F) -> Flow<T>
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        let source = self.clone();
        let node = FlowNode::build(
            self.node.scheduler(),
            smallvec![self.flow_ref()],
            "DistinctUntilChangedFlow",
            None,
            move |_| {
                Box::new(DistinctBehavior::new(source, is_equal)) as Box<dyn Behavior<T>>
            },
        );
        Flow { node }
    }

    /// Subscribe `callback` to this flow's values. The returned consumer is
    /// off until [`Consumer::turn_on`] is called.
    pub fn consume<F>(&self, callback: F) -> Consumer<T>
    where
        F: Fn(&T) + 'static,
    {
        Consumer::new(self, callback)
    }
}

impl<T: Clone + PartialEq + 'static> Flow<T> {
    /// [`distinct_until_changed`](Self::distinct_until_changed) using `==`.
    pub fn distinct(&self) -> Flow<T> {
        self.distinct_until_changed(|a, b| a == b)
    }
}

impl<T: Clone + Debug + 'static> Debug for Flow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name())
            .field("hot", &self.is_hot())
            .field("value", &self.value())
            .finish()
    }
}

/// N-ary map over a homogeneous list of flows.
pub(crate) fn map_all<T, U, F>(scheduler: &Rc<Scheduler>, flows: Vec<Flow<T>>, f: F) -> Flow<U>
where
    T: Clone + 'static,
    U: 'static,
    F: Fn(&[&T]) -> U + 'static,
{
    let sources: Sources = flows.iter().map(Flow::flow_ref).collect();
    let eval = move |name: &str| -> Result<U> {
        let guards: Vec<Ref<'_, Option<T>>> =
            flows.iter().map(|flow| flow.node.borrow_value()).collect();
        let values: Option<Vec<&T>> = guards.iter().map(|guard| guard.as_ref()).collect();
        let values = values.ok_or_else(|| FlowError::MissingValue {
            flow: name.to_string(),
        })?;
        Ok(f(&values))
    };
    let node = FlowNode::build(scheduler, sources, "MapNFlow", None, |_| {
        Box::new(MapBehavior::new(eval)) as Box<dyn Behavior<U>>
    });
    Flow { node }
}
