//! Async Map Flows
//!
//! Each recomputation bumps a generation counter and launches the user's
//! future on the context's executor, reporting "unchanged" right away. When
//! the future resolves, its value is applied only if the generation has not
//! moved on in the meantime. The accepted value is stored and the flow is
//! marked updated, which schedules a pass to propagate it.
//!
//! In-flight futures are never aborted. Stale ones run to completion and
//! their results are dropped.

use std::cell::Cell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tracing::{error, trace};

use super::flow::{contain, Behavior, Flow, FlowNode};
use crate::error::FlowError;
use crate::graph::FlowRef;

type Launch<T, U> = Box<dyn Fn(&T) -> LocalBoxFuture<'static, U>>;

pub(crate) struct MapAsyncBehavior<T, U> {
    this: Weak<FlowNode<U>>,
    source: Flow<T>,
    launch: Launch<T, U>,
    generation: Rc<Cell<u64>>,
}

impl<T, U> MapAsyncBehavior<T, U>
where
    T: Clone + 'static,
    U: Clone + 'static,
{
    pub(crate) fn new<Fut, F>(this: Weak<FlowNode<U>>, source: Flow<T>, f: F) -> Self
    where
        Fut: Future<Output = U> + 'static,
        F: Fn(&T) -> Fut + 'static,
    {
        Self {
            this,
            source,
            launch: Box::new(move |value: &T| f(value).boxed_local()),
            generation: Rc::new(Cell::new(0)),
        }
    }
}

impl<T, U> Behavior<U> for MapAsyncBehavior<T, U>
where
    T: Clone + 'static,
    U: Clone + 'static,
{
    fn recompute(&self, flow: &FlowNode<U>) -> bool {
        let issued = self.generation.get() + 1;
        self.generation.set(issued);

        let name = flow.name();
        let future = match contain(&name, || self.source.node.read(&name, |v| (self.launch)(v))) {
            Ok(future) => future,
            Err(err) => {
                error!(flow = %name, error = %err, "flow computation failed");
                return false;
            }
        };

        let this = self.this.clone();
        let generation = Rc::clone(&self.generation);
        flow.scheduler().spawn(Box::pin(async move {
            let value = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(value) => value,
                Err(payload) => {
                    let err = FlowError::from_panic(&name, payload);
                    error!(flow = %name, error = %err, "async flow computation failed");
                    return;
                }
            };
            if generation.get() != issued {
                trace!(
                    flow = %name,
                    issued,
                    current = generation.get(),
                    "discarding stale async result"
                );
                return;
            }
            if let Some(node) = this.upgrade() {
                node.store(value);
                let scheduler = Rc::clone(node.scheduler());
                scheduler.add_recently_updated(FlowRef(node));
            }
        }));
        false
    }
}
