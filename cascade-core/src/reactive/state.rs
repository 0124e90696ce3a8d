//! State Flow Implementation
//!
//! A state flow is a leaf of the graph: it holds a value that external code
//! assigns directly.
//!
//! # How State Flows Work
//!
//! 1. `set` stores the new value immediately.
//!
//! 2. The flow is recorded as updated and a pass is requested. Dependents see
//!    the value once that pass runs, not before.
//!
//! 3. Every assignment counts as a change, even if the value is equal to the
//!    previous one. Use [`Flow::distinct`] downstream to suppress repeats.

use std::fmt::Debug;
use std::ops::Deref;

use super::flow::{Behavior, Flow, FlowNode};
use crate::graph::Node;

struct StateBehavior;

impl<T> Behavior<T> for StateBehavior {
    fn recompute(&self, _flow: &FlowNode<T>) -> bool {
        true
    }
}

/// A directly mutable leaf flow.
///
/// Dereferences to [`Flow<T>`] for the combinators.
pub struct StateFlow<T> {
    flow: Flow<T>,
}

impl<T: Clone + 'static> StateFlow<T> {
    pub(crate) fn new(flow: Flow<T>) -> Self {
        Self { flow }
    }

    pub(crate) fn behavior() -> Box<dyn Behavior<T>> {
        Box::new(StateBehavior)
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.flow
            .node
            .borrow_value()
            .clone()
            .expect("state flow always holds a value")
    }

    /// Assign a new value and request a pass.
    pub fn set(&self, value: T) {
        self.flow.node.store(value);
        self.flow
            .node
            .scheduler()
            .add_recently_updated(self.flow.flow_ref());
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let guard = self.flow.node.borrow_value();
            match guard.as_ref() {
                Some(current) => f(current),
                None => return,
            }
        };
        self.set(next);
    }

    /// The underlying flow handle.
    pub fn flow(&self) -> &Flow<T> {
        &self.flow
    }

    pub fn with_name(self, label: &str) -> Self {
        self.flow.node.core().set_label(label);
        self
    }
}

impl<T> Clone for StateFlow<T> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
        }
    }
}

impl<T> Deref for StateFlow<T> {
    type Target = Flow<T>;

    fn deref(&self) -> &Flow<T> {
        &self.flow
    }
}

impl<T: Clone + Debug + 'static> Debug for StateFlow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateFlow")
            .field("name", &self.flow.name())
            .field("value", &self.get())
            .field("hot", &self.flow.is_hot())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
