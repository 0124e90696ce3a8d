//! Dependency Graph
//!
//! This module implements the graph structure and the scheduler that keeps
//! it current.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are flows: leaf state, derived values, and consumers
//! - Edges point from a source to the flows computed from it
//!
//! A flow holds its sources strongly and its destinations weakly. Creation
//! order is a topological order, so walks can be driven by a min-queue keyed
//! on flow identifier instead of an explicit sort.

mod deque;
mod dump;
mod node;
mod queue;
pub(crate) mod scheduler;

pub use deque::Deque;
pub use dump::{GraphDump, GraphNode};
pub use node::{FlowId, FlowRef};
pub use queue::UniqueMinQueue;

pub(crate) use node::{Node, NodeCore, Sources};
pub(crate) use scheduler::Scheduler;
