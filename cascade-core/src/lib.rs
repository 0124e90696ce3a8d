//! Cascade Core
//!
//! This crate provides a push-based reactive dataflow graph. It implements:
//!
//! - Leaf state flows assigned from outside the graph
//! - Derived flows (map, N-ary map, async map, distinct-until-changed)
//! - Consumers that observe flows and decide which parts of the graph are hot
//! - A scheduler that batches mutations into deferred two-phase passes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Node structure, traversal queues, the update scheduler and
//!   diagnostic dumps
//! - `reactive`: The context, executors and flow kinds
//! - `error`: Error types
//! - `config`: Context configuration
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use cascade_core::reactive::Context;
//!
//! let ctx = Context::new();
//! let count = ctx.create_state(1);
//! let doubled = count.map(|v| v * 2);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let consumer = doubled.consume(move |v| sink.borrow_mut().push(*v));
//! consumer.turn_on();
//!
//! count.set(5);
//! ctx.run_until_stalled();
//! assert_eq!(*seen.borrow(), vec![10]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::ContextConfig;
pub use error::{FlowError, Result};
pub use graph::{FlowId, FlowRef, GraphDump};
pub use reactive::{Consumer, Context, Flow, StateFlow};
