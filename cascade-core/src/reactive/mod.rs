//! Reactive Flows
//!
//! This module implements the user-facing flow kinds and the context that
//! owns them.
//!
//! # Concepts
//!
//! ## State flows
//!
//! A [`StateFlow`] is a leaf holding a value assigned from outside the graph.
//!
//! ## Derived flows
//!
//! Built with combinators on [`Flow`]: `map` and its N-ary forms compute a
//! value from sources, `map_async` resolves one asynchronously and drops
//! stale results, and `distinct_until_changed` stops repeated values.
//!
//! ## Consumers
//!
//! A [`Consumer`] runs a callback with its source's value. Turning a consumer
//! on is what makes the flows it depends on hot; cold flows never recompute.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded. Flows use `Rc` and `RefCell` and all graph
//! mutation goes through the context's update pass, which never runs
//! re-entrantly.

mod consumer;
mod context;
mod distinct;
mod executor;
mod flow;
mod map;
mod map_async;
mod state;

pub use consumer::Consumer;
pub use context::Context;
pub use executor::{Executor, LocalExecutor, TokioExecutor};
pub use flow::Flow;
pub use state::StateFlow;
