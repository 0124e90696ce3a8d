//! Executors
//!
//! Update passes and async map results never run synchronously inside the
//! call that requested them. They are spawned as local tasks on the
//! context's [`Executor`] and run on a later turn of whatever loop drives it.
//!
//! Two executors are provided:
//!
//! - [`LocalExecutor`] owns a `futures` local pool. Nothing runs until the
//!   host calls [`Context::run_until_stalled`](super::Context::run_until_stalled),
//!   which makes turn boundaries explicit.
//! - [`TokioExecutor`] spawns onto the current tokio [`LocalSet`], so passes
//!   run whenever the local set next polls.
//!
//! [`LocalSet`]: tokio::task::LocalSet

use std::cell::RefCell;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use tracing::{error, warn};

/// Spawns zero-delay local tasks for a context.
pub trait Executor {
    /// Run `task` after the current synchronous turn.
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);

    /// Run queued tasks until none can make progress.
    ///
    /// Executors driven by an outer event loop do nothing here.
    fn run_until_stalled(&self) {}
}

/// Executor backed by a `futures` [`LocalPool`].
pub struct LocalExecutor {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl LocalExecutor {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for LocalExecutor {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(task) {
            error!(error = %err, "failed to spawn local task");
        }
    }

    fn run_until_stalled(&self) {
        match self.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => warn!("run_until_stalled called from inside a running task"),
        }
    }
}

/// Executor that spawns onto the current tokio `LocalSet`.
///
/// Must be used from within `LocalSet::run_until` or a task spawned on one;
/// `tokio::task::spawn_local` panics otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        drop(tokio::task::spawn_local(task));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn tasks_wait_for_the_pool() {
        let executor = LocalExecutor::new();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        executor.spawn_local(Box::pin(async move { ran_clone.set(true) }));
        assert!(!ran.get());

        executor.run_until_stalled();
        assert!(ran.get());
    }

    #[test]
    fn tasks_spawned_while_running_also_run() {
        let executor = Rc::new(LocalExecutor::new());
        let count = Rc::new(Cell::new(0));
        let (inner_exec, inner_count) = (executor.clone(), count.clone());
        executor.spawn_local(Box::pin(async move {
            inner_count.set(inner_count.get() + 1);
            let nested = inner_count.clone();
            inner_exec.spawn_local(Box::pin(async move { nested.set(nested.get() + 1) }));
        }));
        executor.run_until_stalled();
        assert_eq!(count.get(), 2);
    }
}
