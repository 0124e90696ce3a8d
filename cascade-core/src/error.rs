//! Error types for the dataflow graph.
//!
//! Two families of failure exist. Computation failures (a user function
//! returning `Err` or panicking) are contained at the node that raised them:
//! they are logged and the node reports "unchanged". Structural failures
//! (foreign nodes, re-entrant passes, popping empty collections) signal a
//! programming error and are returned to the caller.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error accepted from fallible user functions.
pub type BoxError = Box<dyn StdError + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors produced by the dataflow graph.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A node's function failed. Only ever logged, never propagated.
    #[error("computation failed in {flow}: {message}")]
    Computation { flow: String, message: String },

    /// A derived node read a source that has not produced a value yet.
    #[error("{flow} read a source with no value")]
    MissingValue { flow: String },

    /// A walk reached a node owned by a different context.
    #[error("{flow} does not belong to this context")]
    ForeignFlow { flow: String },

    /// The update routine was entered while a pass was already running.
    #[error("already updating")]
    AlreadyUpdating,

    /// Pop on an empty collection.
    #[error("cannot pop empty {collection}")]
    Empty { collection: &'static str },
}

impl FlowError {
    pub(crate) fn computation(flow: &str, err: impl std::fmt::Display) -> Self {
        Self::Computation {
            flow: flow.to_string(),
            message: err.to_string(),
        }
    }

    /// Build a computation error from a caught panic payload.
    pub(crate) fn from_panic(flow: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic".to_string()
        };
        Self::Computation {
            flow: flow.to_string(),
            message,
        }
    }

    /// Whether this error is contained at a node rather than returned.
    pub fn is_contained(&self) -> bool {
        matches!(self, Self::Computation { .. } | Self::MissingValue { .. })
    }
}
