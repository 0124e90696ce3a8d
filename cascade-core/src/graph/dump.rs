//! Diagnostic graph dump.
//!
//! Renders every flow reachable from the live leaf flows of a context as a
//! quoted edge list:
//!
//! ```text
//! "StateFlow#0"
//! "StateFlow#0" -> "MapFlow#1"
//! "MapFlow#1"
//! ```
//!
//! The lines form a valid DOT body, so wrapping them in `digraph { ... }`
//! is enough for Graphviz.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::deque::Deque;
use super::node::{FlowId, FlowRef};
use crate::error::Result;

/// One flow in a [`GraphDump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: u64,
    pub name: String,
    pub hot: bool,
    /// Names of live destinations, in edge order.
    pub destinations: Vec<String>,
}

/// Snapshot of a context's graph in breadth-first order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDump {
    pub nodes: Vec<GraphNode>,
}

impl GraphDump {
    pub(crate) fn collect(roots: Vec<FlowRef>) -> Result<Self> {
        let mut seen: HashSet<FlowId> = HashSet::new();
        let mut upcoming = Deque::new();
        for root in roots {
            if seen.insert(root.id()) {
                upcoming.push_back(root);
            }
        }

        let mut nodes = Vec::new();
        while !upcoming.is_empty() {
            let flow = upcoming.pop_front()?;
            let mut destinations = Vec::new();
            for dest in flow.destinations() {
                destinations.push(dest.name());
                if seen.insert(dest.id()) {
                    upcoming.push_back(dest);
                }
            }
            nodes.push(GraphNode {
                id: flow.id().raw(),
                name: flow.name(),
                hot: flow.is_hot(),
                destinations,
            });
        }
        Ok(Self { nodes })
    }

    /// All edges as `(from, to)` name pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.nodes.iter().flat_map(|node| {
            node.destinations
                .iter()
                .map(move |dest| (node.name.as_str(), dest.as_str()))
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for GraphDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(f, "\"{}\"", node.name)?;
            for dest in &node.destinations {
                writeln!(f, "\"{}\" -> \"{}\"", node.name, dest)?;
            }
        }
        Ok(())
    }
}
