//! Turns the targets of a registry into a validated dependency graph.
//!
//! Construction happens in two phases. [`DependencyGraph::resolve`] resolves
//! every declared reference against the fully populated registry, which
//! allows targets to refer to targets that were registered after them.
//! [`DependencyGraph::check_cycles`] then verifies that the graph is acyclic.
//! [`DependencyGraph::build`] runs both.

mod cycle;
mod graph;

pub use cycle::{CycleDiagram, CyclicDependencyError};
pub use graph::{DependencyGraph, GraphError, TargetId};
