use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    ops::Index,
    sync::Arc,
};

use buildplan_registry::{TargetRegistry, UnknownTargetError};
use buildplan_target::{Address, Target};
use indexmap::IndexSet;
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::CyclicDependencyError;

/// A target ID is a unique identifier for a node in a [`DependencyGraph`].
///
/// To get a target from a [`DependencyGraph`], you can use the [`TargetId`]
/// as an index.
#[derive(Debug, Clone, Copy, Eq, PartialOrd, PartialEq, Ord, Hash)]
pub struct TargetId(usize);

impl TargetId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A node in the [`DependencyGraph`].
#[derive(Debug)]
struct GraphNode {
    target: Arc<Target>,

    /// The targets this target depends on, in declaration order.
    dependencies: Vec<TargetId>,

    /// The targets that depend on this target.
    dependents: Vec<TargetId>,
}

/// A directed graph over resolved targets. Edges point from a dependent to
/// its dependency.
///
/// The graph is immutable once constructed and can be shared freely between
/// threads.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    ids: HashMap<Address, TargetId>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownTarget(#[from] UnknownTargetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Constructs the dependency graph of all targets in the registry and
    /// verifies that it contains no cycles.
    #[tracing::instrument(skip_all)]
    pub fn build(registry: &TargetRegistry) -> Result<Self, GraphError> {
        let graph = Self::resolve(registry)?;
        graph.check_cycles()?;
        Ok(graph)
    }

    /// Resolves every dependency reference in the registry into an edge,
    /// without checking for cycles.
    ///
    /// Repeated references from one target to the same dependency result in
    /// a single edge.
    pub fn resolve(registry: &TargetRegistry) -> Result<Self, UnknownTargetError> {
        let targets = registry.all_targets().collect_vec();
        let ids: HashMap<Address, TargetId> = targets
            .iter()
            .enumerate()
            .map(|(index, target)| (target.address().clone(), TargetId(index)))
            .collect();

        let mut nodes = Vec::with_capacity(targets.len());
        for target in targets {
            let mut dependencies = IndexSet::with_capacity(target.dependencies().len());
            for reference in target.dependencies() {
                let dependency = registry.resolve(reference, &target)?;
                // Targets registered after the snapshot was taken are not
                // part of this graph.
                let Some(&id) = ids.get(dependency.address()) else {
                    return Err(UnknownTargetError {
                        reference: reference.clone(),
                        referencing_target: Some(target.address().clone()),
                        invalid: None,
                        suggestions: Vec::new(),
                    });
                };
                dependencies.insert(id);
            }
            nodes.push(GraphNode {
                target,
                dependencies: dependencies.into_iter().collect(),
                dependents: Vec::new(),
            });
        }

        for index in 0..nodes.len() {
            for dependency in nodes[index].dependencies.clone() {
                nodes[dependency.0].dependents.push(TargetId(index));
            }
        }

        let graph = Self { nodes, ids };
        tracing::debug!(
            "resolved {} targets with {} dependency edges",
            graph.len(),
            graph.edges().count()
        );
        Ok(graph)
    }

    /// Verifies that no target transitively depends on itself.
    pub fn check_cycles(&self) -> Result<(), CyclicDependencyError> {
        match self.find_cycle(|_| true) {
            Some(cycle) => Err(cycle),
            None => Ok(()),
        }
    }

    /// Searches for a cycle among the targets accepted by `include`, edges to
    /// targets that are not included are ignored.
    ///
    /// This is a depth-first search with three marks: unvisited, in progress
    /// and done. Roots are visited in registration order and dependencies in
    /// declaration order, so the reported cycle is deterministic.
    pub fn find_cycle(&self, include: impl Fn(TargetId) -> bool) -> Option<CyclicDependencyError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for root in self.ids() {
            if !include(root) || marks[root.0] != Mark::Unvisited {
                continue;
            }

            // Every entry is a node and the index of the next dependency to
            // visit.
            let mut stack = vec![(root, 0usize)];
            marks[root.0] = Mark::InProgress;

            while let Some((node, next)) = stack.last().copied() {
                let Some(&dependency) = self.nodes[node.0].dependencies.get(next) else {
                    marks[node.0] = Mark::Done;
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if !include(dependency) {
                    continue;
                }

                match marks[dependency.0] {
                    Mark::Unvisited => {
                        marks[dependency.0] = Mark::InProgress;
                        stack.push((dependency, 0));
                    }
                    Mark::InProgress => {
                        let start = stack
                            .iter()
                            .position(|(id, _)| *id == dependency)
                            .unwrap_or_default();
                        let cycle_path = stack[start..]
                            .iter()
                            .map(|(id, _)| self[*id].address().clone())
                            .chain(std::iter::once(self[dependency].address().clone()))
                            .collect_vec();
                        tracing::debug!(
                            "found a dependency cycle of {} targets",
                            stack.len() - start
                        );
                        return Some(CyclicDependencyError { cycle_path });
                    }
                    Mark::Done => {}
                }
            }
        }

        None
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all ids in registration order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = TargetId> + use<> {
        (0..self.nodes.len()).map(TargetId)
    }

    pub fn id_of(&self, address: &Address) -> Option<TargetId> {
        self.ids.get(address).copied()
    }

    pub fn target(&self, id: TargetId) -> &Arc<Target> {
        &self.nodes[id.0].target
    }

    /// The direct dependencies of a target.
    pub fn dependencies(&self, id: TargetId) -> &[TargetId] {
        &self.nodes[id.0].dependencies
    }

    /// The targets that directly depend on a target.
    pub fn dependents(&self, id: TargetId) -> &[TargetId] {
        &self.nodes[id.0].dependents
    }

    /// Iterates over all edges as `(dependent, dependency)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (TargetId, TargetId)> + '_ {
        self.nodes.iter().enumerate().flat_map(|(index, node)| {
            node.dependencies
                .iter()
                .map(move |&dependency| (TargetId(index), dependency))
        })
    }

    /// Returns the given roots together with everything they transitively
    /// depend on, in breadth first order.
    pub fn transitive_dependencies(
        &self,
        roots: impl IntoIterator<Item = TargetId>,
    ) -> IndexSet<TargetId> {
        let mut closure: IndexSet<TargetId> = roots.into_iter().collect();
        let mut next = 0;
        while let Some(&id) = closure.get_index(next) {
            closure.extend(self.dependencies(id).iter().copied());
            next += 1;
        }
        closure
    }
}

impl Index<TargetId> for DependencyGraph {
    type Output = Target;

    fn index(&self, index: TargetId) -> &Self::Output {
        &self.nodes[index.0].target
    }
}

impl Display for DependencyGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node.target.address())?;
            if !node.dependencies.is_empty() {
                write!(
                    f,
                    " -> {}",
                    node.dependencies
                        .iter()
                        .map(|id| self[*id].address())
                        .format(", ")
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
