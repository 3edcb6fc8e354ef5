use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use buildplan_graph::{CyclicDependencyError, DependencyGraph, TargetId};
use buildplan_registry::UnknownTargetError;
use buildplan_target::{Address, Target};
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownTarget(#[from] UnknownTargetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),
}

/// A set of targets without dependency relationships between them. All
/// dependencies of a target in a wave are placed in earlier waves.
#[derive(Debug, Clone)]
pub struct Wave {
    index: usize,
    targets: Vec<Arc<Target>>,
}

impl Wave {
    /// The zero based position of this wave in its plan.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The targets of this wave, ordered by name and then namespace.
    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Arc<Target>> + '_ {
        self.targets.iter()
    }

    pub fn addresses(&self) -> impl ExactSizeIterator<Item = &Address> + '_ {
        self.targets.iter().map(|target| target.address())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses().any(|candidate| candidate == address)
    }
}

impl<'a> IntoIterator for &'a Wave {
    type Item = &'a Arc<Target>;
    type IntoIter = std::slice::Iter<'a, Arc<Target>>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

/// An ordered sequence of waves. Building the waves in order, and the targets
/// of a single wave in any order, satisfies every dependency.
///
/// A plan is computed fresh for every request and never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    waves: Vec<Wave>,
}

impl BuildPlan {
    /// Orders every target of the graph into waves.
    #[tracing::instrument(skip_all, fields(targets = graph.len()))]
    pub fn new(graph: &DependencyGraph) -> Result<Self, PlanError> {
        Ok(Self::from_subset(graph, &vec![true; graph.len()])?)
    }

    /// Orders the given roots and everything they transitively depend on.
    #[tracing::instrument(skip_all, fields(roots = roots.len()))]
    pub fn for_roots(graph: &DependencyGraph, roots: &[Address]) -> Result<Self, PlanError> {
        let root_ids = roots
            .iter()
            .map(|address| {
                graph.id_of(address).ok_or_else(|| UnknownTargetError {
                    reference: address.into(),
                    referencing_target: None,
                    invalid: None,
                    suggestions: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut included = vec![false; graph.len()];
        for id in graph.transitive_dependencies(root_ids) {
            included[id.index()] = true;
        }
        Ok(Self::from_subset(graph, &included)?)
    }

    /// Kahn's algorithm, emitting every generation of ready targets as one
    /// wave.
    fn from_subset(
        graph: &DependencyGraph,
        included: &[bool],
    ) -> Result<Self, CyclicDependencyError> {
        let is_included = |id: TargetId| included[id.index()];

        let mut remaining = vec![0usize; graph.len()];
        for id in graph.ids().filter(|&id| is_included(id)) {
            remaining[id.index()] = graph
                .dependencies(id)
                .iter()
                .filter(|&&dependency| is_included(dependency))
                .count();
        }

        let mut placed = vec![false; graph.len()];
        let mut ready = graph
            .ids()
            .filter(|&id| is_included(id) && remaining[id.index()] == 0)
            .collect_vec();
        let mut waves = Vec::new();

        while !ready.is_empty() {
            ready.sort_by(|&a, &b| {
                (graph[a].name(), graph[a].namespace())
                    .cmp(&(graph[b].name(), graph[b].namespace()))
            });

            let mut next = Vec::new();
            for &id in &ready {
                placed[id.index()] = true;
                for &dependent in graph.dependents(id) {
                    if !is_included(dependent) {
                        continue;
                    }
                    remaining[dependent.index()] -= 1;
                    if remaining[dependent.index()] == 0 {
                        next.push(dependent);
                    }
                }
            }

            tracing::trace!("wave {} contains {} targets", waves.len(), ready.len());
            waves.push(Wave {
                index: waves.len(),
                targets: ready
                    .iter()
                    .map(|&id| graph.target(id).clone())
                    .collect(),
            });
            ready = next;
        }

        let unplaced = graph
            .ids()
            .filter(|&id| is_included(id) && !placed[id.index()])
            .collect_vec();
        if !unplaced.is_empty() {
            let cycle = graph
                .find_cycle(|id| is_included(id) && !placed[id.index()])
                .unwrap_or_else(|| CyclicDependencyError {
                    cycle_path: unplaced
                        .iter()
                        .map(|&id| graph[id].address().clone())
                        .collect(),
                });
            tracing::debug!("{} targets could not be placed", unplaced.len());
            return Err(cycle);
        }

        let plan = Self { waves };
        tracing::debug!(
            "planned {} targets in {} waves",
            plan.target_count(),
            plan.len()
        );
        Ok(plan)
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    /// The number of waves.
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// The number of targets across all waves.
    pub fn target_count(&self) -> usize {
        self.waves.iter().map(Wave::len).sum()
    }

    /// All targets in a valid topological order.
    pub fn flatten(&self) -> impl Iterator<Item = &Arc<Target>> + '_ {
        self.waves.iter().flat_map(Wave::iter)
    }

    /// The index of the wave that contains the target at `address`.
    pub fn wave_of(&self, address: &Address) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.contains(address))
    }
}

impl<'a> IntoIterator for &'a BuildPlan {
    type Item = &'a Wave;
    type IntoIter = std::slice::Iter<'a, Wave>;

    fn into_iter(self) -> Self::IntoIter {
        self.waves.iter()
    }
}

impl Display for BuildPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for wave in &self.waves {
            writeln!(f, "{}: {}", wave.index + 1, wave.addresses().format(", "))?;
        }
        Ok(())
    }
}

/// Orders every target of the graph into waves.
pub fn plan(graph: &DependencyGraph) -> Result<BuildPlan, PlanError> {
    BuildPlan::new(graph)
}

/// Orders the given roots and everything they transitively depend on into
/// waves.
pub fn plan_for(graph: &DependencyGraph, roots: &[Address]) -> Result<BuildPlan, PlanError> {
    BuildPlan::for_roots(graph, roots)
}
