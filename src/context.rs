use std::{path::Path, sync::Arc};

use buildplan_config::Config;
use buildplan_graph::{DependencyGraph, GraphError};
use buildplan_planner::{BuildPlan, PlanError, TargetExecutor, executor::PlanReport};
use buildplan_registry::{RegistryError, TargetRegistry, UnknownTargetError};
use buildplan_target::{Namespace, Target, TargetDeclaration, TargetError, TargetRef};
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownTarget(#[from] UnknownTargetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),
}

/// The state of a single build invocation: its configuration and the
/// registry every loader registers targets into.
///
/// A context is passed explicitly to whoever needs it, there is no global
/// instance. It can be shared between threads so several loaders can
/// register targets at the same time.
#[derive(Debug, Default)]
pub struct BuildContext {
    config: Config,
    registry: TargetRegistry,
}

impl BuildContext {
    pub fn new(config: Config) -> Self {
        let registry = TargetRegistry::from_config(&config);
        Self { config, registry }
    }

    /// Creates a context with the configuration found in `root`.
    pub fn from_root(root: &Path) -> miette::Result<Self> {
        Ok(Self::new(Config::load_from_root(root)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Registers a target that was constructed by the caller.
    pub fn register_target(&self, target: Target) -> Result<Arc<Target>, BuildError> {
        Ok(self
            .registry
            .register(target)
            .map_err(RegistryError::from)?)
    }

    /// Registers the declarations of a single manifest. `namespace` is the
    /// directory of the manifest relative to the workspace root.
    ///
    /// Registration stops at the first invalid or duplicate declaration,
    /// the declarations before it stay registered.
    pub fn register(
        &self,
        namespace: &str,
        declarations: impl IntoIterator<Item = TargetDeclaration>,
    ) -> Result<Vec<Arc<Target>>, BuildError> {
        let namespace: Namespace = namespace
            .parse()
            .map_err(|err| RegistryError::from(TargetError::from(err)))?;
        let registered = declarations
            .into_iter()
            .map(|declaration| self.registry.register_declaration(&namespace, declaration))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            "registered {} targets in '{namespace}'",
            registered.len()
        );
        Ok(registered)
    }

    /// Resolves and validates the dependency graph of everything registered
    /// so far.
    pub fn graph(&self) -> Result<DependencyGraph, BuildError> {
        Ok(DependencyGraph::build(&self.registry)?)
    }

    /// Plans every registered target.
    pub fn plan(&self) -> Result<BuildPlan, BuildError> {
        let graph = self.graph()?;
        Ok(buildplan_planner::plan(&graph)?)
    }

    /// Plans the given targets and everything they depend on. The roots are
    /// resolved relative to the root namespace.
    pub fn plan_for(
        &self,
        roots: impl IntoIterator<Item = impl Into<TargetRef>>,
    ) -> Result<BuildPlan, BuildError> {
        let roots = roots
            .into_iter()
            .map(|reference| {
                self.registry
                    .lookup(&reference.into())
                    .map(|target| target.address().clone())
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("planning for {}", roots.iter().format(", "));

        let graph = self.graph()?;
        Ok(buildplan_planner::plan_for(&graph, &roots)?)
    }

    /// Hands a plan to an executor, using the configured concurrency limit.
    pub async fn execute<E: TargetExecutor + ?Sized>(
        &self,
        plan: &BuildPlan,
        executor: &E,
    ) -> PlanReport {
        buildplan_planner::execute_plan(plan, executor, self.config.max_concurrency()).await
    }
}
