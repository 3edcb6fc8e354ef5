#![deny(clippy::dbg_macro, clippy::unwrap_used)]

//! Target graph resolution and build-plan construction.
//!
//! Targets are registered in a [`BuildContext`], possibly in many namespaces
//! and in any order. Once every target is known the context resolves the
//! dependency references into a [`DependencyGraph`], validates that it is
//! acyclic and orders it into a [`BuildPlan`] of waves that an external
//! [`TargetExecutor`] can build.

mod context;

pub use buildplan_config::{Config, ConfigError, NamespacePolicy};
pub use buildplan_consts::consts;
pub use buildplan_graph::{CyclicDependencyError, DependencyGraph, GraphError, TargetId};
pub use buildplan_planner::{
    BuildPlan, PlanError, TargetExecutor, Wave, execute_plan,
    executor::{PlanReport, TargetFailure, WaveReport},
    plan, plan_for,
};
pub use buildplan_registry::{
    DuplicateTargetError, RegistryError, TargetRegistry, UnknownTargetError,
};
pub use buildplan_target::{
    Address, FancyDisplay, InvalidNamespace, InvalidReference, InvalidTargetName, Namespace,
    OptionValue, Target, TargetDeclaration, TargetError, TargetKind, TargetName, TargetRef,
};
pub use context::{BuildContext, BuildError};
