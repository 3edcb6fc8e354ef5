//! Orders a [`DependencyGraph`](buildplan_graph::DependencyGraph) into a
//! [`BuildPlan`] of waves.
//!
//! Waves are computed with Kahn's algorithm: the first wave holds every
//! target without dependencies, every following wave holds the targets whose
//! dependencies are all part of earlier waves. Within a wave targets are
//! sorted by name and then namespace so the same graph always results in the
//! same plan.

pub mod executor;
mod plan;

pub use executor::{TargetExecutor, execute_plan};
pub use plan::{BuildPlan, PlanError, Wave, plan, plan_for};
