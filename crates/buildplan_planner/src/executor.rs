//! The contract between a [`BuildPlan`] and whatever actually builds targets.
//!
//! The planner never builds anything itself. An external executor implements
//! [`TargetExecutor`] and [`execute_plan`] feeds it the plan: the targets of a
//! wave run concurrently, bounded by a concurrency limit, and waves run one
//! after the other.

use std::sync::Arc;

use async_trait::async_trait;
use buildplan_target::{Address, Target};
use futures::{StreamExt, stream::FuturesUnordered};
use itertools::Itertools;
use tokio::sync::Semaphore;

use crate::BuildPlan;

/// Builds individual targets on behalf of [`execute_plan`].
#[async_trait]
pub trait TargetExecutor: Send + Sync {
    /// Builds a single target. All dependencies of the target have been built
    /// successfully before this is called.
    async fn execute(&self, target: Arc<Target>) -> miette::Result<()>;

    /// Decides whether the next wave should start after `report` finished.
    ///
    /// By default execution stops after the first wave that had a failure.
    fn should_continue(&self, report: &WaveReport) -> bool {
        !report.has_failures()
    }
}

/// A target that failed to build.
#[derive(Debug)]
pub struct TargetFailure {
    pub address: Address,
    pub error: miette::Report,
}

/// The outcome of a single wave.
#[derive(Debug, Default)]
pub struct WaveReport {
    /// The position of the wave in the plan.
    pub index: usize,
    /// The targets that were built successfully, in wave order.
    pub succeeded: Vec<Address>,
    /// The targets that failed, in wave order.
    pub failed: Vec<TargetFailure>,
}

impl WaveReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// The outcome of executing a plan.
#[derive(Debug, Default)]
pub struct PlanReport {
    /// The reports of the waves that were started, in order.
    pub waves: Vec<WaveReport>,
    /// True if the executor declined to start the remaining waves.
    pub stopped: bool,
}

impl PlanReport {
    /// True if every wave ran and every target succeeded.
    pub fn is_success(&self) -> bool {
        !self.stopped && self.waves.iter().all(|wave| !wave.has_failures())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetFailure> + '_ {
        self.waves.iter().flat_map(|wave| wave.failed.iter())
    }

    /// The number of targets that were handed to the executor.
    pub fn executed_count(&self) -> usize {
        self.waves
            .iter()
            .map(|wave| wave.succeeded.len() + wave.failed.len())
            .sum()
    }
}

/// Runs a plan with the given executor.
///
/// At most `max_concurrency` targets of a wave are executing at any time. The
/// limit is clamped to `1..=Semaphore::MAX_PERMITS`. Between waves the executor's
/// [`TargetExecutor::should_continue`] decides whether to go on.
pub async fn execute_plan<E: TargetExecutor + ?Sized>(
    plan: &BuildPlan,
    executor: &E,
    max_concurrency: usize,
) -> PlanReport {
    let semaphore = Semaphore::new(max_concurrency.clamp(1, Semaphore::MAX_PERMITS));
    let mut report = PlanReport::default();

    for wave in plan.waves() {
        tracing::debug!(
            "executing wave {} with {} targets",
            wave.index(),
            wave.len()
        );

        let semaphore = &semaphore;
        let mut pending = wave
            .iter()
            .cloned()
            .enumerate()
            .map(|(position, target)| async move {
                let address = target.address().clone();
                let result = match semaphore.acquire().await {
                    Ok(_permit) => executor.execute(target).await,
                    Err(err) => Err(miette::miette!("failed to acquire a build slot: {err}")),
                };
                (position, address, result)
            })
            .collect::<FuturesUnordered<_>>();

        let mut outcomes = Vec::with_capacity(wave.len());
        while let Some(outcome) = pending.next().await {
            outcomes.push(outcome);
        }

        let mut wave_report = WaveReport {
            index: wave.index(),
            ..WaveReport::default()
        };
        for (_, address, result) in outcomes
            .into_iter()
            .sorted_by_key(|(position, _, _)| *position)
        {
            match result {
                Ok(()) => wave_report.succeeded.push(address),
                Err(error) => {
                    tracing::warn!("building '{address}' failed: {error}");
                    wave_report.failed.push(TargetFailure { address, error });
                }
            }
        }

        let proceed = executor.should_continue(&wave_report);
        report.waves.push(wave_report);
        if !proceed {
            if report.waves.len() < plan.len() {
                tracing::debug!("stopping after wave {}", wave.index());
                report.stopped = true;
            }
            break;
        }
    }

    report
}
