use crate::analysis::summary::RunSummary;
use crate::analysis::threshold::{find_threshold_with, ThresholdCrossing};
use crate::config::RunConfig;
use crate::error::SirvResult;
use crate::model::sirv::SirvModel;
use crate::model::trajectory::Trajectory;

/// Result of [`run`]: the trajectory plus what the analyzer found in it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub trajectory: Trajectory,
    pub threshold: Option<ThresholdCrossing>,
    pub summary: RunSummary,
}

/// Integrate the configured model and locate the immunity threshold.
pub fn run(cfg: &RunConfig) -> SirvResult<RunOutcome> {
    cfg.check()?;
    let model = SirvModel::new(cfg.params()?)?;
    let solver = cfg.solver();

    let trajectory = model.simulate(cfg.initial_state(), &solver)?;
    let threshold = find_threshold_with(&trajectory, cfg.threshold_fraction, cfg.policy)?;

    let summary = RunSummary::from_trajectory(
        &trajectory,
        cfg.integrator,
        cfg.horizon,
        cfg.step,
        cfg.threshold_fraction,
        cfg.policy,
        threshold,
    );

    match &threshold {
        Some(hit) => tracing::info!(
            integrator = %cfg.integrator,
            samples = trajectory.len(),
            crossing_time = hit.crossing_time,
            crossing_index = hit.crossing_index,
            "{:.0}% of the population recovered or vaccinated",
            cfg.threshold_fraction * 100.0
        ),
        None => tracing::info!(
            integrator = %cfg.integrator,
            samples = trajectory.len(),
            "threshold of {:.0}% not reached within {} days",
            cfg.threshold_fraction * 100.0,
            cfg.horizon
        ),
    }

    Ok(RunOutcome { trajectory, threshold, summary })
}
