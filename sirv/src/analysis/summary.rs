use serde::{Deserialize, Serialize};

use crate::analysis::threshold::{CrossingPolicy, ThresholdCrossing};
use crate::model::sirv::{CompartmentState, Integrator, ModelParameters};
use crate::model::trajectory::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakInfection {
    pub time: f64,
    pub infected: f64,
}

/// Headline numbers of one run, as handed to renderers and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub params: ModelParameters,
    pub integrator: Integrator,
    pub horizon: f64,
    pub step: f64,
    pub samples: usize,
    pub basic_reproduction_number: f64,
    pub herd_immunity_threshold: f64,
    pub peak_infection: Option<PeakInfection>,
    pub final_state: Option<CompartmentState>,
    pub max_conservation_drift: f64,
    pub threshold_fraction: f64,
    pub policy: CrossingPolicy,
    pub threshold: Option<ThresholdCrossing>,
}

impl RunSummary {
    pub fn from_trajectory(
        trajectory: &Trajectory,
        integrator: Integrator,
        horizon: f64,
        step: f64,
        threshold_fraction: f64,
        policy: CrossingPolicy,
        threshold: Option<ThresholdCrossing>,
    ) -> Self {
        let params = *trajectory.params();
        Self {
            params,
            integrator,
            horizon,
            step,
            samples: trajectory.len(),
            basic_reproduction_number: params.basic_reproduction_number(),
            herd_immunity_threshold: params.herd_immunity_threshold(),
            peak_infection: trajectory.peak_infected().map(|s| PeakInfection {
                time: s.time,
                infected: s.state.infected,
            }),
            final_state: trajectory.last().map(|s| s.state),
            max_conservation_drift: trajectory.max_conservation_drift(),
            threshold_fraction,
            policy,
            threshold,
        }
    }
}
