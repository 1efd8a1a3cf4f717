use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analysis::threshold::{CrossingPolicy, DEFAULT_THRESHOLD_FRACTION};
use crate::error::{SirvError, SirvResult};
use crate::math::ode::AdaptiveOptions;
use crate::model::sirv::{CompartmentState, Integrator, ModelParameters, SolverSettings};

/// Everything one run needs. Missing fields take the baseline scenario values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub population: f64,
    pub transmission_rate: f64,
    pub recovery_rate: f64,
    pub vaccination_rate: f64,

    // Seeding; susceptible = population - the rest
    pub initial_infected: f64,
    pub initial_recovered: f64,
    pub initial_vaccinated: f64,

    /// Days.
    pub horizon: f64,
    /// Days.
    pub step: f64,
    pub threshold_fraction: f64,

    pub integrator: Integrator,
    pub policy: CrossingPolicy,
    pub adaptive: AdaptiveOptions,
    pub report_times: Option<Vec<f64>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population: 1000.0,
            transmission_rate: 0.4,
            recovery_rate: 0.05,
            vaccination_rate: 0.02,
            initial_infected: 1.0,
            initial_recovered: 0.0,
            initial_vaccinated: 0.0,
            horizon: 150.0,
            step: 0.1,
            threshold_fraction: DEFAULT_THRESHOLD_FRACTION,
            integrator: Integrator::Euler,
            policy: CrossingPolicy::FirstAtOrAbove,
            adaptive: AdaptiveOptions::default(),
            report_times: None,
        }
    }
}

impl RunConfig {
    /// Load a JSON run configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run config: {}", path.display()))?;
        let cfg: RunConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse run config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn params(&self) -> SirvResult<ModelParameters> {
        ModelParameters::new(
            self.population,
            self.transmission_rate,
            self.recovery_rate,
            self.vaccination_rate,
        )
    }

    pub fn initial_state(&self) -> CompartmentState {
        CompartmentState::seeded(
            self.population,
            self.initial_infected,
            self.initial_recovered,
            self.initial_vaccinated,
        )
    }

    pub fn solver(&self) -> SolverSettings {
        SolverSettings {
            integrator: self.integrator,
            horizon: self.horizon,
            step: self.step,
            adaptive: self.adaptive,
            report_times: self.report_times.clone(),
        }
    }

    /// Checks every field the engine and analyzer would reject, up front.
    pub fn check(&self) -> SirvResult<()> {
        self.params()?;
        self.solver().check()?;
        if !(0.0..=1.0).contains(&self.threshold_fraction) {
            return Err(SirvError::invalid(
                "threshold_fraction",
                self.threshold_fraction,
                "must lie within [0, 1]",
            ));
        }
        Ok(())
    }
}
