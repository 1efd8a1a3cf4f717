use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_positive, SirvError, SirvResult};
use crate::math::interp::resample;
use crate::math::ode::{euler_step, integrate_adaptive, rk4_step_ws, AdaptiveOptions, Rk4Workspace};
use crate::model::trajectory::{Sample, Trajectory};

/// State vector layout: S | I | R | V
pub const N_COMPARTMENTS: usize = 4;

/// Upper bound on fixed-grid samples per run.
pub const MAX_SAMPLES: usize = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    Susceptible = 0,
    Infected = 1,
    Recovered = 2,
    Vaccinated = 3,
}

impl Compartment {
    pub const ALL: [Compartment; N_COMPARTMENTS] = [
        Compartment::Susceptible,
        Compartment::Infected,
        Compartment::Recovered,
        Compartment::Vaccinated,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Compartment::Susceptible => "susceptible",
            Compartment::Infected => "infected",
            Compartment::Recovered => "recovered",
            Compartment::Vaccinated => "vaccinated",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Total population N.
    pub population: f64,

    // Rates (per day)
    pub transmission_rate: f64, // beta
    pub recovery_rate: f64,     // gamma, I -> R
    pub vaccination_rate: f64,  // alpha, S -> V
}

impl ModelParameters {
    pub fn new(
        population: f64,
        transmission_rate: f64,
        recovery_rate: f64,
        vaccination_rate: f64,
    ) -> SirvResult<Self> {
        let params = Self {
            population,
            transmission_rate,
            recovery_rate,
            vaccination_rate,
        };
        params.check()?;
        Ok(params)
    }

    pub fn check(&self) -> SirvResult<()> {
        ensure_positive("population", self.population)?;
        ensure_non_negative("transmission_rate", self.transmission_rate)?;
        ensure_non_negative("recovery_rate", self.recovery_rate)?;
        ensure_non_negative("vaccination_rate", self.vaccination_rate)?;
        Ok(())
    }

    /// R0 = beta / gamma. Infinite when nobody recovers.
    pub fn basic_reproduction_number(&self) -> f64 {
        if self.recovery_rate == 0.0 {
            return f64::INFINITY;
        }
        self.transmission_rate / self.recovery_rate
    }

    /// Immune fraction above which infections decline without vaccination pressure.
    pub fn herd_immunity_threshold(&self) -> f64 {
        let r0 = self.basic_reproduction_number();
        if r0 <= 1.0 {
            0.0
        } else {
            1.0 - 1.0 / r0
        }
    }

    /// Instantaneous flows; the four components sum to zero.
    pub fn derivatives(&self, state: &CompartmentState) -> CompartmentState {
        let s = state.susceptible;
        let i = state.infected;
        let infection = self.transmission_rate * s * i / self.population;
        let vaccination = self.vaccination_rate * s;
        let recovery = self.recovery_rate * i;
        CompartmentState {
            susceptible: -infection - vaccination,
            infected: infection - recovery,
            recovered: recovery,
            vaccinated: vaccination,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompartmentState {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
    pub vaccinated: f64,
}

impl CompartmentState {
    pub fn new(susceptible: f64, infected: f64, recovered: f64, vaccinated: f64) -> Self {
        Self { susceptible, infected, recovered, vaccinated }
    }

    /// Everyone susceptible except the seeded compartments.
    pub fn seeded(population: f64, infected: f64, recovered: f64, vaccinated: f64) -> Self {
        Self::new(population - infected - recovered - vaccinated, infected, recovered, vaccinated)
    }

    pub fn from_slice(y: &[f64]) -> Self {
        Self::new(y[0], y[1], y[2], y[3])
    }

    pub fn to_array(&self) -> [f64; N_COMPARTMENTS] {
        [self.susceptible, self.infected, self.recovered, self.vaccinated]
    }

    pub fn get(&self, c: Compartment) -> f64 {
        self.to_array()[c.index()]
    }

    pub fn total(&self) -> f64 {
        self.susceptible + self.infected + self.recovered + self.vaccinated
    }

    /// R + V, the immune population monitored by the threshold analyzer.
    pub fn recovered_plus_vaccinated(&self) -> f64 {
        self.recovered + self.vaccinated
    }

    pub fn is_non_negative(&self) -> bool {
        self.to_array().iter().all(|v| *v >= 0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Integrator {
    /// Explicit Euler on the fixed grid.
    #[default]
    Euler,
    /// Classic RK4 on the fixed grid.
    Rk4,
    /// Dormand–Prince 5(4) with error control, resampled onto report times.
    Adaptive,
}

impl Integrator {
    pub fn fixed_scheme(self) -> Option<FixedScheme> {
        match self {
            Integrator::Euler => Some(FixedScheme::Euler),
            Integrator::Rk4 => Some(FixedScheme::Rk4),
            Integrator::Adaptive => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Integrator::Euler => "euler",
            Integrator::Rk4 => "rk4",
            Integrator::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Integrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Integrator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler" => Ok(Integrator::Euler),
            "rk4" => Ok(Integrator::Rk4),
            "adaptive" | "rk45" | "dopri5" => Ok(Integrator::Adaptive),
            other => Err(format!("unknown integrator '{other}' (expected euler, rk4 or adaptive)")),
        }
    }
}

/// Fixed-step schemes that can be driven one sample at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedScheme {
    Euler,
    Rk4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub integrator: Integrator,
    /// Days.
    pub horizon: f64,
    /// Days. Grid spacing for the fixed-step schemes and the default report grid.
    pub step: f64,
    pub adaptive: AdaptiveOptions,
    /// Report times for the adaptive solver. `None` means the fixed grid.
    pub report_times: Option<Vec<f64>>,
}

impl SolverSettings {
    pub fn new(integrator: Integrator, horizon: f64, step: f64) -> Self {
        Self {
            integrator,
            horizon,
            step,
            adaptive: AdaptiveOptions::default(),
            report_times: None,
        }
    }

    pub fn euler(horizon: f64, step: f64) -> Self {
        Self::new(Integrator::Euler, horizon, step)
    }

    pub fn check(&self) -> SirvResult<()> {
        ensure_positive("horizon", self.horizon)?;
        ensure_positive("step", self.step)?;
        let ratio = self.horizon / self.step;
        if !ratio.is_finite() || ratio >= MAX_SAMPLES as f64 {
            return Err(SirvError::invalid("step", self.step, "horizon / step yields too many samples"));
        }
        if self.integrator == Integrator::Adaptive {
            self.adaptive.check()?;
            if let Some(times) = &self.report_times {
                check_report_times(times, self.horizon)?;
            }
        }
        Ok(())
    }

    /// floor(horizon / step) + 1, tolerant of ratios like 150 / 0.1.
    pub fn sample_count(&self) -> usize {
        (self.horizon / self.step + 1e-9).floor() as usize + 1
    }

    /// `0, step, 2*step, ...` with `sample_count` entries.
    pub fn grid(&self) -> Vec<f64> {
        (0..self.sample_count()).map(|i| i as f64 * self.step).collect()
    }
}

fn check_report_times(times: &[f64], horizon: f64) -> SirvResult<()> {
    match times.first() {
        None => return Err(SirvError::invalid("report_times", f64::NAN, "must not be empty")),
        Some(&t0) if t0 != 0.0 => {
            return Err(SirvError::invalid("report_times", t0, "must start at 0"));
        }
        Some(_) => {}
    }
    for w in times.windows(2) {
        if !(w[1] > w[0]) {
            return Err(SirvError::invalid("report_times", w[1], "must be strictly increasing"));
        }
    }
    // allow one rounding step past the horizon, as `i * step` grids produce
    let limit = horizon + 1e-9 * horizon.max(1.0);
    if let Some(&t) = times.iter().find(|t| !t.is_finite() || **t > limit) {
        return Err(SirvError::invalid("report_times", t, "must lie within [0, horizon]"));
    }
    Ok(())
}

pub struct SirvModel {
    pub params: ModelParameters,
}

impl SirvModel {
    pub fn new(params: ModelParameters) -> SirvResult<Self> {
        params.check()?;
        Ok(Self { params })
    }

    pub fn deriv(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        let d = self.params.derivatives(&CompartmentState::from_slice(y));
        dy.copy_from_slice(&d.to_array());
    }

    /// Unbounded lazy producer of fixed-step samples, starting with `initial` at t=0.
    ///
    /// `step` is not validated here; use [`SirvModel::simulate`] for a checked run.
    pub fn steps(&self, initial: CompartmentState, step: f64, scheme: FixedScheme) -> Steps<'_> {
        Steps {
            model: self,
            scheme,
            step,
            index: 0,
            y: initial.to_array(),
            ws: Rk4Workspace::new(N_COMPARTMENTS),
        }
    }

    pub fn simulate(&self, initial: CompartmentState, settings: &SolverSettings) -> SirvResult<Trajectory> {
        settings.check()?;
        self.warn_on_inconsistent_initial(&initial);

        let samples: Vec<Sample> = match settings.integrator.fixed_scheme() {
            Some(scheme) => self
                .steps(initial, settings.step, scheme)
                .take(settings.sample_count())
                .collect(),
            None => self.simulate_adaptive(initial, settings)?,
        };

        tracing::debug!(
            integrator = %settings.integrator,
            samples = samples.len(),
            horizon = settings.horizon,
            step = settings.step,
            "trajectory integrated"
        );
        Ok(Trajectory::from_engine(self.params, samples))
    }

    fn simulate_adaptive(&self, initial: CompartmentState, settings: &SolverSettings) -> SirvResult<Vec<Sample>> {
        let times = match &settings.report_times {
            Some(t) => t.clone(),
            None => settings.grid(),
        };
        let end = times.last().map_or(settings.horizon, |t| t.max(settings.horizon));
        let dense = integrate_adaptive(
            &initial.to_array(),
            0.0,
            end,
            &settings.adaptive,
            |t, y, dy| self.deriv(t, y, dy),
        )?;
        let rows = resample(&dense, &times);
        Ok(times
            .iter()
            .zip(rows.iter())
            .map(|(&t, row)| Sample::new(t, CompartmentState::from_slice(row)))
            .collect())
    }

    fn warn_on_inconsistent_initial(&self, initial: &CompartmentState) {
        let n = self.params.population;
        if !initial.is_non_negative() {
            tracing::warn!(?initial, "initial state has a negative compartment");
        }
        let total = initial.total();
        if (total - n).abs() > 1e-9 * n {
            tracing::warn!(total, population = n, "initial compartments do not sum to the population");
        }
    }
}

/// Iterator returned by [`SirvModel::steps`].
pub struct Steps<'a> {
    model: &'a SirvModel,
    scheme: FixedScheme,
    step: f64,
    index: usize,
    y: [f64; N_COMPARTMENTS],
    ws: Rk4Workspace,
}

impl Iterator for Steps<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let t = self.index as f64 * self.step;
        let sample = Sample::new(t, CompartmentState::from_slice(&self.y));
        let model = self.model;
        match self.scheme {
            FixedScheme::Euler => {
                euler_step(&mut self.y, t, self.step, &mut self.ws.k[0], |tt, y, dy| model.deriv(tt, y, dy))
            }
            FixedScheme::Rk4 => {
                rk4_step_ws(&mut self.y, t, self.step, &mut self.ws, |tt, y, dy| model.deriv(tt, y, dy))
            }
        }
        self.index += 1;
        Some(sample)
    }
}

/// Fixed-step Euler trajectory of `floor(horizon / step) + 1` samples.
pub fn integrate(
    params: ModelParameters,
    initial: CompartmentState,
    horizon: f64,
    step: f64,
) -> SirvResult<Trajectory> {
    SirvModel::new(params)?.simulate(initial, &SolverSettings::euler(horizon, step))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> ModelParameters {
        ModelParameters::new(1000.0, 0.4, 0.05, 0.02).unwrap()
    }

    #[test]
    fn derivatives_balance() {
        let d = baseline().derivatives(&CompartmentState::new(999.0, 1.0, 0.0, 0.0));
        assert!(d.total().abs() < 1e-12);
        assert!(d.susceptible < 0.0);
        assert_eq!(d.recovered, 0.05);
        assert_eq!(d.vaccinated, 0.02 * 999.0);
    }

    #[test]
    fn first_euler_step_matches_hand_computation() {
        let traj = integrate(baseline(), CompartmentState::new(999.0, 1.0, 0.0, 0.0), 0.1, 0.1).unwrap();
        assert_eq!(traj.len(), 2);
        let s1 = traj.samples()[1].state;
        let infection = 0.4 * 999.0 * 1.0 / 1000.0;
        assert_eq!(s1.susceptible, 999.0 + (-infection - 0.02 * 999.0) * 0.1);
        assert_eq!(s1.infected, 1.0 + (infection - 0.05) * 0.1);
        assert_eq!(s1.recovered, 0.05 * 0.1);
        assert_eq!(s1.vaccinated, 0.02 * 999.0 * 0.1);
    }

    #[test]
    fn sample_count_is_inclusive_of_both_ends() {
        assert_eq!(SolverSettings::euler(150.0, 0.1).sample_count(), 1501);
        assert_eq!(SolverSettings::euler(1.0, 0.25).sample_count(), 5);
        assert_eq!(SolverSettings::euler(1.0, 0.3).sample_count(), 4);
        assert_eq!(SolverSettings::euler(0.05, 0.1).sample_count(), 1);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let init = CompartmentState::new(999.0, 1.0, 0.0, 0.0);
        let cases = [
            (150.0, 0.0, "step"),
            (150.0, -0.1, "step"),
            (0.0, 0.1, "horizon"),
            (f64::NAN, 0.1, "horizon"),
        ];
        for (h, dt, name) in cases {
            let err = integrate(baseline(), init, h, dt).unwrap_err();
            assert!(matches!(err, SirvError::InvalidParameter { name: n, .. } if n == name), "{err}");
        }
        let no_pop = ModelParameters { population: 0.0, ..baseline() };
        assert!(matches!(
            integrate(no_pop, init, 150.0, 0.1),
            Err(SirvError::InvalidParameter { name: "population", .. })
        ));
        assert!(ModelParameters::new(1000.0, -0.1, 0.05, 0.02).is_err());
    }

    #[test]
    fn large_steps_are_not_clamped() {
        // alpha * step > 1 drives S below zero in one step
        let params = ModelParameters::new(1000.0, 0.4, 0.05, 0.5).unwrap();
        let traj = integrate(params, CompartmentState::new(999.0, 1.0, 0.0, 0.0), 10.0, 5.0).unwrap();
        assert!(traj.samples()[1].state.susceptible < 0.0);
    }

    #[test]
    fn lazy_steps_agree_with_simulate() {
        let model = SirvModel::new(baseline()).unwrap();
        let init = CompartmentState::new(999.0, 1.0, 0.0, 0.0);
        let eager = model.simulate(init, &SolverSettings::euler(5.0, 0.5)).unwrap();
        let lazy: Vec<Sample> = model.steps(init, 0.5, FixedScheme::Euler).take(11).collect();
        assert_eq!(eager.samples(), lazy.as_slice());
    }

    #[test]
    fn adaptive_uses_report_times() {
        let model = SirvModel::new(baseline()).unwrap();
        let init = CompartmentState::new(999.0, 1.0, 0.0, 0.0);
        let mut settings = SolverSettings::new(Integrator::Adaptive, 10.0, 0.1);
        settings.report_times = Some(vec![0.0, 2.5, 10.0]);
        let traj = model.simulate(init, &settings).unwrap();
        let times: Vec<f64> = traj.times().collect();
        assert_eq!(times, vec![0.0, 2.5, 10.0]);
        assert_eq!(traj.samples()[0].state, init);
    }

    #[test]
    fn report_times_must_be_well_formed() {
        let model = SirvModel::new(baseline()).unwrap();
        let init = CompartmentState::new(999.0, 1.0, 0.0, 0.0);
        for bad in [vec![], vec![1.0, 2.0], vec![0.0, 2.0, 2.0], vec![0.0, 11.0]] {
            let mut settings = SolverSettings::new(Integrator::Adaptive, 10.0, 0.1);
            settings.report_times = Some(bad);
            assert!(matches!(
                model.simulate(init, &settings),
                Err(SirvError::InvalidParameter { name: "report_times", .. })
            ));
        }
    }

    #[test]
    fn integrator_parses_aliases() {
        assert_eq!("RK45".parse::<Integrator>(), Ok(Integrator::Adaptive));
        assert_eq!("euler".parse::<Integrator>(), Ok(Integrator::Euler));
        assert!("midpoint".parse::<Integrator>().is_err());
    }

    #[test]
    fn reproduction_number_and_herd_threshold() {
        let p = baseline();
        assert!((p.basic_reproduction_number() - 8.0).abs() < 1e-12);
        assert!((p.herd_immunity_threshold() - 0.875).abs() < 1e-12);
        let no_recovery = ModelParameters { recovery_rate: 0.0, ..p };
        assert!(no_recovery.basic_reproduction_number().is_infinite());
    }
}
