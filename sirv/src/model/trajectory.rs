use serde::{Deserialize, Serialize};

use crate::error::{SirvError, SirvResult};
use crate::model::sirv::{Compartment, CompartmentState, ModelParameters};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Days since the start of the run.
    pub time: f64,
    pub state: CompartmentState,
}

impl Sample {
    pub fn new(time: f64, state: CompartmentState) -> Self {
        Self { time, state }
    }
}

/// Time series of compartment sizes, strictly increasing in time.
///
/// A trajectory is immutable once built: the engine hands ownership to the
/// caller and no mutable access to the samples is exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    params: ModelParameters,
    samples: Vec<Sample>,
}

impl Trajectory {
    /// Build a trajectory from externally produced samples.
    ///
    /// Times must be finite and strictly increasing. An empty sample list is
    /// accepted; the analyzer reports it as an invalid input.
    pub fn new(params: ModelParameters, samples: Vec<Sample>) -> SirvResult<Self> {
        params.check()?;
        if let Some(s) = samples.iter().find(|s| !s.time.is_finite()) {
            return Err(SirvError::invalid("samples.time", s.time, "must be finite"));
        }
        if let Some(w) = samples.windows(2).find(|w| w[1].time <= w[0].time) {
            return Err(SirvError::invalid("samples.time", w[1].time, "must be strictly increasing"));
        }
        Ok(Self { params, samples })
    }

    pub(crate) fn from_engine(params: ModelParameters, samples: Vec<Sample>) -> Self {
        Self { params, samples }
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    pub fn population(&self) -> f64 {
        self.params.population
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.time)
    }

    pub fn series(&self, c: Compartment) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(move |s| s.state.get(c))
    }

    pub fn recovered_plus_vaccinated(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.state.recovered_plus_vaccinated())
    }

    /// Largest |S+I+R+V - (S0+I0+R0+V0)| over the run.
    pub fn max_conservation_drift(&self) -> f64 {
        let Some(first) = self.samples.first() else {
            return 0.0;
        };
        let total0 = first.state.total();
        self.samples
            .iter()
            .map(|s| (s.state.total() - total0).abs())
            .fold(0.0, f64::max)
    }

    /// Sample with the most infected individuals; earliest on ties.
    pub fn peak_infected(&self) -> Option<&Sample> {
        self.samples.iter().fold(None, |best: Option<&Sample>, s| match best {
            Some(b) if b.state.infected >= s.state.infected => Some(b),
            _ => Some(s),
        })
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ModelParameters {
        ModelParameters::new(100.0, 0.3, 0.1, 0.0).unwrap()
    }

    fn sample(t: f64, i: f64) -> Sample {
        Sample::new(t, CompartmentState::new(100.0 - i, i, 0.0, 0.0))
    }

    #[test]
    fn rejects_non_increasing_times() {
        let err = Trajectory::new(params(), vec![sample(0.0, 1.0), sample(0.0, 2.0)]).unwrap_err();
        assert!(matches!(err, SirvError::InvalidParameter { name: "samples.time", .. }));
        assert!(Trajectory::new(params(), vec![sample(f64::NAN, 1.0)]).is_err());
        assert!(Trajectory::new(params(), vec![]).unwrap().is_empty());
    }

    #[test]
    fn peak_prefers_earliest_on_ties() {
        let traj = Trajectory::new(
            params(),
            vec![sample(0.0, 1.0), sample(1.0, 5.0), sample(2.0, 5.0), sample(3.0, 2.0)],
        )
        .unwrap();
        assert_eq!(traj.peak_infected().map(|s| s.time), Some(1.0));
        assert_eq!(traj.max_conservation_drift(), 0.0);
        let infected: Vec<f64> = traj.series(Compartment::Infected).collect();
        assert_eq!(infected, vec![1.0, 5.0, 5.0, 2.0]);
    }
}
