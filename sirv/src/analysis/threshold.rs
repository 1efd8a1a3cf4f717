//! Detection of the time at which the immune population (R + V) reaches a
//! fraction of the total population.
//!
//! Three policies are available because the historical scripts disagreed on
//! what "reaching the threshold" means:
//!
//! - [`CrossingPolicy::FirstAtOrAbove`] (default): earliest sample with
//!   `R + V >= fraction * N`. Never reports a time before the threshold is met.
//! - [`CrossingPolicy::Interpolated`]: same sample, but the reported time is
//!   interpolated linearly between it and its predecessor.
//! - [`CrossingPolicy::Nearest`]: sample whose `R + V` is closest to the
//!   target. Can land one sample *before* the crossing on a monotone series.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SirvError, SirvResult};
use crate::model::trajectory::Trajectory;

pub const DEFAULT_THRESHOLD_FRACTION: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossingPolicy {
    #[default]
    FirstAtOrAbove,
    Interpolated,
    Nearest,
}

impl CrossingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            CrossingPolicy::FirstAtOrAbove => "first-at-or-above",
            CrossingPolicy::Interpolated => "interpolated",
            CrossingPolicy::Nearest => "nearest",
        }
    }
}

impl fmt::Display for CrossingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrossingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first-at-or-above" | "first" => Ok(CrossingPolicy::FirstAtOrAbove),
            "interpolated" => Ok(CrossingPolicy::Interpolated),
            "nearest" => Ok(CrossingPolicy::Nearest),
            other => Err(format!(
                "unknown policy '{other}' (expected first-at-or-above, interpolated or nearest)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCrossing {
    /// Days. Equal to the sample time except under [`CrossingPolicy::Interpolated`].
    pub crossing_time: f64,
    pub crossing_index: usize,
    /// R + V at `crossing_index`.
    pub combined: f64,
    /// fraction * N
    pub target: f64,
}

/// First sample where R + V >= `fraction` * N, or `None` if never reached.
pub fn find_threshold(trajectory: &Trajectory, fraction: f64) -> SirvResult<Option<ThresholdCrossing>> {
    find_threshold_with(trajectory, fraction, CrossingPolicy::FirstAtOrAbove)
}

pub fn find_threshold_with(
    trajectory: &Trajectory,
    fraction: f64,
    policy: CrossingPolicy,
) -> SirvResult<Option<ThresholdCrossing>> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(SirvError::invalid("fraction", fraction, "must lie within [0, 1]"));
    }
    if trajectory.is_empty() {
        return Err(SirvError::invalid("trajectory", 0.0, "must contain at least one sample"));
    }

    let target = fraction * trajectory.population();
    let samples = trajectory.samples();
    let crossing = |index: usize, crossing_time: f64| ThresholdCrossing {
        crossing_time,
        crossing_index: index,
        combined: samples[index].state.recovered_plus_vaccinated(),
        target,
    };

    let result = match policy {
        CrossingPolicy::FirstAtOrAbove => {
            first_at_or_above(trajectory, target).map(|i| crossing(i, samples[i].time))
        }
        CrossingPolicy::Interpolated => first_at_or_above(trajectory, target).map(|i| {
            if i == 0 {
                return crossing(0, samples[0].time);
            }
            let (prev, cur) = (&samples[i - 1], &samples[i]);
            let c0 = prev.state.recovered_plus_vaccinated();
            let c1 = cur.state.recovered_plus_vaccinated();
            let t = if c1 > c0 {
                prev.time + (target - c0) / (c1 - c0) * (cur.time - prev.time)
            } else {
                cur.time
            };
            crossing(i, t)
        }),
        CrossingPolicy::Nearest => nearest(trajectory, target).map(|i| crossing(i, samples[i].time)),
    };

    match &result {
        Some(c) => tracing::debug!(
            %policy,
            index = c.crossing_index,
            time = c.crossing_time,
            target,
            "threshold reached"
        ),
        None => tracing::debug!(%policy, target, "threshold not reached"),
    }
    Ok(result)
}

fn first_at_or_above(trajectory: &Trajectory, target: f64) -> Option<usize> {
    trajectory.recovered_plus_vaccinated().position(|c| c >= target)
}

// earliest index on ties; non-finite samples never win
fn nearest(trajectory: &Trajectory, target: f64) -> Option<usize> {
    trajectory
        .recovered_plus_vaccinated()
        .map(|c| (c - target).abs())
        .enumerate()
        .filter(|(_, d)| d.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((i, d)),
        })
        .map(|(i, _)| i)
}
