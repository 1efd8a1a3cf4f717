//! Renderer-facing output: the trajectory as CSV or JSON, and a plain-text run
//! report. Everything is written to a caller-supplied `io::Write`.

use std::io::Write;

use anyhow::Context;
use serde::Serialize;

use crate::analysis::summary::RunSummary;
use crate::model::sirv::Compartment;
use crate::model::trajectory::{Sample, Trajectory};

#[derive(Serialize)]
struct TrajectoryRow {
    t: f64,
    susceptible: f64,
    infected: f64,
    recovered: f64,
    vaccinated: f64,
    recovered_plus_vaccinated: f64,
}

impl From<&Sample> for TrajectoryRow {
    fn from(s: &Sample) -> Self {
        Self {
            t: s.time,
            susceptible: s.state.susceptible,
            infected: s.state.infected,
            recovered: s.state.recovered,
            vaccinated: s.state.vaccinated,
            recovered_plus_vaccinated: s.state.recovered_plus_vaccinated(),
        }
    }
}

/// One CSV row per sample, full precision.
pub fn write_trajectory_csv<W: Write>(w: W, trajectory: &Trajectory) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for s in trajectory {
        wtr.serialize(TrajectoryRow::from(s))
            .with_context(|| format!("write trajectory row failed (t={})", s.time))?;
    }
    wtr.flush().context("flush trajectory csv failed")?;
    Ok(())
}

#[derive(Serialize)]
struct JsonRun<'a> {
    summary: &'a RunSummary,
    samples: &'a [Sample],
}

pub fn write_json<W: Write>(w: W, summary: &RunSummary, trajectory: &Trajectory) -> anyhow::Result<()> {
    let doc = JsonRun { summary, samples: trajectory.samples() };
    serde_json::to_writer_pretty(w, &doc).context("serialize run json failed")?;
    Ok(())
}

/// Human-readable report: `key=value` header, blank line, then every
/// `every`-th sample as fixed-point CSV.
pub fn write_run_report<W: Write>(
    mut w: W,
    summary: &RunSummary,
    trajectory: &Trajectory,
    every: usize,
) -> anyhow::Result<()> {
    let p = &summary.params;
    writeln!(w, "integrator={}", summary.integrator)?;
    writeln!(w, "population={:.6}", p.population)?;
    writeln!(w, "transmission_rate={:.6}", p.transmission_rate)?;
    writeln!(w, "recovery_rate={:.6}", p.recovery_rate)?;
    writeln!(w, "vaccination_rate={:.6}", p.vaccination_rate)?;
    writeln!(w, "horizon_days={:.6}", summary.horizon)?;
    writeln!(w, "step_days={:.6}", summary.step)?;
    writeln!(w, "samples={}", summary.samples)?;
    writeln!(w, "basic_reproduction_number={:.6}", summary.basic_reproduction_number)?;
    writeln!(w, "herd_immunity_threshold={:.6}", summary.herd_immunity_threshold)?;
    if let Some(peak) = &summary.peak_infection {
        writeln!(w, "peak_infected={:.6}", peak.infected)?;
        writeln!(w, "peak_time_days={:.6}", peak.time)?;
    }
    writeln!(w, "threshold_fraction={:.6}", summary.threshold_fraction)?;
    writeln!(w, "threshold_policy={}", summary.policy)?;
    match &summary.threshold {
        Some(hit) => {
            writeln!(w, "threshold_time_days={:.6}", hit.crossing_time)?;
            writeln!(w, "threshold_index={}", hit.crossing_index)?;
        }
        None => writeln!(w, "threshold_time_days=not_reached")?,
    }
    writeln!(w)?;
    let labels: Vec<&str> = Compartment::ALL.iter().map(|c| c.label()).collect();
    writeln!(w, "t,{}", labels.join(","))?;

    let every = every.max(1);
    for s in trajectory.iter().step_by(every) {
        let values: Vec<String> = Compartment::ALL
            .iter()
            .map(|&c| format!("{:.6}", s.state.get(c)))
            .collect();
        writeln!(w, "{:.6},{}", s.time, values.join(","))?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sirv::{integrate, CompartmentState, ModelParameters};

    fn tiny() -> Trajectory {
        let params = ModelParameters::new(100.0, 0.5, 0.1, 0.0).unwrap();
        integrate(params, CompartmentState::new(99.0, 1.0, 0.0, 0.0), 1.0, 0.5).unwrap()
    }

    #[test]
    fn csv_has_header_and_one_row_per_sample() {
        let mut buf = Vec::new();
        write_trajectory_csv(&mut buf, &tiny()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "t,susceptible,infected,recovered,vaccinated,recovered_plus_vaccinated");
        assert!(lines[1].starts_with("0.0,99.0,1.0,0.0,0.0,0.0"));
    }

    #[test]
    fn report_table_follows_compartment_order() {
        let traj = tiny();
        let summary = RunSummary::from_trajectory(
            &traj,
            Default::default(),
            1.0,
            0.5,
            0.5,
            Default::default(),
            None,
        );
        let mut buf = Vec::new();
        write_run_report(&mut buf, &summary, &traj, 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let table: Vec<&str> = text.split("\n\n").nth(1).unwrap().lines().collect();
        assert_eq!(table[0], "t,susceptible,infected,recovered,vaccinated");
        assert_eq!(table[1], "0.000000,99.000000,1.000000,0.000000,0.000000");
        assert_eq!(table.len(), 3);
        assert!(text.contains("threshold_time_days=not_reached"));
    }

    #[test]
    fn json_carries_summary_and_samples() {
        let traj = tiny();
        let summary = RunSummary::from_trajectory(
            &traj,
            Default::default(),
            1.0,
            0.5,
            0.5,
            Default::default(),
            None,
        );
        let mut buf = Vec::new();
        write_json(&mut buf, &summary, &traj).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["samples"].as_array().map(|a| a.len()), Some(3));
        assert_eq!(v["summary"]["integrator"], "euler");
        assert!(v["summary"]["threshold"].is_null());
    }
}
