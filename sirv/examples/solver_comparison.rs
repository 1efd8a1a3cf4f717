use std::time::Instant;

use sirv::{find_threshold_with, CrossingPolicy, Integrator, RunConfig};

fn main() -> anyhow::Result<()> {
    let base = RunConfig::default();

    println!("integrator,step,runtime_ms,samples,crossing_day,max_drift");
    for integrator in [Integrator::Euler, Integrator::Rk4, Integrator::Adaptive] {
        for step in [0.5, 0.1, 0.01] {
            let cfg = RunConfig { integrator, step, ..base.clone() };

            let t_start = Instant::now();
            let outcome = sirv::run(&cfg)?;
            let ms = t_start.elapsed().as_secs_f64() * 1000.0;

            // interpolate so the column compares solvers rather than grid spacing
            let crossing = find_threshold_with(
                &outcome.trajectory,
                cfg.threshold_fraction,
                CrossingPolicy::Interpolated,
            )?
            .map(|hit| format!("{:.3}", hit.crossing_time))
            .unwrap_or_else(|| "-".to_string());

            println!(
                "{},{},{:.3},{},{},{:.3e}",
                integrator,
                step,
                ms,
                outcome.trajectory.len(),
                crossing,
                outcome.trajectory.max_conservation_drift()
            );
        }
    }

    Ok(())
}
