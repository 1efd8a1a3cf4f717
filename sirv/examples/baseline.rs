use sirv::{find_threshold, run, CompartmentState, RunConfig};

fn main() -> anyhow::Result<()> {
    // N=1000, beta=0.4, gamma=0.05, alpha=0.02, one initial infection, 150 days at dt=0.1
    let cfg = RunConfig::default();
    let outcome = run(&cfg)?;

    // Print daily summary (every 10 steps)
    println!("day,S,I,R,V,R+V");
    for (idx, s) in outcome.trajectory.iter().enumerate() {
        if idx % 10 != 0 {
            continue;
        }
        let CompartmentState { susceptible, infected, recovered, vaccinated } = s.state;
        println!(
            "{:.0},{:.1},{:.1},{:.1},{:.1},{:.1}",
            s.time,
            susceptible,
            infected,
            recovered,
            vaccinated,
            recovered + vaccinated
        );
    }

    // Same trajectory, a few other targets
    for fraction in [0.25, 0.5, 0.75, 0.9] {
        match find_threshold(&outcome.trajectory, fraction)? {
            Some(hit) => println!("{:.0}% immune after {:.1} days", fraction * 100.0, hit.crossing_time),
            None => println!("{:.0}% immune not reached within {} days", fraction * 100.0, cfg.horizon),
        }
    }

    Ok(())
}
