use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use sirv::io::report::{write_json, write_run_report, write_trajectory_csv};
use sirv::logging::{init_logging, LogFormat};
use sirv::{CrossingPolicy, Integrator, RunConfig};

#[derive(Parser, Debug)]
#[command(
    name = "sirv",
    version,
    about = "Integrate an SIRV epidemic model and report when recovered + vaccinated reaches a share of the population",
    allow_negative_numbers = true
)]
struct Cli {
    #[arg(long, help = "JSON run configuration; the flags below override its values")]
    config: Option<PathBuf>,

    #[arg(long, short = 'N', help = "Total population N [default: 1000]")]
    population: Option<f64>,
    #[arg(long, visible_alias = "beta", help = "Transmission rate per day [default: 0.4]")]
    transmission_rate: Option<f64>,
    #[arg(long, visible_alias = "gamma", help = "Recovery rate per day [default: 0.05]")]
    recovery_rate: Option<f64>,
    #[arg(long, visible_alias = "alpha", help = "Vaccination rate per day [default: 0.02]")]
    vaccination_rate: Option<f64>,

    #[arg(long, help = "Initially infected [default: 1]")]
    initial_infected: Option<f64>,
    #[arg(long, help = "Initially recovered [default: 0]")]
    initial_recovered: Option<f64>,
    #[arg(long, help = "Initially vaccinated [default: 0]")]
    initial_vaccinated: Option<f64>,

    #[arg(long, help = "Simulated days [default: 150]")]
    horizon: Option<f64>,
    #[arg(long, help = "Step size in days [default: 0.1]")]
    step: Option<f64>,
    #[arg(long, help = "Share of the population that must be recovered or vaccinated [default: 0.75]")]
    fraction: Option<f64>,

    #[arg(long, help = "euler, rk4 or adaptive [default: euler]")]
    integrator: Option<Integrator>,
    #[arg(long, help = "first-at-or-above, interpolated or nearest [default: first-at-or-above]")]
    policy: Option<CrossingPolicy>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Report)]
    format: OutputFormat,
    #[arg(long, default_value_t = 10, help = "Print every K-th sample in the text report")]
    every: usize,

    #[arg(long, env = "SIRV_LOG_LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long, default_value = "human", help = "human or json")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Report,
    Csv,
    Json,
}

impl Cli {
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };

        let overrides = [
            (self.population, &mut cfg.population),
            (self.transmission_rate, &mut cfg.transmission_rate),
            (self.recovery_rate, &mut cfg.recovery_rate),
            (self.vaccination_rate, &mut cfg.vaccination_rate),
            (self.initial_infected, &mut cfg.initial_infected),
            (self.initial_recovered, &mut cfg.initial_recovered),
            (self.initial_vaccinated, &mut cfg.initial_vaccinated),
            (self.horizon, &mut cfg.horizon),
            (self.step, &mut cfg.step),
            (self.fraction, &mut cfg.threshold_fraction),
        ];
        for (flag, field) in overrides {
            if let Some(v) = flag {
                *field = v;
            }
        }
        if let Some(i) = self.integrator {
            cfg.integrator = i;
        }
        if let Some(p) = self.policy {
            cfg.policy = p;
        }
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    let cfg = cli.run_config()?;
    let outcome = sirv::run(&cfg).context("simulation failed")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        OutputFormat::Report => write_run_report(&mut out, &outcome.summary, &outcome.trajectory, cli.every)?,
        OutputFormat::Csv => write_trajectory_csv(&mut out, &outcome.trajectory)?,
        OutputFormat::Json => {
            write_json(&mut out, &outcome.summary, &outcome.trajectory)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
