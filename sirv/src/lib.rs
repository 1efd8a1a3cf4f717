pub mod analysis;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod math;
pub mod model;
pub mod run;

pub use analysis::threshold::{find_threshold, find_threshold_with, CrossingPolicy, ThresholdCrossing};
pub use config::RunConfig;
pub use error::{SirvError, SirvResult};
pub use model::sirv::{integrate, CompartmentState, Integrator, ModelParameters, SirvModel, SolverSettings};
pub use model::trajectory::{Sample, Trajectory};
pub use run::{run, RunOutcome};
