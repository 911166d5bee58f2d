//! vle-sim: hosting side of the VLE simulation crates.
//!
//! Contains:
//! - coupled (atomic models and the couplings between their ports)
//! - coordinator (sequential DEVS root coordinator)
//! - view (timed observations and observation tables)
//! - catalog (built-in dynamics)
//! - experiment (YAML experiment files)

pub mod catalog;
pub mod coordinator;
pub mod coupled;
pub mod error;
pub mod experiment;
pub mod view;

pub use coordinator::{Coordinator, SimOptions, run_sim};
pub use coupled::{Coupled, CoupledBuilder, Coupling};
pub use error::{SimError, SimResult};
pub use experiment::{
    Experiment, ExperimentError, ExperimentResult, ValidationError, from_yaml_str, load_yaml,
    save_yaml, validate_experiment,
};
pub use view::{Observable, ObservationTable, View};
