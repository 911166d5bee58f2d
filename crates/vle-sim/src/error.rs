//! Error types for coupled simulation runs.

use thiserror::Error;
use vle_core::{DevsError, Time};
use vle_ode::OdeError;

/// Errors raised while assembling or running a coupled model.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Model {name} is declared twice")]
    DuplicateModel { name: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("Unknown dynamics: {name}")]
    UnknownDynamics { name: String },

    #[error("Invalid coupling {from}:{from_port} -> {to}:{to_port} ({reason})")]
    Coupling {
        from: String,
        from_port: String,
        to: String,
        to_port: String,
        reason: &'static str,
    },

    #[error("Model {model}: {source}")]
    Model {
        model: String,
        #[source]
        source: DevsError,
    },

    #[error("Step limit of {steps} reached at t = {time}")]
    StepLimit { steps: usize, time: Time },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Tag a protocol-level error with the model that raised it.
    pub fn model(model: impl Into<String>, source: DevsError) -> Self {
        SimError::Model {
            model: model.into(),
            source,
        }
    }

    /// Build-time failure of a differential equation model.
    pub fn ode(model: &str, source: OdeError) -> Self {
        SimError::Model {
            model: model.to_string(),
            source: source.into_devs(model),
        }
    }
}
