//! Error types for differential equation models.

use thiserror::Error;
use vle_core::DevsError;

/// Errors raised while building or running a differential equation model.
///
/// Every variant is fatal for the simulation run: configuration errors are
/// reported at construction or at the first offending transition, protocol
/// errors signal a coordinator calling a transition the current state does
/// not accept.
#[derive(Error, Debug)]
pub enum OdeError {
    #[error("Variable {name} is already declared")]
    DuplicateVariable { name: String },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Unknown integration method: {method}")]
    InvalidMethod { method: String },

    #[error("Invalid option {key}: {reason}")]
    InvalidOption { key: String, reason: &'static str },

    #[error("{what} is not allowed in state {state}")]
    Protocol {
        state: &'static str,
        what: &'static str,
    },

    #[error("Gradient computation failed: {message}")]
    Compute { message: String },

    #[error(transparent)]
    Condition(#[from] DevsError),
}

pub type OdeResult<T> = Result<T, OdeError>;

impl OdeError {
    /// Convert into the protocol-level error, tagging it with the model name.
    pub fn into_devs(self, model: &str) -> DevsError {
        match self {
            OdeError::Condition(e) => e,
            OdeError::Protocol { state, what } => DevsError::Protocol {
                model: model.to_string(),
                what: format!("{what} in state {state}"),
            },
            OdeError::UnknownVariable { name } => DevsError::UnknownPort {
                model: model.to_string(),
                port: name,
            },
            other => DevsError::Model {
                model: model.to_string(),
                message: other.to_string(),
            },
        }
    }
}
