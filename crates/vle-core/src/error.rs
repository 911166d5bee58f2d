use thiserror::Error;

pub type DevsResult<T> = Result<T, DevsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DevsError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Missing condition: {key}")]
    MissingCondition { key: String },

    #[error("Condition {key} has the wrong type (expected {expected})")]
    ConditionType { key: String, expected: &'static str },

    #[error("Protocol violation in model {model}: {what}")]
    Protocol { model: String, what: String },

    #[error("Unknown port {port} on model {model}")]
    UnknownPort { model: String, port: String },

    #[error("Model {model} failed: {message}")]
    Model { model: String, message: String },
}
