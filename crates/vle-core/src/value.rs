//! Payloads carried by events on model ports.
//!
//! A port carries either a bare number or a record with a `value` and an
//! optional `gradient`. Fixed-step integrators broadcast bare numbers, the
//! quantized integrator always broadcasts records so that downstream models
//! receive the slope of the trajectory as well.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Value exchanged on a port.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Payload {
    /// A bare number.
    Scalar(f64),
    /// A value together with its time derivative.
    Record {
        value: f64,
        #[cfg_attr(
            feature = "serde",
            serde(default, skip_serializing_if = "Option::is_none")
        )]
        gradient: Option<f64>,
    },
}

impl Payload {
    /// Build a record carrying both value and gradient.
    pub fn record(value: f64, gradient: f64) -> Self {
        Payload::Record {
            value,
            gradient: Some(gradient),
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Payload::Scalar(value) => value,
            Payload::Record { value, .. } => value,
        }
    }

    /// Gradient carried by the payload; absent means zero.
    pub fn gradient(&self) -> f64 {
        match *self {
            Payload::Scalar(_) => 0.0,
            Payload::Record { gradient, .. } => gradient.unwrap_or(0.0),
        }
    }

    /// True when the payload carries continuity information.
    pub fn is_record(&self) -> bool {
        matches!(self, Payload::Record { .. })
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Scalar(value)
    }
}
