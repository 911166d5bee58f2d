//! The DEVS protocol implemented by atomic models.
//!
//! A hosting coordinator drives every model strictly sequentially:
//!
//! 1. `init` once, returning the first time advance
//! 2. at each internal event: `output`, then `internal_transition`
//! 3. on inbound events: `external_transition` (or `confluent_transitions`
//!    when the model is imminent at the same instant)
//! 4. `observation` at any time, without changing state
//!
//! All events of one simulation instant are delivered in a single batch.

use std::collections::BTreeSet;

use crate::error::DevsResult;
use crate::value::Payload;

/// Simulation time.
pub type Time = f64;

/// Time advance of a passive model.
pub const INFINITY: Time = f64::INFINITY;

/// An event arriving on (or leaving from) a named port.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEvent {
    pub port: String,
    pub payload: Payload,
}

impl ExternalEvent {
    pub fn new(port: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            port: port.into(),
            payload: payload.into(),
        }
    }
}

/// Request to observe a port at a given time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationEvent {
    pub time: Time,
    pub port: String,
}

impl ObservationEvent {
    pub fn new(time: Time, port: impl Into<String>) -> Self {
        Self {
            time,
            port: port.into(),
        }
    }
}

/// Name and port declarations of an atomic model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelContext {
    name: String,
    input_ports: BTreeSet<String>,
    output_ports: BTreeSet<String>,
}

impl ModelContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_input_port(mut self, port: impl Into<String>) -> Self {
        self.input_ports.insert(port.into());
        self
    }

    pub fn with_output_port(mut self, port: impl Into<String>) -> Self {
        self.output_ports.insert(port.into());
        self
    }

    /// Declare the same port as both input and output.
    pub fn with_port(self, port: impl Into<String>) -> Self {
        let port = port.into();
        self.with_input_port(port.clone()).with_output_port(port)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exist_input_port(&self, port: &str) -> bool {
        self.input_ports.contains(port)
    }

    pub fn exist_output_port(&self, port: &str) -> bool {
        self.output_ports.contains(port)
    }

    pub fn input_ports(&self) -> impl Iterator<Item = &str> {
        self.input_ports.iter().map(String::as_str)
    }

    pub fn output_ports(&self) -> impl Iterator<Item = &str> {
        self.output_ports.iter().map(String::as_str)
    }
}

/// Behaviour of an atomic DEVS model.
pub trait Dynamics {
    /// Name and ports of the model.
    fn context(&self) -> &ModelContext;

    /// Initialise the model at `time` and return its first time advance.
    fn init(&mut self, time: Time) -> DevsResult<Time>;

    /// Emit the events produced just before an internal transition.
    fn output(&self, time: Time, output: &mut Vec<ExternalEvent>) -> DevsResult<()>;

    /// Duration until the next internal transition.
    fn time_advance(&self) -> Time;

    fn internal_transition(&mut self, time: Time) -> DevsResult<()>;

    fn external_transition(&mut self, events: &[ExternalEvent], time: Time) -> DevsResult<()>;

    /// Internal and external events at the same instant. Defaults to the
    /// internal transition followed by the external one.
    fn confluent_transitions(&mut self, time: Time, events: &[ExternalEvent]) -> DevsResult<()> {
        self.internal_transition(time)?;
        self.external_transition(events, time)
    }

    /// Current value of an observable port, if the model knows it.
    fn observation(&self, event: &ObservationEvent) -> Option<Payload>;

    /// Called once when the simulation ends.
    fn finish(&mut self) {}
}
