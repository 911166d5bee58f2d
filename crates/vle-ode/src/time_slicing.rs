//! Time-slicing DEVS scheduler for the fixed-step integrators.
//!
//! State machine: `Init -> Compute -> Output -> Compute -> Output -> ...`
//!
//! - `Init` bootstraps the step grid (time advance 0, no integration).
//! - Leaving `Compute` integrates from the last wake-up time to now.
//! - Leaving `Output` emits the variables when the integration counter
//!   wraps to zero (every `output_period` steps).
//!
//! External events may only arrive while in `Compute`. The continuous state
//! is brought up to the event time before the inbound values overwrite it;
//! the next compute time is left untouched so the step grid never shifts.

use tracing::{debug, trace};
use vle_core::{
    Conditions, ExternalEvent, INFINITY, ModelContext, ObservationEvent, Payload, Time,
};

use crate::equation::Equation;
use crate::error::{OdeError, OdeResult};
use crate::integrator::Integrator;
use crate::variables::Variables;

/// Scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeSlicingState {
    Init,
    Compute,
    Output,
}

impl TimeSlicingState {
    pub fn label(self) -> &'static str {
        match self {
            TimeSlicingState::Init => "INIT",
            TimeSlicingState::Compute => "COMPUTE",
            TimeSlicingState::Output => "OUTPUT",
        }
    }
}

/// Options recognised by the time-slicing scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSlicingOptions {
    /// Fixed integration step (`time_step`, > 0, default 1.0).
    pub time_step: f64,
    /// Emit outputs every N steps (`output_period`, >= 1, default 1).
    pub output_period: u32,
}

impl Default for TimeSlicingOptions {
    fn default() -> Self {
        Self {
            time_step: 1.0,
            output_period: 1,
        }
    }
}

impl TimeSlicingOptions {
    pub fn from_conditions(conditions: &Conditions) -> OdeResult<Self> {
        let time_step = conditions.get_double_or("time_step", 1.0)?;
        if time_step <= 0.0 || !time_step.is_finite() {
            return Err(OdeError::InvalidOption {
                key: "time_step".to_string(),
                reason: "must be a positive finite number",
            });
        }
        let output_period = conditions.get_integer_or("output_period", 1)?;
        let output_period = u32::try_from(output_period)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| OdeError::InvalidOption {
                key: "output_period".to_string(),
                reason: "must be a positive integer",
            })?;
        Ok(Self {
            time_step,
            output_period,
        })
    }
}

/// Fixed-step driver for an integrator `M` and an equation `E`.
#[derive(Debug)]
pub struct TimeSlicing<M, E> {
    method: M,
    equation: E,
    vars: Variables,
    options: TimeSlicingOptions,
    state: TimeSlicingState,
    /// Last wake-up time: the continuous state is current at this time.
    lwut: Time,
    /// Next compute time.
    nct: Time,
    /// Completed integration steps, modulo `output_period`.
    integration_count: u32,
}

impl<M: Integrator, E: Equation> TimeSlicing<M, E> {
    pub fn new(method: M, equation: E, vars: Variables, options: TimeSlicingOptions) -> Self {
        Self {
            method,
            equation,
            vars,
            options,
            state: TimeSlicingState::Init,
            lwut: 0.0,
            nct: 0.0,
            integration_count: 0,
        }
    }

    pub fn state(&self) -> TimeSlicingState {
        self.state
    }

    pub fn options(&self) -> TimeSlicingOptions {
        self.options
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn equation(&self) -> &E {
        &self.equation
    }

    pub fn integration_count(&self) -> u32 {
        self.integration_count
    }

    pub fn init(&mut self, time: Time) -> Time {
        self.state = TimeSlicingState::Init;
        self.lwut = time;
        self.nct = time;
        self.integration_count = 0;
        debug!(
            method = self.method.name(),
            time_step = self.options.time_step,
            output_period = self.options.output_period,
            variables = self.vars.len(),
            "time slicing initialised"
        );
        self.time_advance()
    }

    pub fn time_advance(&self) -> Time {
        match self.state {
            TimeSlicingState::Init | TimeSlicingState::Output => 0.0,
            TimeSlicingState::Compute => self.nct - self.lwut,
        }
    }

    pub fn output(&self, context: &ModelContext, _time: Time, output: &mut Vec<ExternalEvent>) {
        if self.state != TimeSlicingState::Output || self.integration_count != 0 {
            return;
        }
        for var in self.vars.iter() {
            if context.exist_output_port(var.name()) {
                output.push(ExternalEvent::new(var.name(), Payload::Scalar(var.value)));
            }
        }
    }

    pub fn internal_transition(&mut self, time: Time) -> OdeResult<()> {
        let next = match self.state {
            TimeSlicingState::Init => {
                self.schedule_from(time);
                TimeSlicingState::Compute
            }
            TimeSlicingState::Compute => {
                self.method
                    .update_vars(&mut self.equation, &mut self.vars, self.lwut, time)?;
                self.integration_count = (self.integration_count + 1) % self.options.output_period;
                self.schedule_from(time);
                TimeSlicingState::Output
            }
            TimeSlicingState::Output => TimeSlicingState::Compute,
        };
        trace!(time, from = self.state.label(), to = next.label(), "internal transition");
        self.state = next;
        Ok(())
    }

    pub fn external_transition(&mut self, events: &[ExternalEvent], time: Time) -> OdeResult<()> {
        if self.state != TimeSlicingState::Compute {
            return Err(OdeError::Protocol {
                state: self.state.label(),
                what: "external transition",
            });
        }
        // mid-step: integrate up to the event first, `nct` keeps the grid
        self.method
            .update_vars(&mut self.equation, &mut self.vars, self.lwut, time)?;
        self.lwut = time;
        self.overwrite(events, time)
    }

    /// Overwrite first, then the regular internal progression: a pending
    /// compute integrates from the overwritten state.
    pub fn confluent_transitions(&mut self, time: Time, events: &[ExternalEvent]) -> OdeResult<()> {
        self.overwrite(events, time)?;
        self.internal_transition(time)
    }

    /// Stored value of the variable named by the port, without extrapolation.
    pub fn observation(&self, event: &ObservationEvent) -> Option<Payload> {
        let id = self.vars.find(&event.port)?;
        Some(Payload::Scalar(self.vars[id].value))
    }

    fn schedule_from(&mut self, time: Time) {
        self.nct = time + self.options.time_step;
        self.lwut = time;
    }

    /// Overwrite the variables named by the inbound events.
    fn overwrite(&mut self, events: &[ExternalEvent], time: Time) -> OdeResult<()> {
        for event in events {
            let id = self
                .vars
                .find(&event.port)
                .ok_or_else(|| OdeError::UnknownVariable {
                    name: event.port.clone(),
                })?;
            self.vars[id].value = event.payload.value();
            trace!(time, variable = %event.port, value = self.vars[id].value, "external update");
        }
        Ok(())
    }
}

impl<M, E> TimeSlicing<M, E> {
    /// Time of the next scheduled compute, `INFINITY` before initialisation
    /// has placed the model on its step grid.
    pub fn next_compute_time(&self) -> Time {
        match self.state {
            TimeSlicingState::Init => INFINITY,
            _ => self.nct,
        }
    }
}
