//! QSS2 DEVS scheduler.
//!
//! Two states:
//!
//! - `Init`: time advance 0, broadcasts every variable, then computes the
//!   first crossing time of each variable.
//! - `IntegrationTime`: sleeps until the next quantization event, broadcasts
//!   only the variable being quantized, re-estimates all derivatives.
//!
//! External events overwrite the full Taylor state of the named variables
//! and force a re-selection of the next variable to quantize.

use tracing::{debug, trace, warn};
use vle_core::{
    Conditions, ExternalEvent, INFINITY, ModelContext, ObservationEvent, Payload, Time, VariableId,
};

use crate::equation::Equation;
use crate::error::{OdeError, OdeResult};
use crate::quantizer::VarImprovers;
use crate::variables::Variables;

/// Scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qss2State {
    Init,
    IntegrationTime,
}

impl Qss2State {
    pub fn label(self) -> &'static str {
        match self {
            Qss2State::Init => "INIT",
            Qss2State::IntegrationTime => "INTEGRATION_TIME",
        }
    }
}

/// QSS2 driver for an equation `E`.
#[derive(Debug)]
pub struct Qss2<E> {
    equation: E,
    vars: Variables,
    quanta: Vec<f64>,
    improvers: VarImprovers,
    state: Qss2State,
    /// Last wake-up time: the Taylor coefficients are expressed from here.
    lwut: Time,
    min_sigma: Time,
    quantized: Option<VariableId>,
    /// Variables overwritten by the external batch being processed.
    external: Vec<VariableId>,
}

impl<E: Equation> Qss2<E> {
    pub fn new(equation: E, vars: Variables, conditions: &Conditions) -> OdeResult<Self> {
        let quanta = VarImprovers::quanta(&vars, conditions)?;
        Ok(Self {
            equation,
            vars,
            quanta,
            improvers: VarImprovers::default(),
            state: Qss2State::Init,
            lwut: 0.0,
            min_sigma: INFINITY,
            quantized: None,
            external: Vec::new(),
        })
    }

    pub fn state(&self) -> Qss2State {
        self.state
    }

    /// Scratch store of the gradient estimator: after any transition it holds
    /// the perturbed `z + mz dt` sample, not the model state. Read the state
    /// through [`Qss2::observation`] or [`Qss2::improvers`].
    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn equation(&self) -> &E {
        &self.equation
    }

    pub fn improvers(&self) -> &VarImprovers {
        &self.improvers
    }

    /// Variable that fires at the next internal transition.
    pub fn quantized_variable(&self) -> Option<VariableId> {
        self.quantized
    }

    pub fn init(&mut self, time: Time) -> OdeResult<Time> {
        self.improvers = VarImprovers::seed(&self.vars, &self.quanta);
        if !self.improvers.is_empty() && self.improvers.all_quanta_zero() {
            warn!(
                "every quantum is zero: no quantization event will ever fire, \
                 set quantum_<variable> for at least one variable"
            );
        }
        self.quantized = None;
        self.external.clear();
        self.state = Qss2State::Init;
        self.lwut = time;
        self.improvers
            .numerical_gradient_derivative(&mut self.equation, &mut self.vars, time, 0.0)?;
        debug!(variables = self.vars.len(), "qss2 initialised");
        Ok(self.time_advance())
    }

    pub fn time_advance(&self) -> Time {
        match self.state {
            Qss2State::Init => 0.0,
            Qss2State::IntegrationTime => self.min_sigma,
        }
    }

    pub fn output(&self, context: &ModelContext, _time: Time, output: &mut Vec<ExternalEvent>) {
        match self.state {
            Qss2State::Init => {
                for ((id, var), imp) in self.vars.entries().zip(self.improvers.iter()) {
                    if context.exist_output_port(var.name()) {
                        trace!(variable = %id, "initial broadcast");
                        output.push(ExternalEvent::new(var.name(), imp.broadcast()));
                    }
                }
            }
            Qss2State::IntegrationTime => {
                if let Some(id) = self.quantized {
                    let name = self.vars[id].name();
                    if context.exist_output_port(name) {
                        output.push(ExternalEvent::new(name, self.improvers[id].broadcast()));
                    }
                }
            }
        }
    }

    pub fn internal_transition(&mut self, time: Time) -> OdeResult<()> {
        match self.state {
            Qss2State::Init => {
                self.improvers.numerical_gradient_derivative(
                    &mut self.equation,
                    &mut self.vars,
                    time,
                    0.0,
                )?;
                self.improvers.quantizer_delta_ext(0.0, None, &[]);
                self.select_next(time);
                self.state = Qss2State::IntegrationTime;
            }
            Qss2State::IntegrationTime => {
                let id = self.quantized.ok_or(OdeError::Protocol {
                    state: self.state.label(),
                    what: "internal transition without a quantized variable",
                })?;
                let e = time - self.lwut;
                self.improvers.quantizer_delta_int(id);
                self.improvers.static_functions_delta_ext(
                    &mut self.equation,
                    &mut self.vars,
                    time,
                    e,
                    Some(id),
                    &[],
                )?;
                self.improvers.quantizer_delta_ext(e, Some(id), &[]);
                self.select_next(time);
            }
        }
        Ok(())
    }

    pub fn external_transition(&mut self, events: &[ExternalEvent], time: Time) -> OdeResult<()> {
        if self.state != Qss2State::IntegrationTime {
            return Err(OdeError::Protocol {
                state: self.state.label(),
                what: "external transition",
            });
        }
        let e = time - self.lwut;
        self.quantized = None;
        self.external.clear();
        for event in events {
            let id = self
                .vars
                .find(&event.port)
                .ok_or_else(|| OdeError::UnknownVariable {
                    name: event.port.clone(),
                })?;
            self.improvers[id].reset(event.payload.value(), event.payload.gradient());
            if !self.external.contains(&id) {
                self.external.push(id);
            }
            trace!(time, variable = %event.port, value = event.payload.value(), "external update");
        }
        self.improvers.static_functions_delta_ext(
            &mut self.equation,
            &mut self.vars,
            time,
            e,
            None,
            &self.external,
        )?;
        self.improvers.quantizer_delta_ext(e, None, &self.external);
        self.external.clear();
        self.select_next(time);
        Ok(())
    }

    /// The pending quantization event fires first, then the inbound batch is
    /// applied at the same instant.
    pub fn confluent_transitions(&mut self, time: Time, events: &[ExternalEvent]) -> OdeResult<()> {
        self.internal_transition(time)?;
        self.external_transition(events, time)
    }

    /// Exact-curve extrapolation of the named variable at the requested time.
    pub fn observation(&self, event: &ObservationEvent) -> Option<Payload> {
        let id = self.vars.find(&event.port)?;
        if self.improvers.is_empty() {
            return Some(Payload::Scalar(self.vars[id].value));
        }
        let e = event.time - self.lwut;
        Some(Payload::Scalar(self.improvers[id].extrapolate(e)))
    }

    fn select_next(&mut self, time: Time) {
        match self.improvers.min_sigma() {
            Some((id, sig)) => {
                self.quantized = Some(id);
                self.min_sigma = sig;
            }
            None => {
                self.quantized = None;
                self.min_sigma = INFINITY;
            }
        }
        self.lwut = time;
        trace!(time, quantized = ?self.quantized, sigma = self.min_sigma, "next quantization");
    }
}
