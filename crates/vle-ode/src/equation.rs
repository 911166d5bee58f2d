//! The differential equation facade.
//!
//! A model supplies its variables and an [`Equation`] filling gradients; the
//! facade picks the integration scheme from the `method` condition and
//! exposes the whole thing as a DEVS atomic model.

use std::fmt;
use std::str::FromStr;

use vle_core::{
    Conditions, DevsResult, Dynamics, ExternalEvent, ModelContext, ObservationEvent, Payload, Time,
};

use crate::error::{OdeError, OdeResult};
use crate::integrator::{ForwardEuler, RK4};
use crate::qss2::Qss2;
use crate::time_slicing::{TimeSlicing, TimeSlicingOptions};
use crate::variables::Variables;

/// Right-hand side of the system: fills every variable's `gradient` from the
/// current values at `time`.
pub trait Equation {
    fn compute(&mut self, vars: &mut Variables, time: Time) -> OdeResult<()>;
}

impl<F> Equation for F
where
    F: FnMut(&mut Variables, Time) -> OdeResult<()>,
{
    fn compute(&mut self, vars: &mut Variables, time: Time) -> OdeResult<()> {
        self(vars, time)
    }
}

/// Integration scheme selected by the `method` condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Euler,
    Rk4,
    Qss2,
}

impl Method {
    pub const KEY: &'static str = "method";

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Euler => "euler",
            Method::Rk4 => "rk4",
            Method::Qss2 => "qss2",
        }
    }

    /// Read `method` from the conditions, `euler` when absent.
    pub fn from_conditions(conditions: &Conditions) -> OdeResult<Self> {
        match conditions.get(Self::KEY) {
            None => Ok(Method::default()),
            Some(_) => conditions.get_string(Self::KEY)?.parse(),
        }
    }
}

impl FromStr for Method {
    type Err = OdeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "euler" => Ok(Method::Euler),
            "rk4" => Ok(Method::Rk4),
            "qss2" => Ok(Method::Qss2),
            other => Err(OdeError::InvalidMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Engine<E> {
    Euler(TimeSlicing<ForwardEuler, E>),
    Rk4(TimeSlicing<RK4, E>),
    Qss2(Qss2<E>),
}

/// Forward a call to whichever scheduler backs the model.
macro_rules! dispatch {
    ($engine:expr, $s:ident => $body:expr) => {
        match $engine {
            Engine::Euler($s) => $body,
            Engine::Rk4($s) => $body,
            Engine::Qss2($s) => $body,
        }
    };
}

/// An atomic model integrating an ODE system with the configured method.
pub struct DifferentialEquation<E> {
    context: ModelContext,
    engine: Engine<E>,
}

impl<E: Equation> DifferentialEquation<E> {
    /// Build the model. `vars` holds every variable already registered (see
    /// [`crate::Var::init`]); `conditions` selects the method and its options.
    pub fn new(
        context: ModelContext,
        conditions: &Conditions,
        vars: Variables,
        equation: E,
    ) -> OdeResult<Self> {
        let engine = match Method::from_conditions(conditions)? {
            Method::Euler => Engine::Euler(TimeSlicing::new(
                ForwardEuler,
                equation,
                vars,
                TimeSlicingOptions::from_conditions(conditions)?,
            )),
            Method::Rk4 => Engine::Rk4(TimeSlicing::new(
                RK4::new(),
                equation,
                vars,
                TimeSlicingOptions::from_conditions(conditions)?,
            )),
            Method::Qss2 => Engine::Qss2(Qss2::new(equation, vars, conditions)?),
        };
        Ok(Self { context, engine })
    }

    pub fn variables(&self) -> &Variables {
        dispatch!(&self.engine, s => s.variables())
    }

    pub fn equation(&self) -> &E {
        dispatch!(&self.engine, s => s.equation())
    }

    fn lift<T>(&self, result: OdeResult<T>) -> DevsResult<T> {
        result.map_err(|e| e.into_devs(self.context.name()))
    }
}

impl<E> DifferentialEquation<E> {
    pub fn method(&self) -> Method {
        match self.engine {
            Engine::Euler(_) => Method::Euler,
            Engine::Rk4(_) => Method::Rk4,
            Engine::Qss2(_) => Method::Qss2,
        }
    }
}

impl<E> fmt::Debug for DifferentialEquation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DifferentialEquation")
            .field("name", &self.context.name())
            .field("method", &self.method())
            .finish_non_exhaustive()
    }
}

impl<E: Equation> Dynamics for DifferentialEquation<E> {
    fn context(&self) -> &ModelContext {
        &self.context
    }

    fn init(&mut self, time: Time) -> DevsResult<Time> {
        let result = match &mut self.engine {
            Engine::Euler(s) => Ok(s.init(time)),
            Engine::Rk4(s) => Ok(s.init(time)),
            Engine::Qss2(s) => s.init(time),
        };
        self.lift(result)
    }

    fn output(&self, time: Time, output: &mut Vec<ExternalEvent>) -> DevsResult<()> {
        let context = &self.context;
        dispatch!(&self.engine, s => s.output(context, time, output));
        Ok(())
    }

    fn time_advance(&self) -> Time {
        dispatch!(&self.engine, s => s.time_advance())
    }

    fn internal_transition(&mut self, time: Time) -> DevsResult<()> {
        let result = dispatch!(&mut self.engine, s => s.internal_transition(time));
        self.lift(result)
    }

    fn external_transition(&mut self, events: &[ExternalEvent], time: Time) -> DevsResult<()> {
        let result = dispatch!(&mut self.engine, s => s.external_transition(events, time));
        self.lift(result)
    }

    fn confluent_transitions(&mut self, time: Time, events: &[ExternalEvent]) -> DevsResult<()> {
        let result = dispatch!(&mut self.engine, s => s.confluent_transitions(time, events));
        self.lift(result)
    }

    fn observation(&self, event: &ObservationEvent) -> Option<Payload> {
        dispatch!(&self.engine, s => s.observation(event))
    }
}
