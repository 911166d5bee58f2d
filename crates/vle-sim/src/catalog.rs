//! Built-in dynamics, constructible by name from conditions.

use vle_core::{
    Conditions, DevsError, DevsResult, Dynamics, ExternalEvent, INFINITY, ModelContext,
    ObservationEvent, Payload, Time,
};
use vle_ode::{DifferentialEquation, Equation, OdeResult, Var, Variables};

use crate::error::{SimError, SimResult};

/// Names and one-line descriptions of the built-in dynamics.
pub const CATALOG: &[(&str, &str)] = &[
    ("lotka_volterra", "predator-prey system, variables X and Y"),
    (
        "lotka_volterra_x",
        "prey half of the predator-prey system, Y received on its input port",
    ),
    (
        "lotka_volterra_y",
        "predator half of the predator-prey system, X received on its input port",
    ),
    ("seir", "epidemic model, variables S, E, I and R"),
    (
        "perturbation",
        "emits `values` on `port` at the given `times`",
    ),
];

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

pub fn contains(dynamics: &str) -> bool {
    names().any(|n| n == dynamics)
}

/// Instantiate the dynamics `dynamics` as a model called `name`.
pub fn create(dynamics: &str, name: &str, conditions: &Conditions) -> SimResult<Box<dyn Dynamics>> {
    let ode = |e| SimError::ode(name, e);
    let model: Box<dyn Dynamics> = match dynamics {
        "lotka_volterra" => Box::new(lotka_volterra(name, conditions).map_err(ode)?),
        "lotka_volterra_x" => Box::new(lotka_volterra_x(name, conditions).map_err(ode)?),
        "lotka_volterra_y" => Box::new(lotka_volterra_y(name, conditions).map_err(ode)?),
        "seir" => Box::new(seir(name, conditions).map_err(ode)?),
        "perturbation" => Box::new(
            Perturbation::new(name, conditions).map_err(|e| SimError::model(name, e))?,
        ),
        other => {
            return Err(SimError::UnknownDynamics {
                name: other.to_string(),
            });
        }
    };
    Ok(model)
}

/// Predator-prey rates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LotkaVolterraParams {
    pub a: f64,
    pub b: f64,
    pub d: f64,
    pub e: f64,
}

impl LotkaVolterraParams {
    pub fn from_conditions(conditions: &Conditions) -> OdeResult<Self> {
        Ok(Self {
            a: conditions.get_double("a")?,
            b: conditions.get_double("b")?,
            d: conditions.get_double("d")?,
            e: conditions.get_double("e")?,
        })
    }

    /// dX/dt. The decomposed models evaluate the exact same expression.
    pub fn prey(&self, x: f64, y: f64) -> f64 {
        self.a * x - self.b * x * y
    }

    /// dY/dt.
    pub fn predator(&self, x: f64, y: f64) -> f64 {
        -self.d * y + self.e * x * y
    }
}

/// Which gradients a predator-prey equation fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LotkaVolterraPart {
    Both,
    Prey,
    Predator,
}

#[derive(Clone, Debug)]
pub struct LotkaVolterra {
    params: LotkaVolterraParams,
    part: LotkaVolterraPart,
    x: Var,
    y: Var,
}

impl Equation for LotkaVolterra {
    fn compute(&mut self, vars: &mut Variables, _time: Time) -> OdeResult<()> {
        let (x, y) = (vars[self.x].value, vars[self.y].value);
        if self.part != LotkaVolterraPart::Predator {
            vars[self.x].gradient = self.params.prey(x, y);
        }
        if self.part != LotkaVolterraPart::Prey {
            vars[self.y].gradient = self.params.predator(x, y);
        }
        Ok(())
    }
}

fn lotka_volterra_part(
    context: ModelContext,
    conditions: &Conditions,
    part: LotkaVolterraPart,
) -> OdeResult<DifferentialEquation<LotkaVolterra>> {
    let params = LotkaVolterraParams::from_conditions(conditions)?;
    let mut vars = Variables::new();
    let x = Var::init(&mut vars, "X", conditions)?;
    let y = Var::init(&mut vars, "Y", conditions)?;
    let equation = LotkaVolterra {
        params,
        part,
        x,
        y,
    };
    DifferentialEquation::new(context, conditions, vars, equation)
}

pub fn lotka_volterra(
    name: &str,
    conditions: &Conditions,
) -> OdeResult<DifferentialEquation<LotkaVolterra>> {
    let context = ModelContext::new(name).with_port("X").with_port("Y");
    lotka_volterra_part(context, conditions, LotkaVolterraPart::Both)
}

/// Prey only: Y is a copy of the partner model's variable.
pub fn lotka_volterra_x(
    name: &str,
    conditions: &Conditions,
) -> OdeResult<DifferentialEquation<LotkaVolterra>> {
    let context = ModelContext::new(name).with_port("X").with_input_port("Y");
    lotka_volterra_part(context, conditions, LotkaVolterraPart::Prey)
}

/// Predator only: X is a copy of the partner model's variable.
pub fn lotka_volterra_y(
    name: &str,
    conditions: &Conditions,
) -> OdeResult<DifferentialEquation<LotkaVolterra>> {
    let context = ModelContext::new(name).with_port("Y").with_input_port("X");
    lotka_volterra_part(context, conditions, LotkaVolterraPart::Predator)
}

/// Susceptible, exposed, infectious, recovered, with optional renewal `nu`.
#[derive(Clone, Debug)]
pub struct Seir {
    beta: f64,
    gamma: f64,
    sigma: f64,
    nu: f64,
    s: Var,
    e: Var,
    i: Var,
    r: Var,
}

impl Equation for Seir {
    fn compute(&mut self, vars: &mut Variables, _time: Time) -> OdeResult<()> {
        let (s, e, i, r) = (
            vars[self.s].value,
            vars[self.e].value,
            vars[self.i].value,
            vars[self.r].value,
        );
        let infection = self.beta * s * i;
        vars[self.s].gradient = self.nu - infection - self.nu * s;
        vars[self.e].gradient = infection - (self.sigma + self.nu) * e;
        vars[self.i].gradient = self.sigma * e - (self.gamma + self.nu) * i;
        vars[self.r].gradient = self.gamma * i - self.nu * r;
        Ok(())
    }
}

pub fn seir(name: &str, conditions: &Conditions) -> OdeResult<DifferentialEquation<Seir>> {
    let mut vars = Variables::new();
    let s = Var::init(&mut vars, "S", conditions)?;
    let e = Var::init(&mut vars, "E", conditions)?;
    let i = Var::init(&mut vars, "I", conditions)?;
    let r = Var::init(&mut vars, "R", conditions)?;
    let equation = Seir {
        beta: conditions.get_double("beta")?,
        gamma: conditions.get_double("gamma")?,
        sigma: conditions.get_double("sigma")?,
        nu: conditions.get_double_or("nu", 0.0)?,
        s,
        e,
        i,
        r,
    };
    let context = ModelContext::new(name)
        .with_port("S")
        .with_port("E")
        .with_port("I")
        .with_port("R");
    DifferentialEquation::new(context, conditions, vars, equation)
}

/// Emits scheduled values on one output port.
///
/// Conditions: `port` (default `out`), `times` and `values` (same length,
/// times non-decreasing).
#[derive(Clone, Debug)]
pub struct Perturbation {
    context: ModelContext,
    port: String,
    times: Vec<Time>,
    values: Vec<f64>,
    next: usize,
    sigma: Time,
    last: Option<f64>,
}

impl Perturbation {
    pub fn new(name: &str, conditions: &Conditions) -> DevsResult<Self> {
        let port = conditions.get_string_or("port", "out")?.to_string();
        let times = conditions.get_double_list("times")?;
        let values = conditions.get_double_list("values")?;
        if times.len() != values.len() {
            return Err(DevsError::InvalidArg {
                what: "times and values must have the same length",
            });
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] < w[0]) {
            return Err(DevsError::InvalidArg {
                what: "times must be finite and non-decreasing",
            });
        }
        Ok(Self {
            context: ModelContext::new(name).with_output_port(port.as_str()),
            port,
            times,
            values,
            next: 0,
            sigma: INFINITY,
            last: None,
        })
    }

    fn schedule(&mut self, time: Time) {
        self.sigma = match self.times.get(self.next) {
            Some(&at) => (at - time).max(0.0),
            None => INFINITY,
        };
    }
}

impl Dynamics for Perturbation {
    fn context(&self) -> &ModelContext {
        &self.context
    }

    fn init(&mut self, time: Time) -> DevsResult<Time> {
        self.next = self.times.partition_point(|&t| t < time);
        self.last = None;
        self.schedule(time);
        Ok(self.sigma)
    }

    fn output(&self, _time: Time, output: &mut Vec<ExternalEvent>) -> DevsResult<()> {
        if let Some(&value) = self.values.get(self.next) {
            output.push(ExternalEvent::new(self.port.as_str(), value));
        }
        Ok(())
    }

    fn time_advance(&self) -> Time {
        self.sigma
    }

    fn internal_transition(&mut self, time: Time) -> DevsResult<()> {
        self.last = self.values.get(self.next).copied();
        self.next += 1;
        self.schedule(time);
        Ok(())
    }

    fn external_transition(&mut self, _events: &[ExternalEvent], _time: Time) -> DevsResult<()> {
        Ok(())
    }

    fn observation(&self, event: &ObservationEvent) -> Option<Payload> {
        (event.port == self.port)
            .then_some(self.last)
            .flatten()
            .map(Payload::Scalar)
    }
}
