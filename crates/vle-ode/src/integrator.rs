//! Fixed-step time integrators.
//!
//! An integrator advances every variable of the store over `[tin, tout]`
//! using only the store and the equation's `compute` callback. A zero-width
//! interval is a no-op: `compute` is not called and no value changes.

use vle_core::Time;

use crate::equation::Equation;
use crate::error::OdeResult;
use crate::variables::Variables;

/// Trait for time integrators.
pub trait Integrator {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Advance all variables from `tin` to `tout` (`tin <= tout`).
    fn update_vars<E: Equation + ?Sized>(
        &mut self,
        equation: &mut E,
        vars: &mut Variables,
        tin: Time,
        tout: Time,
    ) -> OdeResult<()>;
}

/// Forward Euler (explicit, 1st order).
/// Calls compute() once per step, at the start of the interval.
#[derive(Clone, Debug, Default)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn name(&self) -> &'static str {
        "euler"
    }

    fn update_vars<E: Equation + ?Sized>(
        &mut self,
        equation: &mut E,
        vars: &mut Variables,
        tin: Time,
        tout: Time,
    ) -> OdeResult<()> {
        if tin == tout {
            return Ok(());
        }
        equation.compute(vars, tin)?;
        let h = tout - tin;
        for var in vars.iter_mut() {
            var.value += var.gradient * h;
        }
        Ok(())
    }
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
///
/// Keeps two per-variable buffers (start values and the `k1 + 2k2 + 2k3 + k4`
/// accumulator) that are reused between steps; nothing else survives a call.
#[derive(Clone, Debug, Default)]
pub struct RK4 {
    start: Vec<f64>,
    acc: Vec<f64>,
}

impl RK4 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Integrator for RK4 {
    fn name(&self) -> &'static str {
        "rk4"
    }

    fn update_vars<E: Equation + ?Sized>(
        &mut self,
        equation: &mut E,
        vars: &mut Variables,
        tin: Time,
        tout: Time,
    ) -> OdeResult<()> {
        if tin == tout {
            return Ok(());
        }
        let h = tout - tin;
        let half = tin + 0.5 * h;

        self.start.clear();
        self.start.extend(vars.iter().map(|v| v.value));
        self.acc.clear();
        self.acc.resize(vars.len(), 0.0);

        // k1 at tin, predict the midpoint
        equation.compute(vars, tin)?;
        for ((var, y0), acc) in vars.iter_mut().zip(&self.start).zip(&mut self.acc) {
            *acc = var.gradient;
            var.value = y0 + 0.5 * h * var.gradient;
        }

        // k2 at the midpoint
        equation.compute(vars, half)?;
        for ((var, y0), acc) in vars.iter_mut().zip(&self.start).zip(&mut self.acc) {
            *acc += 2.0 * var.gradient;
            var.value = y0 + 0.5 * h * var.gradient;
        }

        // k3 at the midpoint, predict the endpoint
        equation.compute(vars, half)?;
        for ((var, y0), acc) in vars.iter_mut().zip(&self.start).zip(&mut self.acc) {
            *acc += 2.0 * var.gradient;
            var.value = y0 + h * var.gradient;
        }

        // k4 at tout, combine: y = y0 + (h/6) * (k1 + 2*k2 + 2*k3 + k4)
        equation.compute(vars, tout)?;
        for ((var, y0), acc) in vars.iter_mut().zip(&self.start).zip(&mut self.acc) {
            *acc += var.gradient;
            var.value = y0 + h * *acc / 6.0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Var;
    use proptest::prelude::*;
    use vle_core::{Conditions, VariableId};

    /// dy/dt = k, counting compute calls.
    struct Constant {
        y: VariableId,
        k: f64,
        calls: usize,
    }

    impl Equation for Constant {
        fn compute(&mut self, vars: &mut Variables, _t: Time) -> OdeResult<()> {
            self.calls += 1;
            vars[self.y].gradient = self.k;
            Ok(())
        }
    }

    /// dy/dt = t, exact solution y0 + t^2/2.
    struct Ramp {
        y: Var,
    }

    impl Equation for Ramp {
        fn compute(&mut self, vars: &mut Variables, t: Time) -> OdeResult<()> {
            vars[self.y].gradient = t;
            Ok(())
        }
    }

    fn constant(value: f64, k: f64) -> (Constant, Variables) {
        let mut vars = Variables::new();
        let y = vars.add_var("y").unwrap();
        vars[y].value = value;
        (Constant { y, k, calls: 0 }, vars)
    }

    fn ramp() -> (Ramp, Variables) {
        let mut vars = Variables::new();
        let y = Var::init(&mut vars, "y", &Conditions::new()).unwrap();
        (Ramp { y }, vars)
    }

    fn integrate<I: Integrator>(method: &mut I, h: f64, t_end: f64) -> f64 {
        let (mut eq, mut vars) = ramp();
        let steps = (t_end / h).round() as usize;
        for n in 0..steps {
            let tin = n as f64 * h;
            method.update_vars(&mut eq, &mut vars, tin, tin + h).unwrap();
        }
        vars[eq.y].value
    }

    #[test]
    fn zero_width_interval_is_noop() {
        let (mut eq, mut vars) = constant(2.0, 3.0);
        ForwardEuler.update_vars(&mut eq, &mut vars, 1.0, 1.0).unwrap();
        RK4::new().update_vars(&mut eq, &mut vars, 1.0, 1.0).unwrap();
        assert_eq!(eq.calls, 0);
        assert_eq!(vars[eq.y].value, 2.0);
    }

    #[test]
    fn euler_single_step_constant_gradient() {
        let (mut eq, mut vars) = constant(1.0, 2.5);
        ForwardEuler.update_vars(&mut eq, &mut vars, 0.5, 0.9).unwrap();
        assert_eq!(eq.calls, 1);
        assert!((vars[eq.y].value - (1.0 + 2.5 * 0.4)).abs() < 1e-12);
    }

    #[test]
    fn rk4_calls_compute_four_times() {
        let (mut eq, mut vars) = constant(0.0, 1.0);
        RK4::new().update_vars(&mut eq, &mut vars, 0.0, 0.1).unwrap();
        assert_eq!(eq.calls, 4);
        assert!((vars[eq.y].value - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rk4_is_exact_on_polynomial_ode() {
        for h in [1.0, 0.5, 0.1] {
            let y = integrate(&mut RK4::new(), h, 2.0);
            assert!((y - 2.0).abs() < 1e-12, "h={h}: y={y}");
        }
    }

    #[test]
    fn euler_error_is_first_order() {
        // Forward Euler on dy/dt = t over [0, 2] errs by exactly h.
        let coarse = 2.0 - integrate(&mut ForwardEuler, 0.2, 2.0);
        let fine = 2.0 - integrate(&mut ForwardEuler, 0.1, 2.0);
        assert!((coarse - 0.2).abs() < 1e-9);
        assert!((fine - 0.1).abs() < 1e-9);
        assert!((coarse / fine - 2.0).abs() < 1e-6);
    }

    #[test]
    fn rk4_restores_positional_accumulators_for_several_variables() {
        // dx/dt = 1, dy/dt = -2: both must land on their own line.
        struct Two(VariableId, VariableId);
        impl Equation for Two {
            fn compute(&mut self, vars: &mut Variables, _t: Time) -> OdeResult<()> {
                vars[self.0].gradient = 1.0;
                vars[self.1].gradient = -2.0;
                Ok(())
            }
        }
        let mut vars = Variables::new();
        let x = vars.add_var("x").unwrap();
        let y = vars.add_var("y").unwrap();
        vars[y].value = 5.0;
        let mut eq = Two(x, y);
        RK4::new().update_vars(&mut eq, &mut vars, 0.0, 0.5).unwrap();
        assert!((vars[x].value - 0.5).abs() < 1e-12);
        assert!((vars[y].value - 4.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn euler_matches_linear_solution(
            y0 in -1e3_f64..1e3,
            k in -1e2_f64..1e2,
            tin in 0.0_f64..1e2,
            h in 1e-6_f64..10.0,
        ) {
            let (mut eq, mut vars) = constant(y0, k);
            ForwardEuler.update_vars(&mut eq, &mut vars, tin, tin + h).unwrap();
            let expected = y0 + k * ((tin + h) - tin);
            prop_assert!((vars[eq.y].value - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
        }
    }
}
