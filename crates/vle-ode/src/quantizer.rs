//! Quantization engine for the QSS2 integrator.
//!
//! Every variable carries a `VarImprover` holding second-order Taylor
//! coefficients of three curves:
//!
//! - `x`: the exact trajectory (`x0 + x1 t + x2 t^2 / 2`)
//! - `q`: the quantized trajectory (`q0 + q1 t`), snapped onto `x` at each
//!   quantization event of the variable
//! - `y`: the trajectory broadcast to other models
//!
//! A variable is quantized again when `|x - q|` reaches its quantum `delta_q`.
//! Gradients and their time derivatives are not supplied analytically: they
//! are estimated by evaluating the model's `compute` twice around the shared
//! snapshot `(z, mz)` of every variable.

use std::ops::{Index, IndexMut};

use vle_core::{Conditions, INFINITY, Payload, Time, VariableId};

use crate::equation::Equation;
use crate::error::{OdeError, OdeResult};
use crate::variables::Variables;

/// Smallest non-negative real root of `a t^2 + b t + c = 0`.
///
/// Negative roots are discarded, not clamped. Returns `None` when no
/// non-negative root exists, including the degenerate constant polynomial.
pub fn min_pos_root(a: f64, b: f64, c: f64) -> Option<f64> {
    if a == 0.0 {
        if b == 0.0 {
            return None;
        }
        let root = -c / b;
        return (root >= 0.0).then_some(root);
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sq = discriminant.sqrt();
    let r1 = (-b - sq) / (2.0 * a);
    let r2 = (-b + sq) / (2.0 * a);
    [r1, r2].into_iter().filter(|r| *r >= 0.0).reduce(f64::min)
}

/// Quantization state of one variable.
#[derive(Clone, Debug, PartialEq)]
pub struct VarImprover {
    pub x0: f64,
    pub x1: f64,
    pub x2: f64,
    pub q0: f64,
    pub q1: f64,
    pub y0: f64,
    pub y1: f64,
    pub y2: f64,
    /// Snapshot fed to `compute` by the gradient estimator.
    pub z: f64,
    pub mz: f64,
    /// Quantum; zero disables quantization events for this variable.
    pub delta_q: f64,
    /// Time from the last wake-up to the next quantization event.
    pub sig: Time,
    /// Estimated gradient and gradient derivative.
    pub f0: f64,
    pub f1: f64,
}

impl VarImprover {
    /// Seed every curve from a value and gradient.
    pub fn seed(value: f64, gradient: f64, delta_q: f64) -> Self {
        Self {
            x0: value,
            x1: gradient,
            x2: 0.0,
            q0: value,
            q1: gradient,
            y0: value,
            y1: gradient,
            y2: 0.0,
            z: value,
            mz: gradient,
            delta_q,
            sig: INFINITY,
            f0: gradient,
            f1: 0.0,
        }
    }

    /// Overwrite the whole state with an externally supplied value.
    pub fn reset(&mut self, value: f64, gradient: f64) {
        *self = Self::seed(value, gradient, self.delta_q);
    }

    /// Advance the exact and quantized curves by `e`.
    pub fn advance(&mut self, e: Time) {
        self.x0 += self.x1 * e + self.x2 * e * e / 2.0;
        self.q0 += self.q1 * e;
    }

    /// Take the estimated derivatives and recompute the next crossing.
    pub fn refresh(&mut self) {
        self.x1 = self.f0;
        self.x2 = self.f1;
        self.sig = self.next_crossing();
    }

    /// Time until `|x - q|` reaches `delta_q`, `INFINITY` when it never does
    /// or when quantization is disabled. Zero once the gap already reached
    /// `delta_q`: rounding can push a root that belongs at zero just below it.
    pub fn next_crossing(&self) -> Time {
        if self.delta_q == 0.0 {
            return INFINITY;
        }
        if (self.x0 - self.q0).abs() >= self.delta_q {
            return 0.0;
        }
        let a = -self.x2 / 2.0;
        let b = self.q1 - self.x1;
        let below = min_pos_root(a, b, self.q0 - self.x0 - self.delta_q);
        let above = min_pos_root(a, b, self.q0 - self.x0 + self.delta_q);
        match (below, above) {
            (Some(r1), Some(r2)) => r1.min(r2),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => INFINITY,
        }
    }

    /// Quantization event: move the exact curve by `sig` and snap `q` onto it.
    pub fn delta_int(&mut self) {
        let sig = self.sig;
        self.x0 += self.x1 * sig + self.x2 * sig * sig / 2.0;
        self.x1 += self.x2 * sig;
        self.q0 = self.x0;
        self.q1 = self.x1;
        self.sig = if self.x2 == 0.0 {
            INFINITY
        } else {
            (2.0 * self.delta_q / self.x2).abs().sqrt()
        };
    }

    /// Predict the broadcast curve at the next quantization event.
    pub fn predict(&mut self) {
        if self.sig.is_finite() {
            let sig = self.sig;
            self.y0 = self.x0 + self.x1 * sig + self.x2 * sig * sig / 2.0;
            self.y1 = self.x1 + self.x2 * sig;
        } else {
            self.y0 = self.x0;
            self.y1 = self.x1;
        }
        self.y2 = self.x2;
    }

    /// Exact-curve value `e` after the last wake-up.
    pub fn extrapolate(&self, e: Time) -> f64 {
        self.x0 + self.x1 * e + (self.x2 / 2.0) * e * e
    }

    /// Broadcast payload: value and slope of `y`.
    pub fn broadcast(&self) -> Payload {
        Payload::record(self.y0, self.y1)
    }
}

/// The improvers of all variables, index-aligned with the variable store.
#[derive(Clone, Debug, Default)]
pub struct VarImprovers {
    items: Vec<VarImprover>,
}

impl VarImprovers {
    /// Read `quantum_<name>` for every variable (>= 0, default 0).
    pub fn quanta(vars: &Variables, conditions: &Conditions) -> OdeResult<Vec<f64>> {
        vars.iter()
            .map(|var| {
                let key = format!("quantum_{}", var.name());
                let dq = conditions.get_double_or(&key, 0.0)?;
                if dq < 0.0 || !dq.is_finite() {
                    return Err(OdeError::InvalidOption {
                        key,
                        reason: "quantum must be a non-negative finite number",
                    });
                }
                Ok(dq)
            })
            .collect()
    }

    /// One improver per variable, seeded from the current values.
    pub fn seed(vars: &Variables, quanta: &[f64]) -> Self {
        let items = vars
            .iter()
            .zip(quanta)
            .map(|(var, &dq)| VarImprover::seed(var.value, var.gradient, dq))
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VarImprover> {
        self.items.iter()
    }

    pub fn all_quanta_zero(&self) -> bool {
        self.items.iter().all(|imp| imp.delta_q == 0.0)
    }

    /// Estimate `f0 = f(z)` and `f1 = (f(z + mz dt) - f0) / dt` for every
    /// variable at once, with `dt = max(e / 100, 1e-8)`.
    pub fn numerical_gradient_derivative<E: Equation + ?Sized>(
        &mut self,
        equation: &mut E,
        vars: &mut Variables,
        time: Time,
        e: Time,
    ) -> OdeResult<()> {
        let dt = (e / 100.0).max(1e-8);

        for (var, imp) in vars.iter_mut().zip(&self.items) {
            var.value = imp.z;
            var.gradient = imp.mz;
        }
        equation.compute(vars, time)?;
        for (var, imp) in vars.iter_mut().zip(&mut self.items) {
            imp.f0 = var.gradient;
        }

        for (var, imp) in vars.iter_mut().zip(&self.items) {
            var.value = imp.z + imp.mz * dt;
            var.gradient = imp.mz;
        }
        equation.compute(vars, time)?;
        for (var, imp) in vars.iter_mut().zip(&mut self.items) {
            imp.f1 = (var.gradient - imp.f0) / dt;
        }
        Ok(())
    }

    /// Advance every variable except `quantized` and `external` by `e`, then
    /// refresh derivatives and crossing times of all variables.
    pub fn quantizer_delta_ext(
        &mut self,
        e: Time,
        quantized: Option<VariableId>,
        external: &[VariableId],
    ) {
        for (i, imp) in self.items.iter_mut().enumerate() {
            let id = VariableId::from_index(i as u32);
            if Some(id) != quantized && !external.contains(&id) {
                imp.advance(e);
            }
            imp.refresh();
        }
    }

    /// Quantization event of one variable.
    pub fn quantizer_delta_int(&mut self, id: VariableId) {
        self[id].delta_int();
    }

    /// Refresh the shared snapshot and re-estimate derivatives.
    ///
    /// The quantized variable publishes its broadcast value, externally
    /// updated variables keep the supplied snapshot, every other snapshot
    /// moves along its slope by `e`.
    pub fn static_functions_delta_ext<E: Equation + ?Sized>(
        &mut self,
        equation: &mut E,
        vars: &mut Variables,
        time: Time,
        e: Time,
        quantized: Option<VariableId>,
        external: &[VariableId],
    ) -> OdeResult<()> {
        for (i, imp) in self.items.iter_mut().enumerate() {
            let id = VariableId::from_index(i as u32);
            if Some(id) == quantized {
                imp.z = imp.y0;
                imp.mz = imp.y1;
            } else if !external.contains(&id) {
                imp.z += imp.mz * e;
            }
        }
        self.numerical_gradient_derivative(equation, vars, time, e)
    }

    /// Select the next variable to quantize: the smallest `sig` among
    /// variables with a non-zero quantum, first declared wins ties. When every
    /// quantum is zero the first variable is selected (its `sig` is infinite,
    /// so the model goes passive). Prepares the broadcast prediction of the
    /// selected variable. `None` only for an empty store.
    pub fn min_sigma(&mut self) -> Option<(VariableId, Time)> {
        let mut best: Option<(usize, Time)> = None;
        for (i, imp) in self.items.iter().enumerate() {
            if imp.delta_q == 0.0 {
                continue;
            }
            if best.is_none_or(|(_, sig)| imp.sig < sig) {
                best = Some((i, imp.sig));
            }
        }
        let (i, sig) = match best {
            Some(found) => found,
            None => (0, self.items.first()?.sig),
        };
        self.items[i].predict();
        Some((VariableId::from_index(i as u32), sig))
    }
}

impl Index<VariableId> for VarImprovers {
    type Output = VarImprover;

    fn index(&self, id: VariableId) -> &VarImprover {
        &self.items[id.slot()]
    }
}

impl IndexMut<VariableId> for VarImprovers {
    fn index_mut(&mut self, id: VariableId) -> &mut VarImprover {
        &mut self.items[id.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn min_pos_root_two_positive_roots() {
        // (t - 1)(t - 3) = t^2 - 4t + 3
        assert_eq!(min_pos_root(1.0, -4.0, 3.0), Some(1.0));
        // same polynomial, negated leading coefficient
        assert_eq!(min_pos_root(-1.0, 4.0, -3.0), Some(1.0));
    }

    #[test]
    fn min_pos_root_one_negative_root() {
        // (t + 2)(t - 5) = t^2 - 3t - 10
        assert_eq!(min_pos_root(1.0, -3.0, -10.0), Some(5.0));
    }

    #[test]
    fn min_pos_root_none() {
        // both negative
        assert_eq!(min_pos_root(1.0, 3.0, 2.0), None);
        // negative discriminant
        assert_eq!(min_pos_root(1.0, 0.0, 1.0), None);
        // constant
        assert_eq!(min_pos_root(0.0, 0.0, 1.0), None);
        assert_eq!(min_pos_root(0.0, 0.0, 0.0), None);
    }

    #[test]
    fn min_pos_root_linear() {
        assert_eq!(min_pos_root(0.0, 2.0, -4.0), Some(2.0));
        assert_eq!(min_pos_root(0.0, 2.0, 4.0), None);
        assert_eq!(min_pos_root(0.0, -1.0, 0.0), Some(0.0));
    }

    #[test]
    fn zero_quantum_never_crosses() {
        let imp = VarImprover::seed(1.0, 2.0, 0.0);
        assert_eq!(imp.next_crossing(), INFINITY);
    }

    #[test]
    fn quantization_error_reaches_quantum_at_crossing() {
        // x(t) = t + t^2/4, q(t) = t, delta_q = 0.1
        let mut imp = VarImprover::seed(0.0, 1.0, 0.1);
        imp.f0 = 1.0;
        imp.f1 = 0.5;
        imp.refresh();
        let sig = imp.sig;
        assert!((sig - 0.4_f64.sqrt()).abs() < 1e-12);

        let q_at = |imp: &VarImprover, t: f64| imp.q0 + imp.q1 * t;
        let gap = (imp.extrapolate(sig) - q_at(&imp, sig)).abs();
        assert!((gap - 0.1).abs() < 1e-12);
        for k in 1..10 {
            let t = sig * k as f64 / 10.0;
            assert!((imp.extrapolate(t) - q_at(&imp, t)).abs() < 0.1);
        }

        imp.delta_int();
        assert_eq!(imp.q0, imp.x0);
        assert_eq!(imp.q1, imp.x1);
        assert!((imp.x0 - (sig + sig * sig / 4.0)).abs() < 1e-12);
        assert!((imp.sig - (2.0 * 0.1 / 0.5_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn gap_beyond_the_quantum_crosses_immediately() {
        // the only near-zero root lies in the past
        let mut imp = VarImprover::seed(5.0, 0.0, 1e-3);
        imp.x0 = 5.002;
        imp.x1 = 3.5;
        imp.x2 = -1.75;
        assert_eq!(imp.next_crossing(), 0.0);
    }

    #[test]
    fn delta_int_with_zero_curvature_goes_passive() {
        let mut imp = VarImprover::seed(0.0, 1.0, 0.1);
        imp.sig = 2.0;
        imp.delta_int();
        assert_eq!(imp.x0, 2.0);
        assert_eq!(imp.sig, INFINITY);
    }

    #[test]
    fn predict_handles_infinite_sigma() {
        let mut imp = VarImprover::seed(3.0, 1.0, 0.0);
        imp.predict();
        assert_eq!(imp.broadcast(), Payload::record(3.0, 1.0));
    }

    #[test]
    fn min_sigma_prefers_smallest_and_first_on_ties() {
        let mut vars = Variables::new();
        for name in ["a", "b", "c"] {
            vars.add_var(name).unwrap();
        }
        let mut imps = VarImprovers::seed(&vars, &[0.0, 0.1, 0.1]);
        imps[VariableId::from_index(0)].sig = 0.01;
        imps[VariableId::from_index(1)].sig = 0.5;
        imps[VariableId::from_index(2)].sig = 0.5;
        let (id, sig) = imps.min_sigma().unwrap();
        // "a" has no quantum, ties go to "b"
        assert_eq!(id, VariableId::from_index(1));
        assert_eq!(sig, 0.5);
    }

    #[test]
    fn min_sigma_falls_back_to_first_variable() {
        let mut vars = Variables::new();
        vars.add_var("a").unwrap();
        vars.add_var("b").unwrap();
        let mut imps = VarImprovers::seed(&vars, &[0.0, 0.0]);
        assert!(imps.all_quanta_zero());
        let (id, sig) = imps.min_sigma().unwrap();
        assert_eq!(id, VariableId::from_index(0));
        assert_eq!(sig, INFINITY);

        assert!(VarImprovers::default().min_sigma().is_none());
    }

    #[test]
    fn quanta_from_conditions() {
        let mut vars = Variables::new();
        vars.add_var("X").unwrap();
        vars.add_var("Y").unwrap();
        let conditions = Conditions::new().with("quantum_X", 0.01);
        assert_eq!(
            VarImprovers::quanta(&vars, &conditions).unwrap(),
            vec![0.01, 0.0]
        );
        let bad = Conditions::new().with("quantum_Y", -1.0);
        assert!(matches!(
            VarImprovers::quanta(&vars, &bad),
            Err(OdeError::InvalidOption { key, .. }) if key == "quantum_Y"
        ));
    }

    #[test]
    fn estimator_recovers_linear_dynamics() {
        // dx/dt = -2x around z = 1, mz = -2: f0 = -2, f1 = -2 * mz = 4
        struct Decay(VariableId);
        impl Equation for Decay {
            fn compute(&mut self, vars: &mut Variables, _t: Time) -> OdeResult<()> {
                vars[self.0].gradient = -2.0 * vars[self.0].value;
                Ok(())
            }
        }
        let mut vars = Variables::new();
        let x = vars.add_var("x").unwrap();
        let mut imps = VarImprovers::seed(&vars, &[0.1]);
        imps[x].z = 1.0;
        imps[x].mz = -2.0;
        imps.numerical_gradient_derivative(&mut Decay(x), &mut vars, 0.0, 0.5)
            .unwrap();
        assert!((imps[x].f0 + 2.0).abs() < 1e-12);
        assert!((imps[x].f1 - 4.0).abs() < 1e-6);
    }

    #[test]
    fn estimator_keeps_slope_of_undriven_variable() {
        // compute never writes the gradient of `u`: its slope is the snapshot slope
        let mut vars = Variables::new();
        let u = vars.add_var("u").unwrap();
        let mut imps = VarImprovers::seed(&vars, &[0.0]);
        imps[u].mz = 0.75;
        let mut noop = |_: &mut Variables, _: Time| -> OdeResult<()> { Ok(()) };
        imps.numerical_gradient_derivative(&mut noop, &mut vars, 1.0, 0.0)
            .unwrap();
        assert_eq!(imps[u].f0, 0.75);
        assert_eq!(imps[u].f1, 0.0);
    }

    proptest! {
        #[test]
        fn min_pos_root_finds_smallest_nonnegative_root(
            r1 in -100.0_f64..100.0,
            r2 in -100.0_f64..100.0,
            k in prop_oneof![0.1_f64..10.0, -10.0_f64..-0.1],
        ) {
            prop_assume!((r1 - r2).abs() > 1e-3 && r1.abs() > 1e-3 && r2.abs() > 1e-3);
            let (a, b, c) = (k, -k * (r1 + r2), k * r1 * r2);
            let expected = [r1, r2].into_iter().filter(|r| *r >= 0.0).reduce(f64::min);
            match (min_pos_root(a, b, c), expected) {
                (Some(got), Some(want)) => prop_assert!((got - want).abs() < 1e-6 * (1.0 + want.abs())),
                (None, None) => {}
                (got, want) => prop_assert!(false, "got {:?}, want {:?}", got, want),
            }
        }
    }
}
