//! Integration test: predator-prey system, combined and decomposed.
//!
//! - Euler with `time_step = 0.01` reproduces the reference trajectory
//! - Splitting the system into two coupled single-variable models gives
//!   bit-identical Euler results
//! - QSS2 converges to the same solution

use vle_core::Conditions;
use vle_sim::{CoupledBuilder, ObservationTable, SimOptions, View, catalog, run_sim};

fn conditions(method: &str) -> Conditions {
    Conditions::new()
        .with("a", 0.15)
        .with("b", 0.1)
        .with("d", 0.3)
        .with("e", 0.1)
        .with("init_value_X", 10.0)
        .with("init_value_Y", 5.0)
        .with("method", method)
        .with("time_step", 0.01)
        .with("quantum_X", 1e-4)
        .with("quantum_Y", 1e-4)
}

fn combined(method: &str, duration: f64, timestep: f64) -> ObservationTable {
    let mut b = CoupledBuilder::new();
    b.add_model(catalog::create("lotka_volterra", "lv", &conditions(method)).unwrap())
        .unwrap();
    let view = View::new("view", timestep)
        .unwrap()
        .observe("lv", "X")
        .observe("lv", "Y");
    let opts = SimOptions {
        duration,
        ..SimOptions::default()
    };
    run_sim(b.build().unwrap(), vec![view], &opts)
        .unwrap()
        .remove(0)
}

fn decomposed(method: &str, duration: f64, timestep: f64) -> ObservationTable {
    let mut b = CoupledBuilder::new();
    b.add_model(catalog::create("lotka_volterra_x", "lvx", &conditions(method)).unwrap())
        .unwrap();
    b.add_model(catalog::create("lotka_volterra_y", "lvy", &conditions(method)).unwrap())
        .unwrap();
    b.connect("lvx", "X", "lvy", "X").unwrap();
    b.connect("lvy", "Y", "lvx", "Y").unwrap();
    let view = View::new("view", timestep)
        .unwrap()
        .observe("lvx", "X")
        .observe("lvy", "Y");
    let opts = SimOptions {
        duration,
        ..SimOptions::default()
    };
    run_sim(b.build().unwrap(), vec![view], &opts)
        .unwrap()
        .remove(0)
}

fn assert_rel(got: f64, want: f64, tol: f64) {
    assert!(
        ((got - want) / want).abs() < tol,
        "got {got}, want {want} (relative tolerance {tol})"
    );
}

#[test]
fn euler_reproduces_reference_rows() {
    let table = combined("euler", 150.0, 0.01);
    assert!(table.len() >= 15_000);

    assert_eq!(table.get(0, "lv:X"), Some(10.0));
    assert_eq!(table.get(0, "lv:Y"), Some(5.0));

    // row 10 and row 15000 of the reference output (time 0.09 and 149.99)
    assert!((table.time[9] - 0.09).abs() < 1e-12);
    assert_rel(table.get(9, "lv:X").unwrap(), 9.677077, 1e-4);
    assert_rel(table.get(9, "lv:Y").unwrap(), 5.317209, 1e-4);

    assert!((table.time[14_999] - 149.99).abs() < 1e-6);
    assert_rel(table.get(14_999, "lv:X").unwrap(), 0.5528446, 1e-4);
    assert_rel(table.get(14_999, "lv:Y").unwrap(), 0.09330513, 1e-4);
}

#[test]
fn euler_decomposition_is_bit_identical() {
    let whole = combined("euler", 50.0, 0.01);
    let split = decomposed("euler", 50.0, 0.01);

    assert_eq!(whole.time, split.time);
    assert_eq!(whole.column("lv:X"), split.column("lvx:X"));
    assert_eq!(whole.column("lv:Y"), split.column("lvy:Y"));
}

#[test]
fn qss2_converges_to_the_reference_solution() {
    let table = combined("qss2", 10.0, 0.5);
    let last = table.len() - 1;
    assert!((table.time[last] - 10.0).abs() < 1e-12);

    // fine-step RK4 solution at t = 10
    assert_rel(table.get(last, "lv:X").unwrap(), 0.2185389, 1e-2);
    assert_rel(table.get(last, "lv:Y").unwrap(), 1.3765927, 1e-2);
}

#[test]
fn qss2_decomposition_stays_close() {
    let whole = combined("qss2", 10.0, 0.5);
    let split = decomposed("qss2", 10.0, 0.5);

    assert_eq!(whole.time, split.time);
    for row in 0..whole.len() {
        assert_rel(
            split.get(row, "lvx:X").unwrap(),
            whole.get(row, "lv:X").unwrap(),
            1e-2,
        );
        assert_rel(
            split.get(row, "lvy:Y").unwrap(),
            whole.get(row, "lv:Y").unwrap(),
            1e-2,
        );
    }
}

#[test]
fn rk4_is_closer_than_euler() {
    let euler = combined("euler", 10.0, 0.5);
    let rk4 = combined("rk4", 10.0, 0.5);
    let last = euler.len() - 1;
    let x_ref = 0.2185389;
    let euler_err = (euler.get(last, "lv:X").unwrap() - x_ref).abs();
    let rk4_err = (rk4.get(last, "lv:X").unwrap() - x_ref).abs();
    assert!(rk4_err < 1e-5, "rk4 error {rk4_err}");
    assert!(rk4_err < euler_err);
}
