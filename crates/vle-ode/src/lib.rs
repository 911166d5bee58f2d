//! Numerical integration of ordinary differential equations inside a
//! discrete-event simulation.
//!
//! Provides:
//! - A variable store with stable, index-based handles
//! - Fixed-step forward Euler and RK4 integrators
//! - A time-slicing DEVS scheduler driving the fixed-step integrators
//! - A second-order quantized state system (QSS2) engine and its scheduler
//! - The `DifferentialEquation` facade selecting one of the above from conditions

pub mod equation;
pub mod error;
pub mod integrator;
pub mod qss2;
pub mod quantizer;
pub mod time_slicing;
pub mod variables;

// Re-exports for public API
pub use equation::{DifferentialEquation, Equation, Method};
pub use error::{OdeError, OdeResult};
pub use integrator::{ForwardEuler, Integrator, RK4};
pub use qss2::{Qss2, Qss2State};
pub use quantizer::{VarImprover, VarImprovers, min_pos_root};
pub use time_slicing::{TimeSlicing, TimeSlicingOptions, TimeSlicingState};
pub use variables::{Var, Variable, Variables};
