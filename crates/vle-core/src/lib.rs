//! vle-core: stable foundation for the VLE simulation crates.
//!
//! Contains:
//! - ids (stable compact IDs for variables and models)
//! - value (payloads carried by events on model ports)
//! - conditions (initialisation maps handed to a model at construction)
//! - devs (the DEVS protocol every atomic model implements)
//! - error (shared error types)

pub mod conditions;
pub mod devs;
pub mod error;
pub mod ids;
pub mod value;

// Re-exports: nice ergonomics for downstream crates
pub use conditions::{ConditionValue, Conditions};
pub use devs::{Dynamics, ExternalEvent, INFINITY, ModelContext, ObservationEvent, Time};
pub use error::{DevsError, DevsResult};
pub use ids::*;
pub use value::Payload;
