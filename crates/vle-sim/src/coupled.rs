//! Coupled models: atomic models connected through port couplings.

use std::collections::HashMap;
use std::fmt;

use vle_core::{Dynamics, ModelId};

use crate::error::{SimError, SimResult};

/// A connection from an output port of one model to an input port of another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coupling {
    pub from: ModelId,
    pub from_port: String,
    pub to: ModelId,
    pub to_port: String,
}

pub(crate) struct Atomic {
    pub name: String,
    pub dynamics: Box<dyn Dynamics>,
}

/// Builder for a coupled model.
///
/// Models are named by their context; couplings are checked against the
/// declared ports when `build()` freezes the structure.
#[derive(Default)]
pub struct CoupledBuilder {
    models: Vec<Atomic>,
    couplings: Vec<Coupling>,
    names: HashMap<String, ModelId>,
}

impl CoupledBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an atomic model and return its ID.
    pub fn add_model(&mut self, dynamics: Box<dyn Dynamics>) -> SimResult<ModelId> {
        let name = dynamics.context().name().to_string();
        if self.names.contains_key(&name) {
            return Err(SimError::DuplicateModel { name });
        }
        let id = ModelId::from_index(self.models.len() as u32);
        self.names.insert(name.clone(), id);
        self.models.push(Atomic { name, dynamics });
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<ModelId> {
        self.names.get(name).copied()
    }

    pub fn add_coupling(
        &mut self,
        from: ModelId,
        from_port: impl Into<String>,
        to: ModelId,
        to_port: impl Into<String>,
    ) {
        self.couplings.push(Coupling {
            from,
            from_port: from_port.into(),
            to,
            to_port: to_port.into(),
        });
    }

    /// Couple two models by name.
    pub fn connect(&mut self, from: &str, from_port: &str, to: &str, to_port: &str) -> SimResult<()> {
        let lookup = |name: &str| {
            self.find(name).ok_or_else(|| SimError::UnknownModel {
                name: name.to_string(),
            })
        };
        let (from_id, to_id) = (lookup(from)?, lookup(to)?);
        self.add_coupling(from_id, from_port, to_id, to_port);
        Ok(())
    }

    /// Validate couplings and freeze the structure.
    pub fn build(self) -> SimResult<Coupled> {
        validate_couplings(&self.models, &self.couplings)?;
        Ok(Coupled {
            models: self.models,
            couplings: self.couplings,
            names: self.names,
        })
    }
}

fn validate_couplings(models: &[Atomic], couplings: &[Coupling]) -> SimResult<()> {
    for c in couplings {
        let (Some(from), Some(to)) = (models.get(c.from.slot()), models.get(c.to.slot())) else {
            return Err(SimError::InvalidArg {
                what: "coupling references a model outside this builder",
            });
        };
        let error = |reason| SimError::Coupling {
            from: from.name.clone(),
            from_port: c.from_port.clone(),
            to: to.name.clone(),
            to_port: c.to_port.clone(),
            reason,
        };
        if !from.dynamics.context().exist_output_port(&c.from_port) {
            return Err(error("unknown output port"));
        }
        if !to.dynamics.context().exist_input_port(&c.to_port) {
            return Err(error("unknown input port"));
        }
    }
    Ok(())
}

/// A validated set of atomic models and their couplings.
pub struct Coupled {
    pub(crate) models: Vec<Atomic>,
    couplings: Vec<Coupling>,
    names: HashMap<String, ModelId>,
}

impl Coupled {
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<ModelId> {
        self.names.get(name).copied()
    }

    pub fn name(&self, id: ModelId) -> &str {
        &self.models[id.slot()].name
    }

    pub fn model(&self, id: ModelId) -> &dyn Dynamics {
        self.models[id.slot()].dynamics.as_ref()
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    /// Destinations of an event leaving `from` on `port`.
    pub fn routes<'a>(
        &'a self,
        from: ModelId,
        port: &'a str,
    ) -> impl Iterator<Item = (ModelId, &'a str)> + 'a {
        self.couplings
            .iter()
            .filter(move |c| c.from == from && c.from_port == port)
            .map(|c| (c.to, c.to_port.as_str()))
    }
}

impl fmt::Debug for Coupled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coupled")
            .field(
                "models",
                &self.models.iter().map(|m| &m.name).collect::<Vec<_>>(),
            )
            .field("couplings", &self.couplings)
            .finish()
    }
}
