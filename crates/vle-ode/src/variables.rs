//! Variable store: named continuous state variables.
//!
//! Variables live in an arena and are referred to by `VariableId`, so handles
//! stay valid for the lifetime of the model. Iteration follows declaration
//! order, which keeps per-variable accumulators in the integrators aligned.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use vle_core::{Conditions, VariableId};

use crate::error::{OdeError, OdeResult};

/// One continuous state dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    name: String,
    /// Current value.
    pub value: f64,
    /// Current time derivative, written by the model's `compute`.
    pub gradient: f64,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collection of the variables of one differential equation.
#[derive(Clone, Debug, Default)]
pub struct Variables {
    vars: Vec<Variable>,
    index: HashMap<String, VariableId>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new variable initialised to zero.
    ///
    /// Declaring the same name twice is a configuration error.
    pub fn add_var(&mut self, name: impl Into<String>) -> OdeResult<VariableId> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(OdeError::DuplicateVariable { name });
        }
        let id = VariableId::from_index(self.vars.len() as u32);
        self.index.insert(name.clone(), id);
        self.vars.push(Variable {
            name,
            value: 0.0,
            gradient: 0.0,
        });
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<VariableId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: VariableId) -> Option<&Variable> {
        self.vars.get(id.slot())
    }

    pub fn get_mut(&mut self, id: VariableId) -> Option<&mut Variable> {
        self.vars.get_mut(id.slot())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.vars.iter_mut()
    }

    /// Variables with their handles, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId::from_index(i as u32), v))
    }
}

impl Index<VariableId> for Variables {
    type Output = Variable;

    fn index(&self, id: VariableId) -> &Variable {
        &self.vars[id.slot()]
    }
}

impl IndexMut<VariableId> for Variables {
    fn index_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.vars[id.slot()]
    }
}

/// Handle on a registered variable, kept by the user's equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Var(VariableId);

impl Var {
    /// Register `name` in `vars`, seeding it from `init_value_<name>` and
    /// `init_grad_<name>` (both default to 0).
    pub fn init(vars: &mut Variables, name: &str, conditions: &Conditions) -> OdeResult<Self> {
        let value = conditions.get_double_or(&format!("init_value_{name}"), 0.0)?;
        let gradient = conditions.get_double_or(&format!("init_grad_{name}"), 0.0)?;
        let id = vars.add_var(name)?;
        let var = &mut vars[id];
        var.value = value;
        var.gradient = gradient;
        Ok(Self(id))
    }

    pub fn id(self) -> VariableId {
        self.0
    }
}

impl Index<Var> for Variables {
    type Output = Variable;

    fn index(&self, var: Var) -> &Variable {
        &self[var.0]
    }
}

impl IndexMut<Var> for Variables {
    fn index_mut(&mut self, var: Var) -> &mut Variable {
        &mut self[var.0]
    }
}
