//! Experiment files: models, couplings and views of one simulation run.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vle_core::{Conditions, Time};

use crate::catalog;
use crate::coordinator::{Coordinator, SimOptions};
use crate::coupled::CoupledBuilder;
use crate::error::SimError;
use crate::view::{ObservationTable, View};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    #[serde(default)]
    pub begin: Time,
    pub duration: Time,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub couplings: Vec<CouplingDef>,
    #[serde(default)]
    pub views: Vec<ViewDef>,
}

fn default_max_steps() -> usize {
    SimOptions::default().max_steps
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub dynamics: String,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub observables: Vec<ObservableDef>,
}

/// Attach `port` of the enclosing model to a view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableDef {
    pub port: String,
    pub view: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingDef {
    pub from: String,
    pub from_port: String,
    pub to: String,
    pub to_port: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewDef {
    pub name: String,
    pub timestep: Time,
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;

#[derive(thiserror::Error, Debug)]
pub enum ExperimentError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &Path) -> ExperimentResult<Experiment> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn from_yaml_str(content: &str) -> ExperimentResult<Experiment> {
    let experiment: Experiment = serde_yaml::from_str(content)?;
    validate_experiment(&experiment)?;
    Ok(experiment)
}

pub fn save_yaml(path: &Path, experiment: &Experiment) -> ExperimentResult<()> {
    validate_experiment(experiment)?;
    let content = serde_yaml::to_string(experiment)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_experiment(experiment: &Experiment) -> Result<(), ValidationError> {
    if !experiment.begin.is_finite() {
        return Err(invalid("begin", experiment.begin, "must be finite"));
    }
    if experiment.duration <= 0.0 || !experiment.duration.is_finite() {
        return Err(invalid(
            "duration",
            experiment.duration,
            "must be a positive finite number",
        ));
    }
    if experiment.max_steps == 0 {
        return Err(invalid("max_steps", 0, "must be positive"));
    }

    let mut view_names = HashSet::new();
    for view in &experiment.views {
        if !view_names.insert(view.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: view.name.clone(),
                context: "views".to_string(),
            });
        }
        if view.timestep <= 0.0 || !view.timestep.is_finite() {
            return Err(invalid(
                &format!("views.{}.timestep", view.name),
                view.timestep,
                "must be a positive finite number",
            ));
        }
    }

    let mut model_names = HashSet::new();
    for model in &experiment.models {
        if !model_names.insert(model.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: model.name.clone(),
                context: "models".to_string(),
            });
        }
        if !catalog::contains(&model.dynamics) {
            return Err(ValidationError::MissingReference {
                id: model.dynamics.clone(),
                context: format!("dynamics of model {}", model.name),
            });
        }
        for obs in &model.observables {
            if !view_names.contains(obs.view.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: obs.view.clone(),
                    context: format!("observables of model {}", model.name),
                });
            }
        }
    }

    for coupling in &experiment.couplings {
        for end in [&coupling.from, &coupling.to] {
            if !model_names.contains(end.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: end.clone(),
                    context: "couplings".to_string(),
                });
            }
        }
    }
    Ok(())
}

impl Experiment {
    pub fn options(&self) -> SimOptions {
        SimOptions {
            begin: self.begin,
            duration: self.duration,
            max_steps: self.max_steps,
        }
    }

    /// Instantiate models, couplings and views.
    pub fn build(&self) -> ExperimentResult<Coordinator> {
        validate_experiment(self)?;
        let mut builder = CoupledBuilder::new();
        for model in &self.models {
            builder.add_model(catalog::create(
                &model.dynamics,
                &model.name,
                &model.conditions,
            )?)?;
        }
        for c in &self.couplings {
            builder.connect(&c.from, &c.from_port, &c.to, &c.to_port)?;
        }
        let mut coordinator = Coordinator::new(builder.build()?);
        for def in &self.views {
            let mut view = View::new(def.name.as_str(), def.timestep)?;
            for model in &self.models {
                for obs in model.observables.iter().filter(|o| o.view == def.name) {
                    view.add_observable(model.name.as_str(), obs.port.as_str());
                }
            }
            coordinator.add_view(view)?;
        }
        Ok(coordinator)
    }

    /// Build and run, returning one table per view.
    pub fn run(&self) -> ExperimentResult<Vec<ObservationTable>> {
        let mut coordinator = self.build()?;
        coordinator.run(&self.options())?;
        Ok(coordinator.into_tables())
    }
}
