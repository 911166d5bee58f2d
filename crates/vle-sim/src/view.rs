//! Timed observation views and their tables.

use serde::{Deserialize, Serialize};
use vle_core::{ModelId, ObservationEvent, Time};

use crate::coupled::Coupled;
use crate::error::{SimError, SimResult};

/// A table of observations: one `time` column plus one column per
/// `model:port` observable. Missing observations are `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    pub view: String,
    pub columns: Vec<String>,
    pub time: Vec<Time>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl ObservationTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col).copied().flatten()
    }

    /// Full column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[col]).collect())
    }

    /// CSV with a `time` header column; missing values are left empty.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str("time");
        for c in &self.columns {
            out.push(',');
            out.push_str(c);
        }
        out.push('\n');
        for (t, row) in self.time.iter().zip(&self.rows) {
            out.push_str(&t.to_string());
            for v in row {
                out.push(',');
                if let Some(v) = v {
                    out.push_str(&v.to_string());
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// An observable port of a named model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observable {
    pub model: String,
    pub port: String,
}

/// Observes a set of ports every `timestep`, starting at the simulation begin.
#[derive(Clone, Debug)]
pub struct View {
    name: String,
    timestep: Time,
    observables: Vec<Observable>,
    resolved: Vec<ModelId>,
    next: Time,
    table: ObservationTable,
}

impl View {
    pub fn new(name: impl Into<String>, timestep: Time) -> SimResult<Self> {
        if timestep <= 0.0 || !timestep.is_finite() {
            return Err(SimError::InvalidArg {
                what: "view timestep must be a positive finite number",
            });
        }
        let name = name.into();
        Ok(Self {
            table: ObservationTable {
                view: name.clone(),
                ..ObservationTable::default()
            },
            name,
            timestep,
            observables: Vec::new(),
            resolved: Vec::new(),
            next: 0.0,
        })
    }

    /// Add an observable port; builder style.
    pub fn observe(mut self, model: impl Into<String>, port: impl Into<String>) -> Self {
        self.add_observable(model, port);
        self
    }

    pub fn add_observable(&mut self, model: impl Into<String>, port: impl Into<String>) {
        let obs = Observable {
            model: model.into(),
            port: port.into(),
        };
        self.table.columns.push(format!("{}:{}", obs.model, obs.port));
        self.observables.push(obs);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestep(&self) -> Time {
        self.timestep
    }

    pub fn observables(&self) -> &[Observable] {
        &self.observables
    }

    pub fn table(&self) -> &ObservationTable {
        &self.table
    }

    pub fn into_table(self) -> ObservationTable {
        self.table
    }

    /// Resolve model names against the coupled model.
    pub(crate) fn resolve(&mut self, coupled: &Coupled) -> SimResult<()> {
        self.resolved = self
            .observables
            .iter()
            .map(|o| {
                coupled.find(&o.model).ok_or_else(|| SimError::UnknownModel {
                    name: o.model.clone(),
                })
            })
            .collect::<SimResult<_>>()?;
        Ok(())
    }

    /// Clear the table and place the first observation at `begin`.
    pub(crate) fn start(&mut self, begin: Time) {
        self.next = begin;
        self.table.time.clear();
        self.table.rows.clear();
    }

    /// Record every observation time strictly before `before` and no later
    /// than `end`. Times accumulate as `begin + timestep + timestep + ...`.
    pub(crate) fn observe_until(&mut self, coupled: &Coupled, before: Time, end: Time) {
        while self.next < before && self.next <= end {
            let time = self.next;
            let row = self
                .observables
                .iter()
                .zip(&self.resolved)
                .map(|(obs, &id)| {
                    coupled
                        .model(id)
                        .observation(&ObservationEvent::new(time, obs.port.as_str()))
                        .map(|p| p.value())
                })
                .collect();
            self.table.time.push(time);
            self.table.rows.push(row);
            self.next += self.timestep;
        }
    }
}
