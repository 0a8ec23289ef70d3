//! The run slice
//!
//! Owns the current parameter values, end time, replicate count, the most
//! recent simulation result, and the accumulating record of reasons a rerun
//! is required. Reason flags are set through the store's fan-out dispatch and
//! cleared here, atomically, when a run attempt completes.

pub mod parameter_set;

pub use parameter_set::{ParameterSet, ParameterSetError};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::CompiledModel;
use crate::runner::{RunOptions, Runner, RunnerError, Solution};

/// Why the displayed run output is stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    ModelChanged,
    ParameterValueChanged,
    EndTimeChanged,
    NumberOfReplicatesChanged,
}

/// Accumulating record of rerun reasons since the last completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequiredReasons {
    pub model_changed: bool,
    pub parameter_value_changed: bool,
    pub end_time_changed: bool,
    pub number_of_replicates_changed: bool,
}

impl RunRequiredReasons {
    pub fn set(&mut self, reason: RunReason) {
        match reason {
            RunReason::ModelChanged => self.model_changed = true,
            RunReason::ParameterValueChanged => self.parameter_value_changed = true,
            RunReason::EndTimeChanged => self.end_time_changed = true,
            RunReason::NumberOfReplicatesChanged => self.number_of_replicates_changed = true,
        }
    }

    /// Whether any reason is outstanding
    pub fn any(&self) -> bool {
        self.model_changed
            || self.parameter_value_changed
            || self.end_time_changed
            || self.number_of_replicates_changed
    }

    /// Clear every flag as one transaction
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot of the inputs a run was executed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    pub parameter_values: HashMap<String, f64>,
    pub end_time: f64,
    pub replicates: usize,
}

/// Outcome of a completed run attempt
///
/// Exactly one of solution or error is present, which `Result` makes
/// structural. A failed attempt still counts as up to date with its inputs:
/// rerunning identical inputs would fail identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub inputs: RunInputs,
    pub outcome: Result<Solution, RunnerError>,
}

impl RunResult {
    pub fn solution(&self) -> Option<&Solution> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RunnerError> {
        self.outcome.as_ref().err()
    }
}

/// Session projection of the run slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub parameter_values: HashMap<String, f64>,
    pub saved_parameter_sets: Vec<ParameterSet>,
    pub next_set_index: usize,
    pub end_time: f64,
    pub number_of_replicates: usize,
    pub required: RunRequiredReasons,
    pub has_result: bool,
}

/// The run slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    parameter_values: HashMap<String, f64>,
    saved_parameter_sets: Vec<ParameterSet>,
    next_set_index: usize,
    end_time: f64,
    number_of_replicates: usize,
    required: RunRequiredReasons,
    result: Option<RunResult>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            parameter_values: HashMap::new(),
            saved_parameter_sets: Vec::new(),
            next_set_index: 1,
            end_time: 100.0,
            number_of_replicates: 5,
            required: RunRequiredReasons::default(),
            result: None,
        }
    }
}

impl RunState {
    pub fn parameter_values(&self) -> &HashMap<String, f64> {
        &self.parameter_values
    }

    pub fn saved_parameter_sets(&self) -> &[ParameterSet] {
        &self.saved_parameter_sets
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn number_of_replicates(&self) -> usize {
        self.number_of_replicates
    }

    pub fn required(&self) -> &RunRequiredReasons {
        &self.required
    }

    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    /// Mark one rerun reason dirty (called via the store's fan-out)
    pub fn require(&mut self, reason: RunReason) {
        self.required.set(reason);
    }

    /// Merge parameter values after a recompile
    ///
    /// Values survive for parameters the new model still declares; new
    /// parameters take their defaults, vanished parameters are dropped.
    pub fn merge_parameters(&mut self, model: &CompiledModel) {
        let mut merged = model.default_parameters();
        for (name, value) in &self.parameter_values {
            if let Some(slot) = merged.get_mut(name) {
                *slot = *value;
            }
        }
        self.parameter_values = merged;
    }

    /// Set one parameter value; returns true if the value changed
    pub fn set_parameter_value(&mut self, name: &str, value: f64) -> bool {
        match self.parameter_values.get_mut(name) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Set the end time
    ///
    /// Returns true iff this constitutes an end-time change for dirty
    /// tracking: strictly greater than the end time of the last completed
    /// run. Shrinking (or matching) is free because results retain their full
    /// computed domain and can be truncated for display.
    pub fn set_end_time(&mut self, end_time: f64) -> bool {
        self.end_time = end_time;
        match &self.result {
            Some(result) => end_time > result.inputs.end_time,
            None => false,
        }
    }

    /// Set the replicate count; returns true if it changed
    pub fn set_number_of_replicates(&mut self, n: usize) -> bool {
        if self.number_of_replicates == n {
            return false;
        }
        self.number_of_replicates = n;
        true
    }

    /// Execute the model with the current inputs
    ///
    /// The whole reasons record resets when the attempt completes, whether it
    /// produced a solution or an error.
    pub fn run(&mut self, runner: &dyn Runner, model: &CompiledModel, options: &RunOptions) {
        let inputs = RunInputs {
            parameter_values: self.parameter_values.clone(),
            end_time: self.end_time,
            replicates: options.replicates,
        };
        let outcome = runner.run(model, &self.parameter_values, 0.0, self.end_time, options);
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "model run failed");
        }
        self.result = Some(RunResult { inputs, outcome });
        self.required.reset();
    }

    /// Save the current values as a new immutable set
    ///
    /// Rejected while the current values duplicate any saved set.
    pub fn save_parameter_set(&mut self) -> Result<&ParameterSet, ParameterSetError> {
        if let Some(existing) = self
            .saved_parameter_sets
            .iter()
            .find(|set| *set.values() == self.parameter_values)
        {
            return Err(ParameterSetError::Duplicate {
                name: existing.name().to_string(),
            });
        }
        let name = format!("Set {}", self.next_set_index);
        self.next_set_index += 1;
        self.saved_parameter_sets
            .push(ParameterSet::new(name, self.parameter_values.clone()));
        Ok(self.saved_parameter_sets.last().unwrap())
    }

    /// Delete a saved set by name
    pub fn delete_parameter_set(&mut self, name: &str) -> Result<(), ParameterSetError> {
        let index = self
            .saved_parameter_sets
            .iter()
            .position(|set| set.name() == name)
            .ok_or_else(|| ParameterSetError::NotFound {
                name: name.to_string(),
            })?;
        self.saved_parameter_sets.remove(index);
        Ok(())
    }

    /// Project the slice for session persistence
    ///
    /// Solutions are opaque to the session layer; only their presence is
    /// recorded and they are recomputed on demand after rehydration.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            parameter_values: self.parameter_values.clone(),
            saved_parameter_sets: self.saved_parameter_sets.clone(),
            next_set_index: self.next_set_index,
            end_time: self.end_time,
            number_of_replicates: self.number_of_replicates,
            required: self.required,
            has_result: self.result.is_some(),
        }
    }

    /// Rebuild the slice from a session snapshot, with no result held
    pub fn from_snapshot(snapshot: RunSnapshot) -> Self {
        Self {
            parameter_values: snapshot.parameter_values,
            saved_parameter_sets: snapshot.saved_parameter_sets,
            next_set_index: snapshot.next_set_index,
            end_time: snapshot.end_time,
            number_of_replicates: snapshot.number_of_replicates,
            required: snapshot.required,
            result: None,
        }
    }

    /// Exchange the current values with a saved set's values
    ///
    /// Counts as a parameter edit for dirty tracking (the store fans the
    /// reason out after a successful swap).
    pub fn swap_parameter_set(&mut self, name: &str) -> Result<(), ParameterSetError> {
        let set = self
            .saved_parameter_sets
            .iter_mut()
            .find(|set| set.name() == name)
            .ok_or_else(|| ParameterSetError::NotFound {
                name: name.to_string(),
            })?;
        std::mem::swap(set.values_mut(), &mut self.parameter_values);
        Ok(())
    }
}
