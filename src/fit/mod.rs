//! The model-fit slice (fit apps only)
//!
//! Unlike the run slice, the fit reasons record is cleared when a fit attempt
//! *starts*: fitting is iterative and possibly long-running, and "up to date"
//! means "fitting against current inputs", independent of convergence. The
//! iterative loop itself lives in [`FitTask`], which observes a cancellation
//! token between steps.

pub mod task;

pub use task::{CancellationToken, FitTask, StepOutcome};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::{FitResult, RunnerError};

/// Why the displayed fit is stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitReason {
    DataChanged,
    LinkChanged,
    ModelChanged,
    ParameterValueChanged,
    ParameterToVaryChanged,
    AdvancedSettingsChanged,
}

/// Accumulating record of fit-update reasons since the last started attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitUpdateRequiredReasons {
    pub data_changed: bool,
    pub link_changed: bool,
    pub model_changed: bool,
    pub parameter_value_changed: bool,
    pub parameter_to_vary_changed: bool,
    pub advanced_settings_changed: bool,
}

impl FitUpdateRequiredReasons {
    pub fn set(&mut self, reason: FitReason) {
        match reason {
            FitReason::DataChanged => self.data_changed = true,
            FitReason::LinkChanged => self.link_changed = true,
            FitReason::ModelChanged => self.model_changed = true,
            FitReason::ParameterValueChanged => self.parameter_value_changed = true,
            FitReason::ParameterToVaryChanged => self.parameter_to_vary_changed = true,
            FitReason::AdvancedSettingsChanged => self.advanced_settings_changed = true,
        }
    }

    pub fn any(&self) -> bool {
        self.data_changed
            || self.link_changed
            || self.model_changed
            || self.parameter_value_changed
            || self.parameter_to_vary_changed
            || self.advanced_settings_changed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Prerequisites missing when trying to start a fit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Cannot fit without a compiled model")]
    NoModel,
    #[error("Cannot fit without uploaded data")]
    NoData,
    #[error("Cannot fit without a linked target column")]
    NoTargetColumn,
    #[error("Cannot fit without at least one parameter to vary")]
    NoParametersToVary,
    #[error("A fit is already in progress")]
    AlreadyFitting,
}

/// Session projection of the fit slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSnapshot {
    pub required: FitUpdateRequiredReasons,
    pub parameters_to_vary: Vec<String>,
    pub has_result: bool,
}

/// The model-fit slice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitState {
    required: FitUpdateRequiredReasons,
    parameters_to_vary: Vec<String>,
    fitting: bool,
    cancelled: bool,
    result: Option<FitResult>,
    error: Option<RunnerError>,
}

impl FitState {
    pub fn required(&self) -> &FitUpdateRequiredReasons {
        &self.required
    }

    pub fn parameters_to_vary(&self) -> &[String] {
        &self.parameters_to_vary
    }

    /// Whether a fit attempt is currently stepping
    pub fn is_fitting(&self) -> bool {
        self.fitting
    }

    /// Whether the last attempt was cancelled before converging
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Best-so-far result of the current or last attempt
    pub fn result(&self) -> Option<&FitResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&RunnerError> {
        self.error.as_ref()
    }

    /// Mark one fit-update reason dirty (called via the store's fan-out)
    pub fn require(&mut self, reason: FitReason) {
        self.required.set(reason);
    }

    /// Replace the set of parameters the optimizer may adjust
    ///
    /// Returns true if the selection changed.
    pub fn set_parameters_to_vary(&mut self, names: Vec<String>) -> bool {
        if self.parameters_to_vary == names {
            return false;
        }
        self.parameters_to_vary = names;
        true
    }

    /// Drop selected parameters the model no longer declares
    pub fn prune_parameters_to_vary(&mut self, declared: &[String]) -> bool {
        let before = self.parameters_to_vary.len();
        self.parameters_to_vary.retain(|name| declared.contains(name));
        self.parameters_to_vary.len() != before
    }

    /// Project the slice for session persistence
    pub fn snapshot(&self) -> FitSnapshot {
        FitSnapshot {
            required: self.required,
            parameters_to_vary: self.parameters_to_vary.clone(),
            has_result: self.result.is_some(),
        }
    }

    /// Rebuild the slice from a session snapshot, with no result held
    pub fn from_snapshot(snapshot: FitSnapshot) -> Self {
        Self {
            required: snapshot.required,
            parameters_to_vary: snapshot.parameters_to_vary,
            fitting: false,
            cancelled: false,
            result: None,
            error: None,
        }
    }

    /// Begin a fit attempt: the reasons record clears now, not on completion
    pub(crate) fn start_attempt(&mut self) {
        self.required.reset();
        self.fitting = true;
        self.cancelled = false;
        self.error = None;
        self.result = None;
    }

    pub(crate) fn commit_step(&mut self, result: FitResult) {
        self.result = Some(result);
    }

    pub(crate) fn finish(&mut self) {
        self.fitting = false;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        tracing::debug!("fit cancelled before convergence");
        self.fitting = false;
        self.cancelled = true;
    }

    pub(crate) fn fail(&mut self, error: RunnerError) {
        tracing::warn!(error = %error, "fit attempt failed");
        self.fitting = false;
        self.error = Some(error);
    }
}
