//! The sensitivity and multi-sensitivity slices
//!
//! Both hold varying-parameter settings and the results of the last batch
//! run, plus an accumulating reasons record cleared when a batch completes.
//! Sensitivity sweeps a single parameter; multi-sensitivity sweeps the
//! cross-product of several.

pub mod batch;
pub mod values;

pub use batch::{BatchResult, Combination};
pub use values::{Scale, SettingsError, Variation, VaryingParameterSettings};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::CompiledModel;
use crate::runner::{RunOptions, Runner};

/// Why the displayed batch output is stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitivityReason {
    ModelChanged,
    ParameterValueChanged,
    EndTimeChanged,
    SensitivityOptionsChanged,
    NumberOfReplicatesChanged,
    AdvancedSettingsChanged,
    LinkChanged,
}

/// Accumulating record of batch-update reasons since the last completed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityUpdateRequiredReasons {
    pub model_changed: bool,
    pub parameter_value_changed: bool,
    pub end_time_changed: bool,
    pub sensitivity_options_changed: bool,
    pub number_of_replicates_changed: bool,
    pub advanced_settings_changed: bool,
    pub link_changed: bool,
}

impl SensitivityUpdateRequiredReasons {
    pub fn set(&mut self, reason: SensitivityReason) {
        match reason {
            SensitivityReason::ModelChanged => self.model_changed = true,
            SensitivityReason::ParameterValueChanged => self.parameter_value_changed = true,
            SensitivityReason::EndTimeChanged => self.end_time_changed = true,
            SensitivityReason::SensitivityOptionsChanged => {
                self.sensitivity_options_changed = true
            }
            SensitivityReason::NumberOfReplicatesChanged => {
                self.number_of_replicates_changed = true
            }
            SensitivityReason::AdvancedSettingsChanged => self.advanced_settings_changed = true,
            SensitivityReason::LinkChanged => self.link_changed = true,
        }
    }

    pub fn any(&self) -> bool {
        self.model_changed
            || self.parameter_value_changed
            || self.end_time_changed
            || self.sensitivity_options_changed
            || self.number_of_replicates_changed
            || self.advanced_settings_changed
            || self.link_changed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Session projection of a sensitivity slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySnapshot {
    pub settings: Vec<VaryingParameterSettings>,
    pub required: SensitivityUpdateRequiredReasons,
    pub has_result: bool,
}

/// The single-parameter sensitivity slice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensitivityState {
    settings: Option<VaryingParameterSettings>,
    required: SensitivityUpdateRequiredReasons,
    result: Option<BatchResult>,
}

impl SensitivityState {
    pub fn settings(&self) -> Option<&VaryingParameterSettings> {
        self.settings.as_ref()
    }

    pub fn required(&self) -> &SensitivityUpdateRequiredReasons {
        &self.required
    }

    pub fn result(&self) -> Option<&BatchResult> {
        self.result.as_ref()
    }

    /// Mark one batch-update reason dirty (called via the store's fan-out)
    pub fn require(&mut self, reason: SensitivityReason) {
        self.required.set(reason);
    }

    /// Synchronous preview of the swept values for the current settings
    pub fn preview(&self, base: &HashMap<String, f64>) -> Result<Vec<f64>, SettingsError> {
        let settings = self.settings.as_ref().ok_or(SettingsError::NoSettings)?;
        let base_value = *base
            .get(&settings.name)
            .ok_or_else(|| SettingsError::UnknownParameter(settings.name.clone()))?;
        settings.batch_values(base_value)
    }

    /// Validate and save new settings
    pub fn set_settings(
        &mut self,
        settings: VaryingParameterSettings,
        base: &HashMap<String, f64>,
    ) -> Result<(), SettingsError> {
        let base_value = *base
            .get(&settings.name)
            .ok_or_else(|| SettingsError::UnknownParameter(settings.name.clone()))?;
        settings.batch_values(base_value)?;
        self.settings = Some(settings);
        Ok(())
    }

    /// Project the slice for session persistence
    pub fn snapshot(&self) -> SensitivitySnapshot {
        SensitivitySnapshot {
            settings: self.settings.iter().cloned().collect(),
            required: self.required,
            has_result: self.result.is_some(),
        }
    }

    /// Rebuild the slice from a session snapshot, with no result held
    pub fn from_snapshot(snapshot: SensitivitySnapshot) -> Self {
        Self {
            settings: snapshot.settings.into_iter().next(),
            required: snapshot.required,
            result: None,
        }
    }

    /// Execute the batch; the reasons record clears when it completes
    pub fn run_batch(
        &mut self,
        runner: &dyn Runner,
        model: &CompiledModel,
        base: &HashMap<String, f64>,
        end_time: f64,
        options: &RunOptions,
    ) -> Result<(), SettingsError> {
        let settings = self.settings.clone().ok_or(SettingsError::NoSettings)?;
        let combos = batch::combinations(std::slice::from_ref(&settings), base)?;
        self.result = Some(batch::run_batch(
            runner, model, base, combos, end_time, options,
        ));
        self.required.reset();
        Ok(())
    }
}

/// The multi-parameter sensitivity slice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiSensitivityState {
    settings: Vec<VaryingParameterSettings>,
    required: SensitivityUpdateRequiredReasons,
    result: Option<BatchResult>,
}

impl MultiSensitivityState {
    pub fn settings(&self) -> &[VaryingParameterSettings] {
        &self.settings
    }

    pub fn required(&self) -> &SensitivityUpdateRequiredReasons {
        &self.required
    }

    pub fn result(&self) -> Option<&BatchResult> {
        self.result.as_ref()
    }

    pub fn require(&mut self, reason: SensitivityReason) {
        self.required.set(reason);
    }

    /// Validate and save settings for several varied parameters
    pub fn set_settings(
        &mut self,
        settings: Vec<VaryingParameterSettings>,
        base: &HashMap<String, f64>,
    ) -> Result<(), SettingsError> {
        for (i, s) in settings.iter().enumerate() {
            if settings[..i].iter().any(|other| other.name == s.name) {
                return Err(SettingsError::DuplicateParameter);
            }
            let base_value = *base
                .get(&s.name)
                .ok_or_else(|| SettingsError::UnknownParameter(s.name.clone()))?;
            s.batch_values(base_value)?;
        }
        self.settings = settings;
        Ok(())
    }

    /// Project the slice for session persistence
    pub fn snapshot(&self) -> SensitivitySnapshot {
        SensitivitySnapshot {
            settings: self.settings.clone(),
            required: self.required,
            has_result: self.result.is_some(),
        }
    }

    /// Rebuild the slice from a session snapshot, with no result held
    pub fn from_snapshot(snapshot: SensitivitySnapshot) -> Self {
        Self {
            settings: snapshot.settings,
            required: snapshot.required,
            result: None,
        }
    }

    /// Execute the cross-product batch; reasons clear when it completes
    pub fn run_batch(
        &mut self,
        runner: &dyn Runner,
        model: &CompiledModel,
        base: &HashMap<String, f64>,
        end_time: f64,
        options: &RunOptions,
    ) -> Result<(), SettingsError> {
        if self.settings.is_empty() {
            return Err(SettingsError::NoSettings);
        }
        let combos = batch::combinations(&self.settings, base)?;
        self.result = Some(batch::run_batch(
            runner, model, base, combos, end_time, options,
        ));
        self.required.reset();
        Ok(())
    }
}
