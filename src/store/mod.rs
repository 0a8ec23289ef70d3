//! The application state container
//!
//! Owns every slice and is the single mutation entry point: UI events and
//! asynchronous completions are expressed as [`AppEvent`] values and applied
//! through [`AppState::apply`]. Cross-slice effects go exclusively through
//! the fan-out dispatch table in [`dispatch`]; no slice ever reaches into
//! another slice's fields.

pub mod dispatch;

pub use dispatch::{fan_out, FlagTarget, UpstreamChange};

use serde::{Deserialize, Serialize};

use crate::code::CodeState;
use crate::data::DataState;
use crate::error::GenericError;
use crate::fit::{FitError, FitState, FitTask, StepOutcome};
use crate::link::LinkState;
use crate::model::{CompiledModel, ModelState};
use crate::run::RunState;
use crate::runner::{RunOptions, Runner, SimplexFit};
use crate::sensitivity::{MultiSensitivityState, SensitivityState, VaryingParameterSettings};

/// The flavour of application being served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppKind {
    /// Deterministic model exploration only
    Basic,
    /// Adds data upload, variable linking and model fitting
    Fit,
    /// Discrete-time stochastic models with replicates
    Stochastic,
}

/// Advanced numerical settings forwarded to the runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedSettings {
    pub tol: f64,
    pub max_steps: usize,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            max_steps: 10_000,
        }
    }
}

/// A UI event or asynchronous completion, as consumed by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The user edited the model source
    SetCode(String),
    /// The external compiler produced a model
    CompileSucceeded(CompiledModel),
    /// The external compiler rejected the source
    CompileFailed(Vec<GenericError>),
    /// A CSV payload finished reading (fit apps)
    UploadData(String),
    /// The user picked a different time variable (fit apps)
    SetTimeVariable(String),
    /// The user linked or unlinked a data column (fit apps)
    SetLink {
        column: String,
        variable: Option<String>,
    },
    /// The user picked the optimization target column (fit apps)
    SetColumnToFit(String),
    /// The user edited one current parameter value
    SetParameterValue { name: String, value: f64 },
    /// The user changed the simulation end time
    SetEndTime(f64),
    /// The user changed the replicate count (stochastic apps)
    SetNumberOfReplicates(usize),
    /// The user changed which parameters the fit may adjust (fit apps)
    SetParametersToVary(Vec<String>),
    /// The user edited advanced numerical settings
    SetAdvancedSettings(AdvancedSettings),
    /// The user saved sensitivity variation settings
    SetSensitivitySettings(VaryingParameterSettings),
    /// The user saved multi-sensitivity variation settings
    SetMultiSensitivitySettings(Vec<VaryingParameterSettings>),
    /// Snapshot the current parameter values as a named set
    SaveParameterSet,
    /// Delete a saved parameter set
    DeleteParameterSet(String),
    /// Exchange current values with a saved set
    SwapParameterSet(String),
    /// A transport-level failure (session save/load, remote compile)
    TransportError(GenericError),
    /// The user dismissed the error list
    DismissErrors,
}

/// The application state container
#[derive(Debug, Clone)]
pub struct AppState {
    kind: AppKind,
    code: CodeState,
    model: ModelState,
    data: DataState,
    link: LinkState,
    run: RunState,
    fit: FitState,
    sensitivity: SensitivityState,
    multi_sensitivity: MultiSensitivityState,
    advanced: AdvancedSettings,
    errors: Vec<GenericError>,
}

impl AppState {
    /// Create a fresh state for an app, seeded with its default source code
    pub fn new(kind: AppKind, default_code: impl Into<String>) -> Self {
        Self {
            kind,
            code: CodeState::new(default_code),
            model: ModelState::default(),
            data: DataState::default(),
            link: LinkState::default(),
            run: RunState::default(),
            fit: FitState::default(),
            sensitivity: SensitivityState::default(),
            multi_sensitivity: MultiSensitivityState::default(),
            advanced: AdvancedSettings::default(),
            errors: Vec::new(),
        }
    }

    pub fn kind(&self) -> AppKind {
        self.kind
    }

    pub fn code(&self) -> &CodeState {
        &self.code
    }

    pub fn model(&self) -> &ModelState {
        &self.model
    }

    pub fn data(&self) -> &DataState {
        &self.data
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn fit(&self) -> &FitState {
        &self.fit
    }

    pub fn sensitivity(&self) -> &SensitivityState {
        &self.sensitivity
    }

    pub fn multi_sensitivity(&self) -> &MultiSensitivityState {
        &self.multi_sensitivity
    }

    pub fn advanced(&self) -> &AdvancedSettings {
        &self.advanced
    }

    /// Accumulated transport/validation errors for display
    pub fn errors(&self) -> &[GenericError] {
        &self.errors
    }

    fn is_fit_app(&self) -> bool {
        self.kind == AppKind::Fit
    }

    /// Runner options derived from the advanced settings and replicate count
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            replicates: match self.kind {
                AppKind::Stochastic => self.run.number_of_replicates(),
                _ => 1,
            },
            tol: self.advanced.tol,
            max_steps: self.advanced.max_steps,
        }
    }

    /// Apply one event to the state
    ///
    /// This is the reducer boundary: validation failures are absorbed into
    /// the error list or the owning slice, never propagated to the caller.
    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::SetCode(source) => {
                self.code.set_source(source);
                self.model.set_compile_required();
            }
            AppEvent::CompileSucceeded(compiled) => {
                self.run.merge_parameters(&compiled);
                let declared: Vec<String> = compiled
                    .parameters
                    .iter()
                    .map(|p| p.name.clone())
                    .collect();
                self.fit.prune_parameters_to_vary(&declared);
                self.model.compile_succeeded(compiled);
                if self.is_fit_app() {
                    self.link.refresh(self.data.data(), self.model.compiled());
                }
                self.dirty(UpstreamChange::ModelChanged);
            }
            AppEvent::CompileFailed(messages) => {
                self.model.compile_failed(messages);
            }
            AppEvent::UploadData(raw) => {
                if !self.is_fit_app() {
                    return;
                }
                let had_data = self.data.data().is_some();
                let uploaded = self.data.upload(&raw);
                if uploaded || had_data {
                    self.link.refresh(self.data.data(), self.model.compiled());
                    self.dirty(UpstreamChange::DataChanged);
                }
            }
            AppEvent::SetTimeVariable(name) => {
                if self.data.set_time_variable(&name) {
                    self.link.refresh(self.data.data(), self.model.compiled());
                    self.dirty(UpstreamChange::LinkChanged);
                }
            }
            AppEvent::SetLink { column, variable } => {
                if let Some(variable) = &variable {
                    let known = self
                        .model
                        .compiled()
                        .map(|m| m.has_variable(variable))
                        .unwrap_or(false);
                    if !known {
                        self.errors.push(GenericError::new(
                            "Could not link column",
                            format!("'{variable}' is not a variable of the current model"),
                        ));
                        return;
                    }
                }
                if self.link.set_link(&column, variable) {
                    self.dirty(UpstreamChange::LinkChanged);
                }
            }
            AppEvent::SetColumnToFit(column) => {
                if self.link.set_column_to_fit(&column) {
                    self.dirty(UpstreamChange::LinkChanged);
                }
            }
            AppEvent::SetParameterValue { name, value } => {
                if self.run.set_parameter_value(&name, value) {
                    self.dirty(UpstreamChange::ParameterValueChanged);
                }
            }
            AppEvent::SetEndTime(end_time) => {
                if self.run.set_end_time(end_time) {
                    self.dirty(UpstreamChange::EndTimeChanged);
                }
            }
            AppEvent::SetNumberOfReplicates(n) => {
                let changed = self.run.set_number_of_replicates(n);
                // replicates only affect stochastic model output
                if changed && self.kind == AppKind::Stochastic {
                    self.dirty(UpstreamChange::NumberOfReplicatesChanged);
                }
            }
            AppEvent::SetParametersToVary(names) => {
                // with no model yet, the selection is pruned at compile time
                if let Some(model) = self.model.compiled() {
                    if let Some(unknown) = names
                        .iter()
                        .find(|n| !model.parameters.iter().any(|p| &p.name == *n))
                    {
                        self.errors.push(GenericError::new(
                            "Could not set parameters to vary",
                            format!("'{unknown}' is not a parameter of the current model"),
                        ));
                        return;
                    }
                }
                if self.fit.set_parameters_to_vary(names) {
                    self.dirty(UpstreamChange::ParameterToVaryChanged);
                }
            }
            AppEvent::SetAdvancedSettings(settings) => {
                if self.advanced != settings {
                    self.advanced = settings;
                    self.dirty(UpstreamChange::AdvancedSettingsChanged);
                }
            }
            AppEvent::SetSensitivitySettings(settings) => {
                match self
                    .sensitivity
                    .set_settings(settings, self.run.parameter_values())
                {
                    Ok(()) => self.dirty(UpstreamChange::SensitivityOptionsChanged),
                    Err(e) => self.errors.push(GenericError::new(
                        "Invalid sensitivity settings",
                        e.to_string(),
                    )),
                }
            }
            AppEvent::SetMultiSensitivitySettings(settings) => {
                match self
                    .multi_sensitivity
                    .set_settings(settings, self.run.parameter_values())
                {
                    Ok(()) => self.dirty(UpstreamChange::MultiSensitivityOptionsChanged),
                    Err(e) => self.errors.push(GenericError::new(
                        "Invalid multi-sensitivity settings",
                        e.to_string(),
                    )),
                }
            }
            AppEvent::SaveParameterSet => {
                if let Err(e) = self.run.save_parameter_set() {
                    self.errors.push(GenericError::new(
                        "Could not save parameter set",
                        e.to_string(),
                    ));
                }
            }
            AppEvent::DeleteParameterSet(name) => {
                if let Err(e) = self.run.delete_parameter_set(&name) {
                    self.errors.push(GenericError::new(
                        "Could not delete parameter set",
                        e.to_string(),
                    ));
                }
            }
            AppEvent::SwapParameterSet(name) => match self.run.swap_parameter_set(&name) {
                Ok(()) => self.dirty(UpstreamChange::ParameterValueChanged),
                Err(e) => self.errors.push(GenericError::new(
                    "Could not swap parameter set",
                    e.to_string(),
                )),
            },
            AppEvent::TransportError(error) => {
                self.errors.push(error);
            }
            AppEvent::DismissErrors => {
                self.errors.clear();
            }
        }
    }

    /// Fan one upstream change out to every affected downstream flag
    fn dirty(&mut self, change: UpstreamChange) {
        for target in fan_out(change) {
            match target {
                FlagTarget::Run(reason) => self.run.require(*reason),
                FlagTarget::Fit(reason) => {
                    if self.is_fit_app() {
                        self.fit.require(*reason);
                    }
                }
                FlagTarget::Sensitivity(reason) => self.sensitivity.require(*reason),
                FlagTarget::MultiSensitivity(reason) => self.multi_sensitivity.require(*reason),
            }
        }
    }

    /// Execute the model with the current run inputs
    pub fn run_model(&mut self, runner: &dyn Runner) {
        let options = self.run_options();
        match self.model.compiled() {
            Some(model) => {
                let model = model.clone();
                self.run.run(runner, &model, &options);
            }
            None => self
                .errors
                .push(GenericError::bare("Cannot run model: nothing compiled")),
        }
    }

    /// Execute the single-parameter sensitivity batch
    pub fn run_sensitivity(&mut self, runner: &dyn Runner) {
        let options = self.run_options();
        let Some(model) = self.model.compiled().cloned() else {
            self.errors
                .push(GenericError::bare("Cannot run sensitivity: nothing compiled"));
            return;
        };
        let base = self.run.parameter_values().clone();
        let end_time = self.run.end_time();
        if let Err(e) = self
            .sensitivity
            .run_batch(runner, &model, &base, end_time, &options)
        {
            self.errors
                .push(GenericError::new("Sensitivity run failed", e.to_string()));
        }
    }

    /// Execute the multi-parameter sensitivity batch
    pub fn run_multi_sensitivity(&mut self, runner: &dyn Runner) {
        let options = self.run_options();
        let Some(model) = self.model.compiled().cloned() else {
            self.errors.push(GenericError::bare(
                "Cannot run multi-sensitivity: nothing compiled",
            ));
            return;
        };
        let base = self.run.parameter_values().clone();
        let end_time = self.run.end_time();
        if let Err(e) = self
            .multi_sensitivity
            .run_batch(runner, &model, &base, end_time, &options)
        {
            self.errors.push(GenericError::new(
                "Multi-sensitivity run failed",
                e.to_string(),
            ));
        }
    }

    /// Begin a fit attempt against the current inputs
    ///
    /// Clears the fit reasons record (the attempt is now "fitting against
    /// current inputs") and returns the task driving the stepped optimizer.
    pub fn start_fit<'r, R: Runner>(&mut self, runner: &'r R) -> Result<FitTask<'r>, FitError> {
        if self.fit.is_fitting() {
            return Err(FitError::AlreadyFitting);
        }
        let model = self.model.compiled().cloned().ok_or(FitError::NoModel)?;
        let data = self.data.data().ok_or(FitError::NoData)?;
        let column = self.link.column_to_fit().ok_or(FitError::NoTargetColumn)?;
        // non-null by the link slice's invariant
        let variable = self
            .link
            .linked_variable(column)
            .ok_or(FitError::NoTargetColumn)?
            .to_string();
        let vary = self.fit.parameters_to_vary().to_vec();
        if vary.is_empty() {
            return Err(FitError::NoParametersToVary);
        }

        let times = data.times().to_vec();
        let observed = data
            .column(column)
            .ok_or(FitError::NoTargetColumn)?
            .to_vec();

        let optimizer = SimplexFit::new(
            runner,
            model,
            self.run.parameter_values().clone(),
            vary,
            variable,
            times,
            observed,
            self.run_options(),
        );
        self.fit.start_attempt();
        Ok(FitTask::new(Box::new(optimizer)))
    }

    /// Drive one step of an in-flight fit attempt
    pub fn step_fit(&mut self, task: &mut FitTask<'_>) -> StepOutcome {
        task.step(&mut self.fit)
    }

    pub(crate) fn restore(
        kind: AppKind,
        code: CodeState,
        model: ModelState,
        data: DataState,
        link: LinkState,
        run: RunState,
        fit: FitState,
        sensitivity: SensitivityState,
        multi_sensitivity: MultiSensitivityState,
        advanced: AdvancedSettings,
    ) -> Self {
        Self {
            kind,
            code,
            model,
            data,
            link,
            run,
            fit,
            sensitivity,
            multi_sensitivity,
            advanced,
            errors: Vec::new(),
        }
    }
}
