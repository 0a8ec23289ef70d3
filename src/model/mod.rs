//! The compiled-model slice
//!
//! Holds the artifact produced by the (external) model compiler, its
//! validation messages, and the flag saying the current source has not been
//! compiled yet. A successful compile replaces the compiled model wholesale
//! and broadcasts a model-changed reason to every downstream slice; the
//! broadcast itself is performed by the store's dispatch table, not here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GenericError;

/// Opaque handle to a compiled model artifact
///
/// The actual executable form lives behind the [`crate::runner::Runner`]
/// boundary; the slices only ever pass the handle through. Session snapshots
/// do not persist handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle(pub u64);

/// A model parameter as declared by the compiled model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub default: f64,
}

/// Metadata for a successfully compiled model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledModel {
    /// Output variables, in model declaration order
    pub variables: Vec<String>,
    /// Declared parameters with their default values
    pub parameters: Vec<ParameterDefinition>,
    /// Whether the model is discrete-time stochastic
    pub stochastic: bool,
    /// Handle to the executable artifact held by the runner
    pub artifact: ArtifactHandle,
}

impl CompiledModel {
    /// Default parameter values as a map, used to seed the run slice
    pub fn default_parameters(&self) -> HashMap<String, f64> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.default))
            .collect()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }
}

/// Session projection of the model slice
///
/// The compiled artifact is not persisted: a rehydrated session always
/// requires a fresh compile of the restored source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub messages: Vec<GenericError>,
    pub had_model: bool,
}

/// The model slice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelState {
    compiled: Option<CompiledModel>,
    messages: Vec<GenericError>,
    compile_required: bool,
}

impl ModelState {
    /// Whether the last compile attempt produced a usable model
    pub fn is_valid(&self) -> bool {
        self.compiled.is_some() && self.messages.is_empty()
    }

    pub fn compiled(&self) -> Option<&CompiledModel> {
        self.compiled.as_ref()
    }

    /// Validation messages from the last compile attempt
    pub fn messages(&self) -> &[GenericError] {
        &self.messages
    }

    /// True when the source has been edited since the last compile
    pub fn compile_required(&self) -> bool {
        self.compile_required
    }

    /// Mark the compiled model stale after a source edit
    pub fn set_compile_required(&mut self) {
        self.compile_required = true;
    }

    /// Record a successful compile, replacing the previous model wholesale
    pub fn compile_succeeded(&mut self, model: CompiledModel) {
        tracing::debug!(
            variables = model.variables.len(),
            parameters = model.parameters.len(),
            "model compiled"
        );
        self.compiled = Some(model);
        self.messages.clear();
        self.compile_required = false;
    }

    /// Project the slice for session persistence
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            messages: self.messages.clone(),
            had_model: self.compiled.is_some(),
        }
    }

    /// Rebuild the slice from a session snapshot
    ///
    /// The restored source has no artifact yet, so a compile is required
    /// regardless of the state at save time.
    pub fn from_snapshot(snapshot: ModelSnapshot) -> Self {
        Self {
            compiled: None,
            messages: snapshot.messages,
            compile_required: true,
        }
    }

    /// Record a failed compile
    ///
    /// The previous compiled model (if any) is discarded: its metadata no
    /// longer describes the current source. The compile-required flag stays
    /// set so the user is still prompted to fix and recompile.
    pub fn compile_failed(&mut self, messages: Vec<GenericError>) {
        tracing::debug!(messages = messages.len(), "model compilation failed");
        self.compiled = None;
        self.messages = messages;
    }
}
