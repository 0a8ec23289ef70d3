//! Session persistence projection
//!
//! Projects the whole container into a JSON-compatible snapshot for the
//! transport layer, and rehydrates a container from one. Opaque solution
//! handles are never persisted: snapshots record only whether a result was
//! present, and rehydrated slices recompute results on demand.

use serde::{Deserialize, Serialize};

use crate::code::CodeState;
use crate::data::DataState;
use crate::fit::{FitSnapshot, FitState};
use crate::link::LinkState;
use crate::model::{ModelSnapshot, ModelState};
use crate::run::{RunSnapshot, RunState};
use crate::sensitivity::{MultiSensitivityState, SensitivitySnapshot, SensitivityState};
use crate::store::{AdvancedSettings, AppKind, AppState};

/// JSON-compatible projection of an [`AppState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub kind: AppKind,
    pub code: CodeState,
    pub model: ModelSnapshot,
    pub data: DataState,
    pub link: LinkState,
    pub run: RunSnapshot,
    pub fit: FitSnapshot,
    pub sensitivity: SensitivitySnapshot,
    pub multi_sensitivity: SensitivitySnapshot,
    pub advanced: AdvancedSettings,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl AppState {
    /// Project the container for persistence
    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            kind: self.kind(),
            code: self.code().clone(),
            model: self.model().snapshot(),
            data: self.data().clone(),
            link: self.link().clone(),
            run: self.run().snapshot(),
            fit: self.fit().snapshot(),
            sensitivity: self.sensitivity().snapshot(),
            multi_sensitivity: self.multi_sensitivity().snapshot(),
            advanced: self.advanced().clone(),
        }
    }

    /// Rebuild a container from a persisted snapshot
    ///
    /// Results and compiled artifacts are absent after rehydration; the
    /// model slice comes back compile-required so the artifact is rebuilt
    /// before anything runs.
    pub fn rehydrate(snapshot: SessionSnapshot) -> Self {
        AppState::restore(
            snapshot.kind,
            snapshot.code,
            ModelState::from_snapshot(snapshot.model),
            snapshot.data,
            snapshot.link,
            RunState::from_snapshot(snapshot.run),
            FitState::from_snapshot(snapshot.fit),
            SensitivityState::from_snapshot(snapshot.sensitivity),
            MultiSensitivityState::from_snapshot(snapshot.multi_sensitivity),
            snapshot.advanced,
        )
    }
}
