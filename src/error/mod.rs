use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::DataError;
use crate::fit::FitError;
use crate::runner::RunnerError;
use crate::sensitivity::SettingsError;

/// Top-level error type for the crate
///
/// Validation and computation errors are normally absorbed at the slice
/// boundary (stored on the owning slice or inside a result); this enum exists
/// for library consumers that drive the slices directly.
#[derive(Error, Debug)]
pub enum WodinError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Sensitivity settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Fit error: {0}")]
    Fit(#[from] FitError),

    #[error("Session error: {0}")]
    Session(#[from] serde_json::Error),
}

/// A user-facing error with an optional detail string
///
/// Used for transport-level failures (session save/load, remote compilation)
/// which accumulate on the shared error list independently of the per-slice
/// dirty tracking, and for validation messages attached to slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericError {
    /// Short error label, e.g. "Could not save session"
    pub error: String,
    /// Optional human-readable detail
    pub detail: Option<String>,
}

impl GenericError {
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn bare(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
        }
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.error, detail),
            None => write!(f, "{}", self.error),
        }
    }
}
