pub mod parse;

pub use parse::{parse_data, DataError, FitData};

use serde::{Deserialize, Serialize};

use crate::error::GenericError;

/// The uploaded-data slice (fit apps only)
///
/// Holds the parsed tabular data, or nothing if no upload has succeeded yet.
/// A failed upload clears any previously held data and records the error: the
/// user replaced their data, so stale rows must not keep driving a fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataState {
    data: Option<FitData>,
    error: Option<GenericError>,
}

impl DataState {
    pub fn data(&self) -> Option<&FitData> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&GenericError> {
        self.error.as_ref()
    }

    /// Parse and store an uploaded CSV payload
    ///
    /// Returns true if the upload succeeded and the slice now holds data.
    pub fn upload(&mut self, raw: &str) -> bool {
        match parse_data(raw) {
            Ok(data) => {
                tracing::debug!(
                    rows = data.n_rows(),
                    columns = data.columns().len(),
                    "data uploaded"
                );
                self.data = Some(data);
                self.error = None;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "data upload rejected");
                self.data = None;
                self.error = Some(GenericError::new(
                    "An error occurred when loading data",
                    e.to_string(),
                ));
                false
            }
        }
    }

    /// Select a different time variable from the candidate list
    ///
    /// Returns true if the selection changed. Non-candidate names are ignored.
    pub fn set_time_variable(&mut self, name: &str) -> bool {
        match self.data.as_mut() {
            Some(data) => data.set_time_variable(name),
            None => false,
        }
    }
}
