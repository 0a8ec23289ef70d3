//! Varying-parameter settings and value-list generation
//!
//! The displayed value list is a pure function of the settings and the base
//! parameter value, recomputed synchronously on every edit; the expensive
//! batch run happens separately.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from invalid variation settings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Upper bound ({to}) must be greater than lower bound ({from})")]
    InvalidRange { from: f64, to: f64 },
    #[error("Logarithmic scale requires positive bounds (got {from} to {to})")]
    NonPositiveLogBounds { from: f64, to: f64 },
    #[error("At least two distinct values are required")]
    TooFewCustomValues,
    #[error("Custom values must be finite numbers")]
    NonFiniteCustomValue,
    #[error("Number of runs must be at least 1 (got {0})")]
    InvalidRunCount(usize),
    #[error("Parameter '{0}' is not a parameter of the current model")]
    UnknownParameter(String),
    #[error("Parameters to vary must be distinct")]
    DuplicateParameter,
    #[error("No varying-parameter settings have been saved")]
    NoSettings,
}

/// Spacing of the generated values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    Arithmetic,
    Logarithmic,
}

/// How the swept values are derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variation {
    /// Spread `percent` % either side of the base value
    Percentage { percent: f64 },
    /// Explicit bounds
    Range { from: f64, to: f64 },
    /// User-supplied value list, used verbatim
    Custom { values: Vec<f64> },
}

/// Settings for one varied parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaryingParameterSettings {
    pub name: String,
    pub scale: Scale,
    pub variation: Variation,
    pub run_count: usize,
}

impl VaryingParameterSettings {
    /// Generate the value list for a given base parameter value
    ///
    /// This both validates the settings and produces the swept values; the
    /// same function backs the synchronous preview and the batch run.
    pub fn batch_values(&self, base: f64) -> Result<Vec<f64>, SettingsError> {
        match &self.variation {
            Variation::Custom { values } => {
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(SettingsError::NonFiniteCustomValue);
                }
                let mut distinct = values.clone();
                distinct.sort_by(|a, b| a.partial_cmp(b).unwrap());
                distinct.dedup();
                if distinct.len() < 2 {
                    return Err(SettingsError::TooFewCustomValues);
                }
                Ok(values.clone())
            }
            Variation::Percentage { percent } => {
                if self.run_count < 1 {
                    return Err(SettingsError::InvalidRunCount(self.run_count));
                }
                let from = base * (1.0 - percent / 100.0);
                let to = base * (1.0 + percent / 100.0);
                self.spread(from, to)
            }
            Variation::Range { from, to } => {
                if self.run_count < 1 {
                    return Err(SettingsError::InvalidRunCount(self.run_count));
                }
                self.spread(*from, *to)
            }
        }
    }

    fn spread(&self, from: f64, to: f64) -> Result<Vec<f64>, SettingsError> {
        if to <= from {
            return Err(SettingsError::InvalidRange { from, to });
        }
        match self.scale {
            Scale::Arithmetic => Ok(linspace(from, to, self.run_count)),
            Scale::Logarithmic => {
                if from <= 0.0 {
                    return Err(SettingsError::NonPositiveLogBounds { from, to });
                }
                Ok(linspace(from.ln(), to.ln(), self.run_count)
                    .into_iter()
                    .map(f64::exp)
                    .collect())
            }
        }
    }
}

/// `n` evenly spaced values over `[from, to]`, endpoints included
fn linspace(from: f64, to: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![from];
    }
    (0..n)
        .map(|i| from + (to - from) * i as f64 / (n - 1) as f64)
        .collect()
}
