//! Boundary to the external numerics layer
//!
//! The crate does not integrate ODEs or implement optimization itself; it
//! drives an implementation of [`Runner`] for simulation and a
//! [`FitOptimizer`] for iterative fitting. Errors crossing this boundary are
//! recoverable per-attempt: they are captured into the requesting slice's
//! result and never abort the process.

pub mod simplex;

pub use simplex::SimplexFit;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::CompiledModel;

/// Errors surfaced by the numerics layer
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunnerError {
    #[error("Model integration failed: {0}")]
    Integration(String),
    #[error("Optimization failed: {0}")]
    Optimization(String),
    #[error("Unknown model variable: {0}")]
    UnknownVariable(String),
}

/// Options forwarded to the runner for a single simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Replicates per run, only meaningful for stochastic models
    pub replicates: usize,
    /// Relative tolerance for the integrator
    pub tol: f64,
    /// Maximum number of integrator steps
    pub max_steps: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            replicates: 1,
            tol: 1e-6,
            max_steps: 10_000,
        }
    }
}

/// A computed model solution over a time domain
///
/// Stochastic replicates are reduced to their mean trace by the runner; the
/// slices only ever consume one series per variable. The full computed domain
/// is retained so that a later, shorter end time can be served by truncation
/// without rerunning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    times: Vec<f64>,
    values: HashMap<String, Vec<f64>>,
}

impl Solution {
    /// Build a solution, checking that every series matches the time grid
    pub fn new(times: Vec<f64>, values: HashMap<String, Vec<f64>>) -> Result<Self, RunnerError> {
        for (name, series) in &values {
            if series.len() != times.len() {
                return Err(RunnerError::Integration(format!(
                    "series '{}' has {} points for {} times",
                    name,
                    series.len(),
                    times.len()
                )));
            }
        }
        Ok(Self { times, values })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn series(&self, variable: &str) -> Option<&[f64]> {
        self.values.get(variable).map(|v| v.as_slice())
    }

    /// Last time point of the computed domain
    pub fn end_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Linearly interpolate one variable at time `t`
    ///
    /// Returns `None` for unknown variables or times outside the domain.
    pub fn interpolate(&self, variable: &str, t: f64) -> Option<f64> {
        let series = self.values.get(variable)?;
        if self.times.is_empty() || t < self.times[0] || t > self.end_time() {
            return None;
        }
        let idx = match self
            .times
            .binary_search_by(|probe| probe.partial_cmp(&t).unwrap())
        {
            Ok(i) => return Some(series[i]),
            Err(i) => i,
        };
        let (t0, t1) = (self.times[idx - 1], self.times[idx]);
        let (y0, y1) = (series[idx - 1], series[idx]);
        Some(y0 + (y1 - y0) * (t - t0) / (t1 - t0))
    }

    /// Interpolate one variable at each of the given times
    pub fn interpolate_at(&self, variable: &str, times: &[f64]) -> Result<Vec<f64>, RunnerError> {
        if !self.values.contains_key(variable) {
            return Err(RunnerError::UnknownVariable(variable.to_string()));
        }
        Ok(times
            .iter()
            .map(|&t| self.interpolate(variable, t).unwrap_or(f64::NAN))
            .collect())
    }
}

/// Model simulation boundary
pub trait Runner {
    /// Run the model over `[t_start, t_end]` with the given parameter values
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        model: &CompiledModel,
        parameters: &HashMap<String, f64>,
        t_start: f64,
        t_end: f64,
        options: &RunOptions,
    ) -> Result<Solution, RunnerError>;
}

/// Result of a fit attempt, updated after every optimizer step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub iterations: u64,
    pub converged: bool,
    pub sum_of_squares: f64,
    /// Full parameter map with the optimized values substituted in
    pub parameter_values: HashMap<String, f64>,
    /// Solution at the best parameters, absent if it could not be computed
    pub solution: Option<Solution>,
}

/// Iterative fitting boundary
///
/// A fit is driven one step at a time so a cooperative event loop can observe
/// cancellation between steps; see [`crate::fit::FitTask`].
pub trait FitOptimizer {
    /// Advance the optimization by one bounded batch of iterations
    ///
    /// Returns true once the optimizer considers itself converged.
    fn step(&mut self) -> Result<bool, RunnerError>;

    /// Best-so-far result
    fn result(&self) -> FitResult;
}
