//! Reference [`FitOptimizer`] backed by argmin's Nelder–Mead solver
//!
//! Minimizes the sum of squared residuals between one linked data column and
//! the matching model variable. Each `step()` runs a bounded batch of simplex
//! iterations restarted around the best point so far, which keeps individual
//! steps short enough for a cooperative event loop to observe cancellation
//! between them.

use std::collections::HashMap;

use argmin::core::{CostFunction, Error, Executor};
use argmin::solver::neldermead::NelderMead;

use crate::model::CompiledModel;
use crate::runner::{FitOptimizer, FitResult, RunOptions, Runner, RunnerError, Solution};

const ITERATIONS_PER_STEP: u64 = 20;
const SD_TOLERANCE: f64 = 1e-10;
const CONVERGENCE_TOLERANCE: f64 = 1e-8;

/// Sum-of-squares objective over the varied parameter subset
struct SsqProblem<'a, R: Runner> {
    runner: &'a R,
    model: &'a CompiledModel,
    base: &'a HashMap<String, f64>,
    vary: &'a [String],
    variable: &'a str,
    times: &'a [f64],
    observed: &'a [f64],
    end_time: f64,
    options: &'a RunOptions,
}

impl<R: Runner> SsqProblem<'_, R> {
    fn sum_of_squares(&self, point: &[f64]) -> Result<f64, RunnerError> {
        let mut parameters = self.base.clone();
        for (name, value) in self.vary.iter().zip(point) {
            parameters.insert(name.clone(), *value);
        }
        let solution = self
            .runner
            .run(self.model, &parameters, 0.0, self.end_time, self.options)?;
        let predicted = solution.interpolate_at(self.variable, self.times)?;
        Ok(predicted
            .iter()
            .zip(self.observed)
            .map(|(p, o)| (p - o).powi(2))
            .sum())
    }
}

impl<R: Runner> CostFunction for SsqProblem<'_, R> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, point: &Self::Param) -> Result<Self::Output, Error> {
        self.sum_of_squares(point).map_err(Error::msg)
    }
}

/// Nelder–Mead fit over a subset of model parameters
pub struct SimplexFit<'a, R: Runner> {
    runner: &'a R,
    model: CompiledModel,
    base: HashMap<String, f64>,
    vary: Vec<String>,
    variable: String,
    times: Vec<f64>,
    observed: Vec<f64>,
    end_time: f64,
    options: RunOptions,
    best: Vec<f64>,
    best_cost: f64,
    iterations: u64,
    converged: bool,
}

impl<'a, R: Runner> SimplexFit<'a, R> {
    /// Set up a fit starting from the current parameter values
    ///
    /// Every name in `vary` must be a key of `base`.
    ///
    /// # Arguments
    ///
    /// * `vary` - Names of the parameters the optimizer may adjust
    /// * `variable` - Model variable linked to the target column
    /// * `times` / `observed` - The target column's time grid and values
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: &'a R,
        model: CompiledModel,
        base: HashMap<String, f64>,
        vary: Vec<String>,
        variable: impl Into<String>,
        times: Vec<f64>,
        observed: Vec<f64>,
        options: RunOptions,
    ) -> Self {
        let best = vary.iter().map(|name| base[name]).collect();
        let end_time = times.last().copied().unwrap_or(0.0);
        Self {
            runner,
            model,
            base,
            vary,
            variable: variable.into(),
            times,
            observed,
            end_time,
            options,
            best,
            best_cost: f64::INFINITY,
            iterations: 0,
            converged: false,
        }
    }

    fn problem(&self) -> SsqProblem<'_, R> {
        SsqProblem {
            runner: self.runner,
            model: &self.model,
            base: &self.base,
            vary: &self.vary,
            variable: &self.variable,
            times: &self.times,
            observed: &self.observed,
            end_time: self.end_time,
            options: &self.options,
        }
    }

    fn best_parameters(&self) -> HashMap<String, f64> {
        let mut parameters = self.base.clone();
        for (name, value) in self.vary.iter().zip(&self.best) {
            parameters.insert(name.clone(), *value);
        }
        parameters
    }
}

impl<R: Runner> FitOptimizer for SimplexFit<'_, R> {
    fn step(&mut self) -> Result<bool, RunnerError> {
        if self.converged {
            return Ok(true);
        }

        let simplex = initial_simplex(&self.best);
        let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
            .with_sd_tolerance(SD_TOLERANCE)
            .map_err(|e| RunnerError::Optimization(e.to_string()))?;

        let (batch_best, batch_cost, batch_iters) = {
            let result = Executor::new(self.problem(), solver)
                .configure(|state| state.max_iters(ITERATIONS_PER_STEP))
                .run()
                .map_err(|e| RunnerError::Optimization(e.to_string()))?;
            let state = result.state;
            (state.best_param, state.best_cost, state.iter)
        };
        self.iterations += batch_iters;

        let previous_cost = self.best_cost;
        if batch_cost < self.best_cost {
            self.best_cost = batch_cost;
            if let Some(best) = batch_best {
                self.best = best;
            }
        }

        // Converged once a full batch no longer improves the objective
        // meaningfully. The first batch never converges: there is nothing to
        // compare against.
        if previous_cost.is_finite() {
            let improvement = previous_cost - self.best_cost;
            self.converged = improvement <= CONVERGENCE_TOLERANCE * previous_cost.max(1e-300);
        }
        tracing::debug!(
            iterations = self.iterations,
            sum_of_squares = self.best_cost,
            converged = self.converged,
            "simplex fit step"
        );
        Ok(self.converged)
    }

    fn result(&self) -> FitResult {
        let parameter_values = self.best_parameters();
        let solution: Option<Solution> = self
            .runner
            .run(
                &self.model,
                &parameter_values,
                0.0,
                self.end_time,
                &self.options,
            )
            .ok();
        FitResult {
            iterations: self.iterations,
            converged: self.converged,
            sum_of_squares: self.best_cost,
            parameter_values,
            solution,
        }
    }
}

/// Build the starting simplex by perturbing each component of the point
fn initial_simplex(point: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(point.len() + 1);
    vertices.push(point.to_vec());
    for i in 0..point.len() {
        let perturbation = if point[i] == 0.0 {
            0.00025
        } else {
            0.05 * point[i]
        };
        let mut vertex = point.to_vec();
        vertex[i] += perturbation;
        vertices.push(vertex);
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactHandle;

    /// Closed-form exponential decay: y(t) = y0 * exp(-k * t)
    struct DecayRunner;

    impl Runner for DecayRunner {
        fn run(
            &self,
            _model: &CompiledModel,
            parameters: &HashMap<String, f64>,
            t_start: f64,
            t_end: f64,
            _options: &RunOptions,
        ) -> Result<Solution, RunnerError> {
            let k = parameters["k"];
            let y0 = parameters["y0"];
            let n = 101;
            let times: Vec<f64> = (0..n)
                .map(|i| t_start + (t_end - t_start) * i as f64 / (n - 1) as f64)
                .collect();
            let series: Vec<f64> = times.iter().map(|t| y0 * (-k * t).exp()).collect();
            let mut values = HashMap::new();
            values.insert("y".to_string(), series);
            Solution::new(times, values)
        }
    }

    fn decay_model() -> CompiledModel {
        CompiledModel {
            variables: vec!["y".into()],
            parameters: vec![],
            stochastic: false,
            artifact: ArtifactHandle(0),
        }
    }

    #[test]
    fn recovers_decay_rate_from_synthetic_data() {
        let runner = DecayRunner;
        let model = decay_model();
        let times: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let observed: Vec<f64> = times.iter().map(|t| 10.0 * (-0.5 * t).exp()).collect();

        let mut base = HashMap::new();
        base.insert("k".to_string(), 0.2);
        base.insert("y0".to_string(), 10.0);

        let mut fit = SimplexFit::new(
            &runner,
            model,
            base,
            vec!["k".to_string()],
            "y",
            times,
            observed,
            RunOptions::default(),
        );

        let mut converged = false;
        for _ in 0..100 {
            converged = fit.step().unwrap();
            if converged {
                break;
            }
        }
        assert!(converged);

        let result = fit.result();
        assert!(result.converged);
        assert!(result.sum_of_squares < 1e-6);
        let k = result.parameter_values["k"];
        assert!((k - 0.5).abs() < 1e-3, "recovered k = {k}");
        // untouched parameters pass through unchanged
        assert_eq!(result.parameter_values["y0"], 10.0);
        assert!(result.solution.is_some());
    }

    #[test]
    fn runner_failure_is_recoverable() {
        struct FailingRunner;
        impl Runner for FailingRunner {
            fn run(
                &self,
                _model: &CompiledModel,
                _parameters: &HashMap<String, f64>,
                _t_start: f64,
                _t_end: f64,
                _options: &RunOptions,
            ) -> Result<Solution, RunnerError> {
                Err(RunnerError::Integration("step size underflow".into()))
            }
        }

        let runner = FailingRunner;
        let model = decay_model();
        let mut base = HashMap::new();
        base.insert("k".to_string(), 0.2);

        let mut fit = SimplexFit::new(
            &runner,
            model,
            base,
            vec!["k".to_string()],
            "y",
            vec![0.0, 1.0],
            vec![1.0, 0.5],
            RunOptions::default(),
        );
        assert!(matches!(fit.step(), Err(RunnerError::Optimization(_))));
        let result = fit.result();
        assert!(!result.converged);
        assert!(result.solution.is_none());
    }
}
