//! The full fit workflow through the store: prerequisites, starting an
//! attempt (which clears the fit reasons record), stepping to convergence,
//! mid-flight edits, and cancellation.

use std::collections::HashMap;

use wodin_state::prelude::runner::{RunOptions, Runner, RunnerError, Solution};
use wodin_state::prelude::state::*;
use wodin_state::prelude::store::*;

/// Closed-form decay model: I(t) = y0 * exp(-k * t)
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
        values.insert("I".to_string(), series);
        Solution::new(times, values)
    }
}

fn decay_model() -> CompiledModel {
    CompiledModel {
        variables: vec!["I".into()],
        parameters: vec![
            ParameterDefinition {
                name: "k".into(),
                default: 0.2,
            },
            ParameterDefinition {
                name: "y0".into(),
                default: 10.0,
            },
        ],
        stochastic: false,
        artifact: ArtifactHandle(7),
    }
}

/// CSV of the true model sampled at integer times, k = 0.5, y0 = 10
fn decay_csv() -> String {
    let mut csv = String::from("t,cases\n");
    for i in 0..=8 {
        let t = i as f64;
        csv.push_str(&format!("{},{}\n", t, 10.0 * (-0.5 * t).exp()));
    }
    csv
}

fn ready_app() -> AppState {
    let mut app = AppState::new(AppKind::Fit, "deriv(I) <- -k * I");
    app.apply(AppEvent::CompileSucceeded(decay_model()));
    app.apply(AppEvent::UploadData(decay_csv()));
    app.apply(AppEvent::SetLink {
        column: "cases".into(),
        variable: Some("I".into()),
    });
    app.apply(AppEvent::SetParametersToVary(vec!["k".into()]));
    app
}

#[test]
fn prerequisites_are_checked_in_order() {
    let runner = DecayRunner;

    let mut app = AppState::new(AppKind::Fit, "code");
    assert_eq!(app.start_fit(&runner).unwrap_err(), FitError::NoModel);

    app.apply(AppEvent::CompileSucceeded(decay_model()));
    assert_eq!(app.start_fit(&runner).unwrap_err(), FitError::NoData);

    app.apply(AppEvent::UploadData(decay_csv()));
    assert_eq!(
        app.start_fit(&runner).unwrap_err(),
        FitError::NoTargetColumn
    );

    app.apply(AppEvent::SetLink {
        column: "cases".into(),
        variable: Some("I".into()),
    });
    assert_eq!(
        app.start_fit(&runner).unwrap_err(),
        FitError::NoParametersToVary
    );
}

#[test]
fn fit_converges_and_recovers_the_decay_rate() {
    let runner = DecayRunner;
    let mut app = ready_app();
    assert!(app.fit().required().any());

    let mut task = app.start_fit(&runner).unwrap();
    // starting the attempt cleared the record: we are now fitting against
    // current inputs, converged or not
    assert!(!app.fit().required().any());
    assert!(app.fit().is_fitting());

    let mut outcome = StepOutcome::Continue;
    for _ in 0..200 {
        outcome = app.step_fit(&mut task);
        if outcome != StepOutcome::Continue {
            break;
        }
    }
    assert_eq!(outcome, StepOutcome::Converged);
    assert!(!app.fit().is_fitting());
    assert!(!app.fit().cancelled());

    let result = app.fit().result().unwrap();
    assert!(result.converged);
    let k = result.parameter_values["k"];
    assert!((k - 0.5).abs() < 1e-3, "recovered k = {k}");
    assert_eq!(result.parameter_values["y0"], 10.0);
    assert!(result.solution.is_some());
}

#[test]
fn edits_during_a_fit_accumulate_for_the_next_attempt() {
    let runner = DecayRunner;
    let mut app = ready_app();
    let mut task = app.start_fit(&runner).unwrap();
    app.step_fit(&mut task);

    app.apply(AppEvent::SetParameterValue {
        name: "y0".into(),
        value: 12.0,
    });
    assert!(app.fit().required().parameter_value_changed);

    // the flag survives until the *next* attempt starts
    app.step_fit(&mut task);
    assert!(app.fit().required().parameter_value_changed);
}

#[test]
fn cancellation_keeps_the_best_so_far_visible() {
    let runner = DecayRunner;
    let mut app = ready_app();
    let mut task = app.start_fit(&runner).unwrap();

    assert_eq!(app.step_fit(&mut task), StepOutcome::Continue);
    let committed = app.fit().result().unwrap().clone();

    task.token().cancel();
    assert_eq!(app.step_fit(&mut task), StepOutcome::Cancelled);

    assert!(app.fit().cancelled());
    assert!(!app.fit().is_fitting());
    let shown = app.fit().result().unwrap();
    assert_eq!(shown.iterations, committed.iterations);
    assert!(!shown.converged);
}

#[test]
fn unknown_parameters_to_vary_are_rejected() {
    let runner = DecayRunner;
    let mut app = ready_app();

    app.apply(AppEvent::SetParametersToVary(vec!["bogus".into()]));
    assert_eq!(app.fit().parameters_to_vary(), ["k".to_string()]);
    assert_eq!(app.errors().len(), 1);

    // the surviving selection still supports an attempt
    let task = app.start_fit(&runner);
    assert!(task.is_ok());
}

#[test]
fn only_one_attempt_at_a_time() {
    let runner = DecayRunner;
    let mut app = ready_app();
    let _task = app.start_fit(&runner).unwrap();
    assert_eq!(
        app.start_fit(&runner).unwrap_err(),
        FitError::AlreadyFitting
    );
}
