//! End-to-end tests of the required-update reconciliation rules: reason
//! accumulation, fan-out independence, atomic resets, and the deterministic
//! link re-selection, all driven through the store's event interface.

use std::collections::HashMap;

use wodin_state::prelude::runner::{RunOptions, Runner, RunnerError, Solution};
use wodin_state::prelude::state::*;
use wodin_state::prelude::store::*;

/// Minimal runner: a flat line per model variable
struct StubRunner;

impl Runner for StubRunner {
    fn run(
        &self,
        model: &CompiledModel,
        _parameters: &HashMap<String, f64>,
        t_start: f64,
        t_end: f64,
        _options: &RunOptions,
    ) -> Result<Solution, RunnerError> {
        let times = vec![t_start, t_end];
        let values = model
            .variables
            .iter()
            .map(|v| (v.clone(), vec![1.0, 1.0]))
            .collect();
        Solution::new(times, values)
    }
}

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
        Err(RunnerError::Integration("integration blew up".into()))
    }
}

fn sir_model() -> CompiledModel {
    CompiledModel {
        variables: vec!["S".into(), "I".into(), "R".into()],
        parameters: vec![
            ParameterDefinition {
                name: "beta".into(),
                default: 4.0,
            },
            ParameterDefinition {
                name: "sigma".into(),
                default: 2.0,
            },
        ],
        stochastic: false,
        artifact: ArtifactHandle(1),
    }
}

fn compiled_app(kind: AppKind) -> AppState {
    let mut app = AppState::new(kind, "deriv(S) <- -beta * S * I / N");
    app.apply(AppEvent::CompileSucceeded(sir_model()));
    app
}

fn fit_app_with_data() -> AppState {
    let mut app = compiled_app(AppKind::Fit);
    app.apply(AppEvent::UploadData(
        "t,cases,deaths\n0,1,0\n1,3,1\n2,4,2\n3,8,3\n4,9,4\n".to_string(),
    ));
    app.apply(AppEvent::SetLink {
        column: "cases".into(),
        variable: Some("I".into()),
    });
    app
}

#[test]
fn reason_record_reset_is_idempotent_over_any_edit_sequence() {
    let mut app = compiled_app(AppKind::Basic);
    app.run_model(&StubRunner);

    // arbitrary pile-up of dirtying events
    app.apply(AppEvent::SetParameterValue {
        name: "beta".into(),
        value: 5.0,
    });
    app.apply(AppEvent::SetEndTime(250.0));
    app.apply(AppEvent::CompileSucceeded(sir_model()));
    app.apply(AppEvent::SetParameterValue {
        name: "sigma".into(),
        value: 1.0,
    });
    assert!(app.run().required().any());

    app.run_model(&StubRunner);
    assert_eq!(*app.run().required(), RunRequiredReasons::default());
}

#[test]
fn failed_run_clears_flags_and_records_the_error() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetParameterValue {
        name: "beta".into(),
        value: 5.0,
    });
    assert!(app.run().required().parameter_value_changed);

    app.run_model(&FailingRunner);

    // a failed attempt is still "up to date" with its inputs
    assert!(!app.run().required().any());
    let result = app.run().result().unwrap();
    assert!(result.solution().is_none());
    assert!(matches!(result.error(), Some(RunnerError::Integration(_))));
}

#[test]
fn end_time_dirties_only_when_it_grows_past_the_last_run() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetEndTime(100.0));
    app.run_model(&StubRunner);

    app.apply(AppEvent::SetEndTime(50.0));
    assert!(!app.run().required().end_time_changed);

    app.apply(AppEvent::SetEndTime(100.0));
    assert!(!app.run().required().end_time_changed);

    app.apply(AppEvent::SetEndTime(101.0));
    assert!(app.run().required().end_time_changed);
}

#[test]
fn model_recompile_fans_out_to_all_four_slices_independently() {
    let mut app = fit_app_with_data();
    app.run_model(&StubRunner);
    assert!(!app.run().required().any());

    app.apply(AppEvent::CompileSucceeded(sir_model()));
    assert!(app.run().required().model_changed);
    assert!(app.fit().required().model_changed);
    assert!(app.sensitivity().required().model_changed);
    assert!(app.multi_sensitivity().required().model_changed);

    // clearing one slice's flag leaves the others dirty
    app.run_model(&StubRunner);
    assert!(!app.run().required().model_changed);
    assert!(app.fit().required().model_changed);
    assert!(app.sensitivity().required().model_changed);
    assert!(app.multi_sensitivity().required().model_changed);
}

#[test]
fn parameter_set_uniqueness_scenario() {
    let mut app = compiled_app(AppKind::Basic);

    // beta defaults to 4: save succeeds
    app.apply(AppEvent::SaveParameterSet);
    assert_eq!(app.run().saved_parameter_sets().len(), 1);
    assert_eq!(app.run().saved_parameter_sets()[0].name(), "Set 1");

    app.apply(AppEvent::SetParameterValue {
        name: "beta".into(),
        value: 5.0,
    });
    app.apply(AppEvent::SaveParameterSet);
    assert_eq!(app.run().saved_parameter_sets().len(), 2);

    // back to beta = 4: duplicate of Set 1, rejected
    app.apply(AppEvent::SetParameterValue {
        name: "beta".into(),
        value: 4.0,
    });
    app.apply(AppEvent::SaveParameterSet);
    assert_eq!(app.run().saved_parameter_sets().len(), 2);
    assert_eq!(app.errors().len(), 1);
    assert_eq!(app.errors()[0].error, "Could not save parameter set");
}

#[test]
fn csv_upload_scenarios() {
    let mut app = compiled_app(AppKind::Fit);

    app.apply(AppEvent::UploadData(
        "a,b\n1,2\n3,4\n5,6\n7,8\n9,10".to_string(),
    ));
    let data = app.data().data().unwrap();
    assert_eq!(data.n_rows(), 5);
    assert_eq!(
        data.time_variable_candidates(),
        &["a".to_string(), "b".to_string()]
    );
    assert_eq!(data.time_variable(), "a");
    assert!(app.fit().required().data_changed);

    // a bad replacement upload clears the slice
    app.apply(AppEvent::UploadData("a,b\n1,hello\n".to_string()));
    assert!(app.data().data().is_none());
    let error = app.data().error().unwrap();
    assert!(error.detail.as_ref().unwrap().contains("Non-numeric"));
}

#[test]
fn link_target_reselection_through_the_store() {
    let mut app = fit_app_with_data();
    app.apply(AppEvent::SetLink {
        column: "deaths".into(),
        variable: Some("R".into()),
    });
    app.apply(AppEvent::SetColumnToFit("deaths".into()));
    assert_eq!(app.link().column_to_fit(), Some("deaths"));

    // unlinking the target falls back to the first linked column
    app.apply(AppEvent::SetLink {
        column: "deaths".into(),
        variable: None,
    });
    assert_eq!(app.link().column_to_fit(), Some("cases"));
    assert!(app.fit().required().link_changed);
    assert!(app.sensitivity().required().link_changed);

    app.apply(AppEvent::SetLink {
        column: "cases".into(),
        variable: None,
    });
    assert_eq!(app.link().column_to_fit(), None);
}

#[test]
fn linking_to_an_unknown_variable_is_a_surfaced_error() {
    let mut app = fit_app_with_data();
    app.apply(AppEvent::SetLink {
        column: "deaths".into(),
        variable: Some("X".into()),
    });
    assert_eq!(app.link().linked_variable("deaths"), None);
    assert_eq!(app.errors().len(), 1);

    app.apply(AppEvent::DismissErrors);
    assert!(app.errors().is_empty());
}

#[test]
fn replicates_only_dirty_stochastic_apps() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetNumberOfReplicates(20));
    assert!(!app.run().required().number_of_replicates_changed);

    let mut app = compiled_app(AppKind::Stochastic);
    app.apply(AppEvent::SetNumberOfReplicates(20));
    assert!(app.run().required().number_of_replicates_changed);
    assert!(app.sensitivity().required().number_of_replicates_changed);
    assert_eq!(app.run_options().replicates, 20);

    // unchanged value is not an edit
    app.run_model(&StubRunner);
    app.apply(AppEvent::SetNumberOfReplicates(20));
    assert!(!app.run().required().number_of_replicates_changed);
}

#[test]
fn advanced_settings_dirty_fit_and_sensitivity_but_not_run() {
    let mut app = fit_app_with_data();
    app.apply(AppEvent::SetAdvancedSettings(AdvancedSettings {
        tol: 1e-8,
        max_steps: 20_000,
    }));
    assert!(!app.run().required().any());
    assert!(app.fit().required().advanced_settings_changed);
    assert!(app.sensitivity().required().advanced_settings_changed);
    assert!(app.multi_sensitivity().required().advanced_settings_changed);

    // applying identical settings again is not an edit
    let before = *app.fit().required();
    app.apply(AppEvent::SetAdvancedSettings(AdvancedSettings {
        tol: 1e-8,
        max_steps: 20_000,
    }));
    assert_eq!(*app.fit().required(), before);
}

#[test]
fn sensitivity_batch_clears_only_its_own_record() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetSensitivitySettings(VaryingParameterSettings {
        name: "beta".into(),
        scale: Scale::Arithmetic,
        variation: Variation::Percentage { percent: 10.0 },
        run_count: 5,
    }));
    app.apply(AppEvent::SetParameterValue {
        name: "beta".into(),
        value: 6.0,
    });
    assert!(app.run().required().parameter_value_changed);
    assert!(app.sensitivity().required().parameter_value_changed);

    app.run_sensitivity(&StubRunner);
    assert!(!app.sensitivity().required().any());
    assert_eq!(app.sensitivity().result().unwrap().successes.len(), 5);
    // the run pane is still stale
    assert!(app.run().required().parameter_value_changed);
}

#[test]
fn invalid_sensitivity_settings_never_reach_the_slice() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetSensitivitySettings(VaryingParameterSettings {
        name: "beta".into(),
        scale: Scale::Logarithmic,
        variation: Variation::Range { from: -2.0, to: 2.0 },
        run_count: 5,
    }));
    assert!(app.sensitivity().settings().is_none());
    assert_eq!(app.errors().len(), 1);
    assert!(!app.sensitivity().required().sensitivity_options_changed);
}

#[test]
fn code_edit_requires_recompile_but_dirties_nothing_until_compiled() {
    let mut app = compiled_app(AppKind::Basic);
    app.run_model(&StubRunner);

    app.apply(AppEvent::SetCode("deriv(S) <- -beta * S".to_string()));
    assert!(app.model().compile_required());
    // no model-changed reason until a compile actually completes
    assert!(!app.run().required().model_changed);

    app.apply(AppEvent::CompileSucceeded(sir_model()));
    assert!(!app.model().compile_required());
    assert!(app.run().required().model_changed);
}

#[test]
fn compile_failure_keeps_the_pane_waiting_on_a_fix() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetCode("deriv(S) <-".to_string()));
    app.apply(AppEvent::CompileFailed(vec![
        wodin_state::GenericError::new("Syntax error", "unexpected end of input"),
    ]));
    assert!(!app.model().is_valid());
    assert!(app.model().compile_required());
    assert_eq!(app.model().messages().len(), 1);
    // a failed compile produces no new model, so nothing downstream dirties
    assert!(!app.run().required().model_changed);
}

#[test]
fn recompile_merges_parameter_defaults() {
    let mut app = compiled_app(AppKind::Basic);
    app.apply(AppEvent::SetParameterValue {
        name: "beta".into(),
        value: 9.5,
    });

    app.apply(AppEvent::CompileSucceeded(sir_model()));
    assert_eq!(app.run().parameter_values().get("beta"), Some(&9.5));
    assert_eq!(app.run().parameter_values().get("sigma"), Some(&2.0));
}
