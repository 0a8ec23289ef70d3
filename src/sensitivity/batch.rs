//! Batch execution across swept parameter values
//!
//! Each combination is run independently; a failing combination is recorded
//! alongside the successes and never aborts the rest of the batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::CompiledModel;
use crate::runner::{RunOptions, Runner, RunnerError, Solution};
use crate::sensitivity::values::{SettingsError, VaryingParameterSettings};

/// One parameter combination of a batch
pub type Combination = Vec<(String, f64)>;

/// Results of a completed batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatchResult {
    pub successes: Vec<(Combination, Solution)>,
    pub errors: Vec<(Combination, RunnerError)>,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.errors.is_empty()
    }
}

/// Cross-product of the per-parameter value lists, in settings order
pub(crate) fn combinations(
    settings: &[VaryingParameterSettings],
    base: &HashMap<String, f64>,
) -> Result<Vec<Combination>, SettingsError> {
    let mut combos: Vec<Combination> = vec![Vec::new()];
    for s in settings {
        let base_value = *base
            .get(&s.name)
            .ok_or_else(|| SettingsError::UnknownParameter(s.name.clone()))?;
        let values = s.batch_values(base_value)?;
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |v| {
                    let mut next = combo.clone();
                    next.push((s.name.clone(), *v));
                    next
                })
            })
            .collect();
    }
    Ok(combos)
}

/// Run the model once per combination, collecting successes and failures
pub(crate) fn run_batch(
    runner: &dyn Runner,
    model: &CompiledModel,
    base: &HashMap<String, f64>,
    combos: Vec<Combination>,
    end_time: f64,
    options: &RunOptions,
) -> BatchResult {
    let mut result = BatchResult::default();
    for combo in combos {
        let mut parameters = base.clone();
        for (name, value) in &combo {
            parameters.insert(name.clone(), *value);
        }
        match runner.run(model, &parameters, 0.0, end_time, options) {
            Ok(solution) => result.successes.push((combo, solution)),
            Err(e) => {
                tracing::debug!(error = %e, "batch combination failed");
                result.errors.push((combo, e));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::values::{Scale, Variation};

    fn settings(name: &str, from: f64, to: f64, n: usize) -> VaryingParameterSettings {
        VaryingParameterSettings {
            name: name.to_string(),
            scale: Scale::Arithmetic,
            variation: Variation::Range { from, to },
            run_count: n,
        }
    }

    #[test]
    fn cross_product_in_settings_order() {
        let mut base = HashMap::new();
        base.insert("beta".to_string(), 1.0);
        base.insert("sigma".to_string(), 1.0);

        let combos = combinations(
            &[settings("beta", 1.0, 2.0, 2), settings("sigma", 5.0, 6.0, 2)],
            &base,
        )
        .unwrap();
        assert_eq!(combos.len(), 4);
        assert_eq!(
            combos[0],
            vec![("beta".to_string(), 1.0), ("sigma".to_string(), 5.0)]
        );
        assert_eq!(
            combos[3],
            vec![("beta".to_string(), 2.0), ("sigma".to_string(), 6.0)]
        );
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let base = HashMap::new();
        assert!(matches!(
            combinations(&[settings("beta", 1.0, 2.0, 2)], &base),
            Err(SettingsError::UnknownParameter(_))
        ));
    }
}
