use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from saved parameter-set management
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterSetError {
    #[error("Current parameter values duplicate saved set '{name}'")]
    Duplicate { name: String },
    #[error("No saved parameter set named '{name}'")]
    NotFound { name: String },
}

/// An immutable named snapshot of parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    name: String,
    values: HashMap<String, f64>,
}

impl ParameterSet {
    pub(crate) fn new(name: String, values: HashMap<String, f64>) -> Self {
        Self { name, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &HashMap<String, f64> {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut HashMap<String, f64> {
        &mut self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_name_and_values() {
        let mut values = HashMap::new();
        values.insert("beta".to_string(), 4.0);
        let set = ParameterSet::new("Set 1".to_string(), values);
        assert_eq!(set.name(), "Set 1");
        assert_eq!(set.values().get("beta"), Some(&4.0));
    }
}
