//! The linked-variable slice (fit apps only)
//!
//! Maps uploaded data columns to model output variables and designates one
//! linked column as the fit target. Re-selection of the target after any map
//! mutation is deterministic: keep the current target if it is still linked,
//! otherwise take the first linked column in original column order, otherwise
//! none.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::FitData;
use crate::model::CompiledModel;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    /// Linkable data columns, in file order (excludes the time variable)
    columns: Vec<String>,
    /// Column -> model variable, `None` while unlinked
    map: HashMap<String, Option<String>>,
    column_to_fit: Option<String>,
}

impl LinkState {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn linked_variable(&self, column: &str) -> Option<&str> {
        self.map.get(column).and_then(|v| v.as_deref())
    }

    pub fn column_to_fit(&self) -> Option<&str> {
        self.column_to_fit.as_deref()
    }

    /// Columns with a non-null link, in column order
    pub fn linked_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| self.linked_variable(c).is_some())
            .map(|c| c.as_str())
            .collect()
    }

    /// Rebuild the map after a data upload, time-variable change or recompile
    ///
    /// Keys become the current linkable columns; existing links survive when
    /// both the column and the linked variable still exist. Everything else is
    /// pruned, then the fit target is re-selected.
    pub fn refresh(&mut self, data: Option<&FitData>, model: Option<&CompiledModel>) {
        let columns: Vec<String> = match data {
            Some(data) => data.linkable_columns().iter().map(|c| c.to_string()).collect(),
            None => Vec::new(),
        };
        let mut map: HashMap<String, Option<String>> = HashMap::new();
        for column in &columns {
            let kept = self
                .map
                .get(column)
                .and_then(|v| v.clone())
                .filter(|variable| model.map(|m| m.has_variable(variable)).unwrap_or(false));
            map.insert(column.clone(), kept);
        }
        self.columns = columns;
        self.map = map;
        self.reselect_column_to_fit();
    }

    /// Link or unlink a single column
    ///
    /// Unknown columns are ignored. Returns true if the map changed.
    pub fn set_link(&mut self, column: &str, variable: Option<String>) -> bool {
        match self.map.get_mut(column) {
            Some(slot) if *slot != variable => {
                *slot = variable;
                self.reselect_column_to_fit();
                true
            }
            _ => false,
        }
    }

    /// Designate a linked column as the fit target
    ///
    /// Returns true if the target changed. Unlinked columns are rejected.
    pub fn set_column_to_fit(&mut self, column: &str) -> bool {
        if self.column_to_fit.as_deref() == Some(column) {
            return false;
        }
        if self.linked_variable(column).is_some() {
            self.column_to_fit = Some(column.to_string());
            true
        } else {
            false
        }
    }

    fn reselect_column_to_fit(&mut self) {
        let still_linked = self
            .column_to_fit
            .as_deref()
            .map(|c| self.linked_variable(c).is_some())
            .unwrap_or(false);
        if still_linked {
            return;
        }
        let next = self.linked_columns().first().map(|c| c.to_string());
        self.column_to_fit = next;
    }
}
